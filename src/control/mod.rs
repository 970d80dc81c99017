//! Remote-control action protocol
//!
//! Defines the wire representation of control actions sent over the
//! data channel (mouse, keyboard, audio capture, display selection)
//! and the pure encode/validate functions around it.

mod action;

pub use action::{
    encode_keyboard, encode_mouse, validate_manual_action, ActionError, MouseFlag, RemoteAction,
};

/// Wire `type` discriminants for the action object.
pub const TYPE_MOUSE: i64 = 0;
pub const TYPE_KEYBOARD: i64 = 1;
pub const TYPE_AUDIO_CAPTURE: i64 = 2;
pub const TYPE_DISPLAY_ID: i64 = 3;
