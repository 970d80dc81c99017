//! Input capture and normalization
//!
//! The input engine is the single source of truth for the remote cursor
//! position and the only producer of outbound mouse/keyboard actions.
//! The embedding frontend feeds it pointer, touch, wheel and key events
//! (already carrying client coordinates and relative deltas) plus
//! surface-rectangle updates; the engine emits actions through an
//! [`ActionSink`] and UI notices through an unbounded channel.

pub mod engine;
pub mod virtual_mouse;

pub use engine::InputEngine;
pub use virtual_mouse::{Gesture, OverlayState, VirtualButton};

use crate::control::RemoteAction;
use serde::{Deserialize, Serialize};

/// Outbound action capability handed to the engine.
///
/// Sends are best-effort: a closed or absent channel drops the action
/// and returns `false`. The engine never fails its caller over this.
pub trait ActionSink: Send + Sync {
    /// Whether the underlying channel is currently open.
    fn is_open(&self) -> bool;

    /// Send one action; returns `false` when it was dropped.
    fn send_action(&self, action: &RemoteAction) -> bool;
}

/// Host pointer capability probed once at startup
/// (`hover + fine pointer` on the web, an attached mouse elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Hover plus fine pointer precision; virtual controls disabled.
    Desktop,
    /// Touch-first host; virtual controls enabled.
    Mobile,
}

/// Runtime-switchable touch interpretation on mobile hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MobileMode {
    /// Tap-to-position: every touch repositions the cursor directly.
    #[default]
    Absolute,
    /// Incremental drag: touches integrate per-step deltas.
    Relative,
}

/// The effective interaction mode, derived from device class and
/// mobile mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Desktop,
    MobileAbsolute,
    MobileRelative,
}

/// Cursor position as fractions of the remote video surface,
/// always inside `[0,1] x [0,1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }
}

/// Bounding rectangle of the render surface in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether a client-coordinate point falls inside the rectangle,
    /// edges included.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left
            && x <= self.left + self.width
            && y >= self.top
            && y <= self.top + self.height
    }

    /// Linear mapping from client coordinates to the normalized space.
    pub fn normalize(&self, x: f64, y: f64) -> NormalizedPoint {
        NormalizedPoint::clamped((x - self.left) / self.width, (y - self.top) / self.height)
    }
}

/// Pointer source kind, mirroring the host event's pointer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// A pointer event from the host.
///
/// `movement_x`/`movement_y` carry the relative deltas reported while
/// the pointer lock is engaged; they are zero otherwise.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub client_x: f64,
    pub client_y: f64,
    pub movement_x: f64,
    pub movement_y: f64,
    /// Button id: 0 left, 1 middle, 2 right.
    pub button: i16,
    pub kind: PointerKind,
}

impl PointerEvent {
    pub fn mouse(client_x: f64, client_y: f64, button: i16) -> Self {
        Self {
            client_x,
            client_y,
            movement_x: 0.0,
            movement_y: 0.0,
            button,
            kind: PointerKind::Mouse,
        }
    }

    pub fn touch(client_x: f64, client_y: f64) -> Self {
        Self {
            client_x,
            client_y,
            movement_x: 0.0,
            movement_y: 0.0,
            button: 0,
            kind: PointerKind::Touch,
        }
    }

    pub fn locked_motion(movement_x: f64, movement_y: f64) -> Self {
        Self {
            client_x: 0.0,
            client_y: 0.0,
            movement_x,
            movement_y,
            button: 0,
            kind: PointerKind::Mouse,
        }
    }
}

/// A wheel event from the host.
#[derive(Debug, Clone, Copy)]
pub struct WheelEvent {
    pub client_x: f64,
    pub client_y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
}

/// A single touch sample in client coordinates.
#[derive(Debug, Clone, Copy)]
pub struct TouchPoint {
    pub client_x: f64,
    pub client_y: f64,
}

/// A key event from the host.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub key_code: i32,
    pub ctrl: bool,
    /// Host-reported auto-repeat flag.
    pub repeat: bool,
    /// Focus currently inside a text-entry field.
    pub text_entry_focused: bool,
}

/// A synthesized pointer event routed through the engine's
/// state machine by an external caller.
#[derive(Debug, Clone, Copy)]
pub enum InjectedPointer {
    Down(PointerEvent),
    Move(PointerEvent),
    Up(PointerEvent),
    Wheel(WheelEvent),
}

/// Notices the engine emits toward the embedding UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    /// Ask the environment for an exclusive relative-motion capture.
    RequestPointerLock,
    /// Ask the environment to release the capture (Ctrl+Escape chord).
    ReleasePointerLock,
    /// Transient lock-related notification.
    LockToast { text: String, duration_ms: u64 },
    /// Arm (`true`) or disarm the virtual-wheel repeat timer.
    WheelRepeat(bool),
    /// The virtual-mouse overlay moved to a new anchor.
    OverlayMoved { x: f64, y: f64 },
    /// The overlay minimized state toggled.
    OverlayMinimized(bool),
}

/// Input tunables, loaded from the `[input]` config table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Enable mouse capture
    pub enable_mouse: bool,

    /// Enable keyboard capture
    pub enable_keyboard: bool,

    /// Joystick scaling for virtual-button drags
    #[serde(default = "default_gesture_sensitivity")]
    pub gesture_sensitivity: f64,

    /// Rolling wheel-throttle window in milliseconds
    #[serde(default = "default_wheel_throttle_ms")]
    pub wheel_throttle_ms: u64,

    /// Scroll magnitude of one virtual-wheel tick
    #[serde(default = "default_virtual_wheel_step")]
    pub virtual_wheel_step: i64,

    /// Virtual-wheel repeat period in milliseconds
    #[serde(default = "default_virtual_wheel_interval_ms")]
    pub virtual_wheel_interval_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            enable_mouse: true,
            enable_keyboard: true,
            gesture_sensitivity: default_gesture_sensitivity(),
            wheel_throttle_ms: default_wheel_throttle_ms(),
            virtual_wheel_step: default_virtual_wheel_step(),
            virtual_wheel_interval_ms: default_virtual_wheel_interval_ms(),
        }
    }
}

fn default_gesture_sensitivity() -> f64 {
    2.0
}

fn default_wheel_throttle_ms() -> u64 {
    50
}

fn default_virtual_wheel_step() -> i64 {
    -20
}

fn default_virtual_wheel_interval_ms() -> u64 {
    100
}
