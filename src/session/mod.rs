//! Session and transport state machine
//!
//! Owns the signaling connection, the peer-connection lifecycle, the
//! heartbeat and the reconnect policy. Creates and destroys the
//! transport channel the input engine sends through. One session
//! context per connection attempt; reconnection rebuilds it from
//! scratch.

pub mod client;
pub mod heartbeat;
pub mod peer;
pub mod signaling;
pub mod transport;

pub use client::{ClientCommand, ClientHandle, SessionClient, SessionEvent};
pub use heartbeat::Heartbeat;
pub use signaling::SignalMessage;
pub use transport::TransportChannel;

use parking_lot::Mutex;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Session-layer errors.
#[derive(Debug)]
pub enum SessionError {
    /// Signaling socket failure
    Socket(String),
    /// Signaling message encode/decode failure
    Signaling(String),
    /// Peer connection creation failed
    ConnectionFailed(String),
    /// SDP processing failed
    Sdp(String),
    /// ICE candidate processing failed
    Ice(String),
    /// Data channel failure
    Channel(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Socket(msg) => write!(f, "socket error: {}", msg),
            SessionError::Signaling(msg) => write!(f, "signaling error: {}", msg),
            SessionError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            SessionError::Sdp(msg) => write!(f, "SDP error: {}", msg),
            SessionError::Ice(msg) => write!(f, "ICE error: {}", msg),
            SessionError::Channel(msg) => write!(f, "data channel error: {}", msg),
        }
    }
}

impl Error for SessionError {}

/// Coarse session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Signaling up, no transmission joined
    Idle,
    /// Join requested or offer/answer in flight
    Negotiating,
    /// ICE reports connected
    Connected,
    /// Torn down after a liveness timeout or socket error
    Reconnecting,
    /// Shut down for good
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Negotiating => "negotiating",
            SessionPhase::Connected => "connected",
            SessionPhase::Reconnecting => "reconnecting",
            SessionPhase::Closed => "closed",
        }
    }
}

/// Mirror of the raw negotiation state, driving the status indicators.
///
/// Owned by the session state machine; readers only observe.
pub struct StatusState {
    phase: Mutex<SessionPhase>,
    ice_state: Mutex<String>,
    signaling_state: Mutex<String>,
    connected: AtomicBool,
}

impl StatusState {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(SessionPhase::Idle),
            ice_state: Mutex::new(String::new()),
            signaling_state: Mutex::new(String::new()),
            connected: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock()
    }

    /// Returns `true` when the phase actually changed.
    pub fn set_phase(&self, phase: SessionPhase) -> bool {
        let mut current = self.phase.lock();
        if *current == phase {
            return false;
        }
        *current = phase;
        true
    }

    pub fn ice_state(&self) -> String {
        self.ice_state.lock().clone()
    }

    pub fn set_ice_state(&self, state: String, connected: bool) {
        *self.ice_state.lock() = state;
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn signaling_state(&self) -> String {
        self.signaling_state.lock().clone()
    }

    pub fn set_signaling_state(&self, state: String) {
        *self.signaling_state.lock() = state;
    }

    /// Connected indicator: true iff ICE state is exactly `connected`.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.ice_state.lock().clear();
        self.signaling_state.lock().clear();
        self.connected.store(false, Ordering::Relaxed);
    }
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new()
    }
}
