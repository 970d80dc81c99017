//! Render-surface binding
//!
//! The surface that displays the inbound video stream is an external
//! collaborator; the session only needs to hand tracks over and clear
//! the binding on teardown.

use log::{debug, info};

pub trait VideoSurface: Send + Sync {
    /// Attach an inbound video track to the surface's stream. The
    /// first track creates the stream, later ones are added to it.
    fn attach_track(&self, track_id: &str);

    /// Drop the stream binding and stop its tracks.
    fn clear(&self);
}

/// Headless stand-in used by the CLI binary and in tests.
pub struct NullSurface;

impl VideoSurface for NullSurface {
    fn attach_track(&self, track_id: &str) {
        info!("surface: track {} attached (headless, discarded)", track_id);
    }

    fn clear(&self) {
        debug!("surface: cleared");
    }
}
