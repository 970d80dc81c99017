//! Virtual mouse state
//!
//! Gesture tracking for the on-screen button surrogates and the
//! position/minimize state of the relocatable overlay. Overlay state is
//! visual-only and never reaches the wire.

use super::{NormalizedPoint, SurfaceRect, TouchPoint};
use crate::control::MouseFlag;

/// On-screen click surrogates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualButton {
    Left,
    Right,
}

/// Single-slot virtual-button gesture, armed on touch-start and
/// disarmed on touch-end/cancel.
///
/// The up flag is recorded at arm time so the emitted down/up pair
/// always matches, whatever happens in between.
#[derive(Debug, Clone, Copy)]
pub struct Gesture {
    down: MouseFlag,
    up: MouseFlag,
    origin_x: f64,
    origin_y: f64,
    start: NormalizedPoint,
}

impl Gesture {
    pub fn arm(button: VirtualButton, touch: TouchPoint, start: NormalizedPoint) -> Self {
        let (down, up) = match button {
            VirtualButton::Left => (MouseFlag::LeftDown, MouseFlag::LeftUp),
            VirtualButton::Right => (MouseFlag::RightDown, MouseFlag::RightUp),
        };
        Self {
            down,
            up,
            origin_x: touch.client_x,
            origin_y: touch.client_y,
            start,
        }
    }

    pub fn down_flag(&self) -> MouseFlag {
        self.down
    }

    pub fn up_flag(&self) -> MouseFlag {
        self.up
    }

    /// Joystick projection: displacement from the gesture origin,
    /// scaled by `sensitivity`, applied to the recorded start position.
    pub fn project(
        &self,
        touch: TouchPoint,
        rect: &SurfaceRect,
        sensitivity: f64,
    ) -> NormalizedPoint {
        let dx = touch.client_x - self.origin_x;
        let dy = touch.client_y - self.origin_y;
        NormalizedPoint::clamped(
            self.start.x + dx / rect.width * sensitivity,
            self.start.y + dy / rect.height * sensitivity,
        )
    }
}

/// Virtual-mouse overlay placement: an explicit anchor once dragged,
/// otherwise the bottom-anchored default, plus the minimized toggle.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayState {
    anchor: Option<(f64, f64)>,
    minimized: bool,
    drag_offset: Option<(f64, f64)>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit anchor set by dragging; `None` means the default
    /// bottom-anchored placement.
    pub fn anchor(&self) -> Option<(f64, f64)> {
        self.anchor
    }

    pub fn minimized(&self) -> bool {
        self.minimized
    }

    pub fn dragging(&self) -> bool {
        self.drag_offset.is_some()
    }

    /// Record where inside the overlay the drag grabbed it.
    pub fn begin_drag(&mut self, touch: TouchPoint, overlay_rect: &SurfaceRect) {
        self.drag_offset = Some((
            touch.client_x - overlay_rect.left,
            touch.client_y - overlay_rect.top,
        ));
    }

    /// Reposition by raw touch delta, clamped to the container bounds.
    /// Returns the new anchor while a drag is in progress.
    pub fn drag_to(
        &mut self,
        touch: TouchPoint,
        container: &SurfaceRect,
        overlay_size: (f64, f64),
    ) -> Option<(f64, f64)> {
        let (off_x, off_y) = self.drag_offset?;
        let max_x = (container.width - overlay_size.0).max(0.0);
        let max_y = (container.height - overlay_size.1).max(0.0);
        let x = (touch.client_x - off_x - container.left).clamp(0.0, max_x);
        let y = (touch.client_y - off_y - container.top).clamp(0.0, max_y);
        self.anchor = Some((x, y));
        self.anchor
    }

    pub fn end_drag(&mut self) {
        self.drag_offset = None;
    }

    /// A tap on the drag handle toggles the minimized display state.
    pub fn toggle_minimized(&mut self) -> bool {
        self.minimized = !self.minimized;
        self.minimized
    }
}
