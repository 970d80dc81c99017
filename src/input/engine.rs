//! Input engine state machine
//!
//! Reconciles desktop relative-lock, desktop absolute, mobile
//! tap-to-position, mobile incremental drag, virtual buttons/wheel and
//! the overlay drag handle into one normalized cursor model. Every
//! handler runs to completion on the caller's thread; the normalized
//! position is the single piece of state shared across all modes.

use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::virtual_mouse::{Gesture, OverlayState, VirtualButton};
use super::{
    ActionSink, DeviceClass, EngineNotice, InjectedPointer, InputConfig, InteractionMode, KeyEvent,
    MobileMode, NormalizedPoint, PointerEvent, PointerKind, SurfaceRect, TouchPoint, WheelEvent,
};
use crate::control::{encode_keyboard, encode_mouse, MouseFlag};

const KEY_ESCAPE: i32 = 27;

pub struct InputEngine {
    sink: Arc<dyn ActionSink>,
    notices: mpsc::UnboundedSender<EngineNotice>,
    config: InputConfig,
    device: DeviceClass,
    mobile_mode: MobileMode,

    surface: Option<SurfaceRect>,
    pos: NormalizedPoint,
    locked: bool,
    /// Last client position while a desktop button is held unlocked.
    last_pointer: Option<(f64, f64)>,
    last_wheel: Option<Instant>,
    /// Previous touch sample of a mobile relative drag.
    touch_last: Option<(f64, f64)>,
    gesture: Option<Gesture>,
    wheel_repeat: bool,
    overlay: OverlayState,
}

impl InputEngine {
    pub fn new(
        sink: Arc<dyn ActionSink>,
        notices: mpsc::UnboundedSender<EngineNotice>,
        device: DeviceClass,
        config: InputConfig,
    ) -> Self {
        Self {
            sink,
            notices,
            config,
            device,
            mobile_mode: MobileMode::default(),
            surface: None,
            pos: NormalizedPoint { x: 0.5, y: 0.5 },
            locked: false,
            last_pointer: None,
            last_wheel: None,
            touch_last: None,
            gesture: None,
            wheel_repeat: false,
            overlay: OverlayState::new(),
        }
    }

    /// Refresh the cached render-surface rectangle.
    pub fn set_surface_rect(&mut self, rect: SurfaceRect) {
        self.surface = Some(rect);
    }

    pub fn set_mobile_mode(&mut self, mode: MobileMode) {
        self.mobile_mode = mode;
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        match (self.device, self.mobile_mode) {
            (DeviceClass::Desktop, _) => InteractionMode::Desktop,
            (DeviceClass::Mobile, MobileMode::Absolute) => InteractionMode::MobileAbsolute,
            (DeviceClass::Mobile, MobileMode::Relative) => InteractionMode::MobileRelative,
        }
    }

    pub fn position(&self) -> NormalizedPoint {
        self.pos
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    // --- pointer protocol ---

    pub fn on_pointer_down(&mut self, ev: PointerEvent) {
        if !self.config.enable_mouse || ev.button < 0 {
            return;
        }

        if self.is_mobile_touch(&ev) {
            // Mobile taps reposition only; no button event is emitted.
            if let Some(rect) = self.surface {
                if rect.contains(ev.client_x, ev.client_y) {
                    match self.mobile_mode {
                        MobileMode::Absolute => {
                            self.pos = rect.normalize(ev.client_x, ev.client_y);
                            self.emit_mouse(self.pos, MouseFlag::Move, 0);
                        }
                        MobileMode::Relative => {
                            self.touch_last = Some((ev.client_x, ev.client_y));
                        }
                    }
                }
            }
            return;
        }

        self.last_pointer = Some((ev.client_x, ev.client_y));
        if let Some(rect) = self.surface {
            if rect.contains(ev.client_x, ev.client_y) {
                self.pos = rect.normalize(ev.client_x, ev.client_y);
                self.notify(EngineNotice::RequestPointerLock);
            }
        }
        self.emit_mouse(self.pos, MouseFlag::for_button(ev.button, true), 0);
    }

    pub fn on_pointer_move(&mut self, ev: PointerEvent) {
        if !self.config.enable_mouse {
            return;
        }

        if self.is_mobile_touch(&ev) {
            // An active virtual-button gesture owns the touch; its
            // moves are handled as joystick displacement instead.
            if self.gesture.is_some() {
                return;
            }
            match self.mobile_mode {
                MobileMode::Relative => {
                    let Some(rect) = self.surface else { return };
                    let Some((last_x, last_y)) = self.touch_last else {
                        return;
                    };
                    // Per-step deltas against the previous sample, not
                    // the start point.
                    let dx = (ev.client_x - last_x) / rect.width;
                    let dy = (ev.client_y - last_y) / rect.height;
                    self.pos = NormalizedPoint::clamped(self.pos.x + dx, self.pos.y + dy);
                    self.emit_mouse(self.pos, MouseFlag::Move, 0);
                    self.touch_last = Some((ev.client_x, ev.client_y));
                }
                MobileMode::Absolute => {
                    let Some(rect) = self.surface else { return };
                    if !rect.contains(ev.client_x, ev.client_y) {
                        return;
                    }
                    self.pos = rect.normalize(ev.client_x, ev.client_y);
                    self.emit_mouse(self.pos, MouseFlag::Move, 0);
                }
            }
            return;
        }

        if !self.locked && self.last_pointer.is_none() {
            return;
        }

        let (movement_x, movement_y) = if self.locked {
            (ev.movement_x, ev.movement_y)
        } else {
            let (last_x, last_y) = self.last_pointer.unwrap_or((ev.client_x, ev.client_y));
            (ev.client_x - last_x, ev.client_y - last_y)
        };

        if !self.locked {
            self.last_pointer = Some((ev.client_x, ev.client_y));
        }

        let Some(rect) = self.surface else { return };

        if self.locked {
            self.pos = NormalizedPoint::clamped(
                self.pos.x + movement_x / rect.width,
                self.pos.y + movement_y / rect.height,
            );
            self.emit_mouse(self.pos, MouseFlag::Move, 0);
            return;
        }

        if !rect.contains(ev.client_x, ev.client_y) {
            return;
        }
        self.pos = rect.normalize(ev.client_x, ev.client_y);
        self.emit_mouse(self.pos, MouseFlag::Move, 0);
    }

    pub fn on_pointer_up(&mut self, ev: PointerEvent) {
        if !self.config.enable_mouse {
            return;
        }

        if self.is_mobile_touch(&ev) {
            self.touch_last = None;
            return;
        }

        self.last_pointer = None;
        self.emit_mouse(self.pos, MouseFlag::for_button(ev.button, false), 0);
    }

    pub fn on_pointer_cancel(&mut self) {
        self.last_pointer = None;
        self.touch_last = None;
    }

    pub fn on_wheel(&mut self, ev: WheelEvent) {
        if !self.config.enable_mouse {
            return;
        }

        // One accepted event per rolling window; the rest are dropped.
        let now = Instant::now();
        if let Some(last) = self.last_wheel {
            if now.duration_since(last) < Duration::from_millis(self.config.wheel_throttle_ms) {
                return;
            }
        }
        self.last_wheel = Some(now);

        let Some(rect) = self.surface else { return };

        let coords = if self.locked {
            self.pos
        } else {
            if !rect.contains(ev.client_x, ev.client_y) {
                return;
            }
            rect.normalize(ev.client_x, ev.client_y)
        };

        let (flag, scroll) = if ev.delta_y != 0.0 {
            (MouseFlag::WheelVertical, ev.delta_y)
        } else if ev.delta_x != 0.0 {
            (MouseFlag::WheelHorizontal, ev.delta_x)
        } else {
            (MouseFlag::WheelVertical, 0.0)
        };
        self.emit_mouse(coords, flag, scroll as i64);
    }

    /// Route a synthesized event through the same state machine.
    pub fn inject_pointer(&mut self, event: InjectedPointer) {
        match event {
            InjectedPointer::Down(ev) => self.on_pointer_down(ev),
            InjectedPointer::Move(ev) => self.on_pointer_move(ev),
            InjectedPointer::Up(ev) => self.on_pointer_up(ev),
            InjectedPointer::Wheel(ev) => self.on_wheel(ev),
        }
    }

    // --- pointer lock ---

    /// Environment notification that the lock engaged or was lost.
    pub fn on_lock_change(&mut self, engaged: bool) {
        self.locked = engaged;
        debug!("pointer lock {}", if engaged { "entered" } else { "exited" });
        if !engaged {
            self.notify(EngineNotice::LockToast {
                text: "Pointer lock released. Click the video to re-engage (Ctrl+Esc to release)."
                    .to_string(),
                duration_ms: 3000,
            });
        }
    }

    /// Environment rejected the lock request; interaction degrades to
    /// unlocked absolute mode.
    pub fn on_lock_error(&mut self) {
        self.locked = false;
        self.notify(EngineNotice::LockToast {
            text: "Pointer lock request failed.".to_string(),
            duration_ms: 2500,
        });
    }

    // --- keyboard ---

    pub fn on_key_down(&mut self, ev: KeyEvent) {
        if ev.ctrl && ev.key_code == KEY_ESCAPE {
            self.notify(EngineNotice::ReleasePointerLock);
            return;
        }
        if !self.config.enable_keyboard || !self.sink.is_open() {
            return;
        }
        if ev.repeat || ev.text_entry_focused {
            return;
        }
        let _ = self.sink.send_action(&encode_keyboard(ev.key_code, true));
    }

    pub fn on_key_up(&mut self, ev: KeyEvent) {
        if !self.config.enable_keyboard || !self.sink.is_open() {
            return;
        }
        if ev.text_entry_focused {
            return;
        }
        let _ = self.sink.send_action(&encode_keyboard(ev.key_code, false));
    }

    // --- virtual buttons ---

    pub fn on_virtual_button_down(&mut self, button: VirtualButton, touch: TouchPoint) {
        if self.device != DeviceClass::Mobile {
            return;
        }
        // Single gesture slot; a second concurrent press is ignored so
        // the armed down/up pair stays matched.
        if self.gesture.is_some() {
            return;
        }
        let gesture = Gesture::arm(button, touch, self.pos);
        // Virtual buttons act on whatever the cursor already points at.
        self.emit_mouse(self.pos, gesture.down_flag(), 0);
        self.gesture = Some(gesture);
    }

    pub fn on_virtual_touch_move(&mut self, touch: TouchPoint) {
        let Some(gesture) = self.gesture else { return };
        let Some(rect) = self.surface else { return };
        self.pos = gesture.project(touch, &rect, self.config.gesture_sensitivity);
        self.emit_mouse(self.pos, MouseFlag::Move, 0);
    }

    pub fn on_virtual_touch_end(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            self.emit_mouse(self.pos, gesture.up_flag(), 0);
        }
    }

    // --- virtual wheel ---

    pub fn on_virtual_wheel_down(&mut self) {
        if self.device != DeviceClass::Mobile {
            return;
        }
        self.virtual_wheel_tick_now();
        self.wheel_repeat = true;
        self.notify(EngineNotice::WheelRepeat(true));
    }

    /// Repeat-timer callback; a tick every period while armed.
    pub fn virtual_wheel_tick(&mut self) {
        if self.wheel_repeat {
            self.virtual_wheel_tick_now();
        }
    }

    pub fn on_virtual_wheel_up(&mut self) {
        if self.wheel_repeat {
            self.wheel_repeat = false;
            self.notify(EngineNotice::WheelRepeat(false));
        }
    }

    fn virtual_wheel_tick_now(&mut self) {
        self.emit_mouse(
            self.pos,
            MouseFlag::WheelVertical,
            self.config.virtual_wheel_step,
        );
    }

    // --- overlay drag handle ---

    pub fn on_overlay_drag_start(&mut self, touch: TouchPoint, overlay_rect: SurfaceRect) {
        self.overlay.begin_drag(touch, &overlay_rect);
    }

    pub fn on_overlay_drag_move(
        &mut self,
        touch: TouchPoint,
        container: SurfaceRect,
        overlay_size: (f64, f64),
    ) {
        if let Some((x, y)) = self.overlay.drag_to(touch, &container, overlay_size) {
            self.notify(EngineNotice::OverlayMoved { x, y });
        }
    }

    pub fn on_overlay_drag_end(&mut self) {
        self.overlay.end_drag();
    }

    pub fn on_overlay_tap(&mut self) {
        let minimized = self.overlay.toggle_minimized();
        self.notify(EngineNotice::OverlayMinimized(minimized));
    }

    // --- helpers ---

    fn is_mobile_touch(&self, ev: &PointerEvent) -> bool {
        self.device == DeviceClass::Mobile && ev.kind == PointerKind::Touch
    }

    fn emit_mouse(&self, at: NormalizedPoint, flag: MouseFlag, scroll: i64) {
        let _ = self
            .sink
            .send_action(&encode_mouse(at.x, at.y, flag, scroll));
    }

    fn notify(&self, notice: EngineNotice) {
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RemoteAction;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingSink {
        open: AtomicBool,
        actions: Mutex<Vec<RemoteAction>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(true),
                actions: Mutex::new(Vec::new()),
            })
        }

        fn set_open(&self, open: bool) {
            self.open.store(open, Ordering::Relaxed);
        }

        fn taken(&self) -> Vec<RemoteAction> {
            std::mem::take(&mut *self.actions.lock())
        }
    }

    impl ActionSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::Relaxed)
        }

        fn send_action(&self, action: &RemoteAction) -> bool {
            if !self.is_open() {
                return false;
            }
            self.actions.lock().push(action.clone());
            true
        }
    }

    fn engine(
        device: DeviceClass,
    ) -> (
        InputEngine,
        Arc<RecordingSink>,
        mpsc::UnboundedReceiver<EngineNotice>,
    ) {
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = InputEngine::new(sink.clone(), tx, device, InputConfig::default());
        engine.set_surface_rect(SurfaceRect::new(0.0, 0.0, 800.0, 600.0));
        (engine, sink, rx)
    }

    fn mouse_parts(action: &RemoteAction) -> (f64, f64, i32, MouseFlag) {
        match action {
            RemoteAction::Mouse { x, y, scroll, flag } => (*x, *y, *scroll, *flag),
            other => panic!("expected mouse action, got {:?}", other),
        }
    }

    #[test]
    fn pointer_down_maps_surface_position() {
        let (mut engine, sink, mut rx) = engine(DeviceClass::Desktop);
        engine.on_pointer_down(PointerEvent::mouse(100.0, 50.0, 0));

        let actions = sink.taken();
        assert_eq!(actions.len(), 1);
        let (x, y, _, flag) = mouse_parts(&actions[0]);
        assert_eq!(x, 0.125);
        assert!((y - 1.0 / 12.0).abs() < 1e-9);
        assert_eq!(flag, MouseFlag::LeftDown);
        assert_eq!(rx.try_recv().unwrap(), EngineNotice::RequestPointerLock);
    }

    #[test]
    fn pointer_down_outside_surface_keeps_position() {
        let (mut engine, sink, mut rx) = engine(DeviceClass::Desktop);
        engine.on_pointer_down(PointerEvent::mouse(900.0, 700.0, 2));

        let actions = sink.taken();
        let (x, y, _, flag) = mouse_parts(&actions[0]);
        assert_eq!((x, y), (0.5, 0.5));
        assert_eq!(flag, MouseFlag::RightDown);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn locked_motion_integrates_relative_deltas() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.on_lock_change(true);
        engine.on_pointer_move(PointerEvent::locked_motion(80.0, 0.0));

        let actions = sink.taken();
        let (x, y, _, flag) = mouse_parts(actions.last().unwrap());
        assert!((x - 0.6).abs() < 1e-9);
        assert_eq!(y, 0.5);
        assert_eq!(flag, MouseFlag::Move);
    }

    #[test]
    fn locked_motion_accumulates_and_clamps() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.on_lock_change(true);
        for _ in 0..10 {
            engine.on_pointer_move(PointerEvent::locked_motion(80.0, -120.0));
        }

        for action in sink.taken() {
            let (x, y, _, _) = mouse_parts(&action);
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
        }
        assert_eq!(engine.position(), NormalizedPoint { x: 1.0, y: 0.0 });
    }

    #[test]
    fn unlocked_drag_tracks_absolute_position() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.on_pointer_down(PointerEvent::mouse(400.0, 300.0, 0));
        engine.on_pointer_move(PointerEvent::mouse(200.0, 150.0, 0));
        engine.on_pointer_up(PointerEvent::mouse(200.0, 150.0, 0));

        let actions = sink.taken();
        assert_eq!(actions.len(), 3);
        let (x, y, _, flag) = mouse_parts(&actions[1]);
        assert_eq!((x, y), (0.25, 0.25));
        assert_eq!(flag, MouseFlag::Move);
        let (.., up_flag) = mouse_parts(&actions[2]);
        assert_eq!(up_flag, MouseFlag::LeftUp);
    }

    #[test]
    fn moves_without_held_button_are_ignored_unlocked() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.on_pointer_move(PointerEvent::mouse(200.0, 150.0, 0));
        assert!(sink.taken().is_empty());
    }

    #[test]
    fn wheel_throttle_drops_second_event() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        let ev = WheelEvent {
            client_x: 400.0,
            client_y: 300.0,
            delta_x: 0.0,
            delta_y: 120.0,
        };
        engine.on_wheel(ev);
        engine.on_wheel(ev);

        let actions = sink.taken();
        assert_eq!(actions.len(), 1);
        let (_, _, scroll, flag) = mouse_parts(&actions[0]);
        assert_eq!(flag, MouseFlag::WheelVertical);
        assert_eq!(scroll, 120);
    }

    #[test]
    fn wheel_axis_follows_nonzero_delta() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.on_wheel(WheelEvent {
            client_x: 400.0,
            client_y: 300.0,
            delta_x: -40.0,
            delta_y: 0.0,
        });

        let (_, _, scroll, flag) = mouse_parts(&sink.taken()[0]);
        assert_eq!(flag, MouseFlag::WheelHorizontal);
        assert_eq!(scroll, -40);
    }

    #[test]
    fn wheel_uses_hover_position_when_unlocked() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.on_wheel(WheelEvent {
            client_x: 200.0,
            client_y: 300.0,
            delta_x: 0.0,
            delta_y: 120.0,
        });

        let (x, y, ..) = mouse_parts(&sink.taken()[0]);
        assert_eq!((x, y), (0.25, 0.5));
        // Cursor position itself is untouched by wheel events.
        assert_eq!(engine.position(), NormalizedPoint { x: 0.5, y: 0.5 });
    }

    #[test]
    fn mobile_absolute_touch_repositions_without_click() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Mobile);
        engine.on_pointer_down(PointerEvent::touch(400.0, 300.0));
        engine.on_pointer_up(PointerEvent::touch(400.0, 300.0));

        let actions = sink.taken();
        assert_eq!(actions.len(), 1);
        let (x, y, _, flag) = mouse_parts(&actions[0]);
        assert_eq!((x, y), (0.5, 0.5));
        assert_eq!(flag, MouseFlag::Move);
    }

    #[test]
    fn mobile_relative_integrates_per_step_deltas() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Mobile);
        engine.set_mobile_mode(MobileMode::Relative);
        engine.on_pointer_down(PointerEvent::touch(100.0, 100.0));
        // Arming the drag does not move the cursor.
        assert!(sink.taken().is_empty());

        engine.on_pointer_move(PointerEvent::touch(180.0, 100.0));
        engine.on_pointer_move(PointerEvent::touch(260.0, 160.0));
        engine.on_pointer_up(PointerEvent::touch(260.0, 160.0));

        let actions = sink.taken();
        assert_eq!(actions.len(), 2);
        let (x, y, ..) = mouse_parts(&actions[1]);
        assert!((x - 0.7).abs() < 1e-9);
        assert!((y - 0.6).abs() < 1e-9);

        // Drag disarmed; further moves are ignored.
        engine.on_pointer_move(PointerEvent::touch(300.0, 300.0));
        assert!(sink.taken().is_empty());
    }

    #[test]
    fn virtual_gesture_emits_matched_down_up_pair() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Mobile);
        let origin = TouchPoint {
            client_x: 900.0,
            client_y: 650.0,
        };
        engine.on_virtual_button_down(VirtualButton::Right, origin);
        // A second press while the gesture is active is ignored.
        engine.on_virtual_button_down(VirtualButton::Left, origin);
        engine.on_virtual_touch_move(TouchPoint {
            client_x: 940.0,
            client_y: 650.0,
        });
        engine.on_virtual_touch_end();

        let actions = sink.taken();
        assert_eq!(actions.len(), 3);
        let (.., down) = mouse_parts(&actions[0]);
        let (x, _, _, mid) = mouse_parts(&actions[1]);
        let (.., up) = mouse_parts(&actions[2]);
        assert_eq!(down, MouseFlag::RightDown);
        assert_eq!(mid, MouseFlag::Move);
        // 40px over 800px, sensitivity 2
        assert!((x - 0.6).abs() < 1e-9);
        assert_eq!(up, MouseFlag::RightUp);

        // Gesture fully disarmed.
        engine.on_virtual_touch_end();
        assert!(sink.taken().is_empty());
    }

    #[test]
    fn virtual_wheel_ticks_while_armed() {
        let (mut engine, sink, mut rx) = engine(DeviceClass::Mobile);
        engine.on_virtual_wheel_down();
        engine.virtual_wheel_tick();
        engine.on_virtual_wheel_up();
        engine.virtual_wheel_tick();

        let actions = sink.taken();
        assert_eq!(actions.len(), 2);
        for action in &actions {
            let (_, _, scroll, flag) = mouse_parts(action);
            assert_eq!(flag, MouseFlag::WheelVertical);
            assert_eq!(scroll, -20);
        }
        assert_eq!(rx.try_recv().unwrap(), EngineNotice::WheelRepeat(true));
        assert_eq!(rx.try_recv().unwrap(), EngineNotice::WheelRepeat(false));
    }

    #[test]
    fn keyboard_gating() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        let key = KeyEvent {
            key_code: 65,
            ctrl: false,
            repeat: false,
            text_entry_focused: false,
        };

        engine.on_key_down(key);
        engine.on_key_down(KeyEvent { repeat: true, ..key });
        engine.on_key_down(KeyEvent {
            text_entry_focused: true,
            ..key
        });
        engine.on_key_up(key);

        let actions = sink.taken();
        assert_eq!(
            actions,
            vec![
                RemoteAction::Keyboard {
                    key_value: 65,
                    down: true
                },
                RemoteAction::Keyboard {
                    key_value: 65,
                    down: false
                },
            ]
        );

        sink.set_open(false);
        engine.on_key_down(key);
        engine.on_key_up(key);
        assert!(sink.taken().is_empty());
    }

    #[test]
    fn ctrl_escape_releases_lock_without_forwarding() {
        let (mut engine, sink, mut rx) = engine(DeviceClass::Desktop);
        engine.on_key_down(KeyEvent {
            key_code: KEY_ESCAPE,
            ctrl: true,
            repeat: false,
            text_entry_focused: false,
        });

        assert!(sink.taken().is_empty());
        assert_eq!(rx.try_recv().unwrap(), EngineNotice::ReleasePointerLock);
    }

    #[test]
    fn lock_loss_degrades_and_toasts() {
        let (mut engine, sink, mut rx) = engine(DeviceClass::Desktop);
        engine.on_lock_change(true);
        engine.on_lock_change(false);
        assert!(!engine.is_locked());
        match rx.try_recv().unwrap() {
            EngineNotice::LockToast { duration_ms, .. } => assert_eq!(duration_ms, 3000),
            other => panic!("expected toast, got {:?}", other),
        }

        // Back to unlocked absolute interaction on the next press.
        engine.on_pointer_down(PointerEvent::mouse(400.0, 300.0, 0));
        let (x, y, ..) = mouse_parts(&sink.taken()[0]);
        assert_eq!((x, y), (0.5, 0.5));
    }

    #[test]
    fn sends_drop_silently_when_channel_closed() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        sink.set_open(false);
        engine.on_pointer_down(PointerEvent::mouse(100.0, 50.0, 0));
        engine.on_wheel(WheelEvent {
            client_x: 100.0,
            client_y: 50.0,
            delta_x: 0.0,
            delta_y: 120.0,
        });
        assert!(sink.taken().is_empty());

        // Capture continues; a rebound channel sees fresh actions.
        sink.set_open(true);
        engine.on_pointer_up(PointerEvent::mouse(100.0, 50.0, 0));
        assert_eq!(sink.taken().len(), 1);
    }

    #[test]
    fn injected_events_route_through_the_state_machine() {
        let (mut engine, sink, _rx) = engine(DeviceClass::Desktop);
        engine.inject_pointer(InjectedPointer::Down(PointerEvent::mouse(100.0, 50.0, 0)));
        engine.inject_pointer(InjectedPointer::Up(PointerEvent::mouse(100.0, 50.0, 0)));

        let actions = sink.taken();
        assert_eq!(actions.len(), 2);
        let (.., up) = mouse_parts(&actions[1]);
        assert_eq!(up, MouseFlag::LeftUp);
    }
}
