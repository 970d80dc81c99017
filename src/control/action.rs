//! Wire action encoding
//!
//! Pure mapping between semantic input events and the action object
//! sent over the data channel. No state, no side effects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{TYPE_AUDIO_CAPTURE, TYPE_DISPLAY_ID, TYPE_KEYBOARD, TYPE_MOUSE};

/// Mouse action flag codes as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseFlag {
    Move,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    MiddleDown,
    MiddleUp,
    WheelVertical,
    WheelHorizontal,
}

impl MouseFlag {
    /// Numeric wire code for this flag.
    pub fn code(self) -> i64 {
        match self {
            MouseFlag::Move => 0,
            MouseFlag::LeftDown => 1,
            MouseFlag::LeftUp => 2,
            MouseFlag::RightDown => 3,
            MouseFlag::RightUp => 4,
            MouseFlag::MiddleDown => 5,
            MouseFlag::MiddleUp => 6,
            MouseFlag::WheelVertical => 7,
            MouseFlag::WheelHorizontal => 8,
        }
    }

    /// Resolve a numeric wire code.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => MouseFlag::Move,
            1 => MouseFlag::LeftDown,
            2 => MouseFlag::LeftUp,
            3 => MouseFlag::RightDown,
            4 => MouseFlag::RightUp,
            5 => MouseFlag::MiddleDown,
            6 => MouseFlag::MiddleUp,
            7 => MouseFlag::WheelVertical,
            8 => MouseFlag::WheelHorizontal,
            _ => return None,
        })
    }

    /// Resolve a symbolic flag name; unknown names fall back to `Move`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "move" => MouseFlag::Move,
            "left_down" => MouseFlag::LeftDown,
            "left_up" => MouseFlag::LeftUp,
            "right_down" => MouseFlag::RightDown,
            "right_up" => MouseFlag::RightUp,
            "middle_down" => MouseFlag::MiddleDown,
            "middle_up" => MouseFlag::MiddleUp,
            "wheel_vertical" => MouseFlag::WheelVertical,
            "wheel_horizontal" => MouseFlag::WheelHorizontal,
            _ => MouseFlag::Move,
        }
    }

    /// Map a pointer button id (0 left, 1 middle, 2 right) to its
    /// down/up flag pair. Unknown button ids map to the left pair.
    pub fn for_button(button: i16, down: bool) -> Self {
        match (button, down) {
            (1, true) => MouseFlag::MiddleDown,
            (1, false) => MouseFlag::MiddleUp,
            (2, true) => MouseFlag::RightDown,
            (2, false) => MouseFlag::RightUp,
            (_, true) => MouseFlag::LeftDown,
            (_, false) => MouseFlag::LeftUp,
        }
    }
}

/// A single control action, the unit sent over the data channel.
///
/// Exactly one payload per action; `type` on the wire selects which.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAction {
    Mouse {
        x: f64,
        y: f64,
        scroll: i32,
        flag: MouseFlag,
    },
    Keyboard {
        key_value: i32,
        down: bool,
    },
    AudioCapture(bool),
    DisplayId(i64),
}

impl RemoteAction {
    pub fn audio_capture(enabled: bool) -> Self {
        RemoteAction::AudioCapture(enabled)
    }

    pub fn display_id(id: i64) -> Self {
        RemoteAction::DisplayId(id)
    }

    /// Serialize to the wire JSON document.
    pub fn to_json(&self) -> Result<String, ActionError> {
        serde_json::to_string(&WireAction::from(self.clone()))
            .map_err(|e| ActionError::Encode(e.to_string()))
    }
}

/// Encode a mouse action. Coordinates are clamped to `[0,1]`, the
/// scroll value is truncated to 32 bits.
pub fn encode_mouse(x: f64, y: f64, flag: MouseFlag, scroll: i64) -> RemoteAction {
    RemoteAction::Mouse {
        x: clamp01(x),
        y: clamp01(y),
        scroll: scroll as i32,
        flag,
    }
}

/// Encode a keyboard action.
pub fn encode_keyboard(key_value: i32, down: bool) -> RemoteAction {
    RemoteAction::Keyboard { key_value, down }
}

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Validate a manually entered raw action document.
///
/// Succeeds only when the parsed object carries a numeric `type` field
/// and exactly one recognized payload key.
pub fn validate_manual_action(raw: &str) -> Result<RemoteAction, ActionError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ActionError::Malformed(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| ActionError::Malformed("action must be a JSON object".to_string()))?;

    if !object.get("type").map_or(false, |t| t.is_number()) {
        return Err(ActionError::Malformed(
            "action must carry a numeric type field".to_string(),
        ));
    }

    let payload_keys = ["mouse", "keyboard", "audio_capture", "display_id"];
    let present: Vec<&str> = payload_keys
        .iter()
        .copied()
        .filter(|key| object.contains_key(*key))
        .collect();
    if present.len() != 1 {
        return Err(ActionError::Malformed(format!(
            "action must carry exactly one payload key, found {}",
            present.len()
        )));
    }

    let wire: WireAction =
        serde_json::from_value(value).map_err(|e| ActionError::Malformed(e.to_string()))?;
    RemoteAction::try_from(wire)
}

/// Action codec errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// Manual raw-action validation failure.
    Malformed(String),
    /// Serialization failure.
    Encode(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Malformed(msg) => write!(f, "malformed action: {}", msg),
            ActionError::Encode(msg) => write!(f, "action encode failed: {}", msg),
        }
    }
}

impl std::error::Error for ActionError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMouse {
    x: f64,
    y: f64,
    s: i32,
    flag: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireKeyboard {
    key_value: i32,
    /// 0 = down, 1 = up.
    flag: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireAction {
    #[serde(rename = "type")]
    kind: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    mouse: Option<WireMouse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyboard: Option<WireKeyboard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_capture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_id: Option<i64>,
}

impl From<RemoteAction> for WireAction {
    fn from(action: RemoteAction) -> Self {
        let mut wire = WireAction {
            kind: 0,
            mouse: None,
            keyboard: None,
            audio_capture: None,
            display_id: None,
        };
        match action {
            RemoteAction::Mouse { x, y, scroll, flag } => {
                wire.kind = TYPE_MOUSE;
                wire.mouse = Some(WireMouse {
                    x,
                    y,
                    s: scroll,
                    flag: flag.code(),
                });
            }
            RemoteAction::Keyboard { key_value, down } => {
                wire.kind = TYPE_KEYBOARD;
                wire.keyboard = Some(WireKeyboard {
                    key_value,
                    flag: if down { 0 } else { 1 },
                });
            }
            RemoteAction::AudioCapture(enabled) => {
                wire.kind = TYPE_AUDIO_CAPTURE;
                wire.audio_capture = Some(enabled);
            }
            RemoteAction::DisplayId(id) => {
                wire.kind = TYPE_DISPLAY_ID;
                wire.display_id = Some(id);
            }
        }
        wire
    }
}

impl TryFrom<WireAction> for RemoteAction {
    type Error = ActionError;

    fn try_from(wire: WireAction) -> Result<Self, Self::Error> {
        if let Some(mouse) = wire.mouse {
            let flag = MouseFlag::from_code(mouse.flag)
                .ok_or_else(|| ActionError::Malformed(format!("mouse flag {}", mouse.flag)))?;
            return Ok(RemoteAction::Mouse {
                x: mouse.x,
                y: mouse.y,
                scroll: mouse.s,
                flag,
            });
        }
        if let Some(keyboard) = wire.keyboard {
            return Ok(RemoteAction::Keyboard {
                key_value: keyboard.key_value,
                down: keyboard.flag == 0,
            });
        }
        if let Some(enabled) = wire.audio_capture {
            return Ok(RemoteAction::AudioCapture(enabled));
        }
        if let Some(id) = wire.display_id {
            return Ok(RemoteAction::DisplayId(id));
        }
        Err(ActionError::Malformed("no payload present".to_string()))
    }
}
