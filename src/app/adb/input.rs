use std::fmt;
use std::str::FromStr;

use crate::app::models::ScreenSize;

pub const SWIPE_DURATION_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for SwipeDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "up" => Ok(SwipeDirection::Up),
            "down" => Ok(SwipeDirection::Down),
            "left" => Ok(SwipeDirection::Left),
            "right" => Ok(SwipeDirection::Right),
            other => Err(format!("Swipe direction \"{other}\" is not supported")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipePath {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// Start and end at 80% / 20% of the travelled axis, through the screen center.
pub fn swipe_path(size: ScreenSize, direction: SwipeDirection) -> SwipePath {
    let center_x = size.width / 2;
    let center_y = size.height / 2;
    let near = |extent: u32| extent * 20 / 100;
    let far = |extent: u32| extent * 80 / 100;
    match direction {
        SwipeDirection::Up => SwipePath {
            x0: center_x,
            y0: far(size.height),
            x1: center_x,
            y1: near(size.height),
        },
        SwipeDirection::Down => SwipePath {
            x0: center_x,
            y0: near(size.height),
            x1: center_x,
            y1: far(size.height),
        },
        SwipeDirection::Left => SwipePath {
            x0: far(size.width),
            y0: center_y,
            x1: near(size.width),
            y1: center_y,
        },
        SwipeDirection::Right => SwipePath {
            x0: near(size.width),
            y0: center_y,
            x1: far(size.width),
            y1: center_y,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Back,
    Home,
    VolumeUp,
    VolumeDown,
    Enter,
    DpadCenter,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl Button {
    pub const ALL: [Button; 10] = [
        Button::Back,
        Button::Home,
        Button::VolumeUp,
        Button::VolumeDown,
        Button::Enter,
        Button::DpadCenter,
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Button::Back => "BACK",
            Button::Home => "HOME",
            Button::VolumeUp => "VOLUME_UP",
            Button::VolumeDown => "VOLUME_DOWN",
            Button::Enter => "ENTER",
            Button::DpadCenter => "DPAD_CENTER",
            Button::DpadUp => "DPAD_UP",
            Button::DpadDown => "DPAD_DOWN",
            Button::DpadLeft => "DPAD_LEFT",
            Button::DpadRight => "DPAD_RIGHT",
        }
    }

    pub fn keycode(self) -> &'static str {
        match self {
            Button::Back => "KEYCODE_BACK",
            Button::Home => "KEYCODE_HOME",
            Button::VolumeUp => "KEYCODE_VOLUME_UP",
            Button::VolumeDown => "KEYCODE_VOLUME_DOWN",
            Button::Enter => "KEYCODE_ENTER",
            Button::DpadCenter => "KEYCODE_DPAD_CENTER",
            Button::DpadUp => "KEYCODE_DPAD_UP",
            Button::DpadDown => "KEYCODE_DPAD_DOWN",
            Button::DpadLeft => "KEYCODE_DPAD_LEFT",
            Button::DpadRight => "KEYCODE_DPAD_RIGHT",
        }
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Button::ALL
            .iter()
            .copied()
            .find(|button| button.name() == value)
            .ok_or_else(|| format!("Button \"{value}\" is not supported"))
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `input text` splits on spaces, so they go through as `\ `. Nothing else is escaped.
pub fn escape_input_text(text: &str) -> String {
    text.replace(' ', "\\ ")
}

pub fn round_coordinate(value: f64) -> i64 {
    value.round() as i64
}
