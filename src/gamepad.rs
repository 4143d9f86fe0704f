//! Gamepad → Game Boy button mapping.
//!
//! D-pad and left stick drive the directions, East/South are A/B and
//! Start/Select map straight across. Stick deflection past [`AXIS_THRESHOLD`]
//! counts as a held direction; crossing back releases it.

use gilrs::{Axis, Button as PadButton, EventType};

use crate::engine::Button;

pub const AXIS_THRESHOLD: f32 = 0.5;

pub fn map_button(button: PadButton) -> Option<Button> {
    match button {
        PadButton::DPadUp => Some(Button::Up),
        PadButton::DPadDown => Some(Button::Down),
        PadButton::DPadLeft => Some(Button::Left),
        PadButton::DPadRight => Some(Button::Right),
        PadButton::East => Some(Button::A),
        PadButton::South => Some(Button::B),
        PadButton::Start => Some(Button::Start),
        PadButton::Select => Some(Button::Select),
        _ => None,
    }
}

fn direction(value: f32, negative: Button, positive: Button) -> Option<Button> {
    if value > AXIS_THRESHOLD {
        Some(positive)
    } else if value < -AXIS_THRESHOLD {
        Some(negative)
    } else {
        None
    }
}

/// Turns gamepad events into `(button, pressed)` edges.
///
/// Buttons are stateless; each stick axis remembers which direction it is
/// holding so it can release it.
#[derive(Debug, Default)]
pub struct PadInput {
    x: Option<Button>,
    y: Option<Button>,
}

impl PadInput {
    pub fn translate(&mut self, event: EventType) -> Vec<(Button, bool)> {
        match event {
            EventType::ButtonPressed(button, _) => map_button(button).map(|b| (b, true)).into_iter().collect(),
            EventType::ButtonReleased(button, _) => map_button(button).map(|b| (b, false)).into_iter().collect(),
            EventType::AxisChanged(axis, value, _) => self.axis(axis, value),
            EventType::Disconnected => self.release_all(),
            _ => Vec::new(),
        }
    }

    pub fn axis(&mut self, axis: Axis, value: f32) -> Vec<(Button, bool)> {
        let (held, next) = match axis {
            Axis::LeftStickX => (&mut self.x, direction(value, Button::Left, Button::Right)),
            // stick up reads positive
            Axis::LeftStickY => (&mut self.y, direction(value, Button::Down, Button::Up)),
            _ => return Vec::new(),
        };
        if *held == next {
            return Vec::new();
        }
        let mut edges = Vec::with_capacity(2);
        if let Some(old) = held.take() {
            edges.push((old, false));
        }
        if let Some(new) = next {
            edges.push((new, true));
        }
        *held = next;
        edges
    }

    /// Release everything a vanished pad might have left pressed.
    pub fn release_all(&mut self) -> Vec<(Button, bool)> {
        self.x = None;
        self.y = None;
        Button::ALL.iter().map(|&b| (b, false)).collect()
    }
}
