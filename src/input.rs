//! Host keyboard → Game Boy button mapping.
//!
//! Default mapping:
//! - Arrows → D-pad
//! - Z → B
//! - X → A
//! - Enter → Start
//! - Shift (either side) → Select
//!
//! Translation is stateless. Auto-repeated key-down events translate to
//! repeated presses; the engine binding drops the duplicates.
//!
//! F1 (open a ROM), E (expand) and R (collapse) are front-end hotkeys and
//! never reach the engine. [`HostKeys`] fires each of them once per press.

use std::collections::HashSet;

use winit::event::{ElementState, VirtualKeyCode};

use crate::engine::Button;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down,
    Up,
}

impl From<ElementState> for KeyEdge {
    fn from(state: ElementState) -> Self {
        match state {
            ElementState::Pressed => Self::Down,
            ElementState::Released => Self::Up,
        }
    }
}

pub const KEY_MAP: [(VirtualKeyCode, Button); 9] = [
    (VirtualKeyCode::Z, Button::B),
    (VirtualKeyCode::X, Button::A),
    (VirtualKeyCode::LShift, Button::Select),
    (VirtualKeyCode::RShift, Button::Select),
    (VirtualKeyCode::Return, Button::Start),
    (VirtualKeyCode::Left, Button::Left),
    (VirtualKeyCode::Up, Button::Up),
    (VirtualKeyCode::Right, Button::Right),
    (VirtualKeyCode::Down, Button::Down),
];

/// Map a host key to a button. Returns `None` for unmapped keys.
pub fn map_key(key: VirtualKeyCode) -> Option<Button> {
    KEY_MAP.iter().find(|(k, _)| *k == key).map(|&(_, b)| b)
}

/// Translate a key edge into a `(button, pressed)` pair.
pub fn translate(key: VirtualKeyCode, edge: KeyEdge) -> Option<(Button, bool)> {
    map_key(key).map(|b| (b, edge == KeyEdge::Down))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hotkey {
    Open,
    Expand,
    Collapse,
}

pub fn map_hotkey(key: VirtualKeyCode) -> Option<Hotkey> {
    match key {
        VirtualKeyCode::F1 => Some(Hotkey::Open),
        VirtualKeyCode::E => Some(Hotkey::Expand),
        VirtualKeyCode::R => Some(Hotkey::Collapse),
        _ => None,
    }
}

/// Held hotkeys, so key repeat does not fire an action again.
#[derive(Debug, Default)]
pub struct HostKeys {
    held: HashSet<Hotkey>,
}

impl HostKeys {
    /// Whether this edge is the first press of `hotkey` since its release.
    pub fn fresh(&mut self, hotkey: Hotkey, edge: KeyEdge) -> bool {
        match edge {
            KeyEdge::Down => self.held.insert(hotkey),
            KeyEdge::Up => {
                self.held.remove(&hotkey);
                false
            }
        }
    }

    /// Forget held keys, e.g. when focus moves to a dialog and releases go elsewhere.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_key_maps_to_at_most_one_button() {
        for (i, (key, _)) in KEY_MAP.iter().enumerate() {
            assert!(KEY_MAP[i + 1..].iter().all(|(k, _)| k != key), "{key:?} mapped twice");
        }
    }

    #[test]
    fn every_button_is_reachable() {
        for button in Button::ALL {
            assert!(KEY_MAP.iter().any(|&(_, b)| b == button), "{button} unmapped");
        }
    }

    #[test]
    fn edges_translate_to_press_and_release() {
        assert_eq!(translate(VirtualKeyCode::Up, KeyEdge::Down), Some((Button::Up, true)));
        assert_eq!(translate(VirtualKeyCode::Up, KeyEdge::Up), Some((Button::Up, false)));
        assert_eq!(translate(VirtualKeyCode::Z, KeyEdge::Down), Some((Button::B, true)));
        assert_eq!(translate(VirtualKeyCode::X, KeyEdge::Down), Some((Button::A, true)));
        assert_eq!(translate(VirtualKeyCode::RShift, KeyEdge::Up), Some((Button::Select, false)));
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(translate(VirtualKeyCode::Q, KeyEdge::Down), None);
        assert_eq!(translate(VirtualKeyCode::F1, KeyEdge::Up), None);
    }

    #[test]
    fn element_state_converts() {
        assert_eq!(KeyEdge::from(ElementState::Pressed), KeyEdge::Down);
        assert_eq!(KeyEdge::from(ElementState::Released), KeyEdge::Up);
    }

    #[test]
    fn hotkeys_are_not_buttons() {
        for key in [VirtualKeyCode::F1, VirtualKeyCode::E, VirtualKeyCode::R] {
            assert!(map_hotkey(key).is_some());
            assert_eq!(map_key(key), None);
        }
        assert_eq!(map_hotkey(VirtualKeyCode::Z), None);
    }

    #[test]
    fn repeated_hotkey_fires_once_per_press() {
        let mut keys = HostKeys::default();
        assert!(keys.fresh(Hotkey::Open, KeyEdge::Down));
        assert!(!keys.fresh(Hotkey::Open, KeyEdge::Down));
        assert!(!keys.fresh(Hotkey::Open, KeyEdge::Down));
        assert!(keys.fresh(Hotkey::Expand, KeyEdge::Down));
        assert!(!keys.fresh(Hotkey::Open, KeyEdge::Up));
        assert!(keys.fresh(Hotkey::Open, KeyEdge::Down));

        keys.clear();
        assert!(keys.fresh(Hotkey::Expand, KeyEdge::Down));
    }
}
