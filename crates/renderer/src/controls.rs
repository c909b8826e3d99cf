//! Keyboard bindings for the preview window.

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{Key, ModifiersState};

/// Something the operator asked the preview to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reload,
    ZoomIn,
    ZoomOut,
}

/// One row of the key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Logical character, compared case-insensitively.
    pub key: char,
    /// Modifiers that must be held; extra modifiers are tolerated.
    pub modifiers: ModifiersState,
    pub action: Action,
}

/// Command on macOS, Control elsewhere.
pub fn primary_modifier() -> ModifiersState {
    if cfg!(target_os = "macos") {
        ModifiersState::SUPER
    } else {
        ModifiersState::CONTROL
    }
}

#[derive(Debug, Clone)]
pub struct KeyTable {
    bindings: Vec<Binding>,
}

impl Default for KeyTable {
    fn default() -> Self {
        let modifier = primary_modifier();
        let bind = |key, action| Binding {
            key,
            modifiers: modifier,
            action,
        };
        Self {
            bindings: vec![
                bind('r', Action::Reload),
                bind('+', Action::ZoomIn),
                // `+` shares a key with `=` on most layouts.
                bind('=', Action::ZoomIn),
                bind('-', Action::ZoomOut),
            ],
        }
    }
}

impl KeyTable {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Action bound to `key` while `held` modifiers are down.
    pub fn lookup(&self, key: &Key, held: ModifiersState) -> Option<Action> {
        let Key::Character(text) = key else {
            return None;
        };
        let mut chars = text.chars();
        let pressed = chars.next()?.to_ascii_lowercase();
        if chars.next().is_some() {
            return None;
        }
        self.bindings
            .iter()
            .find(|binding| binding.key == pressed && held.contains(binding.modifiers))
            .map(|binding| binding.action)
    }

    /// Action for a raw key event; only fresh presses count.
    pub fn action_for(&self, event: &KeyEvent, held: ModifiersState) -> Option<Action> {
        if !is_fresh_press(event.state, event.repeat) {
            return None;
        }
        self.lookup(&event.logical_key, held)
    }
}

fn is_fresh_press(state: ElementState, repeat: bool) -> bool {
    state == ElementState::Pressed && !repeat
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NamedKey;

    fn key(text: &str) -> Key {
        Key::Character(text.into())
    }

    #[test]
    fn default_bindings_need_the_primary_modifier() {
        let table = KeyTable::default();
        let modifier = primary_modifier();
        assert_eq!(table.lookup(&key("r"), modifier), Some(Action::Reload));
        assert_eq!(table.lookup(&key("r"), ModifiersState::empty()), None);
        assert_eq!(table.lookup(&key("+"), modifier), Some(Action::ZoomIn));
        assert_eq!(table.lookup(&key("="), modifier), Some(Action::ZoomIn));
        assert_eq!(table.lookup(&key("-"), modifier), Some(Action::ZoomOut));
    }

    #[test]
    fn extra_modifiers_and_case_are_tolerated() {
        let table = KeyTable::default();
        let held = primary_modifier() | ModifiersState::SHIFT;
        assert_eq!(table.lookup(&key("R"), held), Some(Action::Reload));
        assert_eq!(table.lookup(&key("+"), held), Some(Action::ZoomIn));
    }

    #[test]
    fn unbound_keys_do_nothing() {
        let table = KeyTable::default();
        let modifier = primary_modifier();
        assert_eq!(table.lookup(&key("q"), modifier), None);
        assert_eq!(table.lookup(&key("rr"), modifier), None);
        assert_eq!(table.lookup(&Key::Named(NamedKey::Enter), modifier), None);
    }

    #[test]
    fn custom_tables_are_respected() {
        let table = KeyTable::new(vec![Binding {
            key: 'z',
            modifiers: ModifiersState::ALT,
            action: Action::ZoomOut,
        }]);
        assert_eq!(table.lookup(&key("z"), ModifiersState::ALT), Some(Action::ZoomOut));
        assert_eq!(table.lookup(&key("r"), primary_modifier()), None);
        assert_eq!(table.bindings().len(), 1);
    }

    #[test]
    fn only_fresh_presses_trigger() {
        assert!(is_fresh_press(ElementState::Pressed, false));
        assert!(!is_fresh_press(ElementState::Pressed, true));
        assert!(!is_fresh_press(ElementState::Released, false));
    }
}
