use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{Key, NamedKey},
};

use super::ControlPanel;

/// Keyboard front-end for the control panel.
///
/// Tab / Shift+Tab select a control, Left / Right step it by one step,
/// and PageDown / PageUp by ten.
#[derive(Debug, Default)]
pub struct KeyboardControls {
    shift: bool,
}

impl KeyboardControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_shift(&mut self, pressed: bool) {
        self.shift = pressed;
    }

    /// Returns whether the key was consumed by the panel.
    pub fn handle_key(&mut self, panel: &mut ControlPanel, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return false;
        }
        self.handle_named(panel, &event.logical_key)
    }

    fn handle_named(&mut self, panel: &mut ControlPanel, key: &Key) -> bool {
        let Key::Named(named) = key else {
            return false;
        };
        let Some(selected) = panel.selected() else {
            return false;
        };
        match named {
            NamedKey::Tab if self.shift => panel.select_previous(),
            NamedKey::Tab => panel.select_next(),
            NamedKey::ArrowRight => {
                panel.step(selected, 1);
            }
            NamedKey::ArrowLeft => {
                panel.step(selected, -1);
            }
            NamedKey::PageUp => {
                panel.step(selected, 10);
            }
            NamedKey::PageDown => {
                panel.step(selected, -10);
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ControlPanel {
        let mut panel = ControlPanel::new();
        panel.add("uv scale", 6.0, 1.0, 32.0, 1.0, |_| {});
        panel.add("ground y", 0.0, -1.0, 1.0, 0.01, |_| {});
        panel
    }

    #[test]
    fn arrows_step_the_selected_control() {
        let mut panel = panel();
        let mut keys = KeyboardControls::new();
        assert!(keys.handle_named(&mut panel, &Key::Named(NamedKey::ArrowRight)));
        assert_eq!(panel.value(0), Some(7.0));
        assert!(keys.handle_named(&mut panel, &Key::Named(NamedKey::PageDown)));
        assert_eq!(panel.value(0), Some(1.0));
    }

    #[test]
    fn tab_cycles_and_shift_tab_goes_back() {
        let mut panel = panel();
        let mut keys = KeyboardControls::new();
        keys.handle_named(&mut panel, &Key::Named(NamedKey::Tab));
        assert_eq!(panel.selected(), Some(1));
        keys.set_shift(true);
        keys.handle_named(&mut panel, &Key::Named(NamedKey::Tab));
        assert_eq!(panel.selected(), Some(0));
    }

    #[test]
    fn other_keys_are_not_consumed() {
        let mut panel = panel();
        let mut keys = KeyboardControls::new();
        assert!(!keys.handle_named(&mut panel, &Key::Named(NamedKey::Escape)));
        assert!(!keys.handle_named(&mut panel, &Key::Character("a".into())));
    }
}
