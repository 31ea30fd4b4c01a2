//! The control panel: user-adjustable scalar parameters.
//!
//! Front-ends (keyboard natively, DOM sliders in the browser) only edit the
//! panel. Edits are queued and applied to their targets by [`ControlPanel::flush`],
//! which the viewer registers as a per-frame sync callback, so the scene is
//! only ever mutated between frames.

pub mod keyboard;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::{cell::RefCell, fmt::Write as _, rc::Rc};

pub type ControlId = usize;

pub type SharedPanel = Rc<RefCell<ControlPanel>>;

struct Control {
    label: String,
    value: f32,
    min: f32,
    max: f32,
    step: f32,
    pending: bool,
    setter: Box<dyn FnMut(f32)>,
}

impl Control {
    fn quantise(&self, value: f32) -> f32 {
        let value = value.clamp(self.min, self.max);
        if self.step <= 0.0 {
            return value;
        }
        let snapped = self.min + ((value - self.min) / self.step).round() * self.step;
        // rounding back onto the step grid must not leave the range
        snapped.clamp(self.min, self.max)
    }

    fn decimals(&self) -> usize {
        if self.step <= 0.0 || self.step >= 1.0 {
            0
        } else {
            (-self.step.log10() - 1e-3).ceil() as usize
        }
    }
}

/// Read-only view of one control for front-ends.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlInfo {
    pub id: ControlId,
    pub label: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

#[derive(Default)]
pub struct ControlPanel {
    controls: Vec<Control>,
    selected: usize,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedPanel {
        Rc::new(RefCell::new(self))
    }

    /// Adds a slider. `initial` is the target's current value; the setter is
    /// only called for later edits.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        initial: f32,
        min: f32,
        max: f32,
        step: f32,
        setter: impl FnMut(f32) + 'static,
    ) -> ControlId {
        let mut control = Control {
            label: label.into(),
            value: initial,
            min: min.min(max),
            max: max.max(min),
            step,
            pending: false,
            setter: Box::new(setter),
        };
        control.value = control.quantise(initial);
        self.controls.push(control);
        self.controls.len() - 1
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn value(&self, id: ControlId) -> Option<f32> {
        self.controls.get(id).map(|control| control.value)
    }

    pub fn find(&self, label: &str) -> Option<ControlId> {
        self.controls.iter().position(|control| control.label == label)
    }

    /// Queues a new value, snapped to the control's step and range. Returns the stored value.
    pub fn set(&mut self, id: ControlId, value: f32) -> Option<f32> {
        let control = self.controls.get_mut(id)?;
        let value = control.quantise(value);
        if value != control.value {
            control.value = value;
            control.pending = true;
        }
        Some(value)
    }

    /// Moves a control by a whole number of steps.
    pub fn step(&mut self, id: ControlId, steps: i32) -> Option<f32> {
        let control = self.controls.get(id)?;
        let target = control.value + control.step * steps as f32;
        self.set(id, target)
    }

    /// Applies every queued edit to its target, in the order the controls were added.
    pub fn flush(&mut self) {
        for control in &mut self.controls {
            if control.pending {
                control.pending = false;
                (control.setter)(control.value);
            }
        }
    }

    pub fn selected(&self) -> Option<ControlId> {
        (!self.controls.is_empty()).then_some(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.controls.is_empty() {
            self.selected = (self.selected + 1) % self.controls.len();
        }
    }

    pub fn select_previous(&mut self) {
        if !self.controls.is_empty() {
            self.selected = (self.selected + self.controls.len() - 1) % self.controls.len();
        }
    }

    pub fn controls(&self) -> impl Iterator<Item = ControlInfo> + '_ {
        self.controls.iter().enumerate().map(|(id, control)| ControlInfo {
            id,
            label: control.label.clone(),
            value: control.value,
            min: control.min,
            max: control.max,
            step: control.step,
        })
    }

    /// One-line rendering of all controls, the selected one bracketed.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (id, control) in self.controls.iter().enumerate() {
            if id > 0 {
                out.push_str("  ");
            }
            let decimals = control.decimals();
            if Some(id) == self.selected() {
                let _ = write!(out, "[{}: {:.*}]", control.label, decimals, control.value);
            } else {
                let _ = write!(out, "{}: {:.*}", control.label, decimals, control.value);
            }
        }
        out
    }
}

impl std::fmt::Debug for ControlPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

/// The callback that applies queued edits, for the sync registry.
pub fn flush_callback(panel: &SharedPanel) -> impl FnMut() + 'static {
    let panel = panel.clone();
    move || panel.borrow_mut().flush()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn panel_with_target() -> (ControlPanel, Rc<Cell<f32>>) {
        let target = Rc::new(Cell::new(0.0));
        let mut panel = ControlPanel::new();
        let t = target.clone();
        panel.add("ground y", 0.0, -1.0, 1.0, 0.01, move |v| t.set(v));
        (panel, target)
    }

    #[test]
    fn edits_are_applied_on_flush_only() {
        let (mut panel, target) = panel_with_target();
        panel.set(0, 0.5);
        assert_eq!(target.get(), 0.0);
        panel.flush();
        assert_eq!(target.get(), 0.5);
    }

    #[test]
    fn values_snap_to_step_and_range() {
        let mut panel = ControlPanel::new();
        panel.add("uv scale", 6.0, 1.0, 32.0, 1.0, |_| {});
        assert_eq!(panel.set(0, 6.4), Some(6.0));
        assert_eq!(panel.set(0, 40.0), Some(32.0));
        assert_eq!(panel.set(0, -3.0), Some(1.0));
        assert_eq!(panel.step(0, 2), Some(3.0));
    }

    #[test]
    fn unchanged_values_do_not_call_the_setter() {
        let calls = Rc::new(Cell::new(0));
        let mut panel = ControlPanel::new();
        let c = calls.clone();
        panel.add("uv scale", 6.0, 1.0, 32.0, 1.0, move |_| c.set(c.get() + 1));
        panel.set(0, 6.0);
        panel.flush();
        assert_eq!(calls.get(), 0);
        panel.set(0, 7.0);
        panel.flush();
        panel.flush();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn selection_wraps_both_ways() {
        let (mut panel, _) = panel_with_target();
        panel.add("uv scale", 6.0, 1.0, 32.0, 1.0, |_| {});
        assert_eq!(panel.selected(), Some(0));
        panel.select_previous();
        assert_eq!(panel.selected(), Some(1));
        panel.select_next();
        assert_eq!(panel.selected(), Some(0));
    }

    #[test]
    fn summary_uses_step_precision() {
        let (mut panel, _) = panel_with_target();
        panel.add("uv scale", 6.0, 1.0, 32.0, 1.0, |_| {});
        assert_eq!(panel.summary(), "[ground y: 0.00]  uv scale: 6");
    }
}
