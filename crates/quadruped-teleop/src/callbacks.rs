//! Per-button press/release callbacks.
//!
//! Each button owns two slots, one for the falling edge and one for the
//! rising edge. Callbacks receive a mutable context supplied at dispatch
//! time, so they never capture the object they act on.

use std::fmt;

use crate::state::{Button, ButtonEdge, EdgeKind};

/// A button callback acting on a context of type `C`.
pub type Callback<C> = Box<dyn FnMut(&mut C)>;

/// Callback table indexed by button and edge.
pub struct ButtonCallbacks<C> {
    slots: [[Option<Callback<C>>; 2]; 8],
}

const fn slot(kind: EdgeKind) -> usize {
    match kind {
        EdgeKind::Released => 0,
        EdgeKind::Pressed => 1,
    }
}

impl<C> ButtonCallbacks<C> {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| [None, None]),
        }
    }

    /// Install `callback` for the given edge, replacing any previous one.
    pub fn set(&mut self, button: Button, kind: EdgeKind, callback: impl FnMut(&mut C) + 'static) {
        self.slots[button.index()][slot(kind)] = Some(Box::new(callback));
    }

    /// Install a rising-edge callback.
    pub fn on_pressed(&mut self, button: Button, callback: impl FnMut(&mut C) + 'static) {
        self.set(button, EdgeKind::Pressed, callback);
    }

    /// Install a falling-edge callback.
    pub fn on_released(&mut self, button: Button, callback: impl FnMut(&mut C) + 'static) {
        self.set(button, EdgeKind::Released, callback);
    }

    /// Remove both callbacks of `button`.
    pub fn clear(&mut self, button: Button) {
        self.slots[button.index()] = [None, None];
    }

    /// Whether a callback is installed for the edge.
    #[must_use]
    pub fn is_bound(&self, button: Button, kind: EdgeKind) -> bool {
        self.slots[button.index()][slot(kind)].is_some()
    }

    /// Run the callback for one edge, if any. Returns whether one ran.
    pub fn fire(&mut self, edge: ButtonEdge, context: &mut C) -> bool {
        match &mut self.slots[edge.button.index()][slot(edge.kind)] {
            Some(callback) => {
                callback(context);
                true
            }
            None => false,
        }
    }

    /// Run the callbacks for `edges` in order.
    pub fn dispatch(&mut self, edges: &[ButtonEdge], context: &mut C) {
        for &edge in edges {
            self.fire(edge, context);
        }
    }
}

impl<C> Default for ButtonCallbacks<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ButtonCallbacks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<String> = Button::ALL
            .iter()
            .flat_map(|&b| {
                [EdgeKind::Released, EdgeKind::Pressed]
                    .into_iter()
                    .filter(move |&k| self.is_bound(b, k))
                    .map(move |k| format!("{b}:{k:?}"))
            })
            .collect();
        f.debug_struct("ButtonCallbacks").field("bound", &bound).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        presses: u32,
        releases: u32,
    }

    #[test]
    fn dispatches_to_matching_slot() {
        let mut callbacks = ButtonCallbacks::<Counter>::new();
        callbacks.on_pressed(Button::X, |c| c.presses += 1);
        callbacks.on_released(Button::X, |c| c.releases += 1);

        let mut counter = Counter::default();
        callbacks.dispatch(
            &[
                ButtonEdge::pressed(Button::X),
                ButtonEdge::released(Button::X),
                ButtonEdge::pressed(Button::X),
                ButtonEdge::pressed(Button::Y),
            ],
            &mut counter,
        );
        assert_eq!(counter.presses, 2);
        assert_eq!(counter.releases, 1);
    }

    #[test]
    fn unbound_edges_are_ignored() {
        let mut callbacks = ButtonCallbacks::<Counter>::new();
        let mut counter = Counter::default();
        assert!(!callbacks.fire(ButtonEdge::pressed(Button::A), &mut counter));
        callbacks.on_pressed(Button::A, |c| c.presses += 1);
        assert!(callbacks.fire(ButtonEdge::pressed(Button::A), &mut counter));
        assert!(!callbacks.fire(ButtonEdge::released(Button::A), &mut counter));
        assert_eq!(counter.presses, 1);
    }

    #[test]
    fn set_replaces_and_clear_removes() {
        let mut callbacks = ButtonCallbacks::<Counter>::new();
        callbacks.on_pressed(Button::B, |c| c.presses += 1);
        callbacks.on_pressed(Button::B, |c| c.presses += 10);
        let mut counter = Counter::default();
        callbacks.fire(ButtonEdge::pressed(Button::B), &mut counter);
        assert_eq!(counter.presses, 10);

        callbacks.clear(Button::B);
        assert!(!callbacks.is_bound(Button::B, EdgeKind::Pressed));
        assert!(format!("{callbacks:?}").contains("bound: []"));
    }
}
