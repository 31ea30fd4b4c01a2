//! Per-frame synchronisation callbacks.
//!
//! Anything that has to be pushed into the scene once per frame registers a
//! callback here; today that is the control panel flush. The render loop runs
//! them all before drawing. Orbit controls are not a callback: they move the
//! camera inside the frame itself.

/// Ordered, append-only list of frame callbacks.
#[derive(Default)]
pub struct SyncRegistry {
    callbacks: Vec<Box<dyn FnMut()>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: impl FnMut() + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Invokes every callback exactly once, in registration order.
    pub fn run_all(&mut self) {
        for callback in &mut self.callbacks {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
