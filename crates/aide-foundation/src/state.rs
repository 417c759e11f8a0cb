//! Observable state cells.
//!
//! Every piece of presentation-visible state (capture state, pending input,
//! response text, status line, command history) lives in a `StateCell`. The
//! owner mutates through `set`/`update`; consumers call `subscribe` and
//! receive a change notification for every mutation.

use tokio::sync::watch;

/// A single observable value. Mutations always notify subscribers, including
/// writes of an equal value.
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        self.tx.send_modify(f);
    }

    /// New subscription. The receiver observes the value at subscription time
    /// and every subsequent mutation.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateCell").field(&*self.tx.borrow()).finish()
    }
}
