//! Named listener registry
//!
//! Listeners are keyed by a caller-chosen id. Registering an existing id
//! replaces the callback in place, so notification order stays the order in
//! which ids were first registered.

use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Ordered id → callback mapping
pub struct ListenerRegistry<F: ?Sized> {
    entries: Vec<(String, Arc<F>)>,
}

impl<F: ?Sized> ListenerRegistry<F> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a listener; returns `true` if an existing one was replaced
    pub fn register(&mut self, id: impl Into<String>, listener: Arc<F>) -> bool {
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => {
                entry.1 = listener;
                true
            }
            None => {
                self.entries.push((id, listener));
                false
            }
        }
    }

    /// Remove a listener; returns `true` if it was registered
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| existing != id);
        self.entries.len() != before
    }

    /// Registered ids in notification order
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Number of listeners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No listeners registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all listeners
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copy of the current listeners, safe to call without holding a lock
    pub fn snapshot(&self) -> Dispatch<F> {
        Dispatch {
            entries: self.entries.clone(),
        }
    }
}

impl<F: ?Sized> Default for ListenerRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for ListenerRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Listeners captured for one notification round
pub struct Dispatch<F: ?Sized> {
    entries: Vec<(String, Arc<F>)>,
}

impl<F: ?Sized> Dispatch<F> {
    /// Invoke every listener in order, stopping at the first failure
    pub fn run(&self, mut call: impl FnMut(&F) -> anyhow::Result<()>) -> Result<()> {
        for (id, listener) in &self.entries {
            call(listener.as_ref()).map_err(|source| Error::Listener {
                id: id.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl<F: ?Sized> fmt::Debug for Dispatch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("listeners", &self.entries.len())
            .finish()
    }
}
