//! Bounded, order-preserving client registry.
//!
//! - Insertion appends at the end (join order).
//! - Removal at index `i` shifts every later entry down by one, so the
//!   relative order of survivors never changes. This is O(n), which is
//!   fine for the small bounded capacities a broker runs with.
//! - A full registry rejects `add` and hands the item back untouched.
//!
//! The registry is generic so the ordering/capacity rules can be tested
//! without any channels; the broker stores its `ClientRecord`s in it.

use std::fmt;

/// Returned by [`Registry::add`] when the registry is at capacity.
///
/// Carries the rejected item so the caller still owns it.
pub struct RegistryFull<T> {
    pub capacity: usize,
    pub rejected: T,
}

impl<T> fmt::Debug for RegistryFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryFull")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for RegistryFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry full ({} clients)", self.capacity)
    }
}

impl<T> std::error::Error for RegistryFull<T> {}

/// Ordered collection with a hard capacity.
#[derive(Debug)]
pub struct Registry<T> {
    entries: Vec<T>,
    capacity: usize,
}

impl<T> Registry<T> {
    /// Create an empty registry holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Registry {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append `item`, returning its index.
    pub fn add(&mut self, item: T) -> Result<usize, RegistryFull<T>> {
        if self.is_full() {
            return Err(RegistryFull {
                capacity: self.capacity,
                rejected: item,
            });
        }
        self.entries.push(item);
        Ok(self.entries.len() - 1)
    }

    /// Remove the entry at `idx`, shifting later entries down.
    ///
    /// Returns `None` when `idx` is out of range.
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        if idx < self.entries.len() {
            // Vec::remove shifts; swap_remove would reorder survivors.
            Some(self.entries.remove(idx))
        } else {
            None
        }
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.entries.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.entries.get_mut(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.entries.iter_mut()
    }

    /// Remove every entry, last first.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some(item) = self.entries.pop() {
            drained.push(item);
        }
        drained
    }
}
