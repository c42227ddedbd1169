//! Notification Store
//!
//! Bounded, ordered collection of live notifications. Entries are keyed by
//! id in a map; visual order is kept separately as a sequence of ids, so
//! removing an entry never moves another entry's data.
//!
//! # Invariants
//!
//! - `len() <= capacity()` at all times
//! - `get_index(i).position_index() == i` for every `i` in `0..len()`
//! - the order sequence and the map hold exactly the same ids

use std::collections::HashMap;

use crate::error::NotifyError;
use crate::notification::{Notification, NotificationId};
use crate::platform::{BufferId, SurfaceId};

/// Bounded collection of live notifications in stacking order
#[derive(Debug)]
pub struct NotificationStore {
    entries: HashMap<NotificationId, Notification>,
    order: Vec<NotificationId>,
    capacity: usize,
}

impl NotificationStore {
    /// Create an empty store holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of live entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether another entry would exceed capacity
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.order.len() >= self.capacity
    }

    /// Append an entry at the end of the stack
    ///
    /// Sets the entry's `position_index` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::CapacityReached`] when the store is full.
    pub fn insert(&mut self, mut notification: Notification) -> Result<usize, NotifyError> {
        if self.is_full() {
            return Err(NotifyError::CapacityReached {
                limit: self.capacity,
            });
        }

        let index = self.order.len();
        notification.position_index = index;
        self.order.push(notification.id);
        self.entries.insert(notification.id, notification);
        Ok(index)
    }

    /// Remove the entry at `index`, shifting every later entry down by one
    pub fn remove_at(&mut self, index: usize) -> Option<Notification> {
        if index >= self.order.len() {
            return None;
        }

        let id = self.order.remove(index);
        for (i, later) in self.order.iter().enumerate().skip(index) {
            if let Some(entry) = self.entries.get_mut(later) {
                entry.position_index = i;
            }
        }
        self.entries.remove(&id)
    }

    /// Look up by id
    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries.get(&id)
    }

    /// Look up by id, mutably
    pub fn get_mut(&mut self, id: NotificationId) -> Option<&mut Notification> {
        self.entries.get_mut(&id)
    }

    /// Look up by stack position
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Notification> {
        self.order.get(index).and_then(|id| self.entries.get(id))
    }

    /// Stack position of an id
    #[must_use]
    pub fn position_of(&self, id: NotificationId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    /// First live entry that `replace_key` targets
    #[must_use]
    pub fn find_replacement(&self, replace_key: u32) -> Option<NotificationId> {
        if replace_key == 0 {
            return None;
        }
        self.iter()
            .find(|n| n.matches_replace_key(replace_key))
            .map(Notification::id)
    }

    /// Entry owning `surface`
    #[must_use]
    pub fn find_by_surface(&self, surface: SurfaceId) -> Option<NotificationId> {
        self.entries
            .values()
            .find(|n| n.surface == surface)
            .map(Notification::id)
    }

    /// Entry holding `buffer` in flight
    #[must_use]
    pub fn find_by_buffer(&self, buffer: BufferId) -> Option<NotificationId> {
        self.entries
            .values()
            .find(|n| n.buffers_in_flight.contains(&buffer))
            .map(Notification::id)
    }

    /// Entries in stacking order
    pub fn iter(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Ids in stacking order
    #[must_use]
    pub fn ids(&self) -> Vec<NotificationId> {
        self.order.clone()
    }
}
