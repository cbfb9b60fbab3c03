//! Per-group operator state.
//!
//! Grouped operators keep one independent state per group key hash. A group's
//! state is created when the first change for it arrives and dropped as soon
//! as it is empty again, so the number of live groups follows the data.

use alloc::vec::Vec;
use hashbrown::HashMap;
use tracing::debug;

/// State that can tell whether it still holds anything.
pub trait GroupState {
    fn is_empty(&self) -> bool;
}

/// Map from group hash to group state.
pub struct GroupMap<S> {
    groups: HashMap<u32, S>,
}

impl<S> Default for GroupMap<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> GroupMap<S> {
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }

    pub fn get(&self, group: u32) -> Option<&S> {
        self.groups.get(&group)
    }

    pub fn get_mut(&mut self, group: u32) -> Option<&mut S> {
        self.groups.get_mut(&group)
    }

    /// Returns the state of `group`, creating it with `create` if missing.
    pub fn get_or_insert_with<F: FnOnce() -> S>(&mut self, group: u32, create: F) -> &mut S {
        self.groups.entry(group).or_insert_with(create)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group hashes in ascending order.
    pub fn keys(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.groups.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn values(&self) -> impl Iterator<Item = &S> {
        self.groups.values()
    }
}

impl<S: GroupState> GroupMap<S> {
    /// Drops the state of `group` if it is empty. Returns true if dropped.
    pub fn evict_if_empty(&mut self, group: u32) -> bool {
        let empty = self.groups.get(&group).is_some_and(S::is_empty);
        if empty {
            self.groups.remove(&group);
            debug!(group, live = self.groups.len(), "group evicted");
        }
        empty
    }
}
