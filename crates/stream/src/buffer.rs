use std::collections::HashSet;

use gatewatch_core::ActivityItem;

/// Newest-first, id-deduplicated, capped list of activities.
#[derive(Debug, Clone)]
pub struct ActivityBuffer {
    items: Vec<ActivityItem>,
    capacity: usize,
}

impl ActivityBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    /// Prepend the genuinely new items of `batch`, keeping batch order, then
    /// truncate to capacity. Returns the items that were added.
    pub fn merge_batch(&mut self, batch: Vec<ActivityItem>) -> Vec<ActivityItem> {
        let mut seen: HashSet<String> = self.items.iter().map(|a| a.id.clone()).collect();
        let fresh: Vec<ActivityItem> = batch
            .into_iter()
            .filter(|a| seen.insert(a.id.clone()))
            .collect();

        if !fresh.is_empty() {
            self.items.splice(0..0, fresh.iter().cloned());
            self.items.truncate(self.capacity);
        }
        fresh
    }

    /// Prepend one item unless its id is already present.
    pub fn push(&mut self, item: ActivityItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.insert(0, item);
        self.items.truncate(self.capacity);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|a| a.id == id)
    }

    pub fn items(&self) -> &[ActivityItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
