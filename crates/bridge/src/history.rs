use std::collections::VecDeque;

use gatewatch_core::RuntimeEvent;

use crate::filter::EventFilter;

/// Fixed-capacity log of the most recent events, oldest evicted first.
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<RuntimeEvent>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: RuntimeEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Copy of the retained events in emission order, optionally filtered.
    pub fn snapshot(&self, filter: Option<&EventFilter>) -> Vec<RuntimeEvent> {
        self.events
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(e)))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
