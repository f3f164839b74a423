use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use gatewatch_core::{EventKind, RuntimeEvent};

use crate::filter::EventFilter;

/// Something that reacts to emitted events.
///
/// Returning `Err` (or panicking) is reported by the bridge and never reaches
/// the emitter or the other handlers.
pub(crate) trait EventHandler: Send + Sync {
    fn handle(&self, event: &RuntimeEvent) -> anyhow::Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&RuntimeEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, event: &RuntimeEvent) -> anyhow::Result<()> {
        self(event)
    }
}

pub(crate) type SubscriptionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Kind(EventKind),
    All,
}

pub(crate) struct HandlerSlot {
    pub(crate) id: SubscriptionId,
    pub(crate) target: Target,
    pub(crate) filter: Option<EventFilter>,
    pub(crate) handler: Arc<dyn EventHandler>,
    active: AtomicBool,
}

impl HandlerSlot {
    pub(crate) fn new(
        id: SubscriptionId,
        target: Target,
        filter: Option<EventFilter>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            id,
            target,
            filter,
            handler,
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn accepts(&self, event: &RuntimeEvent) -> bool {
        self.is_active() && self.filter.as_ref().map_or(true, |f| f.matches(event))
    }
}

/// Handlers keyed by kind plus the global (all-kinds) list.
#[derive(Default)]
pub(crate) struct Registry {
    by_kind: HashMap<EventKind, Vec<Arc<HandlerSlot>>>,
    global: Vec<Arc<HandlerSlot>>,
}

impl Registry {
    pub(crate) fn insert(&mut self, slot: Arc<HandlerSlot>) {
        match slot.target {
            Target::Kind(kind) => self.by_kind.entry(kind).or_default().push(slot),
            Target::All => self.global.push(slot),
        }
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for slots in self.by_kind.values_mut() {
            slots.retain(|s| {
                let keep = s.id != id;
                if !keep {
                    s.deactivate();
                    removed = true;
                }
                keep
            });
        }
        self.by_kind.retain(|_, slots| !slots.is_empty());
        self.global.retain(|s| {
            let keep = s.id != id;
            if !keep {
                s.deactivate();
                removed = true;
            }
            keep
        });
        removed
    }

    /// Kind-specific handlers first, then global ones.
    pub(crate) fn matching(&self, kind: EventKind) -> Vec<Arc<HandlerSlot>> {
        let mut out: Vec<Arc<HandlerSlot>> = self
            .by_kind
            .get(&kind)
            .map(|slots| slots.to_vec())
            .unwrap_or_default();
        out.extend(self.global.iter().cloned());
        out
    }

    pub(crate) fn clear(&mut self) {
        for slot in self.by_kind.values().flatten().chain(self.global.iter()) {
            slot.deactivate();
        }
        self.by_kind.clear();
        self.global.clear();
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.by_kind
            .values()
            .flatten()
            .chain(self.global.iter())
            .any(|s| s.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum::<usize>() + self.global.len()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a registered handler.
///
/// Dropping the handle unsubscribes. [`Subscription::detach`] keeps the
/// handler registered until the bridge clears its handlers or goes away.
#[must_use = "dropping a Subscription unsubscribes its handler immediately"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Mutex<Registry>>,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, registry: &Arc<Mutex<Registry>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
            detached: false,
        }
    }

    /// Remove the handler. Calling this more than once, or after the bridge
    /// is gone, does nothing.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock(&registry).contains(self.id),
            None => false,
        }
    }

    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.detached)
            .finish()
    }
}
