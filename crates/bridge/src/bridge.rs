//! In-process publish/subscribe hub for runtime events.
//!
//! ```text
//! emit(event)
//!     │
//!     ├──► stamp timestamp/id (once)
//!     ├──► history ring (oldest evicted)
//!     └──► fan-out, synchronously, on the emitting thread
//!            ├──► handlers for event.kind()
//!            └──► global handlers (filter-gated)
//!                   └──► Err / panic → warn!, next handler
//! ```
//!
//! The registry lock is released before any handler runs, so handlers may
//! subscribe, unsubscribe or emit again. Nested emission is delivered
//! depth-first; past `max_emit_depth` events are still recorded in history
//! but not fanned out. Depth is counted per bridge and per thread, so a
//! handler emitting on another bridge starts that bridge at depth one.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use gatewatch_core::{BridgeConfig, EventKind, RuntimeEvent};
use tracing::{debug, warn};

use crate::filter::EventFilter;
use crate::history::EventHistory;
use crate::subscription::{lock, EventHandler, HandlerSlot, Registry, Subscription, Target};

thread_local! {
    // Current nesting depth of `emit` on this thread, per bridge.
    static EMIT_DEPTH: RefCell<HashMap<usize, usize>> = RefCell::new(HashMap::new());
}

struct DepthGuard {
    bridge: usize,
    depth: usize,
}

impl DepthGuard {
    fn enter(bridge: usize) -> Self {
        let depth = EMIT_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            let depth = depths.entry(bridge).or_insert(0);
            *depth += 1;
            *depth
        });
        Self { bridge, depth }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EMIT_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(depth) = depths.get_mut(&self.bridge) {
                *depth = depth.saturating_sub(1);
                if *depth == 0 {
                    depths.remove(&self.bridge);
                }
            }
        });
    }
}

struct BridgeInner {
    registry: Arc<Mutex<Registry>>,
    history: Mutex<EventHistory>,
    next_id: AtomicU64,
    max_emit_depth: usize,
}

/// Cloneable handle to one event hub. Clones share handlers and history.
#[derive(Clone)]
pub struct EventBridge {
    inner: Arc<BridgeInner>,
}

impl EventBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                registry: Arc::new(Mutex::new(Registry::default())),
                history: Mutex::new(EventHistory::new(config.history_capacity)),
                next_id: AtomicU64::new(1),
                max_emit_depth: config.max_emit_depth.max(1),
            }),
        }
    }

    /// Handler for a single kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&RuntimeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Target::Kind(kind), None, Arc::new(handler))
    }

    /// Handler for every kind.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RuntimeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Target::All, None, Arc::new(handler))
    }

    /// Global handler that only sees events passing `filter`.
    pub fn subscribe_with_filter<F>(&self, filter: EventFilter, handler: F) -> Subscription
    where
        F: Fn(&RuntimeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Target::All, Some(filter), Arc::new(handler))
    }

    fn register(
        &self,
        target: Target,
        filter: Option<EventFilter>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(HandlerSlot::new(id, target, filter, handler));
        lock(&self.inner.registry).insert(slot);
        debug!(subscription = id, target = ?target, "Handler registered");
        Subscription::new(id, &self.inner.registry)
    }

    /// Stamp, record and deliver an event. Returns the event as recorded.
    ///
    /// Handler failures are logged and swallowed; `emit` itself cannot fail.
    pub fn emit(&self, mut event: RuntimeEvent) -> RuntimeEvent {
        event.ensure_stamped();
        let kind = event.kind();

        lock(&self.inner.history).push(event.clone());

        let guard = DepthGuard::enter(Arc::as_ptr(&self.inner) as usize);
        if guard.depth > self.inner.max_emit_depth {
            warn!(
                kind = %kind,
                event_id = %event.id(),
                depth = guard.depth,
                "Nested emit too deep, event recorded but not delivered"
            );
            return event;
        }

        let slots = lock(&self.inner.registry).matching(kind);
        for slot in slots {
            // Re-checked per handler: an earlier handler may have unsubscribed it.
            if !slot.accepts(&event) {
                continue;
            }
            match std::panic::catch_unwind(AssertUnwindSafe(|| slot.handler.handle(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        subscription = slot.id,
                        kind = %kind,
                        event_id = %event.id(),
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(panic) => {
                    warn!(
                        subscription = slot.id,
                        kind = %kind,
                        event_id = %event.id(),
                        panic = %panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        event
    }

    /// Snapshot of retained events, oldest first.
    pub fn history(&self, filter: Option<&EventFilter>) -> Vec<RuntimeEvent> {
        lock(&self.inner.history).snapshot(filter)
    }

    pub fn clear_history(&self) {
        lock(&self.inner.history).clear();
    }

    /// Drop every handler. Outstanding [`Subscription`] handles become no-ops.
    pub fn clear_all_handlers(&self) {
        lock(&self.inner.registry).clear();
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.inner.registry).len()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.inner.history).len()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.inner.history).capacity()
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new(&BridgeConfig::default())
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("handlers", &self.handler_count())
            .field("history", &self.history_len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewatch_core::event::{EventPayload, GatewayHealth, SessionDelete};
    use gatewatch_core::ActivityItem;
    use std::sync::atomic::AtomicUsize;

    fn bridge_with_capacity(history_capacity: usize) -> EventBridge {
        EventBridge::new(&BridgeConfig {
            history_capacity,
            ..BridgeConfig::default()
        })
    }

    fn session_deleted(id: &str) -> RuntimeEvent {
        RuntimeEvent::unstamped(EventPayload::SessionDelete(SessionDelete {
            session_id: id.to_string(),
        }))
    }

    fn counter() -> (
        Arc<AtomicUsize>,
        impl Fn(&RuntimeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_e: &RuntimeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_emit_stamps_missing_timestamp() {
        let bridge = EventBridge::default();
        let event = bridge.emit(session_deleted("s1"));
        assert!(event.is_stamped());
        assert_eq!(bridge.history(None)[0], event);
    }

    #[test]
    fn test_bounded_history_keeps_most_recent() {
        let bridge = bridge_with_capacity(100);
        for n in 0..150 {
            bridge.emit(session_deleted(&format!("s{}", n)));
        }
        let history = bridge.history(None);
        assert_eq!(history.len(), 100);
        match history[0].payload() {
            EventPayload::SessionDelete(p) => assert_eq!(p.session_id, "s50"),
            other => panic!("unexpected payload {:?}", other),
        }
        match history[99].payload() {
            EventPayload::SessionDelete(p) => assert_eq!(p.session_id, "s149"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_fan_out_exactly_once() {
        let bridge = EventBridge::default();
        let (by_kind, h1) = counter();
        let (global, h2) = counter();
        let (filtered, h3) = counter();
        let (other_kind, h4) = counter();

        let _s1 = bridge.subscribe(EventKind::SessionDelete, h1);
        let _s2 = bridge.subscribe_all(h2);
        let _s3 =
            bridge.subscribe_with_filter(EventFilter::new().kind(EventKind::SessionDelete), h3);
        let _s4 = bridge.subscribe(EventKind::GatewayStatus, h4);

        bridge.emit(session_deleted("s1"));

        assert_eq!(by_kind.load(Ordering::SeqCst), 1);
        assert_eq!(global.load(Ordering::SeqCst), 1);
        assert_eq!(filtered.load(Ordering::SeqCst), 1);
        assert_eq!(other_kind.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_filter_skips_non_matching_source() {
        let bridge = EventBridge::default();
        let (count, handler) = counter();
        let _sub = bridge.subscribe_with_filter(EventFilter::new().source("cron"), handler);

        bridge.emit(session_deleted("a"));
        bridge.emit(session_deleted("b").with_source("supervisor"));
        bridge.emit(session_deleted("c").with_source("cron"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_and_panicking_handlers_are_isolated() {
        let bridge = EventBridge::default();
        let _bad =
            bridge.subscribe(EventKind::SessionDelete, |_e: &RuntimeEvent| anyhow::bail!("boom"));
        let _worse = bridge.subscribe(
            EventKind::SessionDelete,
            |_e: &RuntimeEvent| -> anyhow::Result<()> { panic!("handler exploded") },
        );
        let (count, handler) = counter();
        let _good = bridge.subscribe(EventKind::SessionDelete, handler);

        let event = bridge.emit(session_deleted("s1"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(event.is_stamped());
        assert_eq!(bridge.history_len(), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bridge = EventBridge::default();
        let (count, handler) = counter();
        let sub = bridge.subscribe(EventKind::SessionDelete, handler);
        assert!(sub.is_active());

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());

        bridge.emit(session_deleted("s1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.handler_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes_and_detach_keeps() {
        let bridge = EventBridge::default();
        let (dropped, h1) = counter();
        let (detached, h2) = counter();

        drop(bridge.subscribe(EventKind::SessionDelete, h1));
        bridge.subscribe(EventKind::SessionDelete, h2).detach();

        bridge.emit(session_deleted("s1"));
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
        assert_eq!(detached.load(Ordering::SeqCst), 1);

        bridge.clear_all_handlers();
        bridge.emit(session_deleted("s2"));
        assert_eq!(detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_fan_out_skips_later_handler() {
        let bridge = EventBridge::default();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let v = victim.clone();
        let _killer = bridge.subscribe(EventKind::SessionDelete, move |_e: &RuntimeEvent| {
            if let Some(sub) = v.lock().unwrap().take() {
                sub.unsubscribe();
            }
            Ok(())
        });
        let (count, handler) = counter();
        *victim.lock().unwrap() = Some(bridge.subscribe(EventKind::SessionDelete, handler));

        bridge.emit(session_deleted("s1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_per_kind_delivery_follows_emission_order() {
        let bridge = EventBridge::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = bridge.subscribe(EventKind::SessionDelete, move |e: &RuntimeEvent| {
            if let EventPayload::SessionDelete(p) = e.payload() {
                s.lock().unwrap().push(p.session_id.clone());
            }
            Ok(())
        });

        for id in ["a", "b", "c"] {
            bridge.emit(session_deleted(id));
        }
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_history_appended_before_handlers_run() {
        let bridge = EventBridge::default();
        let observed = Arc::new(AtomicUsize::new(0));
        let (b, o) = (bridge.clone(), observed.clone());
        let _sub = bridge.subscribe_all(move |_e: &RuntimeEvent| {
            o.store(b.history_len(), Ordering::SeqCst);
            Ok(())
        });

        bridge.emit(session_deleted("s1"));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nested_emit_is_bounded() {
        let bridge = EventBridge::new(&BridgeConfig {
            history_capacity: 100,
            max_emit_depth: 4,
        });
        let (count, handler) = counter();
        let _count_sub = bridge.subscribe(EventKind::GatewayStatus, handler);

        let b = bridge.clone();
        let _echo = bridge.subscribe(EventKind::GatewayStatus, move |_e: &RuntimeEvent| {
            b.emit(RuntimeEvent::gateway_status(GatewayHealth::Degraded, None));
            Ok(())
        });

        bridge.emit(RuntimeEvent::gateway_status(GatewayHealth::Online, None));

        // Depths 1..=4 are delivered, depth 5 is only recorded.
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(bridge.history_len(), 5);
    }

    #[test]
    fn test_emit_depth_is_counted_per_bridge() {
        let outer = EventBridge::default();
        let inner = EventBridge::new(&BridgeConfig {
            history_capacity: 100,
            max_emit_depth: 1,
        });
        let (count, handler) = counter();
        let _inner_sub = inner.subscribe(EventKind::GatewayStatus, handler);

        let forward = inner.clone();
        let _outer_sub = outer.subscribe(EventKind::GatewayStatus, move |_e: &RuntimeEvent| {
            forward.emit(RuntimeEvent::gateway_status(GatewayHealth::Online, None));
            Ok(())
        });

        outer.emit(RuntimeEvent::gateway_status(GatewayHealth::Online, None));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        EMIT_DEPTH.with(|depths| assert!(depths.borrow().is_empty()));
    }

    #[test]
    fn test_history_filter_and_clear() {
        let bridge = EventBridge::default();
        bridge.emit(session_deleted("s1"));
        bridge.emit(
            RuntimeEvent::activity_create(ActivityItem::new("a1", "note", "hello"))
                .with_source("store"),
        );
        bridge.emit(RuntimeEvent::gateway_status(GatewayHealth::Online, None));

        let only_store = bridge.history(Some(&EventFilter::new().source("store")));
        assert_eq!(only_store.len(), 1);
        assert_eq!(only_store[0].kind(), EventKind::ActivityCreate);

        let kinds = bridge.history(Some(
            &EventFilter::new().kinds([EventKind::SessionDelete, EventKind::GatewayStatus]),
        ));
        assert_eq!(kinds.len(), 2);

        bridge.clear_history();
        assert!(bridge.history(None).is_empty());
    }

    #[test]
    fn test_handler_may_subscribe_during_delivery() {
        let bridge = EventBridge::default();
        let late: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let (b, l) = (bridge.clone(), late.clone());
        let _sub = bridge.subscribe(EventKind::SessionDelete, move |_e: &RuntimeEvent| {
            let sub = b.subscribe_all(|_e: &RuntimeEvent| Ok(()));
            l.lock().unwrap().push(sub);
            Ok(())
        });

        bridge.emit(session_deleted("s1"));
        assert_eq!(bridge.handler_count(), 2);
    }
}
