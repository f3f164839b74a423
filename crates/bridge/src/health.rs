use std::time::Duration;

use gatewatch_core::event::{EventPayload, GatewayHealth, GatewayStatus};
use gatewatch_core::RuntimeEvent;
use tracing::{info, warn};

use crate::bridge::EventBridge;

const DEFAULT_DEGRADED_AFTER: Duration = Duration::from_millis(1500);

/// Turns gateway probe results into `gateway:status` events.
///
/// Only transitions are published. Repeated probes with the same outcome
/// emit nothing. `observe` takes `&mut self`, so the recorded status and the
/// emitted event advance together; callers sharing a monitor across tasks
/// wrap it in a mutex held for the whole call.
pub struct GatewayMonitor {
    bridge: EventBridge,
    degraded_after: Duration,
    last: Option<GatewayHealth>,
}

impl GatewayMonitor {
    pub fn new(bridge: EventBridge) -> Self {
        Self {
            bridge,
            degraded_after: DEFAULT_DEGRADED_AFTER,
            last: None,
        }
    }

    pub fn with_degraded_after(mut self, threshold: Duration) -> Self {
        self.degraded_after = threshold;
        self
    }

    /// Classify one probe: reachable and fast is online, reachable but
    /// slower than the threshold is degraded, unreachable is offline.
    pub fn classify(&self, probe: &Result<Duration, String>) -> GatewayHealth {
        match probe {
            Ok(latency) if *latency < self.degraded_after => GatewayHealth::Online,
            Ok(_) => GatewayHealth::Degraded,
            Err(_) => GatewayHealth::Offline,
        }
    }

    /// Record a probe result. Emits and returns the event only when the
    /// health differs from the previous observation.
    pub fn observe(&mut self, probe: Result<Duration, String>) -> Option<RuntimeEvent> {
        let status = self.classify(&probe);
        if self.last == Some(status) {
            return None;
        }
        self.last = Some(status);

        let (latency_ms, message) = match probe {
            Ok(latency) => (Some(latency.as_millis() as u64), None),
            Err(e) => (None, Some(e)),
        };

        match status {
            GatewayHealth::Online => info!(latency_ms = ?latency_ms, "Gateway online"),
            GatewayHealth::Degraded => warn!(latency_ms = ?latency_ms, "Gateway degraded"),
            GatewayHealth::Offline => warn!(error = ?message, "Gateway offline"),
        }

        let event = RuntimeEvent::unstamped(EventPayload::GatewayStatus(GatewayStatus {
            status,
            latency_ms,
            message,
        }))
        .with_source("gateway-monitor");
        Some(self.bridge.emit(event))
    }

    pub fn last_status(&self) -> Option<GatewayHealth> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewatch_core::EventKind;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_only_transitions_are_emitted() {
        let bridge = EventBridge::default();
        let mut monitor = GatewayMonitor::new(bridge.clone());

        assert!(monitor.observe(Ok(Duration::from_millis(20))).is_some());
        assert!(monitor.observe(Ok(Duration::from_millis(30))).is_none());
        assert!(monitor.observe(Err("connection refused".to_string())).is_some());
        assert!(monitor.observe(Err("timeout".to_string())).is_none());
        assert!(monitor.observe(Ok(Duration::from_millis(10))).is_some());

        let history = bridge.history(None);
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|e| e.kind() == EventKind::GatewayStatus));
        assert!(history.iter().all(|e| e.source() == Some("gateway-monitor")));
        assert_eq!(monitor.last_status(), Some(GatewayHealth::Online));
    }

    #[test]
    fn test_slow_probe_is_degraded() {
        let mut monitor = GatewayMonitor::new(EventBridge::default())
            .with_degraded_after(Duration::from_millis(100));

        let event = monitor.observe(Ok(Duration::from_millis(250))).unwrap();
        match event.payload() {
            EventPayload::GatewayStatus(p) => {
                assert_eq!(p.status, GatewayHealth::Degraded);
                assert_eq!(p.latency_ms, Some(250));
                assert!(p.message.is_none());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_offline_carries_error_message() {
        let mut monitor = GatewayMonitor::new(EventBridge::default());
        let event = monitor.observe(Err("dns failure".to_string())).unwrap();
        match event.payload() {
            EventPayload::GatewayStatus(p) => {
                assert_eq!(p.status, GatewayHealth::Offline);
                assert_eq!(p.message.as_deref(), Some("dns failure"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_shared_monitor_history_matches_last_status() {
        let bridge = EventBridge::default();
        let monitor = Arc::new(Mutex::new(GatewayMonitor::new(bridge.clone())));

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let probe = if (worker + round) % 2 == 0 {
                            Ok(Duration::from_millis(5))
                        } else {
                            Err("connection reset".to_string())
                        };
                        monitor.lock().unwrap().observe(probe);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let history = bridge.history(None);
        let last_emitted = match history.last().map(|e| e.payload()) {
            Some(EventPayload::GatewayStatus(p)) => p.status,
            other => panic!("unexpected payload {:?}", other),
        };
        assert_eq!(monitor.lock().unwrap().last_status(), Some(last_emitted));
    }
}
