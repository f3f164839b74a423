use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::action::{ActionOutcome, PollResponse};

struct CachedOutcome {
    outcome: ActionOutcome,
    expires_at: Instant,
    generation: u64,
}

/// Action outcomes keyed by client request id, kept for a fixed TTL.
///
/// Each write schedules its own purge. A later write for the same id bumps
/// the generation, so the earlier purge leaves the newer entry alone.
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<String, CachedOutcome>>>,
    ttl: Duration,
    generation: AtomicU64,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Store an outcome, replacing any earlier one for the same id.
    pub async fn record(&self, request_id: &str, outcome: ActionOutcome) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let expires_at = Instant::now() + self.ttl;
        self.entries.lock().await.insert(
            request_id.to_string(),
            CachedOutcome {
                outcome,
                expires_at,
                generation,
            },
        );

        let entries = self.entries.clone();
        let request_id = request_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            let mut entries = entries.lock().await;
            if entries.get(&request_id).map(|e| e.generation) == Some(generation) {
                entries.remove(&request_id);
                debug!(request_id = %request_id, "Purged expired action result");
            }
        });
    }

    /// Look up an outcome. Unknown and expired ids both read as pending.
    pub async fn get(&self, request_id: &str) -> PollResponse {
        let mut entries = self.entries.lock().await;
        match entries.get(request_id) {
            Some(entry) if Instant::now() < entry.expires_at => PollResponse::from(&entry.outcome),
            Some(_) => {
                entries.remove(request_id);
                PollResponse::Pending
            }
            None => PollResponse::Pending,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(300);

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_is_pending() {
        let cache = ResultCache::new(TTL);
        assert_eq!(cache.get("nope").await, PollResponse::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_and_error_are_both_kept() {
        let cache = ResultCache::new(TTL);
        cache
            .record("r1", ActionOutcome::Success(json!({ "pong": true })))
            .await;
        cache
            .record(
                "r2",
                ActionOutcome::Error(ActionError::ActivityNotFound("a".to_string())),
            )
            .await;

        assert_eq!(
            cache.get("r1").await,
            PollResponse::Success {
                result: json!({ "pong": true })
            }
        );
        assert_eq!(
            cache.get("r2").await,
            PollResponse::Error {
                error: "Activity not found".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_ttl() {
        let cache = ResultCache::new(TTL);
        cache.record("r1", ActionOutcome::Success(json!(1))).await;

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(matches!(cache.get("r1").await, PollResponse::Success { .. }));

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(cache.get("r1").await, PollResponse::Pending);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_survives_earlier_purge() {
        let cache = ResultCache::new(TTL);
        cache.record("r1", ActionOutcome::Success(json!("first"))).await;

        tokio::time::advance(Duration::from_secs(200)).await;
        cache.record("r1", ActionOutcome::Success(json!("second"))).await;

        // The first write's purge fires here and must not touch the second.
        tokio::time::advance(Duration::from_secs(150)).await;
        settle().await;
        assert_eq!(
            cache.get("r1").await,
            PollResponse::Success {
                result: json!("second")
            }
        );

        tokio::time::advance(Duration::from_secs(200)).await;
        settle().await;
        assert_eq!(cache.get("r1").await, PollResponse::Pending);
    }
}
