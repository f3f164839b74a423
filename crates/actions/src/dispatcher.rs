use std::sync::Arc;

use chrono::Utc;
use gatewatch_bridge::EventBridge;
use gatewatch_core::event::{EventFields, SessionChange, StatusChange, UpdateStatus};
use gatewatch_core::{ActionsConfig, EventPayload, RuntimeEvent};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::action::{
    ActionOutcome, ActionRequest, ActionResponse, AgentPayload, ApprovePayload, ClientAction,
    PollResponse, RejectPayload, SessionPayload,
};
use crate::collaborators::{ActivityStore, AgentSupervisor, SessionRunner};
use crate::error::ActionError;
use crate::results::ResultCache;

const EVENT_SOURCE: &str = "dispatcher";

/// Applies client actions against the collaborators and reports the outcome.
///
/// Follow-up events are emitted on the bridge, when one is attached, after
/// the collaborator call returns.
pub struct ActionDispatcher {
    activities: Arc<dyn ActivityStore>,
    supervisor: Arc<dyn AgentSupervisor>,
    sessions: Arc<dyn SessionRunner>,
    bridge: Option<EventBridge>,
    results: ResultCache,
}

impl ActionDispatcher {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        supervisor: Arc<dyn AgentSupervisor>,
        sessions: Arc<dyn SessionRunner>,
        config: &ActionsConfig,
    ) -> Self {
        Self {
            activities,
            supervisor,
            sessions,
            bridge: None,
            results: ResultCache::new(config.result_ttl()),
        }
    }

    pub fn with_bridge(mut self, bridge: EventBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Handle a raw request body.
    pub async fn dispatch_raw(&self, body: &str) -> ActionResponse {
        match ActionRequest::parse(body) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                if let ActionError::InvalidRequest(detail) = &e {
                    warn!(error = %detail, "Rejected malformed action request");
                }
                ActionResponse::failure(e, None)
            }
        }
    }

    pub async fn dispatch(&self, request: ActionRequest) -> ActionResponse {
        let outcome = match ClientAction::from_request(&request) {
            Ok(action) => {
                info!(
                    action = %action.kind(),
                    request_id = request.request_id.as_deref().unwrap_or(""),
                    "Dispatching action"
                );
                self.apply(action).await
            }
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(result) => ActionOutcome::Success(result),
            Err(e) => {
                warn!(action = %request.kind, error = %e, "Action failed");
                ActionOutcome::Error(e)
            }
        };

        if let Some(key) = request.cache_key() {
            self.results.record(key, outcome.clone()).await;
        }

        ActionResponse {
            outcome,
            request_id: request.request_id,
        }
    }

    /// Outcome of an earlier request. Unknown and expired ids are pending.
    pub async fn poll(&self, request_id: &str) -> PollResponse {
        self.results.get(request_id).await
    }

    async fn apply(&self, action: ClientAction) -> Result<Value, ActionError> {
        match action {
            ClientAction::Ping => Ok(json!({ "pong": true, "timestamp": now() })),
            ClientAction::Approve(payload) => self.approve(payload).await,
            ClientAction::Reject(payload) => self.reject(payload).await,
            ClientAction::PauseAgent(payload) => self.pause_agent(payload).await,
            ClientAction::ResumeAgent(payload) => self.resume_agent(payload).await,
            ClientAction::CancelSession(payload) => self.cancel_session(payload).await,
            ClientAction::Subscribe | ClientAction::Unsubscribe => {
                Err(ActionError::SubscriptionNotSupported)
            }
        }
    }

    async fn approve(&self, payload: ApprovePayload) -> Result<Value, ActionError> {
        self.settle_activity(&payload.activity_id, "approved", "notes", payload.notes)
            .await
    }

    async fn reject(&self, payload: RejectPayload) -> Result<Value, ActionError> {
        self.settle_activity(&payload.activity_id, "rejected", "reason", payload.reason)
            .await
    }

    /// Shared approve/reject path. `note_key` names the echoed free-text field.
    async fn settle_activity(
        &self,
        activity_id: &str,
        status: &str,
        note_key: &str,
        note: Option<String>,
    ) -> Result<Value, ActionError> {
        if self.activities.find(activity_id).await.is_none() {
            return Err(ActionError::ActivityNotFound(activity_id.to_string()));
        }
        self.activities
            .update_status(activity_id, status)
            .await
            .map_err(|e| match e {
                gatewatch_core::Error::NotFound(_) => {
                    ActionError::ActivityNotFound(activity_id.to_string())
                }
                other => ActionError::Collaborator(other.to_string()),
            })?;

        let mut updates = EventFields::new();
        updates.insert("status".to_string(), json!(status));
        if let Some(note) = &note {
            updates.insert(note_key.to_string(), json!(note));
        }
        self.emit(RuntimeEvent::activity_update(
            activity_id,
            UpdateStatus::Success,
            updates,
        ));

        let mut result = json!({
            "activityId": activity_id,
            "status": status,
            "timestamp": now(),
        });
        if let (Some(note), Some(map)) = (note, result.as_object_mut()) {
            map.insert(note_key.to_string(), Value::String(note));
        }
        Ok(result)
    }

    async fn pause_agent(&self, payload: AgentPayload) -> Result<Value, ActionError> {
        if let Err(e) = self.supervisor.pause(&payload.agent_id).await {
            warn!(
                agent_id = %payload.agent_id,
                error = %e,
                "Supervisor did not take pause signal"
            );
        }
        self.emit_agent_status(&payload.agent_id, "paused", "active");
        Ok(json!({ "agentId": payload.agent_id, "status": "paused" }))
    }

    async fn resume_agent(&self, payload: AgentPayload) -> Result<Value, ActionError> {
        if let Err(e) = self.supervisor.resume(&payload.agent_id).await {
            warn!(
                agent_id = %payload.agent_id,
                error = %e,
                "Supervisor did not take resume signal"
            );
        }
        self.emit_agent_status(&payload.agent_id, "active", "paused");
        Ok(json!({ "agentId": payload.agent_id, "status": "active" }))
    }

    async fn cancel_session(&self, payload: SessionPayload) -> Result<Value, ActionError> {
        if let Err(e) = self.sessions.cancel(&payload.session_id).await {
            warn!(
                session_id = %payload.session_id,
                error = %e,
                "Session runner did not take cancel signal"
            );
        }
        self.emit(RuntimeEvent::new(EventPayload::SessionChange(SessionChange {
            session_id: payload.session_id.clone(),
            status: Some("cancelled".to_string()),
            changes: EventFields::new(),
        })));
        Ok(json!({ "sessionId": payload.session_id, "status": "cancelled" }))
    }

    fn emit_agent_status(&self, agent_id: &str, status: &str, previous: &str) {
        self.emit(RuntimeEvent::new(EventPayload::StatusChange(StatusChange {
            agent_id: agent_id.to_string(),
            status: status.to_string(),
            previous: Some(previous.to_string()),
        })));
    }

    fn emit(&self, event: RuntimeEvent) {
        match &self.bridge {
            Some(bridge) => {
                bridge.emit(event.with_source(EVENT_SOURCE));
            }
            None => debug!(kind = %event.kind(), "No bridge attached, follow-up event dropped"),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}
