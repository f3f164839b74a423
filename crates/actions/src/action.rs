//! Wire types for client-originated actions.
//!
//! A request is read in two stages: the envelope (`type`, `payload`,
//! `requestId`) first, then the payload against the shape its kind expects.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Ping,
    Approve,
    Reject,
    PauseAgent,
    ResumeAgent,
    CancelSession,
    Subscribe,
    Unsubscribe,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::Ping,
        ActionKind::Approve,
        ActionKind::Reject,
        ActionKind::PauseAgent,
        ActionKind::ResumeAgent,
        ActionKind::CancelSession,
        ActionKind::Subscribe,
        ActionKind::Unsubscribe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Ping => "ping",
            ActionKind::Approve => "action:approve",
            ActionKind::Reject => "action:reject",
            ActionKind::PauseAgent => "action:pause_agent",
            ActionKind::ResumeAgent => "action:resume_agent",
            ActionKind::CancelSession => "action:cancel_session",
            ActionKind::Subscribe => "subscribe",
            ActionKind::Unsubscribe => "unsubscribe",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request envelope as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ActionRequest {
    pub fn new(kind: &str, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            payload,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn parse(body: &str) -> Result<Self, ActionError> {
        serde_json::from_str(body).map_err(|e| ActionError::InvalidRequest(e.to_string()))
    }

    /// The request id to cache under, exactly as the client sent it.
    /// Blank ids are not cached.
    pub fn cache_key(&self) -> Option<&str> {
        self.request_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePayload {
    pub activity_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayload {
    pub activity_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPayload {
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub session_id: String,
}

/// A validated action, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    Ping,
    Approve(ApprovePayload),
    Reject(RejectPayload),
    PauseAgent(AgentPayload),
    ResumeAgent(AgentPayload),
    CancelSession(SessionPayload),
    Subscribe,
    Unsubscribe,
}

impl ClientAction {
    pub fn from_request(request: &ActionRequest) -> Result<Self, ActionError> {
        let kind = ActionKind::from_wire(&request.kind)
            .ok_or_else(|| ActionError::UnknownAction(request.kind.clone()))?;

        let action = match kind {
            ActionKind::Ping => ClientAction::Ping,
            ActionKind::Approve => {
                let payload: ApprovePayload = payload_as(kind, &request.payload)?;
                require(&payload.activity_id, "activityId")?;
                ClientAction::Approve(payload)
            }
            ActionKind::Reject => {
                let payload: RejectPayload = payload_as(kind, &request.payload)?;
                require(&payload.activity_id, "activityId")?;
                ClientAction::Reject(payload)
            }
            ActionKind::PauseAgent | ActionKind::ResumeAgent => {
                let payload: AgentPayload = payload_as(kind, &request.payload)?;
                require(&payload.agent_id, "agentId")?;
                if kind == ActionKind::PauseAgent {
                    ClientAction::PauseAgent(payload)
                } else {
                    ClientAction::ResumeAgent(payload)
                }
            }
            ActionKind::CancelSession => {
                let payload: SessionPayload = payload_as(kind, &request.payload)?;
                require(&payload.session_id, "sessionId")?;
                ClientAction::CancelSession(payload)
            }
            ActionKind::Subscribe => ClientAction::Subscribe,
            ActionKind::Unsubscribe => ClientAction::Unsubscribe,
        };
        Ok(action)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ClientAction::Ping => ActionKind::Ping,
            ClientAction::Approve(_) => ActionKind::Approve,
            ClientAction::Reject(_) => ActionKind::Reject,
            ClientAction::PauseAgent(_) => ActionKind::PauseAgent,
            ClientAction::ResumeAgent(_) => ActionKind::ResumeAgent,
            ClientAction::CancelSession(_) => ActionKind::CancelSession,
            ClientAction::Subscribe => ActionKind::Subscribe,
            ClientAction::Unsubscribe => ActionKind::Unsubscribe,
        }
    }
}

fn payload_as<T: DeserializeOwned>(kind: ActionKind, payload: &Value) -> Result<T, ActionError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| ActionError::Validation(format!("Invalid payload for {}: {}", kind, e)))
}

fn require(value: &str, field: &str) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        return Err(ActionError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Outcome of one applied action, as stored for later polling.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success(Value),
    Error(ActionError),
}

/// Reply to a dispatched action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub outcome: ActionOutcome,
    pub request_id: Option<String>,
}

impl ActionResponse {
    pub fn success(result: Value, request_id: Option<String>) -> Self {
        Self {
            outcome: ActionOutcome::Success(result),
            request_id,
        }
    }

    pub fn failure(error: ActionError, request_id: Option<String>) -> Self {
        Self {
            outcome: ActionOutcome::Error(error),
            request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Success(_))
    }

    pub fn status_code(&self) -> u16 {
        match &self.outcome {
            ActionOutcome::Success(_) => 200,
            ActionOutcome::Error(e) => e.status_code(),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ActionOutcome::Success(result) => Some(result),
            ActionOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ActionError> {
        match &self.outcome {
            ActionOutcome::Success(_) => None,
            ActionOutcome::Error(e) => Some(e),
        }
    }

    /// JSON body a transport sends back.
    pub fn body(&self) -> Value {
        let mut body = match &self.outcome {
            ActionOutcome::Success(result) => json!({ "success": true, "result": result }),
            ActionOutcome::Error(e) => json!({ "error": e.to_string() }),
        };
        if let (Some(id), Some(map)) = (&self.request_id, body.as_object_mut()) {
            map.insert("requestId".to_string(), Value::String(id.clone()));
        }
        body
    }
}

/// Answer to a result poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Pending,
    Success { result: Value },
    Error { error: String },
}

impl From<&ActionOutcome> for PollResponse {
    fn from(outcome: &ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Success(result) => PollResponse::Success {
                result: result.clone(),
            },
            ActionOutcome::Error(e) => PollResponse::Error {
                error: e.to_string(),
            },
        }
    }
}
