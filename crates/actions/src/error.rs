use thiserror::Error;

/// Why an action was not applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The request body itself could not be read. The detail is only logged.
    #[error("Invalid request")]
    InvalidRequest(String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("{0}")]
    Validation(String),

    #[error("Activity not found")]
    ActivityNotFound(String),

    #[error("Use the activity stream endpoint for subscriptions")]
    SubscriptionNotSupported,

    #[error("{0}")]
    Collaborator(String),
}

impl ActionError {
    /// HTTP status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ActionError::InvalidRequest(_)
            | ActionError::UnknownAction(_)
            | ActionError::Validation(_)
            | ActionError::SubscriptionNotSupported => 400,
            ActionError::ActivityNotFound(_) => 404,
            ActionError::Collaborator(_) => 500,
        }
    }
}
