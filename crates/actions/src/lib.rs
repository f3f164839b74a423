pub mod action;
pub mod collaborators;
pub mod dispatcher;
pub mod error;
pub mod results;

pub use action::{
    ActionKind, ActionOutcome, ActionRequest, ActionResponse, ClientAction, PollResponse,
};
pub use collaborators::{
    ActivityStore, AgentSignal, AgentSupervisor, InMemoryActivityStore, LoggingSessionRunner,
    LoggingSupervisor, SessionRunner,
};
pub use dispatcher::ActionDispatcher;
pub use error::ActionError;
pub use results::ResultCache;
