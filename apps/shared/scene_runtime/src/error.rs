use scene_protocol::{EntityId, ProtocolError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EcsError>;

#[derive(Error, Debug)]
pub enum EcsError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("Component '{component}' not found on {entity}")]
    ComponentNotFound { entity: EntityId, component: String },

    #[error("Unknown component type '{0}'")]
    UnknownComponentType(String),

    #[error("Invalid value for component '{component}': {reason}")]
    InvalidComponentValue { component: String, reason: String },

    #[error("System '{system}' failed: {reason}")]
    SystemExecution { system: String, reason: String },

    #[error("Message channel failure: {0}")]
    Channel(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EcsError {
    /// Errors after which the session cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, EcsError::Channel(_) | EcsError::Protocol(_))
    }
}
