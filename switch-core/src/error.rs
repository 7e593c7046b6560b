use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("VLAN id {0} is outside 1-4094")]
    InvalidVlan(u16),
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("unknown model: {name}. Available models: {}", available.join(", "))]
    UnknownModel { name: String, available: Vec<String> },
    #[error("model already registered: {0}")]
    AlreadyRegistered(String),
    #[error("{operation} is not supported on {model}")]
    Unsupported {
        operation: &'static str,
        model: &'static str,
    },
    #[error("{operation} failed on {model}: {reason}")]
    OperationFailed {
        operation: &'static str,
        model: &'static str,
        reason: String,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwitchError>;
