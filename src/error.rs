//! Error types for the chat gateway.

/// Top-level error type for the gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration file {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("No accounts configured")]
    NoAccounts,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote server API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the queue id as unknown or expired.
    /// Recoverable: the caller reregisters and continues.
    #[error("Event queue {queue_id} is no longer valid")]
    BadEventQueue { queue_id: String },

    #[error("Queue registration failed: {reason}")]
    Registration { reason: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Server returned {status} from {endpoint}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether this error is the queue-invalid signal (expired or unknown
    /// queue id) rather than a transport or server fault.
    pub fn is_queue_invalid(&self) -> bool {
        matches!(self, Self::BadEventQueue { .. })
    }
}

/// Errors that are fatal to starting an account session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not resolve own identity for account {account}: {source}")]
    Identity { account: String, source: ApiError },

    #[error("Could not register event queue for account {account}: {source}")]
    Registration { account: String, source: ApiError },
}

/// Errors raised while dispatching one message into the reply pipeline.
///
/// Always contained at the single-message boundary — these never terminate
/// the poll loop or roll back a cursor advance.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Reply pipeline failed: {0}")]
    Handler(String),

    #[error("Reply delivery failed: {0}")]
    Delivery(#[from] ApiError),
}

/// Errors from the outbound action dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action kind: {0}")]
    UnknownKind(String),

    #[error("Invalid parameters for action {kind}: {reason}")]
    InvalidParameters { kind: String, reason: String },

    #[error("Action {kind} failed: {source}")]
    Failed { kind: String, source: ApiError },
}

/// Result type alias for the gateway.
pub type Result<T> = std::result::Result<T, Error>;
