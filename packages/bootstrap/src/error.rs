use thiserror::Error;

/// Failure reported by a datastore adapter, already classified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("authentication to '{scope}' failed: {message}")]
    Auth { scope: String, message: String },

    #[error("failed to grant user '{username}' on database '{database}': {message}")]
    Grant {
        username: String,
        database: String,
        message: String,
    },

    #[error("failed to seed marker in '{database}.{collection}': {message}")]
    Marker {
        database: String,
        collection: String,
        message: String,
    },

    #[error("login verification for user '{username}' on database '{database}' failed: {message}")]
    Verify {
        username: String,
        database: String,
        message: String,
    },

    #[error("invalid bootstrap input: {message}")]
    Config { message: String },

    #[error("datastore error during {operation}: {message}")]
    Store { operation: String, message: String },
}

impl BootstrapError {
    pub fn config(message: impl Into<String>) -> Self {
        BootstrapError::Config {
            message: message.into(),
        }
    }

    pub fn store(operation: impl Into<String>, err: StoreError) -> Self {
        BootstrapError::Store {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}
