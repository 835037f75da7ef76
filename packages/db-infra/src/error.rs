use bootstrap::BootstrapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbInfraError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

impl DbInfraError {
    pub fn config(message: impl Into<String>) -> Self {
        DbInfraError::Config {
            message: message.into(),
        }
    }
}
