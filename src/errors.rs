use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Backup object not found: {0}")]
    NotFound(String),

    #[error("Malformed backup artifact: {0}")]
    Format(String),

    #[error("Command execution failed: {command}: {detail}")]
    Process { command: String, detail: String },

    #[error("Restore operation failed: {0}")]
    Restore(String),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
