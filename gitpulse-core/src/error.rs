use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transient execution error: {0}")]
    Transient(String),

    #[error("Network error during {operation}: {message}")]
    Network { operation: String, message: String },

    #[error("Rebase conflict on branch {branch} while committing \"{message}\"")]
    Conflict { branch: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git command failed: {0}")]
    Git(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Executor is shut down")]
    ExecutorClosed,
}
