use thiserror::Error;

#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Capacity exceeded: {count} targets (max {max})")]
    CapacityExceeded { count: usize, max: usize },

    #[error("Session lock conflict: another worker owns session {0}")]
    SessionConflict(i64),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
