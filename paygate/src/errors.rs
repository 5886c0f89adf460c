use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}
