use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine reported error ({code}, {extra})")]
    Engine { code: i32, extra: i32 },

    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Failed to load library {library}: {message}")]
    LibraryLoad { library: String, message: String },
}

impl BridgeError {
    /// Returns `true` for failures detected before anything reached the engine.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, BridgeError::InvalidArgument(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
