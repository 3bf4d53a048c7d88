use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Library initialisation failed: {0}")]
    LibraryLoad(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, Error>;
