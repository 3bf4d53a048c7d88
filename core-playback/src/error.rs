//! # Playback Error Types
//!
//! Errors returned synchronously to the caller of a player command. Failures
//! the engine reports while executing a command are never returned here; they
//! reach the error listener instead.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur when issuing player commands.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// An argument failed validation before anything was queued.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The data source location is empty.
    #[error("Data source must not be empty")]
    EmptyDataSource,

    /// A manifest data source is not a JSON object or array.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Invalid playback speed (must be finite and > 0).
    #[error("Invalid speed: {0} (must be finite and greater than 0)")]
    InvalidSpeed(f32),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The owner loop is gone; the player can no longer accept commands.
    #[error("Player has shut down")]
    PlayerShutDown,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` for synchronous argument validation failures. Such calls
    /// had no effect on the player.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidArgument(_)
                | PlaybackError::EmptyDataSource
                | PlaybackError::InvalidManifest(_)
                | PlaybackError::InvalidVolume(_)
                | PlaybackError::InvalidSpeed(_)
                | PlaybackError::Bridge(BridgeError::InvalidArgument(_))
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
