//! Media engine bridge traits and supporting types.
//!
//! The native decode/render engine is opaque to the core. It is driven through
//! the [`MediaEngine`] command surface and reports back through
//! [`EngineCallbacks`], which it may invoke from any thread it owns.
//! Host applications provide the concrete engine binding.

use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Identity of one playback session.
///
/// Tokens are issued monotonically and never reused. The engine stamps every
/// event with the token it was attached with, which lets the core discard
/// events that outlive their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Wrap a raw token value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token value.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Opaque handle to a platform render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Optional payload attached to an engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Textual payload, e.g. the URL carried by a url-change info event.
    Text(String),
    /// Raw bytes the core does not interpret.
    Bytes(Bytes),
}

impl EventPayload {
    /// Borrow the payload as text when it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventPayload::Text(text) => Some(text),
            EventPayload::Bytes(_) => None,
        }
    }
}

/// Media location handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Network or content URI with optional request headers.
    Uri {
        uri: String,
        headers: BTreeMap<String, String>,
    },
    /// Local file.
    Path(PathBuf),
    /// Multi-bitrate manifest. Only the engine understands its schema.
    Manifest(String),
}

impl DataSource {
    /// Build a URI source without headers.
    pub fn uri(uri: impl Into<String>) -> Self {
        DataSource::Uri {
            uri: uri.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Classify a user supplied location.
    ///
    /// Input that parses as a JSON object or array is treated as a manifest,
    /// anything else as a URI.
    pub fn detect(input: impl Into<String>) -> Result<Self> {
        let input = input.into();
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "data source must not be empty".to_string(),
            ));
        }

        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) if value.is_object() || value.is_array() => {
                Ok(DataSource::Manifest(trimmed.to_string()))
            }
            _ => Ok(DataSource::uri(trimmed)),
        }
    }

    /// Attach a request header. Has no effect on non-URI sources.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let DataSource::Uri { headers, .. } = &mut self {
            headers.insert(key.into(), value.into());
        }
        self
    }

    /// Synchronous precondition check performed before a source is queued.
    pub fn validate(&self) -> Result<()> {
        match self {
            DataSource::Uri { uri, .. } if uri.trim().is_empty() => Err(
                BridgeError::InvalidArgument("uri must not be empty".to_string()),
            ),
            DataSource::Path(path) if path.as_os_str().is_empty() => Err(
                BridgeError::InvalidArgument("path must not be empty".to_string()),
            ),
            DataSource::Manifest(json) => {
                let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
                    BridgeError::InvalidArgument(format!("manifest is not valid JSON: {}", e))
                })?;
                if value.is_object() || value.is_array() {
                    Ok(())
                } else {
                    Err(BridgeError::InvalidArgument(
                        "manifest must be a JSON object or array".to_string(),
                    ))
                }
            }
            _ => Ok(()),
        }
    }

    /// Header block in the engine's `key:value\r\n` wire form, if any.
    pub fn header_block(&self) -> Option<String> {
        let DataSource::Uri { headers, .. } = self else {
            return None;
        };
        if headers.is_empty() {
            return None;
        }

        let mut block = String::new();
        for (key, value) in headers {
            block.push_str(key);
            block.push(':');
            block.push_str(value);
            block.push_str("\r\n");
        }
        Some(block)
    }

    /// Human-readable location used in start/pause notifications and logs.
    pub fn display_url(&self) -> String {
        match self {
            DataSource::Uri { uri, .. } => uri.clone(),
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Manifest(_) => "manifest".to_string(),
        }
    }
}

/// Callbacks the engine invokes from its own threads.
///
/// Implementations must never block the caller beyond a short, bounded
/// hand-off.
pub trait EngineCallbacks: Send + Sync {
    /// Report one engine occurrence for `session`.
    ///
    /// `time_ms` is the engine's wall-clock stamp; values `<= 0` mean "unknown".
    fn post_event(
        &self,
        session: SessionToken,
        time_ms: i64,
        what: i32,
        arg1: i64,
        arg2: i64,
        payload: Option<EventPayload>,
    );

    /// Forward one engine log line. `level` uses the engine's numeric scale.
    fn post_log(&self, level: i32, tag: &str, bytes: &[u8]);
}

/// Command surface of the native playback engine.
///
/// Every command may fail with [`BridgeError::Engine`]. The core reports such
/// failures through its error listener rather than to the caller that issued
/// the command.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Bind the callbacks for a new session. Events must be stamped with
    /// `session` until the next call to `attach`.
    fn attach(&self, session: SessionToken, callbacks: Arc<dyn EngineCallbacks>);

    /// Set or clear the render surface.
    async fn set_surface(&self, surface: Option<SurfaceHandle>) -> Result<()>;

    /// Set request headers for the next URI source (`key:value\r\n` lines).
    async fn set_headers(&self, headers: String) -> Result<()>;

    /// Set a URI or local path as the source.
    async fn set_data_source(&self, location: String) -> Result<()>;

    /// Set a multi-bitrate manifest as the source.
    async fn set_data_source_manifest(&self, json: String) -> Result<()>;

    /// Start asynchronous preparation. Completion is reported as a prepared event.
    async fn prepare_async(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Seek to an absolute position in milliseconds.
    async fn seek_to(&self, position_ms: i64) -> Result<()>;

    async fn set_volume(&self, left: f32, right: f32) -> Result<()>;

    async fn set_looping(&self, looping: bool) -> Result<()>;

    async fn set_speed(&self, speed: f32) -> Result<()>;

    /// Release every native resource. The engine must not be used afterwards.
    async fn release(&self) -> Result<()>;

    /// Return the engine to its idle state so it can be reused.
    async fn reset(&self) -> Result<()>;
}
