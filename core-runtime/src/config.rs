//! # Runtime Configuration
//!
//! Process-scoped settings and host capabilities needed before any player can
//! be created. Use [`RuntimeConfig::builder`] to construct instances.
//!
//! ```ignore
//! use core_runtime::config::RuntimeConfig;
//! use std::sync::Arc;
//!
//! let config = RuntimeConfig::builder()
//!     .library_loader(Arc::new(MyLoader))
//!     .engine_log_level(4)
//!     .build()?;
//! ```
//!
//! Validation is fail-fast: inconsistent settings are rejected by `build`
//! rather than surfacing later as playback errors.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::library::{EngineInitHook, LoadCallback, DEFAULT_ENGINE_LIBRARIES};
use crate::logging::ENGINE_LOG_VERBOSE;
use bridge_traits::loader::LibraryLoader;
use bridge_traits::time::{LoggerSink, ENGINE_LOG_SILENT};
use std::sync::Arc;

#[derive(Clone)]
pub struct RuntimeConfig {
    /// Loads the engine libraries. `None` means they are linked statically.
    pub library_loader: Option<Arc<dyn LibraryLoader>>,

    /// Libraries to load, in order.
    pub libraries: Vec<String>,

    /// Engine-wide init routine run after the libraries are loaded.
    pub engine_init: Option<EngineInitHook>,

    /// Invoked with the elapsed load time.
    pub on_libraries_loaded: Option<LoadCallback>,

    /// Engine numeric log level filter (2 = verbose .. 8 = silent).
    pub engine_log_level: i32,

    /// Host sink for engine log lines. `None` routes them to `tracing`.
    pub engine_log_sink: Option<Arc<dyn LoggerSink>>,

    /// Capacity of each player's public event channel.
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field(
                "library_loader",
                &self.library_loader.as_ref().map(|_| "LibraryLoader { ... }"),
            )
            .field("libraries", &self.libraries)
            .field("engine_init", &self.engine_init.is_some())
            .field("on_libraries_loaded", &self.on_libraries_loaded.is_some())
            .field("engine_log_level", &self.engine_log_level)
            .field(
                "engine_log_sink",
                &self.engine_log_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Checks:
    /// - a loader comes with at least one library
    /// - the event buffer holds at least one event
    /// - the engine log level is within the engine's scale
    pub fn validate(&self) -> Result<()> {
        if self.library_loader.is_some() && self.libraries.is_empty() {
            return Err(Error::Config(
                "A library loader was provided but the library list is empty".to_string(),
            ));
        }

        if self.libraries.iter().any(|name| name.trim().is_empty()) {
            return Err(Error::Config(
                "Library names must not be empty".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if !(0..=ENGINE_LOG_SILENT).contains(&self.engine_log_level) {
            return Err(Error::Config(format!(
                "Engine log level {} is outside 0..={}",
                self.engine_log_level, ENGINE_LOG_SILENT
            )));
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct RuntimeConfigBuilder {
    library_loader: Option<Arc<dyn LibraryLoader>>,
    libraries: Option<Vec<String>>,
    engine_init: Option<EngineInitHook>,
    on_libraries_loaded: Option<LoadCallback>,
    engine_log_level: Option<i32>,
    engine_log_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
}

impl RuntimeConfigBuilder {
    pub fn library_loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.library_loader = Some(loader);
        self
    }

    /// Replace the default engine library list.
    pub fn libraries<I, S>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries = Some(libraries.into_iter().map(Into::into).collect());
        self
    }

    pub fn engine_init(mut self, hook: EngineInitHook) -> Self {
        self.engine_init = Some(hook);
        self
    }

    pub fn on_libraries_loaded(mut self, callback: LoadCallback) -> Self {
        self.on_libraries_loaded = Some(callback);
        self
    }

    pub fn engine_log_level(mut self, level: i32) -> Self {
        self.engine_log_level = Some(level);
        self
    }

    pub fn engine_log_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.engine_log_sink = Some(sink);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn build(self) -> Result<RuntimeConfig> {
        let libraries = self.libraries.unwrap_or_else(|| {
            DEFAULT_ENGINE_LIBRARIES
                .iter()
                .map(|name| name.to_string())
                .collect()
        });

        let config = RuntimeConfig {
            library_loader: self.library_loader,
            libraries,
            engine_init: self.engine_init,
            on_libraries_loaded: self.on_libraries_loaded,
            engine_log_level: self.engine_log_level.unwrap_or(ENGINE_LOG_VERBOSE),
            engine_log_sink: self.engine_log_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
