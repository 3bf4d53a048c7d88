//! # Core Runtime Module
//!
//! Process-scoped infrastructure every player depends on:
//! - Logging and tracing, including the engine log funnel
//! - The one-time native library initialisation gate
//! - Runtime configuration
//! - The public player event bus
//!
//! Player construction requires a [`CoreRuntime`], which can only be obtained
//! once library initialisation has finished.

pub mod config;
pub mod error;
pub mod events;
pub mod library;
pub mod logging;

pub use error::{Error, Result};

use config::RuntimeConfig;
use library::LibraryGate;
use logging::EngineLogRouter;
use std::sync::Arc;
use tracing::info;

/// Handle to the initialised process runtime.
#[derive(Clone, Debug)]
pub struct CoreRuntime {
    gate: Arc<LibraryGate>,
    log_router: Arc<EngineLogRouter>,
    event_buffer_size: usize,
}

impl CoreRuntime {
    /// Initialise against the process-wide library gate and log router.
    pub fn initialize(config: RuntimeConfig) -> Result<Self> {
        Self::initialize_with(config, LibraryGate::global(), EngineLogRouter::global())
    }

    /// Initialise against explicit instances. Used by hosts embedding several
    /// isolated runtimes, and by tests.
    pub fn initialize_with(
        config: RuntimeConfig,
        gate: Arc<LibraryGate>,
        log_router: Arc<EngineLogRouter>,
    ) -> Result<Self> {
        config.validate()?;

        log_router.set_level(config.engine_log_level);
        if let Some(sink) = config.engine_log_sink.clone() {
            log_router.set_sink(Some(sink));
        }

        if let Some(callback) = config.on_libraries_loaded.clone() {
            gate.set_load_callback(Some(callback));
        }

        let performed = gate.ensure_loaded(
            config.library_loader.as_deref(),
            &config.libraries,
            config.engine_init.as_ref(),
        )?;
        info!(performed_load = performed, "Core runtime initialised");

        Ok(Self {
            gate,
            log_router,
            event_buffer_size: config.event_buffer_size,
        })
    }

    pub fn library_gate(&self) -> &Arc<LibraryGate> {
        &self.gate
    }

    pub fn log_router(&self) -> &Arc<EngineLogRouter> {
        &self.log_router
    }

    pub fn event_buffer_size(&self) -> usize {
        self.event_buffer_size
    }
}
