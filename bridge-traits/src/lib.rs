//! # Host Bridge Traits
//!
//! Contracts between the playback coordination core and everything it treats
//! as an external collaborator.
//!
//! ## Traits
//!
//! ### Engine
//! - [`MediaEngine`](engine::MediaEngine) - Commands issued to the native engine
//! - [`EngineCallbacks`](engine::EngineCallbacks) - Events and log lines the engine posts back
//!
//! ### Platform Integration
//! - [`RenderTarget`](render::RenderTarget) - Render surface owner with its own lifecycle
//! - [`RenderCallback`](render::RenderCallback) - Surface created/changed/destroyed subscriber
//! - [`WakeLock`](power::WakeLock) - Keeps the device awake during playback
//! - [`LibraryLoader`](loader::LibraryLoader) - Loads the engine's shared libraries
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Threading
//!
//! All traits require `Send + Sync`. [`EngineCallbacks`](engine::EngineCallbacks)
//! is invoked from threads the engine owns, and [`RenderCallback`](render::RenderCallback)
//! from the UI thread. Neither may block on the player.
//!
//! ## Error Handling
//!
//! Every fallible bridge call returns [`BridgeError`](error::BridgeError).
//! `InvalidArgument` marks failures detected synchronously before the engine
//! was involved; `Engine` carries the engine's own error code pair.

pub mod engine;
pub mod error;
pub mod loader;
pub mod power;
pub mod render;
pub mod time;

pub use engine::{DataSource, EngineCallbacks, EventPayload, MediaEngine, SessionToken, SurfaceHandle};
pub use error::BridgeError;
pub use loader::LibraryLoader;
pub use power::WakeLock;
pub use render::{RenderCallback, RenderTarget, RenderTargetId, SurfaceInfo};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
