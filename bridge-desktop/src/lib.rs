//! # Desktop Bridge Implementations
//!
//! Reference implementations of the bridge traits for desktop and headless
//! hosts (macOS, Windows, Linux, CI).
//!
//! ## Overview
//!
//! - `ThreadedEngine`: simulated `MediaEngine` that reports back from its own
//!   worker thread, the way a native engine does
//! - `HeadlessRenderTarget`: `RenderTarget` with no window behind it; the host
//!   drives the surface lifecycle by hand
//! - `DesktopWakeLock`: `WakeLock` that only tracks state (desktops do not
//!   sleep during foreground playback)
//! - `SearchPathLoader`: `LibraryLoader` that resolves engine libraries in a
//!   list of directories
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopWakeLock, ThreadedEngine};
//! use core_playback::{Player, PlayerBuilder};
//!
//! let engine = Arc::new(ThreadedEngine::new(SimulatedMedia::default()));
//! let player = Player::spawn(
//!     PlayerBuilder::new()
//!         .runtime(runtime)
//!         .engine(engine)
//!         .wake_lock(Arc::new(DesktopWakeLock::new())),
//! )?;
//! ```

mod engine;
mod loader;
mod power;
mod render;

pub use engine::{SimulatedMedia, ThreadedEngine};
pub use loader::SearchPathLoader;
pub use power::DesktopWakeLock;
pub use render::HeadlessRenderTarget;
