//! Workspace placeholder crate.
//!
//! This crate re-exports the member crates so host applications can depend on
//! `playercore-workspace` alone. The `desktop-shims` feature (enabled by
//! default) additionally pulls in the reference host implementations from
//! `bridge-desktop`.

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
