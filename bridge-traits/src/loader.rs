//! Native library loading bridge.

use crate::error::Result;

/// Loads one native shared library by its short name (e.g. `"redplayer"`).
///
/// Called at most once per library per process, from the initialisation gate.
pub trait LibraryLoader: Send + Sync {
    fn load_library(&self, name: &str) -> Result<()>;
}
