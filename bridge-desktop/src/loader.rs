//! Library Loader using search directories

use bridge_traits::{
    error::{BridgeError, Result},
    loader::LibraryLoader,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolves engine libraries by platform file name in an ordered list of
/// directories.
///
/// The engine is linked into the host binary on desktop, so resolving a
/// library means confirming it is installed where the engine expects it. Each
/// resolved path is recorded in load order.
pub struct SearchPathLoader {
    search_dirs: Vec<PathBuf>,
    loaded: Mutex<Vec<PathBuf>>,
}

impl SearchPathLoader {
    /// Search the per-user data directory (`<data_dir>/playercore/lib`).
    pub fn new() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("playercore")
            .join("lib");
        Self::with_search_dirs(vec![dir])
    }

    pub fn with_search_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            loaded: Mutex::new(Vec::new()),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Resolved library paths, in load order.
    pub fn loaded(&self) -> Vec<PathBuf> {
        self.loaded.lock().clone()
    }

    /// Platform file name for a short library name, e.g. `libfoo.so`.
    pub fn file_name(name: &str) -> String {
        format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            name,
            std::env::consts::DLL_SUFFIX
        )
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let file_name = Self::file_name(name);
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| Path::is_file(path))
    }
}

impl Default for SearchPathLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryLoader for SearchPathLoader {
    fn load_library(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "library name must not be empty".to_string(),
            ));
        }

        match self.resolve(name) {
            Some(path) => {
                debug!(library = name, path = %path.display(), "Resolved library");
                self.loaded.lock().push(path);
                Ok(())
            }
            None => {
                info!(library = name, dirs = ?self.search_dirs, "Library not found");
                Err(BridgeError::LibraryLoad {
                    library: name.to_string(),
                    message: format!("{} not found in search path", Self::file_name(name)),
                })
            }
        }
    }
}
