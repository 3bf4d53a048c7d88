//! One-time native library initialisation gate.
//!
//! The first caller loads every engine library in order and runs the engine's
//! init hook while holding the gate's lock. Concurrent callers block on the
//! same lock and then observe "already loaded".

use crate::error::Result;
use bridge_traits::error::BridgeError;
use bridge_traits::loader::LibraryLoader;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Shared libraries of the engine, in load order.
pub const DEFAULT_ENGINE_LIBRARIES: &[&str] = &[
    "c++_shared",
    "ffmpeg",
    "redbase",
    "reddownload",
    "redstrategycenter",
    "redsource",
    "redrender",
    "reddecoder",
    "soundtouch",
    "redplayer",
];

/// Invoked with the elapsed time once a load completes.
pub type LoadCallback = Arc<dyn Fn(Duration) + Send + Sync>;

/// Engine-wide init routine run once, right after the libraries are loaded.
pub type EngineInitHook = Arc<dyn Fn() -> bridge_traits::error::Result<()> + Send + Sync>;

pub struct LibraryGate {
    loaded: Mutex<bool>,
    on_loaded: RwLock<Option<LoadCallback>>,
}

static GLOBAL_GATE: OnceLock<Arc<LibraryGate>> = OnceLock::new();

impl LibraryGate {
    pub fn new() -> Self {
        Self {
            loaded: Mutex::new(false),
            on_loaded: RwLock::new(None),
        }
    }

    /// The gate shared by the whole process.
    pub fn global() -> Arc<LibraryGate> {
        Arc::clone(GLOBAL_GATE.get_or_init(|| Arc::new(LibraryGate::new())))
    }

    pub fn is_loaded(&self) -> bool {
        *self.loaded.lock()
    }

    /// Override the loaded flag, e.g. when the host loaded the libraries
    /// itself. Returns the previous value.
    pub fn mark_loaded(&self, loaded: bool) -> bool {
        let mut guard = self.loaded.lock();
        std::mem::replace(&mut *guard, loaded)
    }

    pub fn set_load_callback(&self, callback: Option<LoadCallback>) {
        *self.on_loaded.write() = callback;
    }

    /// Load `libraries` through `loader` unless already done.
    ///
    /// Returns `true` when this call performed the load. A failed load leaves
    /// the gate closed so a later caller can retry.
    pub fn ensure_loaded(
        &self,
        loader: Option<&dyn LibraryLoader>,
        libraries: &[String],
        init_hook: Option<&EngineInitHook>,
    ) -> Result<bool> {
        let mut loaded = self.loaded.lock();
        if *loaded {
            return Ok(false);
        }

        let started = Instant::now();
        if let Some(loader) = loader {
            for library in libraries {
                debug!(library = %library, "Loading native library");
                loader
                    .load_library(library)
                    .map_err(|err| as_load_error(library, err))?;
            }
        }

        if let Some(hook) = init_hook {
            hook().map_err(|err| as_load_error("engine-init", err))?;
        }

        *loaded = true;
        drop(loaded);

        let elapsed = started.elapsed();
        info!(
            libraries = libraries.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Native libraries loaded"
        );

        let callback = self.on_loaded.read().clone();
        if let Some(callback) = callback {
            callback(elapsed);
        }
        Ok(true)
    }
}

fn as_load_error(library: &str, err: BridgeError) -> BridgeError {
    match err {
        err @ BridgeError::LibraryLoad { .. } => err,
        other => BridgeError::LibraryLoad {
            library: library.to_string(),
            message: other.to_string(),
        },
    }
}

impl Default for LibraryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LibraryGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryGate")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
