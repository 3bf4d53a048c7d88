//! Wake lock for desktop hosts.

use bridge_traits::{error::Result, power::WakeLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Desktops stay awake during foreground playback, so this lock only tracks
/// whether the player currently wants the device awake.
#[derive(Debug, Default)]
pub struct DesktopWakeLock {
    held: AtomicBool,
    acquisitions: AtomicU64,
}

impl DesktopWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the lock went from released to held.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl WakeLock for DesktopWakeLock {
    fn acquire(&self) -> Result<()> {
        if !self.held.swap(true, Ordering::SeqCst) {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            debug!("Wake lock acquired");
        }
        Ok(())
    }

    fn release(&self) -> Result<()> {
        if self.held.swap(false, Ordering::SeqCst) {
            debug!("Wake lock released");
        }
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
