//! Power management bridge.

use crate::error::Result;

/// Wake lock that keeps the device awake while media is playing.
///
/// Acquisition failures are not fatal to playback; the core logs them and
/// carries on without the lock.
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<()>;

    fn release(&self) -> Result<()>;

    fn is_held(&self) -> bool;
}
