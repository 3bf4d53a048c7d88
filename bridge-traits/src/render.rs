//! Render target bridge traits.
//!
//! A render target is the platform view that owns a drawable surface. Its
//! lifecycle is independent from playback: the surface can be created,
//! resized and destroyed any number of times while one session is alive.
//! Lifecycle callbacks arrive on the UI context, which is not the player's
//! owner loop.

use crate::engine::SurfaceHandle;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one render target instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(Uuid);

impl RenderTargetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for RenderTargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RenderTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surface identity passed along with every lifecycle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    /// Render target that owns the surface.
    pub target: RenderTargetId,
    /// Drawable handle, `None` once the surface is gone.
    pub handle: Option<SurfaceHandle>,
}

/// Subscriber to render surface lifecycle.
pub trait RenderCallback: Send + Sync {
    fn on_surface_created(&self, surface: SurfaceInfo, width: u32, height: u32);

    fn on_surface_changed(&self, surface: SurfaceInfo, format: i32, width: u32, height: u32);

    fn on_surface_destroyed(&self, surface: SurfaceInfo);
}

/// Platform render target.
///
/// Methods are called from the player's owner loop and must only post work to
/// the UI context; they must never call back into the player synchronously.
pub trait RenderTarget: Send + Sync {
    fn id(&self) -> RenderTargetId;

    /// Whether playback may only start once the surface size equals the
    /// video size.
    fn requires_size_match(&self) -> bool {
        true
    }

    /// Subscribe to surface lifecycle. Adding the same subscriber twice has no
    /// effect. A subscriber added while a surface exists immediately receives
    /// synthetic created/changed notifications.
    fn add_render_callback(&self, callback: Arc<dyn RenderCallback>);

    /// Unsubscribe. A subscriber that is not registered is ignored.
    fn remove_render_callback(&self, callback: &Arc<dyn RenderCallback>);

    fn set_video_size(&self, width: u32, height: u32);

    fn set_video_sample_aspect_ratio(&self, num: u32, den: u32);

    fn set_video_rotation(&self, _degrees: i32) {}

    fn set_keep_screen_on(&self, keep_on: bool);
}
