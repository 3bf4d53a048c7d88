//! Render callback fan-out for render target implementations.
//!
//! [`RenderCallbackSet`] tracks the current surface of one render target and
//! the subscribers interested in it. Subscribers are keyed by identity, so
//! adding the same `Arc` twice never duplicates delivery. A subscriber added
//! while a surface exists is brought up to date synchronously.

use bridge_traits::engine::SurfaceHandle;
use bridge_traits::render::{RenderCallback, RenderTargetId, SurfaceInfo};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default, Clone, Copy)]
struct SurfaceState {
    handle: Option<SurfaceHandle>,
    format_changed: bool,
    format: i32,
    width: u32,
    height: u32,
}

struct Inner {
    surface: SurfaceState,
    callbacks: Vec<Arc<dyn RenderCallback>>,
}

pub struct RenderCallbackSet {
    target: RenderTargetId,
    inner: Mutex<Inner>,
}

impl RenderCallbackSet {
    pub fn new(target: RenderTargetId) -> Self {
        Self {
            target,
            inner: Mutex::new(Inner {
                surface: SurfaceState::default(),
                callbacks: Vec::new(),
            }),
        }
    }

    pub fn target(&self) -> RenderTargetId {
        self.target
    }

    fn info(&self, handle: Option<SurfaceHandle>) -> SurfaceInfo {
        SurfaceInfo {
            target: self.target,
            handle,
        }
    }

    /// Subscribe `callback`. No-op when it is already subscribed.
    pub fn add(&self, callback: Arc<dyn RenderCallback>) {
        let surface = {
            let mut inner = self.inner.lock();
            if inner.callbacks.iter().any(|c| Arc::ptr_eq(c, &callback)) {
                return;
            }
            inner.callbacks.push(Arc::clone(&callback));
            inner.surface
        };

        if surface.handle.is_some() {
            callback.on_surface_created(self.info(surface.handle), surface.width, surface.height);
        }
        if surface.format_changed {
            callback.on_surface_changed(
                self.info(surface.handle),
                surface.format,
                surface.width,
                surface.height,
            );
        }
    }

    /// Unsubscribe `callback`. No-op when it is not subscribed.
    pub fn remove(&self, callback: &Arc<dyn RenderCallback>) {
        self.inner
            .lock()
            .callbacks
            .retain(|c| !Arc::ptr_eq(c, callback));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_surface(&self) -> bool {
        self.inner.lock().surface.handle.is_some()
    }

    /// A new drawable surface exists. Its size is unknown until the first change.
    pub fn surface_created(&self, handle: SurfaceHandle) {
        let callbacks = self.replace_surface(SurfaceState {
            handle: Some(handle),
            ..SurfaceState::default()
        });
        trace!(target_id = %self.target, subscribers = callbacks.len(), "Surface created");
        for callback in callbacks {
            callback.on_surface_created(self.info(Some(handle)), 0, 0);
        }
    }

    pub fn surface_changed(&self, format: i32, width: u32, height: u32) {
        let handle = self.inner.lock().surface.handle;
        let callbacks = self.replace_surface(SurfaceState {
            handle,
            format_changed: true,
            format,
            width,
            height,
        });
        trace!(target_id = %self.target, width, height, "Surface changed");
        for callback in callbacks {
            callback.on_surface_changed(self.info(handle), format, width, height);
        }
    }

    pub fn surface_destroyed(&self) {
        let callbacks = self.replace_surface(SurfaceState::default());
        trace!(target_id = %self.target, "Surface destroyed");
        for callback in callbacks {
            callback.on_surface_destroyed(self.info(None));
        }
    }

    fn replace_surface(&self, surface: SurfaceState) -> Vec<Arc<dyn RenderCallback>> {
        let mut inner = self.inner.lock();
        inner.surface = surface;
        inner.callbacks.clone()
    }
}

impl std::fmt::Debug for RenderCallbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RenderCallbackSet")
            .field("target", &self.target)
            .field("surface", &inner.surface)
            .field("subscribers", &inner.callbacks.len())
            .finish()
    }
}
