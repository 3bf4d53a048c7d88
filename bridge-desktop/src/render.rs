//! Headless Render Target
//!
//! A render target with no window system behind it. The host (or a test)
//! drives the surface lifecycle explicitly; the player side sees exactly what
//! it would see from a real view.

use bridge_traits::engine::SurfaceHandle;
use bridge_traits::render::{RenderCallback, RenderTarget, RenderTargetId};
use core_playback::RenderCallbackSet;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct VideoLayout {
    width: u32,
    height: u32,
    sar_num: u32,
    sar_den: u32,
}

pub struct HeadlessRenderTarget {
    callbacks: RenderCallbackSet,
    requires_size_match: bool,
    layout: Mutex<VideoLayout>,
    rotation: AtomicI32,
    keep_screen_on: AtomicBool,
}

impl HeadlessRenderTarget {
    /// A target that holds playback until its surface matches the video size,
    /// like a view that resizes itself to the video.
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// A target that accepts any surface size.
    pub fn fixed_size() -> Arc<Self> {
        Self::build(false)
    }

    fn build(requires_size_match: bool) -> Arc<Self> {
        Arc::new(Self {
            callbacks: RenderCallbackSet::new(RenderTargetId::new()),
            requires_size_match,
            layout: Mutex::new(VideoLayout::default()),
            rotation: AtomicI32::new(0),
            keep_screen_on: AtomicBool::new(false),
        })
    }

    pub fn create_surface(&self, handle: SurfaceHandle) {
        self.callbacks.surface_created(handle);
    }

    pub fn resize(&self, format: i32, width: u32, height: u32) {
        self.callbacks.surface_changed(format, width, height);
    }

    pub fn destroy_surface(&self) {
        self.callbacks.surface_destroyed();
    }

    /// Resize the surface to the last video size the player reported, as a
    /// view would after a layout pass. Returns `false` while no size is known.
    pub fn fit_to_video(&self) -> bool {
        let layout = *self.layout.lock();
        if layout.width == 0 || layout.height == 0 {
            return false;
        }
        self.resize(0, layout.width, layout.height);
        true
    }

    pub fn has_surface(&self) -> bool {
        self.callbacks.has_surface()
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.len()
    }

    pub fn video_size(&self) -> (u32, u32) {
        let layout = self.layout.lock();
        (layout.width, layout.height)
    }

    pub fn sample_aspect_ratio(&self) -> (u32, u32) {
        let layout = self.layout.lock();
        (layout.sar_num, layout.sar_den)
    }

    pub fn rotation(&self) -> i32 {
        self.rotation.load(Ordering::SeqCst)
    }

    pub fn keeps_screen_on(&self) -> bool {
        self.keep_screen_on.load(Ordering::SeqCst)
    }
}

impl RenderTarget for HeadlessRenderTarget {
    fn id(&self) -> RenderTargetId {
        self.callbacks.target()
    }

    fn requires_size_match(&self) -> bool {
        self.requires_size_match
    }

    fn add_render_callback(&self, callback: Arc<dyn RenderCallback>) {
        self.callbacks.add(callback);
    }

    fn remove_render_callback(&self, callback: &Arc<dyn RenderCallback>) {
        self.callbacks.remove(callback);
    }

    fn set_video_size(&self, width: u32, height: u32) {
        let mut layout = self.layout.lock();
        layout.width = width;
        layout.height = height;
    }

    fn set_video_sample_aspect_ratio(&self, num: u32, den: u32) {
        let mut layout = self.layout.lock();
        layout.sar_num = num;
        layout.sar_den = den;
    }

    fn set_video_rotation(&self, degrees: i32) {
        self.rotation.store(degrees, Ordering::SeqCst);
    }

    fn set_keep_screen_on(&self, keep_on: bool) {
        debug!(target_id = %self.id(), keep_on, "Keep screen on");
        self.keep_screen_on.store(keep_on, Ordering::SeqCst);
    }
}
