//! # Surface Binding
//!
//! Tracks the render target bound to a player and the lifecycle of its
//! drawable surface. The surface can come and go any number of times during
//! one session; playback state survives the churn.
//!
//! Render callbacks arrive on the UI context. They are never handled in place:
//! the forwarder posts them to the owner loop as [`SurfaceNotice`]s.

use crate::player::Mailbox;
use crate::state::{Command, EngineCommand, PlaybackStateMachine, VideoGeometry};
use bridge_traits::engine::SurfaceHandle;
use bridge_traits::render::{RenderCallback, RenderTarget, RenderTargetId, SurfaceInfo};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tracing::{debug, warn};

/// Last known surface geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceDescriptor {
    pub present: bool,
    pub width: u32,
    pub height: u32,
    pub format_changed: bool,
}

/// What the state machine needs to know about the surface to decide whether
/// playback may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceGate {
    /// A render target is bound.
    pub bound: bool,
    pub requires_size_match: bool,
    pub present: bool,
    pub width: u32,
    pub height: u32,
}

impl SurfaceGate {
    /// Playback may start when no render target is bound, when the target
    /// does not wait for a resize, while the video size is still unknown, or
    /// once the surface matches the video size.
    pub fn permits_start(&self, video: &VideoGeometry) -> bool {
        if !self.bound || !self.requires_size_match || !video.has_size() {
            return true;
        }
        self.present && self.width == video.width && self.height == video.height
    }
}

/// Render lifecycle callback, relayed to the owner loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceNotice {
    Created {
        surface: SurfaceInfo,
        width: u32,
        height: u32,
    },
    Changed {
        surface: SurfaceInfo,
        format: i32,
        width: u32,
        height: u32,
    },
    Destroyed {
        surface: SurfaceInfo,
    },
}

impl SurfaceNotice {
    pub fn target(&self) -> RenderTargetId {
        match self {
            SurfaceNotice::Created { surface, .. }
            | SurfaceNotice::Changed { surface, .. }
            | SurfaceNotice::Destroyed { surface } => surface.target,
        }
    }
}

/// Result of applying a [`SurfaceNotice`].
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceChange {
    pub engine: Option<EngineCommand>,
    /// The surface has usable geometry and deferred playback may resume.
    pub surface_ready: bool,
}

/// Render callback installed on bound targets. Only enqueues.
pub(crate) struct SurfaceForwarder {
    tx: WeakUnboundedSender<Mailbox>,
}

impl SurfaceForwarder {
    pub(crate) fn new(tx: &UnboundedSender<Mailbox>) -> Self {
        Self {
            tx: tx.downgrade(),
        }
    }

    fn forward(&self, notice: SurfaceNotice) {
        let sent = self
            .tx
            .upgrade()
            .map(|tx| tx.send(Mailbox::Surface(notice)).is_ok())
            .unwrap_or(false);
        if !sent {
            debug!(target_id = %notice.target(), "Player loop gone, dropping surface notice");
        }
    }
}

impl RenderCallback for SurfaceForwarder {
    fn on_surface_created(&self, surface: SurfaceInfo, width: u32, height: u32) {
        self.forward(SurfaceNotice::Created {
            surface,
            width,
            height,
        });
    }

    fn on_surface_changed(&self, surface: SurfaceInfo, format: i32, width: u32, height: u32) {
        self.forward(SurfaceNotice::Changed {
            surface,
            format,
            width,
            height,
        });
    }

    fn on_surface_destroyed(&self, surface: SurfaceInfo) {
        self.forward(SurfaceNotice::Destroyed { surface });
    }
}

pub struct SurfaceBinding {
    target: Option<Arc<dyn RenderTarget>>,
    forwarder: Arc<dyn RenderCallback>,
    descriptor: SurfaceDescriptor,
    handle: Option<SurfaceHandle>,
}

impl SurfaceBinding {
    pub fn new(forwarder: Arc<dyn RenderCallback>) -> Self {
        Self {
            target: None,
            forwarder,
            descriptor: SurfaceDescriptor::default(),
            handle: None,
        }
    }

    pub fn target(&self) -> Option<&Arc<dyn RenderTarget>> {
        self.target.as_ref()
    }

    pub fn target_id(&self) -> Option<RenderTargetId> {
        self.target.as_ref().map(|t| t.id())
    }

    pub fn descriptor(&self) -> SurfaceDescriptor {
        self.descriptor
    }

    pub fn handle(&self) -> Option<SurfaceHandle> {
        self.handle
    }

    pub fn gate(&self) -> SurfaceGate {
        SurfaceGate {
            bound: self.target.is_some(),
            requires_size_match: self
                .target
                .as_ref()
                .map(|t| t.requires_size_match())
                .unwrap_or(false),
            present: self.descriptor.present,
            width: self.descriptor.width,
            height: self.descriptor.height,
        }
    }

    /// Bind a new render target, or unbind with `None`.
    ///
    /// Rebinding the current target is a no-op. Otherwise the forwarder moves
    /// from the old target to the new one and the engine loses its surface
    /// until the new target reports one.
    pub fn bind(&mut self, target: Option<Arc<dyn RenderTarget>>) -> Option<EngineCommand> {
        let new_id = target.as_ref().map(|t| t.id());
        if new_id.is_some() && new_id == self.target_id() {
            debug!(target_id = ?new_id, "Render target already bound");
            return None;
        }

        if let Some(old) = self.target.take() {
            old.remove_render_callback(&self.forwarder);
        }

        let detach = self
            .handle
            .take()
            .map(|_| EngineCommand::SetSurface(None));
        self.descriptor = SurfaceDescriptor::default();

        if let Some(new) = &target {
            new.add_render_callback(Arc::clone(&self.forwarder));
        }
        self.target = target;
        detach
    }

    /// Apply a relayed render callback. Returns `None` for notices from a
    /// target that is no longer bound.
    pub fn on_notice(&mut self, notice: SurfaceNotice) -> Option<SurfaceChange> {
        if Some(notice.target()) != self.target_id() {
            warn!(target_id = %notice.target(), "Unmatched render callback");
            return None;
        }

        let change = match notice {
            SurfaceNotice::Created {
                surface,
                width,
                height,
            } => {
                self.handle = surface.handle;
                self.descriptor = SurfaceDescriptor {
                    present: surface.handle.is_some(),
                    width,
                    height,
                    format_changed: false,
                };
                SurfaceChange {
                    engine: Some(EngineCommand::SetSurface(surface.handle)),
                    surface_ready: true,
                }
            }
            SurfaceNotice::Changed {
                surface,
                width,
                height,
                ..
            } => {
                let engine = if surface.handle.is_some() && surface.handle != self.handle {
                    self.handle = surface.handle;
                    Some(EngineCommand::SetSurface(surface.handle))
                } else {
                    None
                };
                self.descriptor = SurfaceDescriptor {
                    present: self.handle.is_some(),
                    width,
                    height,
                    format_changed: true,
                };
                SurfaceChange {
                    engine,
                    surface_ready: true,
                }
            }
            SurfaceNotice::Destroyed { .. } => {
                self.handle = None;
                self.descriptor = SurfaceDescriptor::default();
                SurfaceChange {
                    engine: Some(EngineCommand::SetSurface(None)),
                    surface_ready: false,
                }
            }
        };
        Some(change)
    }

    /// Commands that resume deferred playback now that the surface is ready.
    pub fn reconcile(&self, machine: &PlaybackStateMachine) -> Vec<Command> {
        machine.resume_commands(&self.gate())
    }
}

impl fmt::Debug for SurfaceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceBinding")
            .field("target", &self.target_id())
            .field("descriptor", &self.descriptor)
            .field("handle", &self.handle)
            .finish()
    }
}
