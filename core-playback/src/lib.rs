//! # Playback Coordination Module
//!
//! Drives one playback session from two independent sources of input: the
//! native engine, which posts events from its own threads, and the caller,
//! which issues commands. Both are funnelled into a single owner loop so the
//! state machine only ever sees one totally ordered stream.
//!
//! ## Overview
//!
//! - [`bridge::EventBridge`] receives engine callbacks on any thread
//! - [`state::PlaybackStateMachine`] turns each input into a transition plus
//!   side-effect requests
//! - [`surface::SurfaceBinding`] follows the render surface lifecycle and
//!   resumes deferred playback once geometry is usable
//! - [`listeners::ListenerRegistry`] holds one caller handler per category
//! - [`session::SessionRegistry`] issues the tokens that make stale engine
//!   input detectable
//! - [`player::Player`] is the caller handle, [`player::PlayerLoop`] the
//!   owner loop behind it
//!
//! [`render::RenderCallbackSet`] is a helper for render target
//! implementations that need identity-keyed callback fan-out.

pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod listeners;
pub mod player;
pub mod render;
pub mod session;
pub mod state;
pub mod surface;

pub use bridge::EventBridge;
pub use config::{PendingSeekOrder, PlayerConfig};
pub use error::{PlaybackError, Result};
pub use event::{EventEnvelope, EventKind};
pub use listeners::{Listener, ListenerCategory, ListenerRegistry};
pub use player::{Player, PlayerBuilder, PlayerLoop};
pub use render::RenderCallbackSet;
pub use session::SessionRegistry;
pub use state::{
    Command, EngineCommand, InfoNotice, PlaybackSnapshot, PlaybackState, PlaybackStateMachine,
    SideEffect, Transition, VideoGeometry,
};
pub use surface::{SurfaceBinding, SurfaceDescriptor, SurfaceGate, SurfaceNotice};
