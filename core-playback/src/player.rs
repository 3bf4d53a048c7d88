//! # Player
//!
//! [`Player`] is the caller-facing handle; [`PlayerLoop`] is the owner loop
//! that holds the state machine. They are connected by one unbounded mailbox
//! that also carries bridged engine events and relayed render callbacks, so
//! commands and events are totally ordered.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use bridge_traits::engine::MediaEngine;
//! # use core_runtime::{config::RuntimeConfig, CoreRuntime};
//! # use core_playback::player::{Player, PlayerBuilder};
//! # async fn example(engine: Arc<dyn MediaEngine>) -> core_playback::Result<()> {
//! let runtime = CoreRuntime::initialize(RuntimeConfig::builder().build()?)?;
//! let player = Player::spawn(PlayerBuilder::new().runtime(runtime).engine(engine))?;
//!
//! player.set_data_source_str("https://example.com/video.mp4")?;
//! player.start()?;
//! # Ok(())
//! # }
//! ```

use crate::bridge::EventBridge;
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::event::{codes, EventEnvelope};
use crate::listeners::{Listener, ListenerRegistry};
use crate::session::SessionRegistry;
use crate::state::{
    Command, EngineCommand, Input, PlaybackSnapshot, PlaybackState, PlaybackStateMachine,
    SideEffect,
};
use crate::surface::{SurfaceBinding, SurfaceForwarder, SurfaceNotice};
use bridge_traits::engine::{DataSource, MediaEngine, SessionToken};
use bridge_traits::error::BridgeError;
use bridge_traits::power::WakeLock;
use bridge_traits::render::RenderTarget;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{EventBus, EventStream, PlayerEvent};
use core_runtime::CoreRuntime;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

/// Items processed by the owner loop, in arrival order.
pub(crate) enum Mailbox {
    Event(EventEnvelope),
    Command(Command),
    Surface(SurfaceNotice),
    Bind(Option<Arc<dyn RenderTarget>>),
    Flush(oneshot::Sender<()>),
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mailbox::Event(envelope) => f.debug_tuple("Event").field(&envelope.kind).finish(),
            Mailbox::Command(command) => f.debug_tuple("Command").field(command).finish(),
            Mailbox::Surface(notice) => f.debug_tuple("Surface").field(notice).finish(),
            Mailbox::Bind(target) => f
                .debug_tuple("Bind")
                .field(&target.as_ref().map(|t| t.id()))
                .finish(),
            Mailbox::Flush(_) => f.write_str("Flush"),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct PlayerBuilder {
    runtime: Option<CoreRuntime>,
    engine: Option<Arc<dyn MediaEngine>>,
    wake_lock: Option<Arc<dyn WakeLock>>,
    config: PlayerConfig,
    clock: Arc<dyn Clock>,
}

impl PlayerBuilder {
    pub fn new() -> Self {
        Self {
            runtime: None,
            engine: None,
            wake_lock: None,
            config: PlayerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Proof that library initialisation has finished. Required.
    pub fn runtime(mut self, runtime: CoreRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Required.
    pub fn engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Without a wake lock, playback simply does not keep the device awake.
    pub fn wake_lock(mut self, wake_lock: Arc<dyn WakeLock>) -> Self {
        self.wake_lock = Some(wake_lock);
        self
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the handle and its owner loop without spawning anything.
    ///
    /// The caller must drive the loop, either with [`PlayerLoop::run`] or by
    /// calling [`PlayerLoop::drain`].
    pub fn build(self) -> Result<(Player, PlayerLoop)> {
        let runtime = self
            .runtime
            .ok_or_else(|| core_runtime::Error::CapabilityMissing {
                capability: "core_runtime".to_string(),
                message: "Players can only be created after runtime initialisation".to_string(),
            })?;
        let engine = self
            .engine
            .ok_or_else(|| core_runtime::Error::CapabilityMissing {
                capability: "media_engine".to_string(),
                message: "No media engine provided".to_string(),
            })?;
        self.config
            .validate()
            .map_err(core_runtime::Error::Config)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let sessions = Arc::new(SessionRegistry::new());
        let session = sessions.begin();
        let bridge = EventBridge::new(
            &tx,
            Arc::clone(&sessions),
            Arc::clone(runtime.log_router()),
            self.clock,
        );
        engine.attach(session, Arc::new(bridge.clone()));

        let machine = PlaybackStateMachine::new(session, &self.config);
        let snapshot = Arc::new(watch::Sender::new(machine.snapshot()));
        let listeners = Arc::new(ListenerRegistry::new());
        let bus = EventBus::new(runtime.event_buffer_size());
        let binding = SurfaceBinding::new(Arc::new(SurfaceForwarder::new(&tx)));

        info!(tag = %self.config.tag, session = %session, "Player created");

        let requeue = tx.downgrade();
        let player = Player {
            tx,
            sessions: Arc::clone(&sessions),
            listeners: Arc::clone(&listeners),
            bus: bus.clone(),
            snapshot: Arc::clone(&snapshot),
            bridge: bridge.clone(),
            tag: self.config.tag.clone(),
        };
        let owner = PlayerLoop {
            rx,
            requeue,
            machine,
            binding,
            listeners,
            sessions,
            engine,
            wake_lock: self.wake_lock,
            bus,
            snapshot,
            bridge,
            flushes: Vec::new(),
            tag: self.config.tag,
        };
        Ok((player, owner))
    }
}

impl Default for PlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Owner loop
// ============================================================================

/// Single consumer of a player's mailbox. The state machine is only ever
/// touched from here.
pub struct PlayerLoop {
    rx: mpsc::UnboundedReceiver<Mailbox>,
    requeue: mpsc::WeakUnboundedSender<Mailbox>,
    machine: PlaybackStateMachine,
    binding: SurfaceBinding,
    listeners: Arc<ListenerRegistry>,
    sessions: Arc<SessionRegistry>,
    engine: Arc<dyn MediaEngine>,
    wake_lock: Option<Arc<dyn WakeLock>>,
    bus: EventBus,
    snapshot: Arc<watch::Sender<PlaybackSnapshot>>,
    bridge: EventBridge,
    flushes: Vec<oneshot::Sender<()>>,
    tag: String,
}

impl PlayerLoop {
    /// Process until the player is released or every [`Player`] handle is
    /// dropped.
    #[instrument(skip(self), fields(tag = %self.tag))]
    pub async fn run(mut self) {
        while let Some(item) = self.rx.recv().await {
            self.step(item).await;
            self.drain().await;
            if self.machine.is_released() {
                break;
            }
        }
        self.complete_flushes();
        debug!("Player loop finished");
    }

    /// Process everything queued right now, including anything re-queued
    /// while doing so. Returns the number of items processed.
    pub async fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(item) = self.rx.try_recv() {
            self.step(item).await;
            processed += 1;
        }
        self.complete_flushes();
        processed
    }

    pub fn state(&self) -> PlaybackState {
        self.machine.state()
    }

    pub fn machine(&self) -> &PlaybackStateMachine {
        &self.machine
    }

    pub fn binding(&self) -> &SurfaceBinding {
        &self.binding
    }

    async fn step(&mut self, item: Mailbox) {
        match item {
            Mailbox::Event(envelope) => {
                if !self.sessions.is_live(envelope.session) {
                    debug!(session = %envelope.session, kind = ?envelope.kind, "Dropping queued envelope for stale session");
                    return;
                }
                self.apply(Input::Event(envelope)).await;
            }
            Mailbox::Command(command) => {
                let superseded = !matches!(command, Command::Release | Command::Reset { .. })
                    && self.sessions.current() != self.machine.session();
                if superseded {
                    debug!(command = ?command, "Dropping command issued before release or reset");
                    return;
                }
                self.apply(Input::Command(command)).await;
            }
            Mailbox::Surface(notice) => self.on_surface(notice).await,
            Mailbox::Bind(target) => self.on_bind(target).await,
            Mailbox::Flush(done) => {
                self.flushes.push(done);
                return;
            }
        }
        self.publish();
    }

    async fn apply(&mut self, input: Input) {
        let session = self.machine.session();
        let gate = self.binding.gate();
        let transition = self.machine.apply(input, &gate);

        if transition.changed() {
            debug!(from = %transition.from, to = %transition.state, "Playback state changed");
            if let Some(session) = session {
                self.bus
                    .emit(PlayerEvent::StateChanged {
                        session: session.as_raw(),
                        from: transition.from.to_string(),
                        to: transition.state.to_string(),
                    })
                    .ok();
            }
        }

        for effect in transition.effects {
            self.execute(effect, session).await;
        }
    }

    async fn execute(&mut self, effect: SideEffect, session: Option<SessionToken>) {
        match effect {
            SideEffect::Engine(command) => self.run_engine(command, session).await,
            SideEffect::AcquireWakeLock => {
                if let Some(lock) = &self.wake_lock {
                    if !lock.is_held() {
                        if let Err(e) = lock.acquire() {
                            warn!(error = %e, "Failed to acquire wake lock, continuing without it");
                        }
                    }
                }
            }
            SideEffect::ReleaseWakeLock => {
                if let Some(lock) = &self.wake_lock {
                    if lock.is_held() {
                        if let Err(e) = lock.release() {
                            warn!(error = %e, "Failed to release wake lock");
                        }
                    }
                }
            }
            SideEffect::UpdateKeepScreenOn(keep_on) => {
                if let Some(target) = self.binding.target() {
                    target.set_keep_screen_on(keep_on);
                }
            }
            SideEffect::UpdateRotation(degrees) => {
                if let Some(target) = self.binding.target() {
                    target.set_video_rotation(degrees);
                }
            }
            SideEffect::Requeue(command) => {
                let sent = self
                    .requeue
                    .upgrade()
                    .map(|tx| tx.send(Mailbox::Command(command)).is_ok())
                    .unwrap_or(false);
                if !sent {
                    debug!("Every player handle is gone, dropping re-queued command");
                }
            }
            SideEffect::ResetListeners => self.listeners.reset(),
            notify => {
                if let SideEffect::NotifyVideoSizeChanged(geometry) = &notify {
                    if let Some(target) = self.binding.target() {
                        if geometry.has_size() {
                            target.set_video_size(geometry.width, geometry.height);
                        }
                        if geometry.has_sar() {
                            target.set_video_sample_aspect_ratio(geometry.sar_num, geometry.sar_den);
                        }
                    }
                }
                self.listeners.dispatch(&notify);
                if let Some(session) = session {
                    self.mirror(&notify, session.as_raw());
                }
            }
        }
    }

    fn mirror(&self, effect: &SideEffect, session: u64) {
        let event = match effect {
            SideEffect::NotifyPrepared => PlayerEvent::Prepared { session },
            SideEffect::NotifyCompletion => PlayerEvent::Completed { session },
            SideEffect::NotifyError { code, extra } => PlayerEvent::Error {
                session,
                code: *code,
                extra: *extra,
            },
            SideEffect::NotifyBufferingUpdate(percent) => PlayerEvent::BufferingUpdated {
                session,
                percent: *percent,
            },
            SideEffect::NotifyVideoSizeChanged(g) => PlayerEvent::VideoSizeChanged {
                session,
                width: g.width,
                height: g.height,
                sar_num: g.sar_num,
                sar_den: g.sar_den,
            },
            SideEffect::NotifySeekComplete => PlayerEvent::SeekCompleted { session },
            SideEffect::NotifyInfo(notice) => PlayerEvent::Info {
                session,
                subtype: notice.subtype,
                extra: notice.extra,
            },
            SideEffect::NotifyStartOrPause { is_playing, url } => PlayerEvent::StartedOrPaused {
                session,
                is_playing: *is_playing,
                url: url.clone(),
            },
            _ => return,
        };
        self.bus.emit(event).ok();
    }

    async fn run_engine(&mut self, command: EngineCommand, session: Option<SessionToken>) {
        let label = engine_command_name(&command);
        let result = match command {
            EngineCommand::SetSurface(handle) => self.engine.set_surface(handle).await,
            EngineCommand::SetDataSource(source) => self.send_data_source(source).await,
            EngineCommand::PrepareAsync => self.engine.prepare_async().await,
            EngineCommand::Start => self.engine.start().await,
            EngineCommand::Pause => self.engine.pause().await,
            EngineCommand::Stop => self.engine.stop().await,
            EngineCommand::SeekTo(position_ms) => self.engine.seek_to(position_ms).await,
            EngineCommand::SetVolume { left, right } => self.engine.set_volume(left, right).await,
            EngineCommand::SetLooping(looping) => self.engine.set_looping(looping).await,
            EngineCommand::SetSpeed(speed) => self.engine.set_speed(speed).await,
            EngineCommand::Release => {
                let result = self.engine.release().await;
                if let Some(session) = session {
                    self.bus
                        .emit(PlayerEvent::Released {
                            session: session.as_raw(),
                        })
                        .ok();
                }
                result
            }
            EngineCommand::Reset { next } => {
                let result = self.engine.reset().await;
                self.engine.attach(next, Arc::new(self.bridge.clone()));
                result
            }
        };

        if let Err(err) = result {
            self.report_engine_failure(label, err);
        }
    }

    async fn send_data_source(&self, source: DataSource) -> bridge_traits::error::Result<()> {
        if let Some(headers) = source.header_block() {
            self.engine.set_headers(headers).await?;
        }
        match source {
            DataSource::Uri { uri, .. } => self.engine.set_data_source(uri).await,
            DataSource::Path(path) => {
                self.engine
                    .set_data_source(path.to_string_lossy().into_owned())
                    .await
            }
            DataSource::Manifest(json) => self.engine.set_data_source_manifest(json).await,
        }
    }

    /// Engine failures travel the same path as engine-reported errors.
    fn report_engine_failure(&self, command: &'static str, err: BridgeError) {
        let (code, extra) = match err {
            BridgeError::Engine { code, extra } => (code, extra),
            ref other => {
                debug!(error = %other, "Engine command failed without an engine code");
                (codes::MEDIA_ERROR_UNKNOWN, 0)
            }
        };

        match self.machine.session() {
            Some(session) => {
                warn!(command, code, extra, "Engine command failed");
                self.bridge.post(EventEnvelope::error(session, code, extra));
            }
            None => warn!(command, code, extra, "Engine command failed after release"),
        }
    }

    async fn on_bind(&mut self, target: Option<Arc<dyn RenderTarget>>) {
        if self.machine.is_released() {
            debug!("Ignoring render target binding after release");
            return;
        }
        if let Some(detach) = self.binding.bind(target) {
            self.run_engine(detach, self.machine.session()).await;
        }

        if let Some(target) = self.binding.target() {
            let video = self.machine.video();
            if video.has_size() {
                target.set_video_size(video.width, video.height);
            }
            if video.has_sar() {
                target.set_video_sample_aspect_ratio(video.sar_num, video.sar_den);
            }
            target.set_video_rotation(self.machine.rotation_degrees());
            target.set_keep_screen_on(self.machine.keep_screen_on());
        }
    }

    async fn on_surface(&mut self, notice: SurfaceNotice) {
        if self.machine.is_released() {
            return;
        }
        let Some(change) = self.binding.on_notice(notice) else {
            return;
        };
        if let Some(command) = change.engine {
            self.run_engine(command, self.machine.session()).await;
        }
        if change.surface_ready {
            for command in self.binding.reconcile(&self.machine) {
                self.apply(Input::Command(command)).await;
            }
        }
    }

    /// Publish the machine's snapshot, unless a release or reset issued by a
    /// handle has not reached the machine yet. The handle already published
    /// the idle snapshot for that session.
    fn publish(&self) {
        let snapshot = self.machine.snapshot();
        self.snapshot.send_if_modified(|current| {
            if self.sessions.current() != snapshot.session {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn complete_flushes(&mut self) {
        for done in self.flushes.drain(..) {
            done.send(()).ok();
        }
    }
}

impl fmt::Debug for PlayerLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerLoop")
            .field("tag", &self.tag)
            .field("machine", &self.machine)
            .field("binding", &self.binding)
            .finish()
    }
}

fn engine_command_name(command: &EngineCommand) -> &'static str {
    match command {
        EngineCommand::SetSurface(_) => "set_surface",
        EngineCommand::SetDataSource(_) => "set_data_source",
        EngineCommand::PrepareAsync => "prepare_async",
        EngineCommand::Start => "start",
        EngineCommand::Pause => "pause",
        EngineCommand::Stop => "stop",
        EngineCommand::SeekTo(_) => "seek_to",
        EngineCommand::SetVolume { .. } => "set_volume",
        EngineCommand::SetLooping(_) => "set_looping",
        EngineCommand::SetSpeed(_) => "set_speed",
        EngineCommand::Release => "release",
        EngineCommand::Reset { .. } => "reset",
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Caller-facing player handle.
///
/// Every command validates its arguments synchronously and then enqueues.
/// Errors the engine reports while executing a command reach the error
/// listener, never the caller.
#[derive(Clone)]
pub struct Player {
    tx: mpsc::UnboundedSender<Mailbox>,
    sessions: Arc<SessionRegistry>,
    listeners: Arc<ListenerRegistry>,
    bus: EventBus,
    snapshot: Arc<watch::Sender<PlaybackSnapshot>>,
    bridge: EventBridge,
    tag: String,
}

impl Player {
    /// Build a player and spawn its owner loop on the current tokio runtime.
    pub fn spawn(builder: PlayerBuilder) -> Result<Player> {
        let (player, owner) = builder.build()?;
        tokio::spawn(owner.run());
        Ok(player)
    }

    fn live(&self) -> Result<SessionToken> {
        self.sessions.current().ok_or(PlaybackError::PlayerShutDown)
    }

    fn send(&self, item: Mailbox) -> Result<()> {
        self.tx.send(item).map_err(|_| PlaybackError::PlayerShutDown)
    }

    fn command(&self, command: Command) -> Result<()> {
        self.live()?;
        self.send(Mailbox::Command(command))
    }

    pub fn set_data_source(&self, source: DataSource) -> Result<()> {
        check_source(&source)?;
        self.command(Command::SetDataSource(source))
    }

    /// Classify `location` as a manifest or a URI and set it.
    pub fn set_data_source_str(&self, location: &str) -> Result<()> {
        if location.trim().is_empty() {
            return Err(PlaybackError::EmptyDataSource);
        }
        self.set_data_source(DataSource::detect(location)?)
    }

    pub fn set_data_source_manifest(&self, json: impl Into<String>) -> Result<()> {
        self.set_data_source(DataSource::Manifest(json.into()))
    }

    pub fn prepare_async(&self) -> Result<()> {
        self.command(Command::PrepareAsync)
    }

    pub fn start(&self) -> Result<()> {
        self.command(Command::Start)
    }

    pub fn pause(&self) -> Result<()> {
        self.command(Command::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.command(Command::Stop)
    }

    pub fn seek_to(&self, position_ms: i64) -> Result<()> {
        if position_ms < 0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "seek position must not be negative: {}",
                position_ms
            )));
        }
        self.command(Command::SeekTo(position_ms))
    }

    pub fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        for volume in [left, right] {
            if !(0.0..=1.0).contains(&volume) {
                return Err(PlaybackError::InvalidVolume(volume));
            }
        }
        self.command(Command::SetVolume { left, right })
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        self.command(Command::SetLooping(looping))
    }

    pub fn set_speed(&self, speed: f32) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PlaybackError::InvalidSpeed(speed));
        }
        self.command(Command::SetSpeed(speed))
    }

    pub fn set_screen_on_while_playing(&self, enabled: bool) -> Result<()> {
        self.command(Command::SetScreenOnWhilePlaying(enabled))
    }

    /// Bind the render target that displays this player, or unbind with `None`.
    pub fn bind_render_target(&self, target: Option<Arc<dyn RenderTarget>>) -> Result<()> {
        self.live()?;
        self.send(Mailbox::Bind(target))
    }

    /// End the session.
    ///
    /// The session token is invalidated and the player reads as idle before
    /// this returns, so anything the engine posts afterwards is dropped.
    /// Releasing twice is a no-op.
    pub fn release(&self) -> Result<()> {
        let Some(session) = self.sessions.invalidate() else {
            debug!(tag = %self.tag, "Player already released");
            return Ok(());
        };
        self.snapshot.send_modify(|snapshot| snapshot.reset_to(None));
        info!(tag = %self.tag, session = %session, "Releasing player");
        if self.tx.send(Mailbox::Command(Command::Release)).is_err() {
            debug!(tag = %self.tag, "Player loop already gone");
        }
        Ok(())
    }

    /// Return to idle under a fresh session, keeping listeners and the bound
    /// render target.
    pub fn reset(&self) -> Result<()> {
        let next = self.sessions.rotate().ok_or(PlaybackError::PlayerShutDown)?;
        self.snapshot
            .send_modify(|snapshot| snapshot.reset_to(Some(next)));
        info!(tag = %self.tag, session = %next, "Resetting player");
        self.send(Mailbox::Command(Command::Reset { next }))
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Shorthand for `listeners().register(listener)`.
    pub fn on(&self, listener: Listener) {
        self.listeners.register(listener);
    }

    /// Stream of every notification this player dispatches.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.bus.subscribe())
    }

    /// State as of the last owner-loop step, or idle right after `release()`
    /// or `reset()`.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot.borrow().state
    }

    pub fn session(&self) -> Option<SessionToken> {
        self.sessions.current()
    }

    pub fn is_released(&self) -> bool {
        self.sessions.current().is_none()
    }

    /// The callbacks handed to the engine.
    pub fn event_bridge(&self) -> &EventBridge {
        &self.bridge
    }

    /// Wait until the owner loop has processed everything queued before this
    /// call. Returns immediately once the loop has shut down.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Mailbox::Flush(done)).is_ok() {
            wait.await.ok();
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("tag", &self.tag)
            .field("session", &self.sessions.current())
            .field("state", &self.snapshot.borrow().state)
            .finish()
    }
}

fn check_source(source: &DataSource) -> Result<()> {
    match source {
        DataSource::Uri { uri, .. } if uri.trim().is_empty() => Err(PlaybackError::EmptyDataSource),
        DataSource::Path(path) if path.as_os_str().is_empty() => {
            Err(PlaybackError::EmptyDataSource)
        }
        DataSource::Manifest(_) => source
            .validate()
            .map_err(|e| PlaybackError::InvalidManifest(e.to_string())),
        _ => Ok(()),
    }
}
