//! # Playback State Machine
//!
//! Canonical state of one playback session. [`PlaybackStateMachine::apply`]
//! consumes engine events and caller commands and returns the next state with
//! an ordered list of [`SideEffect`]s. The machine never performs a side effect
//! itself; the owner loop executes them.
//!
//! Commands that a state does not allow are no-ops. They still update the
//! target state where the caller's intent must survive, e.g. `Start` while
//! the surface is not ready yet.

use crate::config::{PendingSeekOrder, PlayerConfig};
use crate::event::{codes, EventEnvelope, EventKind};
use crate::surface::SurfaceGate;
use bridge_traits::engine::{DataSource, EventPayload, SessionToken, SurfaceHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Preparing,
    Prepared,
    Playing,
    Paused,
    Completed,
    Error,
}

impl PlaybackState {
    /// States in which the engine accepts transport commands.
    pub fn is_playable(self) -> bool {
        matches!(
            self,
            PlaybackState::Prepared
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Completed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Preparing => "preparing",
            PlaybackState::Prepared => "prepared",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Completed => "completed",
            PlaybackState::Error => "error",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video dimensions and sample aspect ratio as last reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub sar_num: u32,
    pub sar_den: u32,
}

impl VideoGeometry {
    pub fn has_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn has_sar(&self) -> bool {
        self.sar_num > 0 && self.sar_den > 0
    }
}

/// Caller commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetDataSource(DataSource),
    PrepareAsync,
    Start,
    Pause,
    Stop,
    SeekTo(i64),
    SetVolume { left: f32, right: f32 },
    SetLooping(bool),
    SetSpeed(f32),
    SetScreenOnWhilePlaying(bool),
    Release,
    /// Return to idle and continue under the `next` session.
    Reset { next: SessionToken },
    /// Issue the deferred seek, if one is still pending.
    ReplayPendingSeek,
}

/// Commands forwarded to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    SetSurface(Option<SurfaceHandle>),
    SetDataSource(DataSource),
    PrepareAsync,
    Start,
    Pause,
    Stop,
    SeekTo(i64),
    SetVolume { left: f32, right: f32 },
    SetLooping(bool),
    SetSpeed(f32),
    Release,
    Reset { next: SessionToken },
}

/// Payload of an info notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoNotice {
    pub subtype: i32,
    pub extra: i64,
    pub payload: Option<EventPayload>,
    /// Position the engine sought to, for seek-request completion.
    pub position_ms: Option<i64>,
    pub engine_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    NotifyPrepared,
    NotifyCompletion,
    NotifyError { code: i32, extra: i32 },
    NotifyBufferingUpdate(u8),
    NotifyVideoSizeChanged(VideoGeometry),
    NotifySeekComplete,
    NotifyInfo(InfoNotice),
    NotifyStartOrPause { is_playing: bool, url: String },
    AcquireWakeLock,
    ReleaseWakeLock,
    UpdateKeepScreenOn(bool),
    UpdateRotation(i32),
    Engine(EngineCommand),
    /// Append a command to the owner loop's mailbox.
    Requeue(Command),
    ResetListeners,
}

#[derive(Debug)]
pub enum Input {
    Event(EventEnvelope),
    Command(Command),
}

impl From<Command> for Input {
    fn from(command: Command) -> Self {
        Input::Command(command)
    }
}

impl From<EventEnvelope> for Input {
    fn from(envelope: EventEnvelope) -> Self {
        Input::Event(envelope)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: PlaybackState,
    pub state: PlaybackState,
    pub effects: Vec<SideEffect>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.state
    }
}

/// Point-in-time copy of the machine, published after every owner-loop step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackSnapshot {
    pub session: Option<SessionToken>,
    pub state: PlaybackState,
    pub target: PlaybackState,
    pub video: VideoGeometry,
    pub buffer_percent: u8,
    pub pending_seek_ms: i64,
    pub url_list: Option<String>,
    pub url_list_status: i64,
    pub rotation_degrees: i32,
    pub keep_screen_on: bool,
    pub data_source: Option<String>,
}

impl PlaybackSnapshot {
    /// Clear everything a release or reset clears and move to `session`.
    pub fn reset_to(&mut self, session: Option<SessionToken>) {
        *self = PlaybackSnapshot {
            session,
            ..PlaybackSnapshot::default()
        };
    }
}

pub struct PlaybackStateMachine {
    session: Option<SessionToken>,
    state: PlaybackState,
    target: PlaybackState,
    data_source: Option<DataSource>,
    video: VideoGeometry,
    pending_seek_ms: i64,
    buffer_percent: u8,
    url_list: Option<String>,
    url_list_status: i64,
    rotation_degrees: i32,
    awake: bool,
    screen_on_while_playing: bool,
    start_on_prepared: bool,
    seek_order: PendingSeekOrder,
}

impl PlaybackStateMachine {
    pub fn new(session: SessionToken, config: &PlayerConfig) -> Self {
        Self {
            session: Some(session),
            state: PlaybackState::Idle,
            target: PlaybackState::Idle,
            data_source: None,
            video: VideoGeometry::default(),
            pending_seek_ms: 0,
            buffer_percent: 0,
            url_list: None,
            url_list_status: 0,
            rotation_degrees: 0,
            awake: false,
            screen_on_while_playing: config.screen_on_while_playing,
            start_on_prepared: config.start_on_prepared,
            seek_order: config.pending_seek_order,
        }
    }

    pub fn session(&self) -> Option<SessionToken> {
        self.session
    }

    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn target(&self) -> PlaybackState {
        self.target
    }

    pub fn video(&self) -> VideoGeometry {
        self.video
    }

    pub fn pending_seek_ms(&self) -> i64 {
        self.pending_seek_ms
    }

    pub fn rotation_degrees(&self) -> i32 {
        self.rotation_degrees
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn keep_screen_on(&self) -> bool {
        self.screen_on_while_playing && self.awake
    }

    pub fn data_source(&self) -> Option<&DataSource> {
        self.data_source.as_ref()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            session: self.session,
            state: self.state,
            target: self.target,
            video: self.video,
            buffer_percent: self.buffer_percent,
            pending_seek_ms: self.pending_seek_ms,
            url_list: self.url_list.clone(),
            url_list_status: self.url_list_status,
            rotation_degrees: self.rotation_degrees,
            keep_screen_on: self.keep_screen_on(),
            data_source: self.data_source.as_ref().map(DataSource::display_url),
        }
    }

    /// Apply one input. Must only ever be called from the owner loop.
    pub fn apply(&mut self, input: Input, gate: &SurfaceGate) -> Transition {
        let from = self.state;
        let mut effects = Vec::new();

        match input {
            Input::Event(envelope) => self.on_event(envelope, &mut effects),
            Input::Command(command) => self.on_command(command, gate, &mut effects),
        }

        Transition {
            from,
            state: self.state,
            effects,
        }
    }

    /// Commands to issue once the render surface reports ready geometry.
    ///
    /// Empty unless the caller wants playback, the session can start and the
    /// gate lets it.
    pub fn resume_commands(&self, gate: &SurfaceGate) -> Vec<Command> {
        let resumable = matches!(
            self.state,
            PlaybackState::Prepared | PlaybackState::Paused | PlaybackState::Completed
        );
        if self.is_released()
            || self.target != PlaybackState::Playing
            || !resumable
            || !gate.permits_start(&self.video)
        {
            return Vec::new();
        }
        self.ordered_resume(self.pending_seek_ms != 0, true)
    }

    fn ordered_resume(&self, replay_seek: bool, start: bool) -> Vec<Command> {
        let seek = replay_seek.then_some(Command::ReplayPendingSeek);
        let start = start.then_some(Command::Start);
        let ordered = match self.seek_order {
            PendingSeekOrder::SeekThenStart => [seek, start],
            PendingSeekOrder::StartThenSeek => [start, seek],
        };
        ordered.into_iter().flatten().collect()
    }

    fn on_event(&mut self, envelope: EventEnvelope, effects: &mut Vec<SideEffect>) {
        let Some(live) = self.session else {
            debug!(session = %envelope.session, kind = ?envelope.kind, "Dropping event after release");
            return;
        };
        if envelope.session != live {
            debug!(
                session = %envelope.session,
                live = %live,
                kind = ?envelope.kind,
                "Dropping event from stale session"
            );
            return;
        }

        match envelope.kind {
            EventKind::Prepared => {
                if self.state != PlaybackState::Preparing {
                    debug!(session = %live, state = %self.state, "Ignoring prepared event");
                    return;
                }
                self.state = PlaybackState::Prepared;
                effects.push(SideEffect::NotifyPrepared);

                if self.start_on_prepared {
                    self.target = PlaybackState::Playing;
                }
                let start = self.target == PlaybackState::Playing;
                for command in self.ordered_resume(self.pending_seek_ms != 0, start) {
                    effects.push(SideEffect::Requeue(command));
                }
            }
            EventKind::PlaybackComplete => {
                if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
                    debug!(session = %live, state = %self.state, "Ignoring completion event");
                    return;
                }
                self.state = PlaybackState::Completed;
                self.target = PlaybackState::Completed;
                self.stay_awake(false, effects);
                effects.push(SideEffect::NotifyCompletion);
            }
            EventKind::BufferingUpdate => {
                let percent = envelope.arg1.clamp(0, 100) as u8;
                self.buffer_percent = percent;
                effects.push(SideEffect::NotifyBufferingUpdate(percent));
            }
            EventKind::SeekComplete => {
                effects.push(SideEffect::NotifySeekComplete);
                effects.push(SideEffect::NotifyInfo(InfoNotice {
                    subtype: codes::MEDIA_INFO_MEDIA_SEEK_REQ_COMPLETE,
                    extra: envelope.arg2,
                    payload: envelope.payload,
                    position_ms: Some(envelope.arg1),
                    engine_time_ms: envelope.engine_time_ms,
                }));
            }
            EventKind::VideoSizeChanged => {
                self.video.width = to_dimension(envelope.arg1);
                self.video.height = to_dimension(envelope.arg2);
                effects.push(SideEffect::NotifyVideoSizeChanged(self.video));
            }
            EventKind::SampleAspectRatioChanged => {
                self.video.sar_num = to_dimension(envelope.arg1);
                self.video.sar_den = to_dimension(envelope.arg2);
                effects.push(SideEffect::NotifyVideoSizeChanged(self.video));
            }
            EventKind::Error { code, extra } => {
                error!(session = %live, code, extra, state = %self.state, "Engine reported error");
                self.state = PlaybackState::Error;
                self.target = PlaybackState::Error;
                effects.push(SideEffect::NotifyError { code, extra });
                if envelope.kind.is_terminal_error() {
                    effects.push(SideEffect::NotifyCompletion);
                    self.stay_awake(false, effects);
                }
            }
            EventKind::Info { subtype, extra } => {
                if subtype == codes::MEDIA_INFO_VIDEO_ROTATION_CHANGED {
                    self.rotation_degrees = extra as i32;
                    effects.push(SideEffect::UpdateRotation(self.rotation_degrees));
                }
                effects.push(SideEffect::NotifyInfo(InfoNotice {
                    subtype,
                    extra,
                    payload: envelope.payload,
                    position_ms: None,
                    engine_time_ms: envelope.engine_time_ms,
                }));
            }
            EventKind::UrlListChanged => {
                let url = envelope.payload_text().unwrap_or_default().to_string();
                if envelope.arg2 != codes::URL_LIST_APPEND {
                    // The current url is recorded, not notified.
                    self.url_list = Some(url);
                    self.url_list_status = envelope.arg2;
                    return;
                }

                let list = match self.url_list.take() {
                    Some(existing) if !existing.is_empty() => format!("{},{}", existing, url),
                    _ => url,
                };
                self.url_list = Some(list.clone());
                effects.push(SideEffect::NotifyInfo(InfoNotice {
                    subtype: codes::MEDIA_INFO_URL_CHANGE,
                    extra: self.url_list_status,
                    payload: Some(EventPayload::Text(list)),
                    position_ms: None,
                    engine_time_ms: envelope.engine_time_ms,
                }));
            }
        }
    }

    fn on_command(&mut self, command: Command, gate: &SurfaceGate, effects: &mut Vec<SideEffect>) {
        let Some(session) = self.session else {
            if command != Command::Release {
                debug!(command = ?command, "Ignoring command after release");
            }
            return;
        };

        match command {
            Command::SetDataSource(source) => {
                if self.state != PlaybackState::Idle {
                    warn!(session = %session, state = %self.state, "Data source can only be set while idle");
                    return;
                }
                self.url_list = None;
                self.url_list_status = 0;
                self.data_source = Some(source.clone());
                effects.push(SideEffect::Engine(EngineCommand::SetDataSource(source)));
            }
            Command::PrepareAsync => self.prepare(effects),
            Command::Start => {
                self.target = PlaybackState::Playing;
                match self.state {
                    PlaybackState::Idle => self.prepare(effects),
                    PlaybackState::Prepared | PlaybackState::Paused | PlaybackState::Completed => {
                        if gate.permits_start(&self.video) {
                            effects.push(SideEffect::Engine(EngineCommand::Start));
                            self.state = PlaybackState::Playing;
                            self.stay_awake(true, effects);
                            effects.push(SideEffect::NotifyStartOrPause {
                                is_playing: true,
                                url: self.display_url(),
                            });
                        } else {
                            debug!(session = %session, "Start deferred until the surface matches the video size");
                        }
                    }
                    PlaybackState::Preparing | PlaybackState::Playing | PlaybackState::Error => {}
                }
            }
            Command::Pause => {
                self.target = PlaybackState::Paused;
                if self.state == PlaybackState::Playing {
                    effects.push(SideEffect::Engine(EngineCommand::Pause));
                    self.state = PlaybackState::Paused;
                    self.stay_awake(false, effects);
                    effects.push(SideEffect::NotifyStartOrPause {
                        is_playing: false,
                        url: self.display_url(),
                    });
                }
            }
            Command::Stop => {
                if self.state.is_playable() || self.state == PlaybackState::Preparing {
                    effects.push(SideEffect::Engine(EngineCommand::Stop));
                    self.stay_awake(false, effects);
                    self.state = PlaybackState::Idle;
                    self.target = PlaybackState::Idle;
                    self.pending_seek_ms = 0;
                }
            }
            Command::SeekTo(position_ms) => {
                if self.state.is_playable() {
                    effects.push(SideEffect::Engine(EngineCommand::SeekTo(position_ms)));
                    self.pending_seek_ms = 0;
                } else {
                    self.pending_seek_ms = position_ms;
                }
            }
            Command::ReplayPendingSeek => {
                if self.pending_seek_ms != 0 && self.state.is_playable() {
                    effects.push(SideEffect::Engine(EngineCommand::SeekTo(self.pending_seek_ms)));
                    self.pending_seek_ms = 0;
                }
            }
            Command::SetVolume { left, right } => {
                effects.push(SideEffect::Engine(EngineCommand::SetVolume { left, right }));
            }
            Command::SetLooping(looping) => {
                effects.push(SideEffect::Engine(EngineCommand::SetLooping(looping)));
            }
            Command::SetSpeed(speed) => {
                if self.state.is_playable() {
                    effects.push(SideEffect::Engine(EngineCommand::SetSpeed(speed)));
                } else {
                    debug!(session = %session, state = %self.state, "Ignoring speed change before prepare");
                }
            }
            Command::SetScreenOnWhilePlaying(enabled) => {
                self.screen_on_while_playing = enabled;
                effects.push(SideEffect::UpdateKeepScreenOn(self.keep_screen_on()));
            }
            Command::Release => {
                self.stay_awake(false, effects);
                effects.push(SideEffect::Engine(EngineCommand::Release));
                effects.push(SideEffect::ResetListeners);
                self.clear();
                self.session = None;
            }
            Command::Reset { next } => {
                self.stay_awake(false, effects);
                effects.push(SideEffect::Engine(EngineCommand::Reset { next }));
                self.clear();
                self.session = Some(next);
            }
        }
    }

    fn prepare(&mut self, effects: &mut Vec<SideEffect>) {
        if self.state != PlaybackState::Idle {
            return;
        }
        if self.data_source.is_none() {
            debug!("Prepare requested without a data source");
            return;
        }
        effects.push(SideEffect::Engine(EngineCommand::PrepareAsync));
        self.state = PlaybackState::Preparing;
    }

    fn stay_awake(&mut self, awake: bool, effects: &mut Vec<SideEffect>) {
        self.awake = awake;
        effects.push(if awake {
            SideEffect::AcquireWakeLock
        } else {
            SideEffect::ReleaseWakeLock
        });
        effects.push(SideEffect::UpdateKeepScreenOn(self.keep_screen_on()));
    }

    fn clear(&mut self) {
        self.state = PlaybackState::Idle;
        self.target = PlaybackState::Idle;
        self.data_source = None;
        self.video = VideoGeometry::default();
        self.pending_seek_ms = 0;
        self.buffer_percent = 0;
        self.url_list = None;
        self.url_list_status = 0;
        self.rotation_degrees = 0;
    }

    fn display_url(&self) -> String {
        self.data_source
            .as_ref()
            .map(DataSource::display_url)
            .unwrap_or_default()
    }
}

impl fmt::Debug for PlaybackStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackStateMachine")
            .field("session", &self.session)
            .field("state", &self.state)
            .field("target", &self.target)
            .field("video", &self.video)
            .field("pending_seek_ms", &self.pending_seek_ms)
            .finish()
    }
}

fn to_dimension(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
