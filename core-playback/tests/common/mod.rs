//! Shared fakes for the player integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::engine::{
    EngineCallbacks, EventPayload, MediaEngine, SessionToken, SurfaceHandle,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::power::WakeLock;
use bridge_traits::render::{RenderCallback, RenderTarget, RenderTargetId};
use core_playback::{Player, PlayerBuilder, PlayerConfig, PlayerLoop, RenderCallbackSet};
use core_runtime::config::RuntimeConfig;
use core_runtime::library::LibraryGate;
use core_runtime::logging::EngineLogRouter;
use core_runtime::CoreRuntime;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetSurface(Option<u64>),
    SetHeaders(String),
    SetDataSource(String),
    SetManifest(String),
    Prepare,
    Start,
    Pause,
    Stop,
    Seek(i64),
    Volume(f32, f32),
    Looping(bool),
    Speed(f32),
    Release,
    Reset,
}

/// Engine fake that records every command and lets tests post events.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
    attached: Mutex<Option<(SessionToken, Arc<dyn EngineCallbacks>)>>,
    attach_count: AtomicUsize,
    fail_start: Mutex<Option<(i32, i32)>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn seeks(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Seek(ms) => Some(ms),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn attach_count(&self) -> usize {
        self.attach_count.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> Option<SessionToken> {
        self.attached.lock().as_ref().map(|(token, _)| *token)
    }

    pub fn fail_start_with(&self, code: i32, extra: i32) {
        *self.fail_start.lock() = Some((code, extra));
    }

    /// Post an event stamped with the currently attached session.
    pub fn post(&self, what: i32, arg1: i64, arg2: i64) {
        self.post_with(what, arg1, arg2, None);
    }

    pub fn post_text(&self, what: i32, arg1: i64, arg2: i64, text: &str) {
        self.post_with(what, arg1, arg2, Some(EventPayload::Text(text.to_string())));
    }

    pub fn post_with(&self, what: i32, arg1: i64, arg2: i64, payload: Option<EventPayload>) {
        let attached = self.attached.lock().clone();
        if let Some((session, callbacks)) = attached {
            callbacks.post_event(session, 0, what, arg1, arg2, payload);
        }
    }

    /// Post as if from `session`, regardless of what is attached.
    pub fn post_as(&self, session: SessionToken, what: i32, arg1: i64, arg2: i64) {
        let attached = self.attached.lock().clone();
        if let Some((_, callbacks)) = attached {
            callbacks.post_event(session, 0, what, arg1, arg2, None);
        }
    }

    fn record(&self, call: Call) -> BridgeResult<()> {
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for RecordingEngine {
    fn attach(&self, session: SessionToken, callbacks: Arc<dyn EngineCallbacks>) {
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        *self.attached.lock() = Some((session, callbacks));
    }

    async fn set_surface(&self, surface: Option<SurfaceHandle>) -> BridgeResult<()> {
        self.record(Call::SetSurface(surface.map(|s| s.as_raw())))
    }

    async fn set_headers(&self, headers: String) -> BridgeResult<()> {
        self.record(Call::SetHeaders(headers))
    }

    async fn set_data_source(&self, location: String) -> BridgeResult<()> {
        self.record(Call::SetDataSource(location))
    }

    async fn set_data_source_manifest(&self, json: String) -> BridgeResult<()> {
        self.record(Call::SetManifest(json))
    }

    async fn prepare_async(&self) -> BridgeResult<()> {
        self.record(Call::Prepare)
    }

    async fn start(&self) -> BridgeResult<()> {
        self.record(Call::Start)?;
        match *self.fail_start.lock() {
            Some((code, extra)) => Err(BridgeError::Engine { code, extra }),
            None => Ok(()),
        }
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(Call::Pause)
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record(Call::Stop)
    }

    async fn seek_to(&self, position_ms: i64) -> BridgeResult<()> {
        self.record(Call::Seek(position_ms))
    }

    async fn set_volume(&self, left: f32, right: f32) -> BridgeResult<()> {
        self.record(Call::Volume(left, right))
    }

    async fn set_looping(&self, looping: bool) -> BridgeResult<()> {
        self.record(Call::Looping(looping))
    }

    async fn set_speed(&self, speed: f32) -> BridgeResult<()> {
        self.record(Call::Speed(speed))
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record(Call::Release)
    }

    async fn reset(&self) -> BridgeResult<()> {
        self.record(Call::Reset)
    }
}

#[derive(Default)]
pub struct CountingWakeLock {
    held: AtomicBool,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingWakeLock {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl WakeLock for CountingWakeLock {
    fn acquire(&self) -> BridgeResult<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> BridgeResult<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

/// Render target driven by the test instead of a UI toolkit.
pub struct TestTarget {
    callbacks: RenderCallbackSet,
    size_match: bool,
    pub video_size: Mutex<Option<(u32, u32)>>,
    pub sar: Mutex<Option<(u32, u32)>>,
    pub keep_screen_on: AtomicBool,
}

impl TestTarget {
    pub fn new(size_match: bool) -> Arc<Self> {
        Arc::new(Self {
            callbacks: RenderCallbackSet::new(RenderTargetId::new()),
            size_match,
            video_size: Mutex::new(None),
            sar: Mutex::new(None),
            keep_screen_on: AtomicBool::new(false),
        })
    }

    pub fn create_surface(&self, raw: u64) {
        self.callbacks.surface_created(SurfaceHandle::from_raw(raw));
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.callbacks.surface_changed(1, width, height);
    }

    pub fn destroy_surface(&self) {
        self.callbacks.surface_destroyed();
    }

    pub fn subscribers(&self) -> usize {
        self.callbacks.len()
    }
}

impl RenderTarget for TestTarget {
    fn id(&self) -> RenderTargetId {
        self.callbacks.target()
    }

    fn requires_size_match(&self) -> bool {
        self.size_match
    }

    fn add_render_callback(&self, callback: Arc<dyn RenderCallback>) {
        self.callbacks.add(callback);
    }

    fn remove_render_callback(&self, callback: &Arc<dyn RenderCallback>) {
        self.callbacks.remove(callback);
    }

    fn set_video_size(&self, width: u32, height: u32) {
        *self.video_size.lock() = Some((width, height));
    }

    fn set_video_sample_aspect_ratio(&self, num: u32, den: u32) {
        *self.sar.lock() = Some((num, den));
    }

    fn set_keep_screen_on(&self, keep_on: bool) {
        self.keep_screen_on.store(keep_on, Ordering::SeqCst);
    }
}

pub fn runtime() -> CoreRuntime {
    let config = RuntimeConfig::builder()
        .build()
        .expect("default runtime config is valid");
    CoreRuntime::initialize_with(
        config,
        Arc::new(LibraryGate::new()),
        Arc::new(EngineLogRouter::new()),
    )
    .expect("runtime initialises without a loader")
}

pub struct Harness {
    pub player: Player,
    pub owner: PlayerLoop,
    pub engine: Arc<RecordingEngine>,
    pub wake_lock: Arc<CountingWakeLock>,
}

impl Harness {
    pub fn new(config: PlayerConfig) -> Self {
        let engine = Arc::new(RecordingEngine::default());
        let wake_lock = Arc::new(CountingWakeLock::default());
        let (player, owner) = PlayerBuilder::new()
            .runtime(runtime())
            .engine(engine.clone())
            .wake_lock(wake_lock.clone())
            .config(config)
            .build()
            .expect("player builds");
        Self {
            player,
            owner,
            engine,
            wake_lock,
        }
    }

    pub async fn drain(&mut self) -> usize {
        self.owner.drain().await
    }

    /// Set a source, prepare, and deliver the prepared event.
    pub async fn prepared(&mut self) {
        self.player
            .set_data_source_str("https://example.com/video.mp4")
            .unwrap();
        self.player.prepare_async().unwrap();
        self.drain().await;
        self.engine.post(1, 0, 0);
        self.drain().await;
    }
}
