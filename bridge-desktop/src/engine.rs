//! Simulated Media Engine
//!
//! Accepts the full command surface and answers on a dedicated worker thread,
//! so hosts exercise the same cross-thread delivery a native engine produces.
//! No media is decoded.

use async_trait::async_trait;
use bridge_traits::{
    engine::{EngineCallbacks, EventPayload, MediaEngine, SessionToken, SurfaceHandle},
    error::{BridgeError, Result},
};
use core_playback::event::codes;
use parking_lot::Mutex;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Command issued in a state the engine cannot honour.
pub const MEDIA_ERROR_INVALID_OPERATION: i32 = -38;
/// Manifest or stream the engine cannot parse.
pub const MEDIA_ERROR_MALFORMED: i32 = -1007;

const LOG_TAG: &str = "sim-engine";
const LOG_INFO: i32 = 4;

/// Media the simulated engine pretends to play.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMedia {
    /// Zero for audio-only media; no size event is reported then.
    pub width: u32,
    pub height: u32,
    pub sar: (u32, u32),
    pub rotation_degrees: i32,
    pub prepare_delay: Duration,
    /// Play to the end once started. When `false`, playback runs until paused.
    pub completes: bool,
    pub duration: Duration,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            sar: (1, 1),
            rotation_degrees: 0,
            prepare_delay: Duration::from_millis(10),
            completes: false,
            duration: Duration::from_millis(50),
        }
    }
}

impl SimulatedMedia {
    pub fn audio_only() -> Self {
        Self {
            width: 0,
            height: 0,
            sar: (0, 0),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn completing_after(mut self, duration: Duration) -> Self {
        self.completes = true;
        self.duration = duration;
        self
    }

    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }
}

type Attached = (SessionToken, Arc<dyn EngineCallbacks>);

enum Job {
    Post {
        target: Attached,
        delay: Duration,
        what: i32,
        arg1: i64,
        arg2: i64,
        payload: Option<EventPayload>,
    },
    Log {
        target: Attached,
        level: i32,
        line: String,
    },
}

struct EngineState {
    attached: Option<Attached>,
    source: Option<String>,
    headers: Option<String>,
    surface: Option<SurfaceHandle>,
    prepared: bool,
    playing: bool,
    released: bool,
    volume: (f32, f32),
    looping: bool,
    speed: f32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            attached: None,
            source: None,
            headers: None,
            surface: None,
            prepared: false,
            playing: false,
            released: false,
            volume: (1.0, 1.0),
            looping: false,
            speed: 1.0,
        }
    }
}

/// Simulated engine whose callbacks come from its own worker thread.
///
/// Events are delivered in the order they were scheduled; a delayed event
/// holds back everything scheduled after it.
pub struct ThreadedEngine {
    media: SimulatedMedia,
    state: Mutex<EngineState>,
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
}

impl ThreadedEngine {
    /// Spawn the worker thread.
    pub fn new(media: SimulatedMedia) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name(LOG_TAG.to_string())
            .spawn(move || run_worker(rx))
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to spawn engine worker: {}", e)))?;

        Ok(Self {
            media,
            state: Mutex::new(EngineState::default()),
            jobs: Mutex::new(Some(tx)),
        })
    }

    pub fn media(&self) -> &SimulatedMedia {
        &self.media
    }

    pub fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    pub fn headers(&self) -> Option<String> {
        self.state.lock().headers.clone()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.state.lock().surface
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn volume(&self) -> (f32, f32) {
        self.state.lock().volume
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    pub fn speed(&self) -> f32 {
        self.state.lock().speed
    }

    /// Session the engine currently stamps its events with.
    pub fn session(&self) -> Option<SessionToken> {
        self.state.lock().attached.as_ref().map(|(session, _)| *session)
    }

    /// Report an arbitrary event from the worker thread, as if the engine
    /// produced it on its own.
    pub fn inject(&self, what: i32, arg1: i64, arg2: i64) -> Result<()> {
        self.schedule(Duration::ZERO, what, arg1, arg2, None)
    }

    pub fn inject_text(&self, what: i32, arg1: i64, arg2: i64, text: impl Into<String>) -> Result<()> {
        self.schedule(
            Duration::ZERO,
            what,
            arg1,
            arg2,
            Some(EventPayload::Text(text.into())),
        )
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state.lock().released {
            return Err(BridgeError::NotAvailable("engine released".to_string()));
        }
        Ok(())
    }

    fn attached(&self) -> Result<Attached> {
        self.state
            .lock()
            .attached
            .clone()
            .ok_or_else(|| BridgeError::NotAvailable("no callbacks attached".to_string()))
    }

    fn send(&self, job: Job) -> Result<()> {
        let jobs = self.jobs.lock();
        let Some(tx) = jobs.as_ref() else {
            return Err(BridgeError::NotAvailable("engine released".to_string()));
        };
        tx.send(job)
            .map_err(|_| BridgeError::OperationFailed("engine worker stopped".to_string()))
    }

    fn schedule(
        &self,
        delay: Duration,
        what: i32,
        arg1: i64,
        arg2: i64,
        payload: Option<EventPayload>,
    ) -> Result<()> {
        let target = self.attached()?;
        self.send(Job::Post {
            target,
            delay,
            what,
            arg1,
            arg2,
            payload,
        })
    }

    fn log(&self, line: String) {
        let Ok(target) = self.attached() else {
            return;
        };
        if let Err(e) = self.send(Job::Log {
            target,
            level: LOG_INFO,
            line,
        }) {
            debug!(error = %e, "Dropping engine log line");
        }
    }

    fn invalid_operation(command: &str) -> BridgeError {
        warn!(command, "Command issued in a state the engine cannot honour");
        BridgeError::Engine {
            code: MEDIA_ERROR_INVALID_OPERATION,
            extra: 0,
        }
    }
}

fn run_worker(rx: mpsc::Receiver<Job>) {
    for job in rx {
        match job {
            Job::Post {
                target: (session, callbacks),
                delay,
                what,
                arg1,
                arg2,
                payload,
            } => {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                callbacks.post_event(session, 0, what, arg1, arg2, payload);
            }
            Job::Log {
                target: (_, callbacks),
                level,
                line,
            } => callbacks.post_log(level, LOG_TAG, line.as_bytes()),
        }
    }
    debug!("Engine worker finished");
}

#[async_trait]
impl MediaEngine for ThreadedEngine {
    fn attach(&self, session: SessionToken, callbacks: Arc<dyn EngineCallbacks>) {
        debug!(session = %session, "Engine attached");
        self.state.lock().attached = Some((session, callbacks));
    }

    async fn set_surface(&self, surface: Option<SurfaceHandle>) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().surface = surface;
        Ok(())
    }

    async fn set_headers(&self, headers: String) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().headers = Some(headers);
        Ok(())
    }

    async fn set_data_source(&self, location: String) -> Result<()> {
        self.ensure_live()?;
        if location.trim().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "data source must not be empty".to_string(),
            ));
        }
        {
            let mut state = self.state.lock();
            state.source = Some(location.clone());
            state.prepared = false;
        }
        self.log(format!("open {}", location));
        Ok(())
    }

    async fn set_data_source_manifest(&self, json: String) -> Result<()> {
        self.ensure_live()?;
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&json) {
            warn!(error = %e, "Rejecting malformed manifest");
            return Err(BridgeError::Engine {
                code: MEDIA_ERROR_MALFORMED,
                extra: 0,
            });
        }
        {
            let mut state = self.state.lock();
            state.source = Some("manifest".to_string());
            state.prepared = false;
        }
        self.log("open manifest".to_string());
        Ok(())
    }

    async fn prepare_async(&self) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = self.state.lock();
            if state.source.is_none() {
                return Err(Self::invalid_operation("prepare_async"));
            }
            state.prepared = true;
        }

        let media = &self.media;
        let mut delay = media.prepare_delay;
        if media.width > 0 && media.height > 0 {
            self.schedule(
                delay,
                codes::MEDIA_SET_VIDEO_SIZE,
                media.width as i64,
                media.height as i64,
                None,
            )?;
            delay = Duration::ZERO;
            if media.sar.0 > 0 && media.sar.1 > 0 {
                self.schedule(
                    delay,
                    codes::MEDIA_SET_VIDEO_SAR,
                    media.sar.0 as i64,
                    media.sar.1 as i64,
                    None,
                )?;
            }
        }
        if media.rotation_degrees != 0 {
            self.schedule(
                delay,
                codes::MEDIA_INFO,
                codes::MEDIA_INFO_VIDEO_ROTATION_CHANGED as i64,
                media.rotation_degrees as i64,
                None,
            )?;
            delay = Duration::ZERO;
        }
        self.schedule(delay, codes::MEDIA_BUFFERING_UPDATE, 100, 0, None)?;
        self.schedule(Duration::ZERO, codes::MEDIA_PREPARED, 0, 0, None)
    }

    async fn start(&self) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = self.state.lock();
            if !state.prepared {
                return Err(Self::invalid_operation("start"));
            }
            state.playing = true;
        }
        if self.media.completes {
            self.schedule(self.media.duration, codes::MEDIA_PLAYBACK_COMPLETE, 0, 0, None)?;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().playing = false;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.state.lock();
        state.playing = false;
        state.prepared = false;
        Ok(())
    }

    async fn seek_to(&self, position_ms: i64) -> Result<()> {
        self.ensure_live()?;
        if !self.state.lock().prepared {
            return Err(Self::invalid_operation("seek_to"));
        }
        self.schedule(Duration::ZERO, codes::MEDIA_SEEK_COMPLETE, position_ms, 0, None)
    }

    async fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().volume = (left, right);
        Ok(())
    }

    async fn set_looping(&self, looping: bool) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().looping = looping;
        Ok(())
    }

    async fn set_speed(&self, speed: f32) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().speed = speed;
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.playing = false;
            state.attached = None;
        }
        // Dropping the sender lets the worker drain and exit.
        self.jobs.lock().take();
        info!("Simulated engine released");
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.state.lock();
        state.source = None;
        state.headers = None;
        state.prepared = false;
        state.playing = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender};

    struct ChannelCallbacks {
        events: Mutex<Sender<(SessionToken, i32, i64, i64)>>,
        logs: Mutex<Vec<String>>,
    }

    impl EngineCallbacks for ChannelCallbacks {
        fn post_event(
            &self,
            session: SessionToken,
            _time_ms: i64,
            what: i32,
            arg1: i64,
            arg2: i64,
            _payload: Option<EventPayload>,
        ) {
            self.events.lock().send((session, what, arg1, arg2)).ok();
        }

        fn post_log(&self, _level: i32, _tag: &str, bytes: &[u8]) {
            self.logs
                .lock()
                .push(String::from_utf8_lossy(bytes).into_owned());
        }
    }

    fn attached(engine: &ThreadedEngine) -> Receiver<(SessionToken, i32, i64, i64)> {
        let (tx, rx) = mpsc::channel();
        engine.attach(
            SessionToken::from_raw(1),
            Arc::new(ChannelCallbacks {
                events: Mutex::new(tx),
                logs: Mutex::new(Vec::new()),
            }),
        );
        rx
    }

    fn next(rx: &Receiver<(SessionToken, i32, i64, i64)>) -> (SessionToken, i32, i64, i64) {
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_prepare_reports_geometry_then_prepared() {
        let engine = ThreadedEngine::new(SimulatedMedia::default().with_rotation(90)).unwrap();
        let rx = attached(&engine);

        engine.set_data_source("file:///a.mp4".into()).await.unwrap();
        engine.prepare_async().await.unwrap();

        let token = SessionToken::from_raw(1);
        assert_eq!(next(&rx), (token, codes::MEDIA_SET_VIDEO_SIZE, 1280, 720));
        assert_eq!(next(&rx), (token, codes::MEDIA_SET_VIDEO_SAR, 1, 1));
        assert_eq!(
            next(&rx),
            (
                token,
                codes::MEDIA_INFO,
                codes::MEDIA_INFO_VIDEO_ROTATION_CHANGED as i64,
                90
            )
        );
        assert_eq!(next(&rx), (token, codes::MEDIA_BUFFERING_UPDATE, 100, 0));
        assert_eq!(next(&rx), (token, codes::MEDIA_PREPARED, 0, 0));
    }

    #[tokio::test]
    async fn test_audio_only_skips_geometry() {
        let engine = ThreadedEngine::new(SimulatedMedia::audio_only()).unwrap();
        let rx = attached(&engine);

        engine.set_data_source("file:///a.mp3".into()).await.unwrap();
        engine.prepare_async().await.unwrap();

        assert_eq!(next(&rx).1, codes::MEDIA_BUFFERING_UPDATE);
        assert_eq!(next(&rx).1, codes::MEDIA_PREPARED);
    }

    #[tokio::test]
    async fn test_commands_out_of_order_fail_with_engine_code() {
        let engine = ThreadedEngine::new(SimulatedMedia::default()).unwrap();
        let _rx = attached(&engine);

        let err = engine.prepare_async().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Engine {
                code: MEDIA_ERROR_INVALID_OPERATION,
                extra: 0
            }
        ));
        assert!(matches!(
            engine.start().await,
            Err(BridgeError::Engine { .. })
        ));
        assert!(matches!(
            engine.set_data_source_manifest("{oops".into()).await,
            Err(BridgeError::Engine {
                code: MEDIA_ERROR_MALFORMED,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_seek_and_completion() {
        let engine = ThreadedEngine::new(
            SimulatedMedia::audio_only()
                .with_prepare_delay(Duration::ZERO)
                .completing_after(Duration::from_millis(5)),
        )
        .unwrap();
        let rx = attached(&engine);

        engine.set_data_source("file:///a.mp3".into()).await.unwrap();
        engine.prepare_async().await.unwrap();
        next(&rx);
        next(&rx);

        engine.seek_to(1500).await.unwrap();
        assert_eq!(
            next(&rx),
            (SessionToken::from_raw(1), codes::MEDIA_SEEK_COMPLETE, 1500, 0)
        );

        engine.start().await.unwrap();
        assert!(engine.is_playing());
        assert_eq!(next(&rx).1, codes::MEDIA_PLAYBACK_COMPLETE);
    }

    #[tokio::test]
    async fn test_release_stops_everything() {
        let engine = ThreadedEngine::new(SimulatedMedia::default()).unwrap();
        let _rx = attached(&engine);

        engine.release().await.unwrap();
        engine.release().await.unwrap();
        assert!(engine.is_released());
        assert!(engine.session().is_none());
        assert!(matches!(
            engine.start().await,
            Err(BridgeError::NotAvailable(_))
        ));
        assert!(engine.inject(codes::MEDIA_PREPARED, 0, 0).is_err());
    }

    #[tokio::test]
    async fn test_pass_through_state() {
        let engine = ThreadedEngine::new(SimulatedMedia::default()).unwrap();
        engine.set_volume(0.5, 0.25).await.unwrap();
        engine.set_looping(true).await.unwrap();
        engine.set_speed(2.0).await.unwrap();
        engine.set_headers("A:b\r\n".into()).await.unwrap();
        engine
            .set_surface(Some(SurfaceHandle::from_raw(4)))
            .await
            .unwrap();

        assert_eq!(engine.volume(), (0.5, 0.25));
        assert!(engine.is_looping());
        assert_eq!(engine.speed(), 2.0);
        assert_eq!(engine.headers().as_deref(), Some("A:b\r\n"));
        assert_eq!(engine.surface(), Some(SurfaceHandle::from_raw(4)));

        engine.reset().await.unwrap();
        assert!(engine.headers().is_none());
        assert!(engine.source().is_none());
    }
}
