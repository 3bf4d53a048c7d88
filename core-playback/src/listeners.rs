//! Caller listeners.
//!
//! One optional handler per category. Handlers run on the owner loop after the
//! state transition that produced them, so they always observe the new state.
//! A handler may call back into the player; the registry lock is never held
//! while a handler runs.

use crate::state::{InfoNotice, SideEffect, VideoGeometry};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub type PreparedHandler = Arc<dyn Fn() + Send + Sync>;
pub type CompletionHandler = Arc<dyn Fn() + Send + Sync>;
pub type BufferingHandler = Arc<dyn Fn(u8) + Send + Sync>;
pub type SeekCompleteHandler = Arc<dyn Fn() + Send + Sync>;
pub type VideoSizeHandler = Arc<dyn Fn(VideoGeometry) + Send + Sync>;
/// Returns `true` when the error was handled.
pub type ErrorHandler = Arc<dyn Fn(i32, i32) -> bool + Send + Sync>;
/// Returns `true` when the info was handled.
pub type InfoHandler = Arc<dyn Fn(&InfoNotice) -> bool + Send + Sync>;
pub type StartOrPauseHandler = Arc<dyn Fn(bool, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerCategory {
    Prepared,
    Completion,
    BufferingUpdate,
    SeekComplete,
    VideoSizeChanged,
    Error,
    Info,
    StartOrPause,
}

/// A handler tagged with its category.
#[derive(Clone)]
pub enum Listener {
    Prepared(PreparedHandler),
    Completion(CompletionHandler),
    BufferingUpdate(BufferingHandler),
    SeekComplete(SeekCompleteHandler),
    VideoSizeChanged(VideoSizeHandler),
    Error(ErrorHandler),
    Info(InfoHandler),
    StartOrPause(StartOrPauseHandler),
}

impl Listener {
    pub fn category(&self) -> ListenerCategory {
        match self {
            Listener::Prepared(_) => ListenerCategory::Prepared,
            Listener::Completion(_) => ListenerCategory::Completion,
            Listener::BufferingUpdate(_) => ListenerCategory::BufferingUpdate,
            Listener::SeekComplete(_) => ListenerCategory::SeekComplete,
            Listener::VideoSizeChanged(_) => ListenerCategory::VideoSizeChanged,
            Listener::Error(_) => ListenerCategory::Error,
            Listener::Info(_) => ListenerCategory::Info,
            Listener::StartOrPause(_) => ListenerCategory::StartOrPause,
        }
    }

    pub fn prepared(f: impl Fn() + Send + Sync + 'static) -> Self {
        Listener::Prepared(Arc::new(f))
    }

    pub fn completion(f: impl Fn() + Send + Sync + 'static) -> Self {
        Listener::Completion(Arc::new(f))
    }

    pub fn buffering_update(f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Listener::BufferingUpdate(Arc::new(f))
    }

    pub fn seek_complete(f: impl Fn() + Send + Sync + 'static) -> Self {
        Listener::SeekComplete(Arc::new(f))
    }

    pub fn video_size_changed(f: impl Fn(VideoGeometry) + Send + Sync + 'static) -> Self {
        Listener::VideoSizeChanged(Arc::new(f))
    }

    pub fn error(f: impl Fn(i32, i32) -> bool + Send + Sync + 'static) -> Self {
        Listener::Error(Arc::new(f))
    }

    pub fn info(f: impl Fn(&InfoNotice) -> bool + Send + Sync + 'static) -> Self {
        Listener::Info(Arc::new(f))
    }

    pub fn start_or_pause(f: impl Fn(bool, &str) + Send + Sync + 'static) -> Self {
        Listener::StartOrPause(Arc::new(f))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.category()).finish()
    }
}

#[derive(Default)]
struct Slots {
    prepared: Option<PreparedHandler>,
    completion: Option<CompletionHandler>,
    buffering_update: Option<BufferingHandler>,
    seek_complete: Option<SeekCompleteHandler>,
    video_size_changed: Option<VideoSizeHandler>,
    error: Option<ErrorHandler>,
    info: Option<InfoHandler>,
    start_or_pause: Option<StartOrPauseHandler>,
}

#[derive(Default)]
pub struct ListenerRegistry {
    slots: Mutex<Slots>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler, replacing any previous one of the same category.
    pub fn register(&self, listener: Listener) {
        let mut slots = self.slots.lock();
        match listener {
            Listener::Prepared(h) => slots.prepared = Some(h),
            Listener::Completion(h) => slots.completion = Some(h),
            Listener::BufferingUpdate(h) => slots.buffering_update = Some(h),
            Listener::SeekComplete(h) => slots.seek_complete = Some(h),
            Listener::VideoSizeChanged(h) => slots.video_size_changed = Some(h),
            Listener::Error(h) => slots.error = Some(h),
            Listener::Info(h) => slots.info = Some(h),
            Listener::StartOrPause(h) => slots.start_or_pause = Some(h),
        }
    }

    pub fn unregister(&self, category: ListenerCategory) {
        let mut slots = self.slots.lock();
        match category {
            ListenerCategory::Prepared => slots.prepared = None,
            ListenerCategory::Completion => slots.completion = None,
            ListenerCategory::BufferingUpdate => slots.buffering_update = None,
            ListenerCategory::SeekComplete => slots.seek_complete = None,
            ListenerCategory::VideoSizeChanged => slots.video_size_changed = None,
            ListenerCategory::Error => slots.error = None,
            ListenerCategory::Info => slots.info = None,
            ListenerCategory::StartOrPause => slots.start_or_pause = None,
        }
    }

    pub fn is_registered(&self, category: ListenerCategory) -> bool {
        let slots = self.slots.lock();
        match category {
            ListenerCategory::Prepared => slots.prepared.is_some(),
            ListenerCategory::Completion => slots.completion.is_some(),
            ListenerCategory::BufferingUpdate => slots.buffering_update.is_some(),
            ListenerCategory::SeekComplete => slots.seek_complete.is_some(),
            ListenerCategory::VideoSizeChanged => slots.video_size_changed.is_some(),
            ListenerCategory::Error => slots.error.is_some(),
            ListenerCategory::Info => slots.info.is_some(),
            ListenerCategory::StartOrPause => slots.start_or_pause.is_some(),
        }
    }

    /// Drop every handler.
    pub fn reset(&self) {
        *self.slots.lock() = Slots::default();
    }

    /// Invoke the handler for a notify effect.
    ///
    /// Returns the handler's verdict for error and info handlers, `true` when
    /// any other handler ran and `false` when no handler is registered or the
    /// effect is not a notification.
    pub fn dispatch(&self, effect: &SideEffect) -> bool {
        match effect {
            SideEffect::NotifyPrepared => self.with(|s| s.prepared.clone(), |h| h()),
            SideEffect::NotifyCompletion => self.with(|s| s.completion.clone(), |h| h()),
            SideEffect::NotifyBufferingUpdate(percent) => {
                self.with(|s| s.buffering_update.clone(), |h| h(*percent))
            }
            SideEffect::NotifySeekComplete => self.with(|s| s.seek_complete.clone(), |h| h()),
            SideEffect::NotifyVideoSizeChanged(geometry) => {
                self.with(|s| s.video_size_changed.clone(), |h| h(*geometry))
            }
            SideEffect::NotifyError { code, extra } => {
                let handler = self.slots.lock().error.clone();
                handler.map(|h| h(*code, *extra)).unwrap_or(false)
            }
            SideEffect::NotifyInfo(notice) => {
                let handler = self.slots.lock().info.clone();
                handler.map(|h| h(notice)).unwrap_or(false)
            }
            SideEffect::NotifyStartOrPause { is_playing, url } => {
                self.with(|s| s.start_or_pause.clone(), |h| h(*is_playing, url))
            }
            _ => false,
        }
    }

    fn with<H>(&self, select: impl FnOnce(&Slots) -> Option<H>, call: impl FnOnce(H)) -> bool {
        let handler = select(&self.slots.lock());
        match handler {
            Some(h) => {
                call(h);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("ListenerRegistry")
            .field("prepared", &slots.prepared.is_some())
            .field("completion", &slots.completion.is_some())
            .field("error", &slots.error.is_some())
            .field("info", &slots.info.is_some())
            .finish_non_exhaustive()
    }
}
