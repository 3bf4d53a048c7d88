//! Engine events in canonical form.

use bridge_traits::engine::{EventPayload, SessionToken};
use std::time::Instant;

/// Raw event codes posted by the engine.
pub mod codes {
    pub const MEDIA_NOP: i32 = 0;
    pub const MEDIA_PREPARED: i32 = 1;
    pub const MEDIA_PLAYBACK_COMPLETE: i32 = 2;
    pub const MEDIA_BUFFERING_UPDATE: i32 = 3;
    pub const MEDIA_SEEK_COMPLETE: i32 = 4;
    pub const MEDIA_SET_VIDEO_SIZE: i32 = 5;
    pub const MEDIA_ERROR: i32 = 100;
    pub const MEDIA_INFO: i32 = 200;
    pub const MEDIA_SET_VIDEO_SAR: i32 = 10001;

    /// Generic engine failure, used when a command fails without an engine code.
    pub const MEDIA_ERROR_UNKNOWN: i32 = 1;

    pub const MEDIA_INFO_VIDEO_ROTATION_CHANGED: i32 = 10001;
    pub const MEDIA_INFO_URL_CHANGE: i32 = 10014;
    pub const MEDIA_INFO_MEDIA_SEEK_REQ_COMPLETE: i32 = 10102;

    /// `arg2` of a url-change event that appends to the tracked list.
    pub const URL_LIST_APPEND: i64 = -1;
}

/// Kind of one engine occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Prepared,
    PlaybackComplete,
    BufferingUpdate,
    SeekComplete,
    VideoSizeChanged,
    SampleAspectRatioChanged,
    Error { code: i32, extra: i32 },
    Info { subtype: i32, extra: i64 },
    UrlListChanged,
}

/// Result of decoding a raw engine code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Event(EventKind),
    /// Interface test message.
    Nop,
    Unknown,
}

impl EventKind {
    pub fn decode(what: i32, arg1: i64, arg2: i64) -> Decoded {
        let kind = match what {
            codes::MEDIA_NOP => return Decoded::Nop,
            codes::MEDIA_PREPARED => EventKind::Prepared,
            codes::MEDIA_PLAYBACK_COMPLETE => EventKind::PlaybackComplete,
            codes::MEDIA_BUFFERING_UPDATE => EventKind::BufferingUpdate,
            codes::MEDIA_SEEK_COMPLETE => EventKind::SeekComplete,
            codes::MEDIA_SET_VIDEO_SIZE => EventKind::VideoSizeChanged,
            codes::MEDIA_SET_VIDEO_SAR => EventKind::SampleAspectRatioChanged,
            codes::MEDIA_ERROR => EventKind::Error {
                code: saturate_i32(arg1),
                extra: saturate_i32(arg2),
            },
            codes::MEDIA_INFO if arg1 == codes::MEDIA_INFO_URL_CHANGE as i64 => {
                EventKind::UrlListChanged
            }
            codes::MEDIA_INFO => EventKind::Info {
                subtype: saturate_i32(arg1),
                extra: arg2,
            },
            _ => return Decoded::Unknown,
        };
        Decoded::Event(kind)
    }

    /// Returns `true` for an error the engine cannot continue from.
    pub fn is_terminal_error(&self) -> bool {
        matches!(self, EventKind::Error { extra, .. } if *extra >= 0)
    }
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// One engine occurrence, stamped with the session that produced it.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub session: SessionToken,
    pub kind: EventKind,
    pub arg1: i64,
    pub arg2: i64,
    pub payload: Option<EventPayload>,
    /// Engine wall-clock time in milliseconds, or the time of posting when the
    /// engine did not supply one.
    pub engine_time_ms: i64,
    pub received_at: Instant,
}

impl EventEnvelope {
    pub fn new(session: SessionToken, kind: EventKind, arg1: i64, arg2: i64) -> Self {
        Self {
            session,
            kind,
            arg1,
            arg2,
            payload: None,
            engine_time_ms: chrono::Utc::now().timestamp_millis(),
            received_at: Instant::now(),
        }
    }

    /// Error envelope for a failed engine command.
    pub fn error(session: SessionToken, code: i32, extra: i32) -> Self {
        Self::new(
            session,
            EventKind::Error { code, extra },
            code as i64,
            extra as i64,
        )
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_engine_time(mut self, time_ms: i64) -> Self {
        self.engine_time_ms = time_ms;
        self
    }

    pub fn payload_text(&self) -> Option<&str> {
        self.payload.as_ref().and_then(EventPayload::as_text)
    }
}
