//! # Event Bus System
//!
//! Broadcast channel of public player events built on `tokio::sync::broadcast`.
//!
//! Single-slot listeners (one handler per category) are the primary
//! notification surface of a player. The event bus mirrors every dispatched
//! notification so any number of observers, such as UI widgets, analytics or
//! tests, can follow a player without competing for the listener slot.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(PlayerEvent::Prepared { session: 1 }).ok();
//! assert_eq!(stream.recv().await.unwrap(), PlayerEvent::Prepared { session: 1 });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n` events.
//!   Non-fatal; later events still arrive.
//! - **`RecvError::Closed`**: the player was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Public notification emitted by a player.
///
/// `session` is the raw session token the notification belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// The playback state changed.
    StateChanged {
        session: u64,
        from: String,
        to: String,
    },
    Prepared {
        session: u64,
    },
    /// Playback started or paused.
    StartedOrPaused {
        session: u64,
        is_playing: bool,
        url: String,
    },
    Completed {
        session: u64,
    },
    BufferingUpdated {
        session: u64,
        percent: u8,
    },
    SeekCompleted {
        session: u64,
    },
    VideoSizeChanged {
        session: u64,
        width: u32,
        height: u32,
        sar_num: u32,
        sar_den: u32,
    },
    Error {
        session: u64,
        code: i32,
        extra: i32,
    },
    Info {
        session: u64,
        subtype: i32,
        extra: i64,
    },
    /// The session ended through release.
    Released {
        session: u64,
    },
}

impl PlayerEvent {
    pub fn session(&self) -> u64 {
        match self {
            PlayerEvent::StateChanged { session, .. }
            | PlayerEvent::Prepared { session }
            | PlayerEvent::StartedOrPaused { session, .. }
            | PlayerEvent::Completed { session }
            | PlayerEvent::BufferingUpdated { session, .. }
            | PlayerEvent::SeekCompleted { session }
            | PlayerEvent::VideoSizeChanged { session, .. }
            | PlayerEvent::Error { session, .. }
            | PlayerEvent::Info { session, .. }
            | PlayerEvent::Released { session } => *session,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged { .. } => "Playback state changed",
            PlayerEvent::Prepared { .. } => "Media prepared",
            PlayerEvent::StartedOrPaused { is_playing: true, .. } => "Playback started",
            PlayerEvent::StartedOrPaused { .. } => "Playback paused",
            PlayerEvent::Completed { .. } => "Playback completed",
            PlayerEvent::BufferingUpdated { .. } => "Buffering progress",
            PlayerEvent::SeekCompleted { .. } => "Seek completed",
            PlayerEvent::VideoSizeChanged { .. } => "Video size changed",
            PlayerEvent::Error { .. } => "Playback error",
            PlayerEvent::Info { .. } => "Engine info",
            PlayerEvent::Released { .. } => "Player released",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::Error { .. } => EventSeverity::Error,
            PlayerEvent::Prepared { .. }
            | PlayerEvent::Completed { .. }
            | PlayerEvent::Released { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Central broadcast channel for one player's public events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Subscribers lagging by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    /// Each call creates an independent receiver of all future events.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, PlayerEvent};
///
/// let bus = EventBus::new(16);
/// let errors_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, PlayerEvent::Error { .. }));
/// ```
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(PlayerEvent::Prepared { session: 1 }).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = PlayerEvent::Error {
            session: 3,
            code: 100,
            extra: 0,
        };
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, PlayerEvent::Completed { .. }));

        bus.emit(PlayerEvent::Prepared { session: 1 }).ok();
        bus.emit(PlayerEvent::Completed { session: 1 }).ok();

        assert_eq!(
            stream.recv().await.unwrap(),
            PlayerEvent::Completed { session: 1 }
        );
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for percent in 0..5u8 {
            bus.emit(PlayerEvent::BufferingUpdated { session: 1, percent }).ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
        assert!(matches!(stream.try_recv(), Some(Ok(_))));
    }

    #[test]
    fn test_event_metadata() {
        let started = PlayerEvent::StartedOrPaused {
            session: 9,
            is_playing: true,
            url: "https://example.com".into(),
        };
        assert_eq!(started.session(), 9);
        assert_eq!(started.description(), "Playback started");
        assert_eq!(started.severity(), EventSeverity::Debug);

        let error = PlayerEvent::Error {
            session: 9,
            code: 1,
            extra: -1,
        };
        assert_eq!(error.severity(), EventSeverity::Error);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(PlayerEvent::SeekCompleted { session: 2 }).unwrap();
        assert_eq!(json["event"], "SeekCompleted");
        assert_eq!(json["session"], 2);
    }
}
