//! # Player Configuration
//!
//! Per-player settings. Every field has a serde default so hosts can ship a
//! partial JSON document.

use serde::{Deserialize, Serialize};

/// Order in which a deferred seek and the deferred start are issued once the
/// render surface becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PendingSeekOrder {
    /// Seek first, then resume. Playback never shows frames from the old position.
    #[default]
    SeekThenStart,
    /// Resume first, then seek. For engines that drop seeks issued while paused.
    StartThenSeek,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// See [`PendingSeekOrder`].
    ///
    /// Default: `SeekThenStart`.
    #[serde(default)]
    pub pending_seek_order: PendingSeekOrder,

    /// Keep the screen on while the player holds its wake lock.
    ///
    /// Default: true.
    #[serde(default = "default_screen_on_while_playing")]
    pub screen_on_while_playing: bool,

    /// Start automatically once prepared, even if `start` was never called.
    ///
    /// Default: false.
    #[serde(default)]
    pub start_on_prepared: bool,

    /// Label attached to this player's log lines.
    ///
    /// Default: `"player"`.
    #[serde(default = "default_tag")]
    pub tag: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            pending_seek_order: PendingSeekOrder::default(),
            screen_on_while_playing: default_screen_on_while_playing(),
            start_on_prepared: false,
            tag: default_tag(),
        }
    }
}

impl PlayerConfig {
    /// Starts as soon as the media is prepared.
    pub fn autoplay() -> Self {
        Self {
            start_on_prepared: true,
            ..Default::default()
        }
    }

    /// No video output, so the screen is never held on.
    pub fn audio_only() -> Self {
        Self {
            screen_on_while_playing: false,
            tag: "audio".to_string(),
            ..Default::default()
        }
    }

    pub fn with_pending_seek_order(mut self, order: PendingSeekOrder) -> Self {
        self.pending_seek_order = order;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tag.trim().is_empty() {
            return Err("tag must not be empty".to_string());
        }
        Ok(())
    }
}

fn default_screen_on_while_playing() -> bool {
    true
}

fn default_tag() -> String {
    "player".to_string()
}
