//! Integration tests for the player owner loop
//!
//! Each test builds a player with a recording engine and drives the owner loop
//! by hand with `drain()`, so every interleaving is deterministic.

mod common;

use common::{Call, Harness, TestTarget};
use core_playback::event::codes;
use core_playback::{
    Listener, ListenerCategory, PendingSeekOrder, PlaybackError, PlaybackState, Player,
    PlayerBuilder, PlayerConfig, VideoGeometry,
};
use core_runtime::events::PlayerEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_events_apply_in_arrival_order() {
    let mut h = Harness::new(PlayerConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.player
        .on(Listener::buffering_update(move |pct| sink.lock().push(pct)));

    for batch in 0..5u8 {
        for i in 0..10u8 {
            h.engine.post(codes::MEDIA_BUFFERING_UPDATE, (batch * 10 + i) as i64, 0);
        }
        h.drain().await;
    }

    let expected: Vec<u8> = (0..50).collect();
    assert_eq!(*seen.lock(), expected);
}

#[tokio::test]
async fn test_commands_and_events_share_one_order() {
    let mut h = Harness::new(PlayerConfig::default());
    h.player
        .set_data_source_str("https://example.com/video.mp4")
        .unwrap();
    h.player.prepare_async().unwrap();
    h.drain().await;

    // Start is queued before the prepared event arrives, so it only records
    // intent; the prepared event then starts playback.
    h.player.start().unwrap();
    h.engine.post(codes::MEDIA_PREPARED, 0, 0);
    h.drain().await;

    assert_eq!(h.player.state(), PlaybackState::Playing);
    assert_eq!(h.engine.count(&Call::Start), 1);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_events_after_release_are_dropped() {
    let mut h = Harness::new(PlayerConfig::default());
    h.player
        .set_data_source_str("https://example.com/video.mp4")
        .unwrap();
    h.player.prepare_async().unwrap();
    h.drain().await;

    let old = h.player.session().unwrap();
    let mut events = h.player.subscribe();

    // One event already queued, one posted after release.
    h.engine.post(codes::MEDIA_PREPARED, 0, 0);
    h.player.release().unwrap();
    h.engine.post_as(old, codes::MEDIA_PREPARED, 0, 0);
    h.drain().await;

    let snapshot = h.player.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.session.is_none());

    while let Some(event) = events.try_recv() {
        let event = event.unwrap();
        assert!(
            !matches!(event, PlayerEvent::Prepared { .. }),
            "stale prepared event leaked: {event:?}"
        );
    }
}

#[tokio::test]
async fn test_release_twice_is_idempotent() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    h.player.start().unwrap();
    h.drain().await;
    assert_eq!(h.wake_lock.acquired(), 1);

    h.player.release().unwrap();
    h.drain().await;
    h.player.release().unwrap();
    h.drain().await;

    assert_eq!(h.player.state(), PlaybackState::Idle);
    assert_eq!(h.engine.count(&Call::Release), 1);
    assert_eq!(h.wake_lock.released(), 1);
    assert!(h.player.is_released());
}

#[tokio::test]
async fn test_release_reads_idle_before_the_loop_runs() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    h.player.start().unwrap();
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Playing);

    h.player.release().unwrap();
    assert_eq!(h.player.state(), PlaybackState::Idle);
    let snapshot = h.player.snapshot();
    assert_eq!(snapshot.target, PlaybackState::Idle);
    assert!(snapshot.session.is_none());
    assert!(snapshot.data_source.is_none());
    assert!(!snapshot.video.has_size());

    // An event already queued for the old session cannot bring it back.
    h.engine.post(codes::MEDIA_BUFFERING_UPDATE, 50, 0);
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Idle);
    assert_eq!(h.engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_reset_reads_idle_before_the_loop_runs() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    assert_eq!(h.player.state(), PlaybackState::Prepared);

    // Queued under the old session, then superseded by the reset.
    h.player.start().unwrap();
    h.player.reset().unwrap();
    let next = h.player.session();
    assert_eq!(h.player.state(), PlaybackState::Idle);
    assert_eq!(h.player.snapshot().session, next);
    assert_eq!(h.player.watch_snapshot().borrow().state, PlaybackState::Idle);

    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Idle);
    assert_eq!(h.player.snapshot().session, next);
    assert_eq!(h.engine.count(&Call::Start), 0);
    assert_eq!(h.engine.count(&Call::Reset), 1);
}

#[tokio::test]
async fn test_commands_after_release_fail() {
    let mut h = Harness::new(PlayerConfig::default());
    h.player.release().unwrap();
    h.drain().await;

    assert!(matches!(h.player.start(), Err(PlaybackError::PlayerShutDown)));
    assert!(matches!(h.player.seek_to(10), Err(PlaybackError::PlayerShutDown)));
    assert!(matches!(h.player.reset(), Err(PlaybackError::PlayerShutDown)));
}

#[tokio::test]
async fn test_commands_queued_before_release_are_dropped() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;

    h.player.start().unwrap();
    h.player.release().unwrap();
    h.drain().await;

    assert_eq!(h.engine.count(&Call::Start), 0);
    assert_eq!(h.engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_release_clears_listeners() {
    let mut h = Harness::new(PlayerConfig::default());
    h.player.on(Listener::prepared(|| {}));
    h.player.on(Listener::error(|_, _| true));

    h.player.release().unwrap();
    h.drain().await;

    let listeners = h.player.listeners();
    assert!(!listeners.is_registered(ListenerCategory::Prepared));
    assert!(!listeners.is_registered(ListenerCategory::Error));
}

#[tokio::test]
async fn test_reset_starts_fresh_session() {
    let mut h = Harness::new(PlayerConfig::default());
    let (prepared, on_prepared) = counter();
    h.player.on(Listener::prepared(on_prepared));
    h.prepared().await;
    assert_eq!(prepared.load(Ordering::SeqCst), 1);

    let old = h.player.session().unwrap();
    h.player.reset().unwrap();
    let next = h.player.session().unwrap();
    assert!(next > old);

    h.drain().await;
    assert_eq!(h.engine.count(&Call::Reset), 1);
    assert_eq!(h.engine.attach_count(), 2);
    assert_eq!(h.engine.session(), Some(next));
    assert_eq!(h.player.state(), PlaybackState::Idle);

    // The old session can no longer reach the player.
    h.engine.post_as(old, codes::MEDIA_ERROR, 1, 0);
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Idle);

    // Listeners survive a reset.
    h.prepared().await;
    assert_eq!(prepared.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Seeking
// ============================================================================

#[tokio::test]
async fn test_seek_while_preparing_uses_last_target() {
    let mut h = Harness::new(PlayerConfig::default());
    h.player
        .set_data_source_str("https://example.com/video.mp4")
        .unwrap();
    h.player.prepare_async().unwrap();
    h.player.seek_to(1000).unwrap();
    h.player.seek_to(2000).unwrap();
    h.drain().await;
    assert!(h.engine.seeks().is_empty());
    assert_eq!(h.player.snapshot().pending_seek_ms, 2000);

    h.engine.post(codes::MEDIA_PREPARED, 0, 0);
    h.drain().await;

    assert_eq!(h.engine.seeks(), vec![2000]);
    assert_eq!(h.player.snapshot().pending_seek_ms, 0);
}

#[tokio::test]
async fn test_pending_seek_then_start_order() {
    let mut h = Harness::new(PlayerConfig::default());
    h.player
        .set_data_source_str("https://example.com/video.mp4")
        .unwrap();
    h.player.start().unwrap();
    h.player.seek_to(5000).unwrap();
    h.drain().await;
    h.engine.clear();

    h.engine.post(codes::MEDIA_PREPARED, 0, 0);
    h.drain().await;
    assert_eq!(h.engine.calls(), vec![Call::Seek(5000), Call::Start]);
}

#[tokio::test]
async fn test_pending_start_then_seek_order() {
    let mut h = Harness::new(
        PlayerConfig::default().with_pending_seek_order(PendingSeekOrder::StartThenSeek),
    );
    h.player
        .set_data_source_str("https://example.com/video.mp4")
        .unwrap();
    h.player.start().unwrap();
    h.player.seek_to(5000).unwrap();
    h.drain().await;
    h.engine.clear();

    h.engine.post(codes::MEDIA_PREPARED, 0, 0);
    h.drain().await;
    assert_eq!(h.engine.calls(), vec![Call::Start, Call::Seek(5000)]);
    assert_eq!(h.player.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_seek_complete_notifies_both_listeners() {
    let mut h = Harness::new(PlayerConfig::default());
    let (seeks, on_seek) = counter();
    let infos = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    h.player.on(Listener::seek_complete(on_seek));
    h.player.on(Listener::info(move |notice| {
        sink.lock().push((notice.subtype, notice.extra, notice.position_ms));
        true
    }));

    h.engine.post(codes::MEDIA_SEEK_COMPLETE, 3000, 1);
    h.drain().await;

    assert_eq!(seeks.load(Ordering::SeqCst), 1);
    assert_eq!(
        *infos.lock(),
        vec![(codes::MEDIA_INFO_MEDIA_SEEK_REQ_COMPLETE, 1, Some(3000))]
    );
}

// ============================================================================
// Engine notifications
// ============================================================================

#[tokio::test]
async fn test_identical_video_size_still_notifies() {
    let mut h = Harness::new(PlayerConfig::default());
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&sizes);
    h.player
        .on(Listener::video_size_changed(move |g| sink.lock().push(g)));

    h.engine.post(codes::MEDIA_SET_VIDEO_SAR, 1, 1);
    h.engine.post(codes::MEDIA_SET_VIDEO_SIZE, 1920, 1080);
    h.engine.post(codes::MEDIA_SET_VIDEO_SIZE, 1920, 1080);
    h.drain().await;

    let full = VideoGeometry {
        width: 1920,
        height: 1080,
        sar_num: 1,
        sar_den: 1,
    };
    let sizes = sizes.lock();
    assert_eq!(sizes.len(), 3);
    assert_eq!(sizes[1], full);
    assert_eq!(sizes[2], full);
}

#[tokio::test]
async fn test_url_list_accumulation() {
    let mut h = Harness::new(PlayerConfig::default());
    let infos = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    h.player.on(Listener::info(move |notice| {
        let text = notice
            .payload
            .as_ref()
            .and_then(|p| p.as_text())
            .map(str::to_string);
        sink.lock().push((notice.subtype, notice.extra, text));
        true
    }));

    h.engine
        .post_text(codes::MEDIA_INFO, codes::MEDIA_INFO_URL_CHANGE as i64, 200, "A");
    h.drain().await;
    assert!(infos.lock().is_empty());
    assert_eq!(h.player.snapshot().url_list.as_deref(), Some("A"));
    assert_eq!(h.player.snapshot().url_list_status, 200);

    h.engine
        .post_text(codes::MEDIA_INFO, codes::MEDIA_INFO_URL_CHANGE as i64, -1, "B");
    h.drain().await;
    assert_eq!(
        *infos.lock(),
        vec![(codes::MEDIA_INFO_URL_CHANGE, 200, Some("A,B".to_string()))]
    );
}

#[tokio::test]
async fn test_non_terminal_error() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    h.player.start().unwrap();
    h.drain().await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let (completions, on_complete) = counter();
    h.player.on(Listener::error(move |code, extra| {
        sink.lock().push((code, extra));
        true
    }));
    h.player.on(Listener::completion(on_complete));

    h.engine.post(codes::MEDIA_ERROR, -10000, -1);
    h.drain().await;

    assert_eq!(*errors.lock(), vec![(-10000, -1)]);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(h.wake_lock.released(), 0);
    assert_eq!(h.player.state(), PlaybackState::Error);
}

#[tokio::test]
async fn test_terminal_error_completes_and_releases_wake_lock() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    h.player.start().unwrap();
    h.drain().await;

    let (errors, on_error_count) = counter();
    let (completions, on_complete) = counter();
    h.player.on(Listener::error(move |_, _| {
        on_error_count();
        false
    }));
    h.player.on(Listener::completion(on_complete));

    h.engine.post(codes::MEDIA_ERROR, -10000, 0);
    h.drain().await;

    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(h.wake_lock.released(), 1);
}

#[tokio::test]
async fn test_engine_command_failure_reaches_error_listener() {
    let mut h = Harness::new(PlayerConfig::default());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    h.player.on(Listener::error(move |code, extra| {
        sink.lock().push((code, extra));
        true
    }));
    h.prepared().await;

    h.engine.fail_start_with(-1004, -1);
    assert!(h.player.start().is_ok());
    h.drain().await;

    assert_eq!(*errors.lock(), vec![(-1004, -1)]);
    assert_eq!(h.player.state(), PlaybackState::Error);
}

#[tokio::test]
async fn test_completion_from_playing() {
    let mut h = Harness::new(PlayerConfig::default());
    let (completions, on_complete) = counter();
    h.player.on(Listener::completion(on_complete));
    h.prepared().await;
    h.player.start().unwrap();
    h.drain().await;

    h.engine.post(codes::MEDIA_PLAYBACK_COMPLETE, 0, 0);
    h.drain().await;

    assert_eq!(h.player.state(), PlaybackState::Completed);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(h.wake_lock.released(), 1);

    // Starting again from completed replays the media.
    h.player.start().unwrap();
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_start_and_pause_notifications_carry_url() {
    let mut h = Harness::new(PlayerConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.player.on(Listener::start_or_pause(move |playing, url| {
        sink.lock().push((playing, url.to_string()))
    }));
    h.prepared().await;

    h.player.start().unwrap();
    h.player.pause().unwrap();
    h.drain().await;

    let url = "https://example.com/video.mp4".to_string();
    assert_eq!(*seen.lock(), vec![(true, url.clone()), (false, url)]);
}

// ============================================================================
// Render surface
// ============================================================================

#[tokio::test]
async fn test_start_waits_for_matching_surface() {
    let mut h = Harness::new(PlayerConfig::default());
    let target = TestTarget::new(true);
    h.player.bind_render_target(Some(target.clone())).unwrap();
    h.prepared().await;
    h.engine.post(codes::MEDIA_SET_VIDEO_SIZE, 1920, 1080);
    h.drain().await;
    assert_eq!(*target.video_size.lock(), Some((1920, 1080)));

    h.player.start().unwrap();
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Prepared);
    assert_eq!(h.player.snapshot().target, PlaybackState::Playing);

    target.create_surface(11);
    target.resize(1280, 720);
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Prepared);
    assert_eq!(h.engine.count(&Call::SetSurface(Some(11))), 1);
    assert_eq!(h.wake_lock.acquired(), 0);

    target.resize(1920, 1080);
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Playing);
    assert_eq!(h.wake_lock.acquired(), 1);
    assert_eq!(h.engine.count(&Call::Start), 1);
    assert!(target.keep_screen_on.load(Ordering::SeqCst));

    // A further matching resize does not start twice.
    target.resize(1920, 1080);
    h.drain().await;
    assert_eq!(h.wake_lock.acquired(), 1);
    assert_eq!(h.engine.count(&Call::Start), 1);
}

#[tokio::test]
async fn test_target_without_size_match_starts_immediately() {
    let mut h = Harness::new(PlayerConfig::default());
    let target = TestTarget::new(false);
    h.player.bind_render_target(Some(target.clone())).unwrap();
    h.prepared().await;
    h.engine.post(codes::MEDIA_SET_VIDEO_SIZE, 1920, 1080);
    h.player.start().unwrap();
    h.drain().await;

    assert_eq!(h.player.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_surface_destroy_keeps_session() {
    let mut h = Harness::new(PlayerConfig::default());
    let target = TestTarget::new(false);
    h.player.bind_render_target(Some(target.clone())).unwrap();
    target.create_surface(5);
    h.prepared().await;
    h.player.start().unwrap();
    h.drain().await;

    target.destroy_surface();
    h.drain().await;

    assert_eq!(h.player.state(), PlaybackState::Playing);
    assert_eq!(h.engine.count(&Call::Stop), 0);
    assert_eq!(h.engine.calls().last(), Some(&Call::SetSurface(None)));

    target.create_surface(6);
    h.drain().await;
    assert_eq!(h.engine.calls().last(), Some(&Call::SetSurface(Some(6))));
}

#[tokio::test]
async fn test_rebinding_never_duplicates_callbacks() {
    let mut h = Harness::new(PlayerConfig::default());
    let first = TestTarget::new(true);
    let second = TestTarget::new(true);

    h.player.bind_render_target(Some(first.clone())).unwrap();
    h.player.bind_render_target(Some(first.clone())).unwrap();
    h.drain().await;
    assert_eq!(first.subscribers(), 1);

    h.player.bind_render_target(Some(second.clone())).unwrap();
    h.player.bind_render_target(Some(first.clone())).unwrap();
    h.drain().await;
    assert_eq!(first.subscribers(), 1);
    assert_eq!(second.subscribers(), 0);
}

#[tokio::test]
async fn test_late_binding_receives_existing_surface() {
    let mut h = Harness::new(PlayerConfig::default());
    let target = TestTarget::new(true);
    target.create_surface(9);
    target.resize(640, 360);

    h.player.bind_render_target(Some(target.clone())).unwrap();
    h.drain().await;

    assert_eq!(h.engine.count(&Call::SetSurface(Some(9))), 1);

    h.prepared().await;
    h.engine.post(codes::MEDIA_SET_VIDEO_SIZE, 640, 360);
    h.player.start().unwrap();
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_callbacks_from_unbound_target_are_ignored() {
    let mut h = Harness::new(PlayerConfig::default());
    let old = TestTarget::new(true);
    let current = TestTarget::new(true);
    h.player.bind_render_target(Some(old.clone())).unwrap();
    h.drain().await;
    h.player.bind_render_target(Some(current.clone())).unwrap();
    h.drain().await;

    // The old target no longer holds the forwarder, so nothing reaches the engine.
    old.create_surface(3);
    h.drain().await;
    assert_eq!(h.engine.count(&Call::SetSurface(Some(3))), 0);
}

// ============================================================================
// Command validation and pass-through
// ============================================================================

#[tokio::test]
async fn test_invalid_arguments_fail_synchronously() {
    let mut h = Harness::new(PlayerConfig::default());

    assert!(matches!(
        h.player.set_data_source_str("   "),
        Err(PlaybackError::EmptyDataSource)
    ));
    assert!(matches!(
        h.player.set_data_source_manifest("not json"),
        Err(PlaybackError::InvalidManifest(_))
    ));
    assert!(matches!(
        h.player.set_volume(1.5, 0.5),
        Err(PlaybackError::InvalidVolume(v)) if v == 1.5
    ));
    assert!(matches!(
        h.player.set_speed(0.0),
        Err(PlaybackError::InvalidSpeed(_))
    ));
    assert!(matches!(
        h.player.set_speed(f32::NAN),
        Err(PlaybackError::InvalidSpeed(_))
    ));
    assert!(matches!(
        h.player.seek_to(-1),
        Err(PlaybackError::InvalidArgument(_))
    ));

    h.drain().await;
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn test_commands_in_forbidden_state_are_noops() {
    let mut h = Harness::new(PlayerConfig::default());
    assert!(h.player.pause().is_ok());
    assert!(h.player.stop().is_ok());
    assert!(h.player.set_speed(2.0).is_ok());
    h.drain().await;

    assert_eq!(h.player.state(), PlaybackState::Idle);
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn test_data_source_headers_and_manifest() {
    let mut h = Harness::new(PlayerConfig::default());
    let source = bridge_traits::engine::DataSource::uri("https://example.com/a.m3u8")
        .with_header("User-Agent", "player")
        .with_header("Cookie", "k=v");
    h.player.set_data_source(source).unwrap();
    h.drain().await;

    assert_eq!(
        h.engine.calls(),
        vec![
            Call::SetHeaders("Cookie:k=v\r\nUser-Agent:player\r\n".to_string()),
            Call::SetDataSource("https://example.com/a.m3u8".to_string()),
        ]
    );

    h.player.reset().unwrap();
    h.drain().await;
    h.engine.clear();

    h.player
        .set_data_source_str(r#"{"adaptationSet":[]}"#)
        .unwrap();
    h.drain().await;
    assert_eq!(
        h.engine.calls(),
        vec![Call::SetManifest(r#"{"adaptationSet":[]}"#.to_string())]
    );
}

#[tokio::test]
async fn test_pass_through_commands() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    h.engine.clear();

    h.player.set_volume(0.25, 0.75).unwrap();
    h.player.set_looping(true).unwrap();
    h.player.set_speed(1.5).unwrap();
    h.drain().await;

    assert_eq!(
        h.engine.calls(),
        vec![Call::Volume(0.25, 0.75), Call::Looping(true), Call::Speed(1.5)]
    );
}

#[tokio::test]
async fn test_stop_then_prepare_again() {
    let mut h = Harness::new(PlayerConfig::default());
    h.prepared().await;
    h.player.start().unwrap();
    h.player.stop().unwrap();
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Idle);
    assert_eq!(h.wake_lock.released(), 1);

    h.player.prepare_async().unwrap();
    h.drain().await;
    assert_eq!(h.player.state(), PlaybackState::Preparing);
    assert_eq!(h.engine.count(&Call::Prepare), 2);
}

// ============================================================================
// Event bus and snapshots
// ============================================================================

#[tokio::test]
async fn test_event_bus_mirrors_notifications() {
    let mut h = Harness::new(PlayerConfig::default());
    let mut events = h.player.subscribe();
    let session = h.player.session().unwrap().as_raw();

    h.prepared().await;

    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event.unwrap());
    }
    assert!(seen.contains(&PlayerEvent::Prepared { session }));
    assert!(seen.contains(&PlayerEvent::StateChanged {
        session,
        from: "idle".to_string(),
        to: "preparing".to_string(),
    }));
    assert!(seen.contains(&PlayerEvent::StateChanged {
        session,
        from: "preparing".to_string(),
        to: "prepared".to_string(),
    }));
}

#[tokio::test]
async fn test_release_emits_released_event() {
    let mut h = Harness::new(PlayerConfig::default());
    let session = h.player.session().unwrap().as_raw();
    let mut events = h
        .player
        .subscribe()
        .filter(|e| matches!(e, PlayerEvent::Released { .. }));

    h.player.release().unwrap();
    h.drain().await;

    assert_eq!(
        events.try_recv().map(|e| e.unwrap()),
        Some(PlayerEvent::Released { session })
    );
}

#[tokio::test]
async fn test_spawned_loop_and_flush() {
    let engine = Arc::new(common::RecordingEngine::default());
    let player = Player::spawn(
        PlayerBuilder::new()
            .runtime(common::runtime())
            .engine(engine.clone())
            .config(PlayerConfig::autoplay()),
    )
    .unwrap();

    player
        .set_data_source_str("https://example.com/video.mp4")
        .unwrap();
    player.prepare_async().unwrap();
    player.flush().await;
    assert_eq!(player.state(), PlaybackState::Preparing);

    // The re-queued start is processed in the same drain as the flush.
    engine.post(codes::MEDIA_PREPARED, 0, 0);
    player.flush().await;
    assert_eq!(player.state(), PlaybackState::Playing);

    player.release().unwrap();
    player.flush().await;
    assert_eq!(engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_build_requires_runtime_and_engine() {
    let missing_runtime = PlayerBuilder::new()
        .engine(Arc::new(common::RecordingEngine::default()))
        .build();
    assert!(matches!(missing_runtime, Err(PlaybackError::Runtime(_))));

    let missing_engine = PlayerBuilder::new().runtime(common::runtime()).build();
    assert!(matches!(missing_engine, Err(PlaybackError::Runtime(_))));
}
