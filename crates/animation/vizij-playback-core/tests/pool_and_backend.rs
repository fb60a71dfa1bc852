use vizij_playback_core::{
    Config, HeadlessBackend, PlayMode, PlayOptions, PlaybackError, PlaybackEvent, Scheduler,
};

type Sched = Scheduler<HeadlessBackend>;

fn scheduler() -> Sched {
    Scheduler::new(Config::default(), HeadlessBackend::new())
}

#[test]
/// it should keep at most pool_capacity_per_clip idle resources per clip
fn pool_capacity_is_respected() {
    let mut s = scheduler();
    let clip = s.load_clip("wave", 1.0);
    for _ in 0..6 {
        s.play_with_mode(clip, PlayMode::Additive, None);
    }
    assert_eq!(s.backend().created, 6);
    assert_eq!(s.pool().stats().outstanding, 6);

    s.stop_all();
    assert_eq!(s.pool().pooled(clip), 4);
    assert_eq!(s.backend().destroyed, 2);
    assert_eq!(s.backend().live_resources(), 4);
    assert_eq!(s.backend().attached_count(), 0);

    let h = s.play(clip, None);
    assert_eq!(s.backend().created, 6);
    assert_eq!(s.pool().stats().reused, 1);
    assert_eq!(s.pool().pooled(clip), 3);
    let r = s.resource(h).expect("attached resource");
    assert_eq!(r.time, 0.0);
    assert!(!r.done);
    assert_eq!(r.duration, 1.0);
}

#[test]
/// it should never hand the same resource to two live slots
fn resources_are_not_shared() {
    let mut s = scheduler();
    let clip = s.load_clip("wave", 1.0);
    s.prewarm_clip(clip, 2);
    let a = s.play_with_mode(clip, PlayMode::Additive, None);
    let b = s.play_with_mode(clip, PlayMode::Additive, None);
    let c = s.play_with_mode(clip, PlayMode::Additive, None);
    let serials: Vec<u64> = [a, b, c]
        .iter()
        .map(|h| s.resource(*h).map(|r| r.serial).unwrap_or(u64::MAX))
        .collect();
    assert_ne!(serials[0], serials[1]);
    assert_ne!(serials[1], serials[2]);
    assert_ne!(serials[0], serials[2]);
    assert_eq!(s.pool().pooled(clip), 0);
}

#[test]
/// it should prewarm only up to the clip's free pool capacity
fn prewarm_is_bounded() {
    let mut s = scheduler();
    let clip = s.load_clip("nod", 0.8);
    assert_eq!(s.prewarm_clip(clip, 10), 4);
    assert_eq!(s.prewarm_clip(clip, 10), 0);
    assert_eq!(s.backend().created, 4);

    let h = s.play(clip, None);
    assert!(s.is_handle_valid(h));
    assert_eq!(s.backend().created, 4);
    assert_eq!(s.prewarm_clip(clip, 10), 1);

    let unknown = vizij_playback_core::ClipId(404);
    assert_eq!(s.prewarm_clip(unknown, 3), 0);
}

#[test]
/// it should suspend the backend after the idle threshold and resume on play
fn idle_suspend_and_resume() {
    let mut s = scheduler();
    let clip = s.load_clip("blink", 0.2);
    s.play(clip, None);

    s.tick(0.3);
    assert_eq!(s.active_count(), 0);
    assert!(!s.is_backend_suspended());
    s.tick(0.3);
    assert!(s.is_backend_suspended());
    assert!(s.backend().is_suspended());
    s.tick(1.0);
    assert_eq!(s.backend().suspend_calls, 1);

    let h = s.play(clip, None);
    assert!(s.is_handle_valid(h));
    assert!(!s.is_backend_suspended());
    assert_eq!(s.backend().resume_calls, 1);
    s.tick(0.1);
    assert!(!s.backend().is_suspended());
}

#[test]
/// it should keep advancing a slot whose backend resource was invalidated
fn invalidated_resource_is_tolerated() {
    let mut s = scheduler();
    let clip = s.load_clip("shrug", 1.2);
    let other = s.load_clip("wave", 1.5);
    let h = s.play(clip, None);
    let serial = s.resource(h).map(|r| r.serial).expect("resource");
    assert!(s.backend_mut().invalidate(serial));

    s.tick(0.6);
    assert!((s.get_progress(h) - 0.5).abs() < 1e-6);
    s.set_speed(h, 2.0);
    s.set_weight(h, 0.5);
    s.set_time(h, 0.1);
    s.pause(h);
    s.resume(h);

    s.stop(h);
    assert!(!s.is_handle_valid(h));
    assert_eq!(s.pool().pooled(clip), 0);
    assert_eq!(s.backend().live_resources(), 0);

    let next = s.play(other, None);
    assert_eq!(next.slot, h.slot);
    let attached = s.backend().attachment(next.slot as usize).expect("attached");
    assert_eq!(attached.clip, other);
    assert_eq!(attached.weight, 1.0);
}

#[test]
/// it should refuse plays on a full table when eviction is disabled
fn no_free_slot_without_eviction() {
    let cfg = Config {
        max_slots: 2,
        evict_when_full: false,
        ..Config::default()
    };
    let mut s = Scheduler::try_new(cfg, HeadlessBackend::new()).expect("valid config");
    let clip = s.load_clip("wave", 1.0);
    s.play_with_mode(clip, PlayMode::Additive, None);
    s.play_with_mode(clip, PlayMode::Additive, None);
    let third = s.play_with_mode(clip, PlayMode::Additive, None);
    assert!(!s.is_handle_valid(third));
    assert_eq!(s.active_count(), 2);
    assert!(matches!(
        s.try_play(clip, PlayOptions::default().with_mode(PlayMode::Additive), None),
        Err(PlaybackError::NoFreeSlot { capacity: 2 })
    ));
    assert_eq!(s.pool().stats().outstanding, 2);
}

#[test]
/// it should release everything as interrupted and free pooled resources on shutdown
fn shutdown_releases_everything() {
    let mut s = scheduler();
    let clip = s.load_clip("wave", 1.0);
    for _ in 0..3 {
        s.play_with_mode(clip, PlayMode::Additive, None);
    }
    s.play_with_mode(clip, PlayMode::Queue, None);
    assert_eq!(s.queued_len(), 1);
    s.drain_events().for_each(drop);

    s.shutdown();
    assert_eq!(s.active_count(), 0);
    assert_eq!(s.queued_len(), 0);
    assert_eq!(s.pool().pooled(clip), 0);
    assert_eq!(s.backend().live_resources(), 0);
    assert_eq!(s.backend().attached_count(), 0);
    let interrupted = s
        .drain_events()
        .filter(|e| matches!(e, PlaybackEvent::Interrupted { .. }))
        .count();
    assert_eq!(interrupted, 3);

    let h = s.play(clip, None);
    assert!(s.is_handle_valid(h));
}

#[test]
/// it should reject invalid configs in try_new and fall back to defaults in new
fn config_validation() {
    let bad = Config {
        max_slots: 0,
        ..Config::default()
    };
    assert!(matches!(
        Scheduler::try_new(bad.clone(), HeadlessBackend::new()),
        Err(PlaybackError::InvalidConfig { .. })
    ));
    let s = Scheduler::new(bad, HeadlessBackend::new());
    assert_eq!(s.capacity(), 8);
    assert_eq!(s.config(), &Config::default());
}
