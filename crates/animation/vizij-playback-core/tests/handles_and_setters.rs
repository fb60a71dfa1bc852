use vizij_playback_core::{
    ClipId, Config, Handle, HeadlessBackend, PlayMode, PlayOptions, PlaybackError, Scheduler,
};

type Sched = Scheduler<HeadlessBackend>;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn scheduler() -> Sched {
    Scheduler::new(Config::default(), HeadlessBackend::new())
}

#[test]
/// it should invalidate a handle once its slot is reused and ignore setters on it
fn handle_staleness_after_reuse() {
    let mut s = scheduler();
    let a = s.load_clip("a", 2.0);
    let b = s.load_clip("b", 2.0);

    let old = s.play(a, None);
    s.stop(old);
    let new = s.play(b, None);
    assert_eq!(new.slot, old.slot);
    assert_ne!(new.generation, old.generation);
    assert!(!s.is_handle_valid(old));

    s.set_speed(old, 5.0);
    s.set_weight(old, 0.2);
    s.set_time(old, 1.5);
    s.set_progress(old, 0.9);
    s.set_looping(old, true);
    s.pause(old);
    s.fade_weight(old, 0.0, 0.1);

    assert_eq!(s.get_speed(new), 1.0);
    assert_eq!(s.get_weight(new), 1.0);
    assert_eq!(s.get_progress(new), 0.0);
    assert!(s.is_playing(new));
    assert!(!s.state(new).is_some_and(|st| st.is_looping()));

    assert_eq!(s.get_speed(old), 0.0);
    assert_eq!(s.get_weight(old), 0.0);
    assert_eq!(s.get_progress(old), 0.0);
    assert!(!s.is_playing(old));
    assert!(!s.is_paused(old));
    assert!(s.try_state(old).is_err_and(|e| e.is_stale_handle()));
}

#[test]
/// it should treat the invalid handle as stale everywhere
fn invalid_handle_is_inert() {
    let mut s = scheduler();
    let h = Handle::INVALID;
    assert!(!s.is_handle_valid(h));
    s.stop(h);
    s.pause(h);
    s.resume(h);
    s.set_speed(h, 2.0);
    assert_eq!(s.get_progress(h), 0.0);
    assert_eq!(s.loop_count(h), 0);
    assert!(s.resource(h).is_none());
    assert!(s.clip_of(h).is_none());
}

#[test]
/// it should return the invalid handle for unknown clips
fn missing_clip_yields_invalid_handle() {
    let mut s = scheduler();
    let h = s.play(ClipId(999), None);
    assert_eq!(h, Handle::INVALID);
    assert_eq!(s.active_count(), 0);
    assert!(matches!(
        s.try_play(ClipId(999), PlayOptions::default(), None),
        Err(PlaybackError::MissingClip(ClipId(999)))
    ));
    assert_eq!(s.play_with_crossfade(ClipId(999), 0.2, None), Handle::INVALID);
    assert!(s.drain_events().next().is_none());
}

#[test]
/// it should keep weights within [0, 1] under any mix of set/fade/tick
fn weight_bounds() {
    let mut s = scheduler();
    let clip = s.load_clip("long", 100.0);
    let h = s.play_looped(clip, 0, None);

    let check = |s: &Sched| {
        let w = s.get_weight(h);
        assert!((0.0..=1.0).contains(&w), "weight out of range: {w}");
    };

    s.set_weight(h, 1.5);
    check(&s);
    assert_eq!(s.get_weight(h), 1.0);
    s.set_weight(h, -0.3);
    check(&s);
    s.set_weight(h, f32::NAN);
    check(&s);

    s.set_weight(h, 0.4);
    s.fade_weight(h, 3.0, 0.25);
    for _ in 0..10 {
        s.tick(0.07);
        check(&s);
    }
    assert_eq!(s.get_weight(h), 1.0);

    s.fade_weight(h, 0.6, 0.0);
    s.tick(0.0);
    check(&s);
    approx(s.get_weight(h), 0.6, 1e-6);
    assert!(s.is_handle_valid(h));

    s.fade_weight(h, -2.0, 0.5);
    for _ in 0..20 {
        s.tick(0.05);
        check(&s);
    }
    assert!(!s.is_handle_valid(h));
}

#[test]
/// it should apply per-clip speed times global speed exactly once
fn speed_composition_and_pause() {
    let mut s = scheduler();
    let clip = s.load_clip("walk", 4.0);
    let h = s.play(clip, None);

    s.set_speed(h, 0.5);
    s.set_global_speed(2.0);
    assert_eq!(s.get_speed(h), 0.5);
    assert_eq!(s.resource(h).map(|r| r.speed), Some(1.0));

    s.tick(1.0);
    approx(s.get_time(h), 1.0, 1e-6);

    s.pause(h);
    assert!(s.is_paused(h));
    assert!(!s.is_playing(h));
    assert_eq!(s.resource(h).map(|r| r.speed), Some(0.0));
    s.tick(1.0);
    approx(s.get_time(h), 1.0, 1e-6);

    // global changes while paused must not leak through
    s.set_global_speed(3.0);
    assert_eq!(s.resource(h).map(|r| r.speed), Some(0.0));

    s.resume(h);
    assert_eq!(s.resource(h).map(|r| r.speed), Some(1.5));

    s.set_speed(h, -4.0);
    assert_eq!(s.get_speed(h), 0.0);
    s.set_global_speed(-1.0);
    assert_eq!(s.global_speed(), 0.0);
    s.set_global_speed(f32::NAN);
    assert_eq!(s.global_speed(), 0.0);
}

#[test]
/// it should pause and resume every slot at once
fn pause_all_resume_all() {
    let mut s = scheduler();
    let clip = s.load_clip("walk", 4.0);
    let a = s.play_with_mode(clip, PlayMode::Additive, None);
    let b = s.play_with_mode(clip, PlayMode::Additive, None);

    s.pause_all();
    assert!(s.is_paused(a) && s.is_paused(b));
    s.tick(1.0);
    assert_eq!(s.get_time(a), 0.0);

    s.resume_all();
    s.tick(1.0);
    approx(s.get_time(a), 1.0, 1e-6);
    approx(s.get_time(b), 1.0, 1e-6);
}

#[test]
/// it should seek by time and progress, clamped to the clip
fn seek_time_and_progress() {
    let mut s = scheduler();
    let clip = s.load_clip("walk", 2.0);
    let h = s.play(clip, None);

    s.set_progress(h, 0.5);
    approx(s.get_progress(h), 0.5, 1e-6);
    approx(s.get_time(h), 1.0, 1e-6);
    assert_eq!(s.resource(h).map(|r| r.time), Some(1.0));

    s.set_time(h, 10.0);
    approx(s.get_time(h), 2.0, 1e-6);
    s.set_time(h, -1.0);
    approx(s.get_time(h), 0.0, 1e-6);
    s.set_progress(h, 7.0);
    approx(s.get_progress(h), 1.0, 1e-6);
}

#[test]
/// it should turn a one-shot play into a loop with set_looping
fn set_looping_extends_play() {
    let mut s = scheduler();
    let clip = s.load_clip("walk", 1.0);
    let h = s.play(clip, None);
    s.set_looping(h, true);
    s.tick(1.5);
    assert!(s.is_handle_valid(h));
    assert_eq!(s.loop_count(h), 1);
    approx(s.get_progress(h), 0.5, 1e-6);

    s.set_looping(h, false);
    s.tick(0.6);
    assert!(!s.is_handle_valid(h));
}

#[test]
/// it should report progress per handle and zero for stale ones
fn batch_operations() {
    let mut s = scheduler();
    let clip = s.load_clip("walk", 4.0);
    let handles: Vec<Handle> = (0..3)
        .map(|_| s.play_with_mode(clip, PlayMode::Additive, None))
        .collect();
    assert_eq!(s.active_handles(), handles);

    s.batch_set_speed(&handles, 2.0);
    s.tick(1.0);
    s.stop(handles[1]);

    let mut progress = vec![9.0; 7];
    s.batch_get_progress(&handles, &mut progress);
    assert_eq!(progress.len(), 3);
    approx(progress[0], 0.5, 1e-6);
    assert_eq!(progress[1], 0.0);
    approx(progress[2], 0.5, 1e-6);

    let mut live = Vec::new();
    s.active_handles_into(&mut live);
    assert_eq!(live, vec![handles[0], handles[2]]);
}
