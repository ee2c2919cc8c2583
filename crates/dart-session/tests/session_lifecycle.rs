use std::sync::Arc;
use std::time::Duration;

use analysis::{trajectory_length, ScoringTable};
use crossbeam_channel::Receiver;
use dart_ingest_core::RawSample;
use dart_session::*;
use model::{AcceptReason, EndReason, ScoringZone, Vec3, Verdict};
use parking_lot::{Mutex, RwLock};

struct Harness {
    session: Session,
    events: Receiver<EngineEvent>,
    history: SharedHistory,
}

fn harness(config: EngineConfig, calibration: StaticCalibration) -> Harness {
    let (tx, rx) = crossbeam_channel::unbounded();
    let history: SharedHistory = Arc::new(Mutex::new(RoundHistory::new()));
    let session = Session::new(config)
        .with_calibration(calibration)
        .with_events(tx)
        .with_history(history.clone());
    Harness { session, events: rx, history }
}

/// Pre-filter off and a very high cutoff so smoothed points sit on the raw ones.
fn transparent_config() -> EngineConfig {
    let mut c = EngineConfig::default();
    c.validator.set_low_pass_alpha(1.0).unwrap();
    c.validator.set_initial_point_max_distance(50.0).unwrap();
    c.filter.set_min_cutoff(1.0e6).unwrap();
    c
}

fn x(d: f64, t: f64) -> RawSample {
    RawSample::at(d, 0.0, 0.0, t)
}

/// Feeds one short receding throw starting at `now` and returns when it was last fed.
fn feed_throw(s: &mut Session, now: f64) -> f64 {
    for (i, d) in [5.0, 8.0, 12.0].into_iter().enumerate() {
        let t = now + i as f64 * 0.1;
        s.add_sample(&x(d, t), t).unwrap();
    }
    now + 0.2
}

#[test]
fn end_to_end_single_throw_auto_stops() {
    let center = Vec3::new(12.0, 3.0, 0.0);
    let mut h = harness(transparent_config(), StaticCalibration::centered(center));
    h.session.start_round("Alice", 0.0).unwrap();

    let last = feed_throw(&mut h.session, 0.0);
    assert!(h.session.is_throw_active());
    assert!(h.session.tick(last + 2.9).is_none());

    let summary = h.session.tick(last + 3.1).expect("auto-stop should fire");
    assert!(!h.session.is_throw_active());
    assert_eq!(summary.end_reason, EndReason::AutoStop);
    assert_eq!(summary.zone, "Bullseye");
    assert!((summary.closest_distance - 3.0).abs() < 1e-3);

    let round = h.session.current_round().unwrap();
    let throw = &round.throws[0];
    assert_eq!(throw.samples.len(), 3);
    assert!(throw.samples.iter().all(|r| r.verdict.is_accepted()));
    let path: Vec<Vec3> = throw
        .samples
        .iter()
        .filter_map(|r| r.smoothed.map(|s| s.position()))
        .collect();
    assert_eq!(throw.trajectory_distance, trajectory_length(&path));
    assert!((throw.trajectory_distance - 7.0).abs() < 1e-2);
    assert_eq!(
        throw.score,
        throw.zone_points + throw.trajectory_distance.round() as u32
    );
    assert_eq!(throw.score, 107);
}

#[test]
fn round_closes_after_three_throws_of_any_kind() {
    let mut h = harness(
        transparent_config(),
        StaticCalibration::centered(Vec3::new(12.0, 3.0, 0.0)),
    );
    h.session.start_round("alice", 0.0).unwrap();

    let last = feed_throw(&mut h.session, 0.0);
    h.session.tick(last + 3.5).unwrap();
    assert_eq!(h.session.throws_in_current_round(), 1);

    let last = feed_throw(&mut h.session, 10.0);
    h.session.force_end_throw(last + 0.5).unwrap();
    assert_eq!(h.session.throws_in_current_round(), 2);
    assert_eq!(h.session.state(), RoundState::InProgress);

    let last = feed_throw(&mut h.session, 20.0);
    h.session.end_throw(last + 0.5).unwrap();

    assert_eq!(h.session.state(), RoundState::WaitingForPlayer);
    let round = h.session.last_round().unwrap().clone();
    assert_eq!(round.throws.len(), 3);
    let reasons: Vec<EndReason> = round.throws.iter().map(|t| t.end_reason).collect();
    assert_eq!(reasons, vec![EndReason::AutoStop, EndReason::Forced, EndReason::Stopped]);
    assert_eq!(round.total_score, round.throws.iter().map(|t| t.score).sum::<u32>());

    assert_eq!(h.history.lock().rounds(), &[round.clone()]);
    let completed: Vec<EngineEvent> = h
        .events
        .try_iter()
        .filter(|e| !matches!(e, EngineEvent::Position(_)))
        .collect();
    assert_eq!(completed.len(), 4);
    assert_eq!(completed.last(), Some(&EngineEvent::RoundCompleted(round)));
}

#[test]
fn samples_without_round_go_to_preview_only() {
    let mut h = harness(EngineConfig::default(), StaticCalibration::centered(Vec3::ORIGIN));
    h.session.add_sample(&x(500.0, 0.0), 0.0).unwrap();
    assert!(!h.session.is_throw_active());
    match h.events.try_recv() {
        Ok(EngineEvent::Position(p)) => {
            assert_eq!(p.kind, PositionKind::Preview);
            assert_eq!(p.position, Vec3::new(500.0, 0.0, 0.0));
        }
        other => panic!("expected preview, got {other:?}"),
    }
}

#[test]
fn incomplete_sample_is_ignored_entirely() {
    let mut h = harness(EngineConfig::default(), StaticCalibration::centered(Vec3::ORIGIN));
    h.session.start_round("alice", 0.0).unwrap();
    let raw = RawSample { z: None, ..x(1.0, 0.0) };
    h.session.add_sample(&raw, 0.0).unwrap();
    assert!(!h.session.is_throw_active());
    assert!(h.events.try_recv().is_err());

    h.session.add_sample(&x(1.0, 0.0), 0.0).unwrap();
    let deadline = h.session.next_deadline();
    h.session.add_sample(&raw, 2.0).unwrap();
    assert_eq!(h.session.next_deadline(), deadline);
}

#[test]
fn start_round_validates() {
    let mut s = Session::new(EngineConfig::default());
    assert!(matches!(s.start_round("  ", 0.0), Err(SessionError::EmptyPlayerName)));
    s.start_round("bob", 0.0).unwrap();
    assert!(matches!(
        s.start_round("carol", 1.0),
        Err(SessionError::RoundInProgress(p)) if p == "bob"
    ));
    assert_eq!(s.current_round().map(|r| r.round_number), Some(1));
}

#[test]
fn idle_stops_are_no_ops() {
    let mut s = Session::new(EngineConfig::default());
    assert!(s.end_throw(1.0).is_none());
    assert!(s.force_end_throw(1.0).is_none());
    assert!(s.force_end_round(1.0).is_none());
    assert!(s.tick(100.0).is_none());
    s.start_round("bob", 0.0).unwrap();
    assert!(s.end_throw(1.0).is_none());
    assert_eq!(s.throws_in_current_round(), 0);
}

#[test]
fn force_end_round_keeps_partial_throws() {
    let mut h = harness(
        transparent_config(),
        StaticCalibration::centered(Vec3::new(12.0, 3.0, 0.0)),
    );
    h.session.start_round("alice", 0.0).unwrap();
    let last = feed_throw(&mut h.session, 0.0);
    h.session.force_end_throw(last).unwrap();
    feed_throw(&mut h.session, 5.0);

    let round = h.session.force_end_round(6.0).unwrap();
    assert_eq!(round.throws.len(), 2);
    assert_eq!(round.total_score, round.throws[0].score + round.throws[1].score);
    assert_eq!(h.session.state(), RoundState::WaitingForPlayer);
    assert_eq!(h.history.lock().rounds().len(), 1);
}

#[test]
fn force_end_round_on_final_throw_returns_that_round() {
    let mut config = transparent_config();
    config.lifecycle.set_max_throws_per_round(1).unwrap();
    let mut h = harness(config, StaticCalibration::centered(Vec3::ORIGIN));
    h.session.start_round("alice", 0.0).unwrap();
    feed_throw(&mut h.session, 0.0);
    let round = h.session.force_end_round(1.0).unwrap();
    assert_eq!(round.throws.len(), 1);
    assert_eq!(h.history.lock().rounds().len(), 1);
}

#[test]
fn missing_center_fails_the_sample_not_the_throw() {
    let mut h = harness(transparent_config(), StaticCalibration::default());
    h.session.start_round("alice", 0.0).unwrap();
    let err = h.session.add_sample(&x(5.0, 0.0), 0.0);
    assert!(matches!(err, Err(SessionError::TargetCenterUnavailable)));
    assert!(h.session.is_throw_active());
    assert_eq!(h.session.active_throw().map(|t| t.records().len()), Some(1));

    let summary = h.session.force_end_throw(1.0).unwrap();
    assert_eq!(summary.zone, "Miss");
    assert_eq!(summary.closest_point, None);
}

#[test]
fn calibration_scale_rescales_zones() {
    let zones = ScoringTable::new(vec![
        ScoringZone::new("hit", 1.0, 100, "#f00"),
        ScoringZone::new("miss", f64::INFINITY, 10, "#000"),
    ])
    .unwrap();
    let mut config = transparent_config();
    config.zones = zones;

    let calibration: SharedCalibration =
        Arc::new(RwLock::new(StaticCalibration::new(Vec3::new(1.5, 0.0, 0.0), 2.0)));
    let mut s = Session::new(config).with_calibration(calibration.clone());
    s.start_round("alice", 0.0).unwrap();

    s.add_sample(&x(0.0, 0.0), 0.0).unwrap();
    let hit = s.force_end_throw(0.5).unwrap();
    assert_eq!(hit.zone, "hit");
    assert_eq!(hit.score, 100);

    calibration.write().scale = None;
    s.add_sample(&x(0.0, 1.0), 1.0).unwrap();
    let miss = s.force_end_throw(1.5).unwrap();
    assert_eq!(miss.zone, "miss");
    assert_eq!(miss.score, 10);
    assert_eq!(miss.zone_color.as_deref(), Some("#000"));
}

#[test]
fn live_stream_keeps_throw_open() {
    let mut config = EngineConfig::default();
    config.validator.set_enabled(false);
    let mut s = Session::new(config).with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    s.start_round("alice", 0.0).unwrap();
    for i in 0..20 {
        let now = i as f64 * 2.0;
        s.add_sample(&x(1.0, now), now).unwrap();
        assert!(s.tick(now + 1.9).is_none());
    }
    assert!(s.is_throw_active());
    assert!(s.tick(38.0 + 3.0).is_some());
}

#[test]
fn rejected_samples_still_count_as_liveness() {
    let mut s = Session::new(transparent_config())
        .with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    s.start_round("alice", 0.0).unwrap();
    s.add_sample(&x(5.0, 0.0), 0.0).unwrap();
    // back toward the origin: tolerated five times, then rejected
    for i in 1..=10 {
        let now = i as f64;
        s.add_sample(&x(1.0, now), now).unwrap();
    }
    let throw = s.active_throw().unwrap();
    assert_eq!(throw.records().iter().filter(|r| !r.verdict.is_accepted()).count(), 5);
    assert_eq!(s.next_deadline(), Some(13.0));
}

#[test]
fn overdue_auto_stop_fires_before_late_sample() {
    let mut s = Session::new(transparent_config())
        .with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    s.start_round("alice", 0.0).unwrap();
    s.add_sample(&x(5.0, 0.0), 0.0).unwrap();
    s.add_sample(&x(8.0, 1.5), 1.5).unwrap();
    assert_eq!(s.next_deadline(), Some(4.5));

    // no tick between the deadline and this sample
    s.add_sample(&x(5.0, 10.0), 10.0).unwrap();

    let round = s.current_round().unwrap();
    assert_eq!(round.throws.len(), 1);
    assert_eq!(round.throws[0].end_reason, EndReason::AutoStop);
    assert_eq!(round.throws[0].samples.len(), 2);
    let next = s.active_throw().unwrap();
    assert_eq!(next.throw_number(), 2);
    assert_eq!(next.records().len(), 1);
    assert_eq!(s.next_deadline(), Some(13.0));
}

#[test]
fn overdue_final_throw_sends_late_sample_to_preview() {
    let mut config = transparent_config();
    config.lifecycle.set_max_throws_per_round(1).unwrap();
    let mut h = harness(config, StaticCalibration::centered(Vec3::ORIGIN));
    h.session.start_round("alice", 0.0).unwrap();
    h.session.add_sample(&x(5.0, 0.0), 0.0).unwrap();

    h.session.add_sample(&x(5.0, 10.0), 10.0).unwrap();

    assert_eq!(h.session.state(), RoundState::WaitingForPlayer);
    assert!(!h.session.is_throw_active());
    assert_eq!(h.history.lock().rounds().len(), 1);
    let last = h.events.try_iter().last();
    assert!(matches!(
        last,
        Some(EngineEvent::Position(PositionUpdate { kind: PositionKind::Preview, .. }))
    ));
}

#[test]
fn early_auto_stop_waits_for_min_duration() {
    let mut config = transparent_config();
    config.lifecycle.set_auto_stop_delay(Duration::from_millis(200)).unwrap();
    let mut s = Session::new(config).with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    s.start_round("alice", 0.0).unwrap();
    s.add_sample(&x(5.0, 0.0), 0.0).unwrap();

    assert!(s.tick(0.25).is_none());
    assert!(s.is_throw_active());
    let deadline = s.next_deadline().unwrap();
    assert!(deadline > 1.0);
    let summary = s.tick(deadline + 0.01).unwrap();
    assert_eq!(summary.end_reason, EndReason::AutoStop);
}

#[test]
fn lowering_throw_limit_applies_to_open_round() {
    let mut s = Session::new(transparent_config())
        .with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    s.start_round("alice", 0.0).unwrap();
    let last = feed_throw(&mut s, 0.0);
    s.force_end_throw(last).unwrap();
    s.config_mut().lifecycle.set_max_throws_per_round(2).unwrap();
    let last = feed_throw(&mut s, 5.0);
    s.force_end_throw(last).unwrap();
    assert_eq!(s.state(), RoundState::WaitingForPlayer);
    assert_eq!(s.last_round().map(|r| r.throws.len()), Some(2));
}

#[test]
fn duplicate_timestamp_still_goes_through_validator() {
    let mut s = Session::new(transparent_config())
        .with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    s.start_round("alice", 0.0).unwrap();
    s.add_sample(&x(5.0, 0.0), 0.0).unwrap();
    s.add_sample(&x(8.0, 0.1), 0.1).unwrap();
    s.add_sample(&x(9.0, 0.1), 0.2).unwrap();

    let records = s.active_throw().unwrap().records();
    assert!(matches!(
        records[2].verdict,
        Verdict::Accepted(AcceptReason::DistanceIncreased { .. })
    ));
    assert_eq!(records[2].smoothed.map(|p| p.x), records[1].smoothed.map(|p| p.x));
}

#[test]
fn next_round_numbers_continue() {
    let mut config = transparent_config();
    config.lifecycle.set_max_throws_per_round(1).unwrap();
    let mut s = Session::new(config).with_calibration(StaticCalibration::centered(Vec3::ORIGIN));
    for (i, player) in ["alice", "bob"].into_iter().enumerate() {
        let start = i as f64 * 10.0;
        s.start_round(player, start).unwrap();
        let last = feed_throw(&mut s, start);
        s.end_throw(last).unwrap();
        assert_eq!(s.last_round().map(|r| r.round_number), Some(i as u32 + 1));
        assert_eq!(s.last_round().map(|r| r.player.as_str()), Some(player));
    }
}
