use dart_ingest_core::RawSample;
use model::*;
use tracing::{debug, info, warn};

use crate::calibration::{resolve_scale, CalibrationProvider, StaticCalibration};
use crate::config::EngineConfig;
use crate::sink::*;
use crate::throw::{SampleOutcome, ThrowTracker, TimerCheck};
use crate::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    WaitingForPlayer,
    InProgress,
}

/// Folds the live sample feed into throws and rounds.
///
/// Everything happens synchronously on the caller's thread. `now` is the
/// caller's clock in seconds; it drives the auto-stop timer and throw
/// durations, while sample timestamps drive the smoothing filter.
pub struct Session {
    config: EngineConfig,
    calibration: Box<dyn CalibrationProvider>,
    events: Box<dyn EventSink>,
    history: Box<dyn HistorySink>,
    round: Option<Round>,
    throw: Option<ThrowTracker>,
    last_round: Option<Round>,
    rounds_started: u32,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            calibration: Box::new(StaticCalibration::default()),
            events: Box::new(()),
            history: Box::new(()),
            round: None,
            throw: None,
            last_round: None,
            rounds_started: 0,
        }
    }

    pub fn with_calibration(mut self, c: impl CalibrationProvider + 'static) -> Self {
        self.calibration = Box::new(c);
        self
    }

    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Box::new(sink);
        self
    }

    pub fn with_history(mut self, sink: impl HistorySink + 'static) -> Self {
        self.history = Box::new(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn state(&self) -> RoundState {
        if self.round.is_some() {
            RoundState::InProgress
        } else {
            RoundState::WaitingForPlayer
        }
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Most recently finalized round.
    pub fn last_round(&self) -> Option<&Round> {
        self.last_round.as_ref()
    }

    pub fn active_throw(&self) -> Option<&ThrowTracker> {
        self.throw.as_ref()
    }

    pub fn is_throw_active(&self) -> bool {
        self.throw.is_some()
    }

    pub fn throws_in_current_round(&self) -> u32 {
        self.round.as_ref().map(|r| r.throws.len() as u32).unwrap_or(0)
    }

    /// When the pending auto-stop is due, if a throw is active.
    pub fn next_deadline(&self) -> Option<f64> {
        self.throw.as_ref().and_then(|t| t.auto_stop_deadline())
    }

    pub fn start_round(&mut self, player: &str, now: f64) -> Result<(), SessionError> {
        let player = player.trim();
        if player.is_empty() {
            return Err(SessionError::EmptyPlayerName);
        }
        if let Some(r) = &self.round {
            return Err(SessionError::RoundInProgress(r.player.clone()));
        }
        self.rounds_started += 1;
        info!(player, round = self.rounds_started, "round started");
        self.round = Some(Round::new(player, self.rounds_started, now));
        Ok(())
    }

    /// Handles one sample from the feed.
    ///
    /// Samples missing a coordinate are dropped. A pending auto-stop that is
    /// already due fires before the sample is handled, so a late sample
    /// starts the next throw. Without an open round the sample only goes to
    /// the preview. Errors only when an accepted sample cannot be measured
    /// because the target center is unknown; the throw carries on.
    pub fn add_sample(&mut self, raw: &RawSample, now: f64) -> Result<(), SessionError> {
        let Some(sample) = raw.complete(now) else {
            debug!(?raw, "dropping incomplete sample");
            return Ok(());
        };

        // a deadline that passed before this sample ends the throw first
        self.tick(now);

        let Some(round) = &self.round else {
            self.events.emit(EngineEvent::Position(PositionUpdate {
                kind: PositionKind::Preview,
                position: sample.position(),
                timestamp: sample.timestamp,
            }));
            return Ok(());
        };

        let center = self.calibration.target_center();
        let config = &self.config;
        let tracker = self.throw.get_or_insert_with(|| {
            let n = round.throws.len() as u32 + 1;
            info!(player = %round.player, throw = n, "throw started");
            ThrowTracker::start(n, now, config)
        });

        match tracker.on_sample(&sample, now, center, &self.config.lifecycle) {
            SampleOutcome::Rejected(_) => {
                self.events.emit(EngineEvent::Position(PositionUpdate {
                    kind: PositionKind::Rejected,
                    position: sample.position(),
                    timestamp: sample.timestamp,
                }));
                Ok(())
            }
            SampleOutcome::Accepted { smoothed, distance, .. } => {
                self.events.emit(EngineEvent::Position(PositionUpdate {
                    kind: PositionKind::Smoothed,
                    position: smoothed.position(),
                    timestamp: smoothed.timestamp,
                }));
                if distance.is_none() {
                    warn!("accepted sample not measured: target center unavailable");
                    return Err(SessionError::TargetCenterUnavailable);
                }
                Ok(())
            }
        }
    }

    /// Runs the auto-stop timer. Returns the summary when it ended a throw.
    pub fn tick(&mut self, now: f64) -> Option<ThrowSummary> {
        let tracker = self.throw.as_mut()?;
        match tracker.check_timer(now, &self.config.lifecycle) {
            TimerCheck::Pending => None,
            TimerCheck::Extended(at) => {
                debug!(throw = tracker.throw_number(), until = at, "auto-stop deferred");
                None
            }
            TimerCheck::Expired => self.end_active_throw(now, EndReason::AutoStop),
        }
    }

    /// Explicit stop. No-op while idle.
    pub fn end_throw(&mut self, now: f64) -> Option<ThrowSummary> {
        self.end_active_throw(now, EndReason::Stopped)
    }

    /// Ends the active throw without waiting for the auto-stop. No-op while idle.
    pub fn force_end_throw(&mut self, now: f64) -> Option<ThrowSummary> {
        self.end_active_throw(now, EndReason::Forced)
    }

    /// Ends the active throw, if any, and closes the round with the throws
    /// collected so far. Returns the finalized round.
    pub fn force_end_round(&mut self, now: f64) -> Option<Round> {
        let id = self.round.as_ref()?.id;
        self.end_active_throw(now, EndReason::Forced);
        if self.round.is_none() {
            // the forced throw was the last one and closed the round itself
            return self.last_round.clone().filter(|r| r.id == id);
        }
        self.finalize_round()
    }

    fn end_active_throw(&mut self, now: f64, reason: EndReason) -> Option<ThrowSummary> {
        let tracker = self.throw.take()?;
        let scale = resolve_scale(self.calibration.as_ref());
        let throw = tracker.finish(now, reason, scale, &self.config.zones);

        let round = self.round.as_mut()?;
        let summary = ThrowSummary {
            round_id: round.id,
            player: round.player.clone(),
            throw_number: throw.throw_number,
            score: throw.score,
            zone: throw.scoring_zone.clone(),
            zone_color: self.config.zones.color_of(&throw.scoring_zone).map(str::to_owned),
            zone_points: throw.zone_points,
            closest_point: throw.closest_point,
            closest_distance: throw.closest_distance,
            trajectory_distance: throw.trajectory_distance,
            end_reason: reason,
        };
        info!(
            player = %round.player,
            throw = throw.throw_number,
            score = throw.score,
            zone = %throw.scoring_zone,
            closest = throw.closest_distance,
            path = throw.trajectory_distance,
            accepted = throw.accepted_count(),
            rejected = throw.rejected_count(),
            ?reason,
            "throw completed"
        );
        round.throws.push(throw);
        let done = round.throws.len() as u32 >= self.config.lifecycle.max_throws_per_round();

        self.events.emit(EngineEvent::ThrowCompleted(summary.clone()));
        if done {
            self.finalize_round();
        }
        Some(summary)
    }

    fn finalize_round(&mut self) -> Option<Round> {
        let mut round = self.round.take()?;
        round.total_score = round.score_sum();
        info!(
            player = %round.player,
            round = round.round_number,
            throws = round.throws.len(),
            total = round.total_score,
            "round completed"
        );
        self.history.store_round(&round);
        self.events.emit(EngineEvent::RoundCompleted(round.clone()));
        self.last_round = Some(round.clone());
        Some(round)
    }
}
