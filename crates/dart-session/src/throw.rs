//! One active throw: validation, smoothing, closest-approach tracking and the
//! auto-stop timer, from the first sample until it is finished.

use analysis::{trajectory_length, OneEuroFilter3, ScoringTable, TrajectoryValidator};
use model::{EndReason, RejectReason, Sample, SampleRecord, Throw, Vec3, Verdict};
use tracing::trace;
use uuid::Uuid;

use crate::config::{EngineConfig, LifecycleConfig};
use crate::timer::AutoStop;

/// Extra wait when the auto-stop fires before the minimum throw duration.
pub const AUTO_STOP_MARGIN_S: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Accepted {
        smoothed: Sample,
        /// `None` when the target center was unavailable.
        distance: Option<f64>,
        new_closest: bool,
    },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerCheck {
    /// Nothing due (or no timer armed).
    Pending,
    /// Fired too early; re-armed at the contained deadline.
    Extended(f64),
    /// Fired; the throw should end.
    Expired,
}

#[derive(Debug)]
pub struct ThrowTracker {
    id: Uuid,
    throw_number: u32,
    start_time: f64,
    validator: TrajectoryValidator,
    filter: OneEuroFilter3,
    records: Vec<SampleRecord>,
    path: Vec<Vec3>,
    closest_distance: f64,
    closest_point: Option<Vec3>,
    auto_stop: AutoStop,
}

impl ThrowTracker {
    pub fn start(throw_number: u32, now: f64, config: &EngineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            throw_number,
            start_time: now,
            validator: TrajectoryValidator::new(config.validator),
            filter: OneEuroFilter3::new(config.filter),
            records: vec![],
            path: vec![],
            closest_distance: f64::INFINITY,
            closest_point: None,
            auto_stop: AutoStop::default(),
        }
    }

    pub fn throw_number(&self) -> u32 {
        self.throw_number
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn closest_distance(&self) -> f64 {
        self.closest_distance
    }

    pub fn closest_point(&self) -> Option<Vec3> {
        self.closest_point
    }

    pub fn auto_stop_deadline(&self) -> Option<f64> {
        self.auto_stop.deadline()
    }

    /// Feeds one complete sample. Any sample, accepted or not, re-arms the
    /// auto-stop timer.
    pub fn on_sample(
        &mut self,
        sample: &Sample,
        now: f64,
        center: Option<Vec3>,
        lifecycle: &LifecycleConfig,
    ) -> SampleOutcome {
        self.auto_stop.arm(now + lifecycle.auto_stop_delay().as_secs_f64());

        let (prefiltered, verdict) = self.validator.process(sample);
        if let Verdict::Rejected(reason) = &verdict {
            trace!(throw = self.throw_number, %reason, "sample rejected");
            let reason = reason.clone();
            self.records.push(SampleRecord {
                raw: *sample,
                prefiltered,
                verdict,
                smoothed: None,
                distance_to_target: None,
            });
            return SampleOutcome::Rejected(reason);
        }

        let smoothed = self.filter.filter(&prefiltered);
        let point = smoothed.position();
        self.path.push(point);

        let distance = center.map(|c| point.distance_to(&c));
        let mut new_closest = false;
        if let Some(d) = distance {
            if d < self.closest_distance {
                self.closest_distance = d;
                self.closest_point = Some(point);
                new_closest = true;
            }
        }

        self.records.push(SampleRecord {
            raw: *sample,
            prefiltered,
            verdict,
            smoothed: Some(smoothed),
            distance_to_target: distance,
        });

        SampleOutcome::Accepted {
            smoothed,
            distance,
            new_closest,
        }
    }

    /// Checks the auto-stop timer. A timer that fires before the throw has
    /// lasted `min_throw_duration` is pushed back instead of expiring.
    pub fn check_timer(&mut self, now: f64, lifecycle: &LifecycleConfig) -> TimerCheck {
        if !self.auto_stop.is_due(now) {
            return TimerCheck::Pending;
        }
        let active_for = now - self.start_time;
        let min = lifecycle.min_throw_duration().as_secs_f64();
        if active_for >= min {
            self.auto_stop.cancel();
            return TimerCheck::Expired;
        }
        let at = now + (min - active_for) + AUTO_STOP_MARGIN_S;
        self.auto_stop.arm(at);
        TimerCheck::Extended(at)
    }

    /// Scores the throw and freezes it. Consumes the tracker, which drops the
    /// timer and all filter/validator state with it.
    pub fn finish(
        self,
        now: f64,
        reason: EndReason,
        target_scale: f64,
        zones: &ScoringTable,
    ) -> Throw {
        let zone = zones.score(self.closest_distance, target_scale);
        let trajectory_distance = trajectory_length(&self.path);
        let score = (f64::from(zone.points) + trajectory_distance).round() as u32;

        Throw {
            id: self.id,
            throw_number: self.throw_number,
            start_time: self.start_time,
            samples: self.records,
            closest_distance: self.closest_distance,
            closest_point: self.closest_point,
            score,
            zone_points: zone.points,
            trajectory_distance,
            scoring_zone: zone.zone,
            duration: (now - self.start_time).max(0.0),
            end_reason: reason,
        }
    }
}
