//! Two-stage admission gate for throw samples.
//!
//! Stage 1 is a per-axis exponential moving average that knocks down sensor
//! noise. Stage 2 judges the pre-filtered point: the first point has to start
//! near the origin, later points have to keep moving away from it, with a
//! bounded number of non-increasing points tolerated in a row.

use model::{AcceptReason, RejectReason, Sample, Vec3, Verdict};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{non_negative, positive, unit_interval, ConfigError};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    enabled: bool,
    initial_point_max_distance: f64,
    require_monotonic_distance: bool,
    min_distance_increase: f64,
    max_points_without_increase: u32,
    low_pass_alpha: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_point_max_distance: 199.0,
            require_monotonic_distance: true,
            min_distance_increase: 1.0,
            max_points_without_increase: 5,
            low_pass_alpha: 0.3,
        }
    }
}

impl ValidatorConfig {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn initial_point_max_distance(&self) -> f64 {
        self.initial_point_max_distance
    }

    pub fn require_monotonic_distance(&self) -> bool {
        self.require_monotonic_distance
    }

    pub fn min_distance_increase(&self) -> f64 {
        self.min_distance_increase
    }

    pub fn max_points_without_increase(&self) -> u32 {
        self.max_points_without_increase
    }

    pub fn low_pass_alpha(&self) -> f64 {
        self.low_pass_alpha
    }

    pub fn set_enabled(&mut self, v: bool) {
        self.enabled = v;
    }

    pub fn set_initial_point_max_distance(&mut self, v: f64) -> Result<(), ConfigError> {
        self.initial_point_max_distance = positive("initial_point_max_distance", v)?;
        Ok(())
    }

    pub fn set_require_monotonic_distance(&mut self, v: bool) {
        self.require_monotonic_distance = v;
    }

    pub fn set_min_distance_increase(&mut self, v: f64) -> Result<(), ConfigError> {
        self.min_distance_increase = non_negative("min_distance_increase", v)?;
        Ok(())
    }

    pub fn set_max_points_without_increase(&mut self, v: u32) {
        self.max_points_without_increase = v;
    }

    /// `1.0` disables the pre-filter (output equals input).
    pub fn set_low_pass_alpha(&mut self, v: f64) -> Result<(), ConfigError> {
        self.low_pass_alpha = unit_interval("low_pass_alpha", v)?;
        Ok(())
    }
}

/// Per-axis EMA seeded with the first sample it sees.
#[derive(Clone, Copy, Debug)]
pub struct NoiseReducer {
    alpha: f64,
    state: Option<Vec3>,
}

impl NoiseReducer {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, state: None }
    }

    pub fn apply(&mut self, sample: &Sample) -> Sample {
        let p = sample.position();
        let next = match self.state {
            None => p,
            Some(prev) => {
                let a = self.alpha;
                Vec3::new(
                    a * p.x + (1.0 - a) * prev.x,
                    a * p.y + (1.0 - a) * prev.y,
                    a * p.z + (1.0 - a) * prev.z,
                )
            }
        };
        self.state = Some(next);
        sample.with_position(next)
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[derive(Clone, Debug)]
pub struct TrajectoryValidator {
    config: ValidatorConfig,
    noise: NoiseReducer,
    last_valid_distance: f64,
    points_without_increase: u32,
    first_point_accepted: bool,
}

impl TrajectoryValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            noise: NoiseReducer::new(config.low_pass_alpha),
            last_valid_distance: 0.0,
            points_without_increase: 0,
            first_point_accepted: false,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn last_valid_distance(&self) -> Option<f64> {
        self.first_point_accepted.then_some(self.last_valid_distance)
    }

    pub fn points_without_increase(&self) -> u32 {
        self.points_without_increase
    }

    /// Runs both stages. Returns the pre-filtered sample and the verdict on it.
    pub fn process(&mut self, raw: &Sample) -> (Sample, Verdict) {
        let pre = self.noise.apply(raw);
        let verdict = self.validate(&pre);
        (pre, verdict)
    }

    /// Stage 2 only, on an already pre-filtered sample.
    pub fn validate(&mut self, sample: &Sample) -> Verdict {
        if !self.config.enabled {
            return Verdict::Accepted(AcceptReason::ValidationDisabled);
        }

        let d = sample.position().norm();

        if !self.first_point_accepted {
            let max = self.config.initial_point_max_distance;
            if d > max {
                trace!(distance = d, max, "first point rejected");
                return Verdict::Rejected(RejectReason::FirstPointTooFar {
                    distance: d,
                    max_distance: max,
                });
            }
            self.first_point_accepted = true;
            self.last_valid_distance = d;
            self.points_without_increase = 0;
            return Verdict::Accepted(AcceptReason::FirstPoint { distance: d });
        }

        if !self.config.require_monotonic_distance {
            return Verdict::Accepted(AcceptReason::MonotonicCheckDisabled);
        }

        let increase = d - self.last_valid_distance;
        if increase >= self.config.min_distance_increase {
            self.last_valid_distance = d;
            self.points_without_increase = 0;
            Verdict::Accepted(AcceptReason::DistanceIncreased { increase })
        } else if self.points_without_increase < self.config.max_points_without_increase {
            self.points_without_increase += 1;
            Verdict::Accepted(AcceptReason::WithinTolerance {
                points_without_increase: self.points_without_increase,
            })
        } else {
            trace!(
                distance = d,
                last_valid = self.last_valid_distance,
                "non-increasing point rejected"
            );
            Verdict::Rejected(RejectReason::NoDistanceIncrease {
                points_without_increase: self.points_without_increase,
            })
        }
    }

    pub fn reset(&mut self) {
        self.noise = NoiseReducer::new(self.config.low_pass_alpha);
        self.last_valid_distance = 0.0;
        self.points_without_increase = 0;
        self.first_point_accepted = false;
    }
}
