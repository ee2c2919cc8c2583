//! Speed-adaptive low-pass ("One Euro") filter.
//!
//! Smooths hard while the signal is slow and relaxes the cutoff as the
//! signal speeds up, so jitter is removed at rest without lagging behind
//! fast motion.

use std::f64::consts::PI;

use model::{Sample, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{non_negative, positive, ConfigError};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct OneEuroConfig {
    /// Nominal sample rate (Hz). Replaced by the observed rate once samples flow.
    frequency: f64,
    /// Cutoff (Hz) at zero speed; lower means smoother at rest.
    min_cutoff: f64,
    /// How fast the cutoff grows with speed.
    beta: f64,
    /// Cutoff (Hz) for the derivative estimate.
    d_cutoff: f64,
}

impl Default for OneEuroConfig {
    fn default() -> Self {
        Self {
            frequency: 60.0,
            min_cutoff: 1.0,
            beta: 0.007,
            d_cutoff: 1.0,
        }
    }
}

impl OneEuroConfig {
    pub fn new(
        frequency: f64,
        min_cutoff: f64,
        beta: f64,
        d_cutoff: f64,
    ) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.set_frequency(frequency)?;
        cfg.set_min_cutoff(min_cutoff)?;
        cfg.set_beta(beta)?;
        cfg.set_d_cutoff(d_cutoff)?;
        Ok(cfg)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn min_cutoff(&self) -> f64 {
        self.min_cutoff
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn d_cutoff(&self) -> f64 {
        self.d_cutoff
    }

    pub fn set_frequency(&mut self, v: f64) -> Result<(), ConfigError> {
        self.frequency = positive("frequency", v)?;
        Ok(())
    }

    pub fn set_min_cutoff(&mut self, v: f64) -> Result<(), ConfigError> {
        self.min_cutoff = positive("min_cutoff", v)?;
        Ok(())
    }

    pub fn set_beta(&mut self, v: f64) -> Result<(), ConfigError> {
        self.beta = non_negative("beta", v)?;
        Ok(())
    }

    pub fn set_d_cutoff(&mut self, v: f64) -> Result<(), ConfigError> {
        self.d_cutoff = positive("d_cutoff", v)?;
        Ok(())
    }
}

/// Smoothing factor for a first-order low-pass at `cutoff` Hz sampled at `frequency` Hz.
pub fn smoothing_alpha(cutoff: f64, frequency: f64) -> f64 {
    let tau = 1.0 / (2.0 * PI * cutoff);
    let te = 1.0 / frequency;
    1.0 / (1.0 + tau / te)
}

/// `y[n] = a*x[n] + (1-a)*y[n-1]`, seeded with the first input.
#[derive(Clone, Copy, Debug, Default)]
struct LowPass {
    last: Option<f64>,
}

impl LowPass {
    fn apply(&mut self, x: f64, alpha: f64) -> f64 {
        let y = match self.last {
            None => x,
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
        };
        self.last = Some(y);
        y
    }

    fn seed(&mut self, x: f64) {
        self.last = Some(x);
    }
}

#[derive(Clone, Debug)]
pub struct OneEuroFilter {
    config: OneEuroConfig,
    rate: f64,
    x: LowPass,
    dx: LowPass,
    last_timestamp: Option<f64>,
}

impl OneEuroFilter {
    pub fn new(config: OneEuroConfig) -> Self {
        Self {
            config,
            rate: config.frequency,
            x: LowPass::default(),
            dx: LowPass::default(),
            last_timestamp: None,
        }
    }

    pub fn config(&self) -> &OneEuroConfig {
        &self.config
    }

    /// Tuning applies from the next call; the filter state is kept.
    pub fn config_mut(&mut self) -> &mut OneEuroConfig {
        &mut self.config
    }

    /// Rate derived from the last accepted timestamp step.
    pub fn observed_frequency(&self) -> f64 {
        self.rate
    }

    /// Last smoothed value, if any sample has been seen since the last reset.
    pub fn value(&self) -> Option<f64> {
        self.x.last
    }

    pub fn filter(&mut self, value: f64, timestamp: f64) -> f64 {
        let (Some(last_ts), Some(prev)) = (self.last_timestamp, self.x.last) else {
            self.x.seed(value);
            self.dx.seed(0.0);
            self.last_timestamp = Some(timestamp);
            return value;
        };

        let dt = timestamp - last_ts;
        if dt <= 0.0 || !dt.is_finite() {
            return prev;
        }
        self.rate = 1.0 / dt;

        let raw_derivative = (value - prev) * self.rate;
        let derivative = self
            .dx
            .apply(raw_derivative, smoothing_alpha(self.config.d_cutoff, self.rate));
        let cutoff = self.config.min_cutoff + self.config.beta * derivative.abs();
        let out = self.x.apply(value, smoothing_alpha(cutoff, self.rate));

        self.last_timestamp = Some(timestamp);
        out
    }

    pub fn reset(&mut self) {
        self.x = LowPass::default();
        self.dx = LowPass::default();
        self.last_timestamp = None;
        self.rate = self.config.frequency;
    }
}

/// Three independent axis filters driven by a shared timestamp.
#[derive(Clone, Debug)]
pub struct OneEuroFilter3 {
    x: OneEuroFilter,
    y: OneEuroFilter,
    z: OneEuroFilter,
}

impl OneEuroFilter3 {
    pub fn new(config: OneEuroConfig) -> Self {
        Self {
            x: OneEuroFilter::new(config),
            y: OneEuroFilter::new(config),
            z: OneEuroFilter::new(config),
        }
    }

    /// Filters the coordinates; every other field of `sample` is passed through.
    pub fn filter(&mut self, sample: &Sample) -> Sample {
        let t = sample.timestamp;
        sample.with_position(Vec3::new(
            self.x.filter(sample.x, t),
            self.y.filter(sample.y, t),
            self.z.filter(sample.z, t),
        ))
    }

    pub fn set_config(&mut self, config: OneEuroConfig) {
        for f in [&mut self.x, &mut self.y, &mut self.z] {
            *f.config_mut() = config;
        }
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.z.reset();
    }
}
