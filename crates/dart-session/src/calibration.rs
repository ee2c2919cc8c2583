use std::sync::Arc;

use analysis::DEFAULT_TARGET_SCALE;
use model::Vec3;
use parking_lot::RwLock;
use tracing::debug;

/// Where the target is and how large it is drawn, as supplied by calibration.
pub trait CalibrationProvider: Send {
    fn target_center(&self) -> Option<Vec3>;
    fn target_scale(&self) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticCalibration {
    pub center: Option<Vec3>,
    pub scale: Option<f64>,
}

impl StaticCalibration {
    pub fn new(center: Vec3, scale: f64) -> Self {
        Self {
            center: Some(center),
            scale: Some(scale),
        }
    }

    pub fn centered(center: Vec3) -> Self {
        Self {
            center: Some(center),
            scale: None,
        }
    }
}

impl CalibrationProvider for StaticCalibration {
    fn target_center(&self) -> Option<Vec3> {
        self.center
    }

    fn target_scale(&self) -> Option<f64> {
        self.scale
    }
}

/// Calibration that can be updated while the session runs.
pub type SharedCalibration = Arc<RwLock<StaticCalibration>>;

impl CalibrationProvider for SharedCalibration {
    fn target_center(&self) -> Option<Vec3> {
        self.read().center
    }

    fn target_scale(&self) -> Option<f64> {
        self.read().scale
    }
}

/// Provider scale, or [`DEFAULT_TARGET_SCALE`] when it is missing or unusable.
pub fn resolve_scale(provider: &dyn CalibrationProvider) -> f64 {
    match provider.target_scale() {
        Some(s) if s.is_finite() && s > 0.0 => s,
        other => {
            debug!(scale = ?other, fallback = DEFAULT_TARGET_SCALE, "target scale unavailable");
            DEFAULT_TARGET_SCALE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_falls_back() {
        assert_eq!(resolve_scale(&StaticCalibration::default()), DEFAULT_TARGET_SCALE);
        let bad = StaticCalibration { center: None, scale: Some(0.0) };
        assert_eq!(resolve_scale(&bad), DEFAULT_TARGET_SCALE);
        let nan = StaticCalibration { center: None, scale: Some(f64::NAN) };
        assert_eq!(resolve_scale(&nan), DEFAULT_TARGET_SCALE);
        assert_eq!(resolve_scale(&StaticCalibration::new(Vec3::ORIGIN, 2.5)), 2.5);
    }

    #[test]
    fn shared_calibration_sees_updates() {
        let shared: SharedCalibration = Arc::new(RwLock::new(StaticCalibration::default()));
        assert_eq!(shared.target_center(), None);
        shared.write().center = Some(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(shared.target_center(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }
}
