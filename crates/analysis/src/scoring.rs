//! Distance-to-zone scoring with a calibration scale factor.

use model::{ScoringZone, ZoneScore};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scale used when the calibration provider has nothing to offer.
pub const DEFAULT_TARGET_SCALE: f64 = 1.0;

/// Picks the first zone (ascending `max_distance`) whose scaled threshold
/// reaches `closest_distance`. Falls back to the last zone with 0 points.
pub fn score(closest_distance: f64, target_scale: f64, zones: &[ScoringZone]) -> ZoneScore {
    for zone in zones {
        if zone.max_distance * target_scale >= closest_distance {
            return ZoneScore {
                zone: zone.name.clone(),
                points: zone.points,
            };
        }
    }
    ZoneScore {
        zone: zones.last().map(|z| z.name.clone()).unwrap_or_default(),
        points: 0,
    }
}

/// Ordered zone list. Always sorted by ascending `max_distance`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(try_from = "Vec<ScoringZone>", into = "Vec<ScoringZone>")]
pub struct ScoringTable {
    zones: Vec<ScoringZone>,
}

impl ScoringTable {
    pub fn new(mut zones: Vec<ScoringZone>) -> Result<Self, ConfigError> {
        if zones.is_empty() {
            return Err(ConfigError::NoZones);
        }
        if let Some(bad) = zones.iter().find(|z| z.max_distance.is_nan() || z.max_distance < 0.0) {
            return Err(ConfigError::InvalidZone(bad.name.clone()));
        }
        zones.sort_by(|a, b| a.max_distance.total_cmp(&b.max_distance));
        Ok(Self { zones })
    }

    pub fn zones(&self) -> &[ScoringZone] {
        &self.zones
    }

    pub fn score(&self, closest_distance: f64, target_scale: f64) -> ZoneScore {
        score(closest_distance, target_scale, &self.zones)
    }

    pub fn color_of(&self, zone: &str) -> Option<&str> {
        self.zones.iter().find(|z| z.name == zone).map(|z| z.color.as_str())
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            zones: vec![
                ScoringZone::new("Bullseye", 5.0, 100, "#ff0000"),
                ScoringZone::new("Inner Ring", 15.0, 50, "#ff8800"),
                ScoringZone::new("Middle Ring", 30.0, 25, "#ffff00"),
                ScoringZone::new("Outer Ring", 50.0, 10, "#00ff00"),
                ScoringZone::new("Miss", f64::INFINITY, 0, "#888888"),
            ],
        }
    }
}

impl TryFrom<Vec<ScoringZone>> for ScoringTable {
    type Error = ConfigError;

    fn try_from(zones: Vec<ScoringZone>) -> Result<Self, Self::Error> {
        Self::new(zones)
    }
}

impl From<ScoringTable> for Vec<ScoringZone> {
    fn from(t: ScoringTable) -> Self {
        t.zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_zone() -> ScoringTable {
        ScoringTable::new(vec![
            ScoringZone::new("miss", f64::INFINITY, 10, "#000"),
            ScoringZone::new("hit", 1.0, 100, "#f00"),
        ])
        .unwrap()
    }

    #[test]
    fn scale_widens_thresholds() {
        let t = two_zone();
        assert_eq!(t.score(1.5, 2.0).points, 100);
        assert_eq!(t.score(2.5, 2.0).points, 10);
        assert_eq!(t.score(1.5, 1.0).points, 10);
    }

    #[test]
    fn threshold_is_inclusive() {
        let t = two_zone();
        let s = t.score(2.0, 2.0);
        assert_eq!(s, ZoneScore { zone: "hit".into(), points: 100 });
    }

    #[test]
    fn zones_are_sorted_on_construction() {
        let t = two_zone();
        assert_eq!(t.zones()[0].name, "hit");
        assert_eq!(t.color_of("miss"), Some("#000"));
    }

    #[test]
    fn no_match_falls_back_to_last_zone_with_zero() {
        let zones = vec![
            ScoringZone::new("a", 1.0, 100, "#1"),
            ScoringZone::new("b", 2.0, 50, "#2"),
        ];
        assert_eq!(score(9.0, 1.0, &zones), ZoneScore { zone: "b".into(), points: 0 });
        assert_eq!(score(9.0, 1.0, &[]).points, 0);
    }

    #[test]
    fn never_seen_distance_lands_in_infinite_zone() {
        let t = ScoringTable::default();
        assert_eq!(t.score(f64::INFINITY, DEFAULT_TARGET_SCALE).zone, "Miss");
        assert_eq!(t.score(3.0, DEFAULT_TARGET_SCALE).points, 100);
    }

    #[test]
    fn rejects_bad_tables() {
        assert_eq!(ScoringTable::new(vec![]), Err(ConfigError::NoZones));
        assert!(ScoringTable::new(vec![ScoringZone::new("x", f64::NAN, 1, "#")]).is_err());
    }

    #[test]
    fn loads_from_json_list() {
        let json = r##"[{"name":"far","max_distance":10.0,"points":1,"color":"#a"},
                       {"name":"near","max_distance":2.0,"points":5,"color":"#b"}]"##;
        let t: ScoringTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.zones()[0].name, "near");
        assert!(serde_json::from_str::<ScoringTable>("[]").is_err());
    }
}
