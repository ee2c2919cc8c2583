use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unbounded distances travel as `null` in JSON.
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn infinity() -> f64 {
        f64::INFINITY
    }

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_f64(*v)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ORIGIN: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn norm(&self) -> f64 {
        self.distance_to(&Vec3::ORIGIN)
    }
}

/// One raw observation of the tracked object.
///
/// `timestamp` is in seconds since an arbitrary epoch shared by the feed.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: f64,
    /// Frame counter of the tracking system, if it sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<u64>,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp,
            frame_id: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Same sample with its coordinates replaced; every other field is kept.
    pub fn with_position(&self, p: Vec3) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            ..*self
        }
    }
}

/// Why the validator let a sample through.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceptReason {
    ValidationDisabled,
    FirstPoint { distance: f64 },
    MonotonicCheckDisabled,
    DistanceIncreased { increase: f64 },
    WithinTolerance { points_without_increase: u32 },
}

/// Why the validator dropped a sample.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    FirstPointTooFar { distance: f64, max_distance: f64 },
    NoDistanceIncrease { points_without_increase: u32 },
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Accepted(AcceptReason),
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

impl fmt::Display for AcceptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptReason::ValidationDisabled => write!(f, "validation disabled"),
            AcceptReason::FirstPoint { distance } => {
                write!(f, "first point at {distance:.2} from origin")
            }
            AcceptReason::MonotonicCheckDisabled => write!(f, "monotonic distance check disabled"),
            AcceptReason::DistanceIncreased { increase } => {
                write!(f, "distance increased by {increase:.2}")
            }
            AcceptReason::WithinTolerance { points_without_increase } => write!(
                f,
                "no distance increase, tolerated ({points_without_increase} in a row)"
            ),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::FirstPointTooFar { distance, max_distance } => write!(
                f,
                "first point too far: {distance:.2} from origin (max {max_distance:.2})"
            ),
            RejectReason::NoDistanceIncrease { points_without_increase } => write!(
                f,
                "too many consecutive non-increasing points ({points_without_increase})"
            ),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted(r) => write!(f, "accepted: {r}"),
            Verdict::Rejected(r) => write!(f, "rejected: {r}"),
        }
    }
}

/// Everything the engine learned about one sample of a throw.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SampleRecord {
    pub raw: Sample,
    /// Output of the noise pre-filter; this is what the validator judged.
    pub prefiltered: Sample,
    pub verdict: Verdict,
    /// Only set for accepted samples.
    #[serde(default)]
    pub smoothed: Option<Sample>,
    /// Distance from `smoothed` to the target center, when the center was known.
    #[serde(default)]
    pub distance_to_target: Option<f64>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// No sample arrived for the auto-stop delay.
    AutoStop,
    /// Explicit stop requested by the caller.
    Stopped,
    /// Administrative override.
    Forced,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Throw {
    #[serde(with = "uuid::serde::simple")]
    pub id: Uuid,
    pub throw_number: u32,
    pub start_time: f64,
    #[serde(default)]
    pub samples: Vec<SampleRecord>,
    /// `f64::INFINITY` when no accepted sample had a known target center.
    #[serde(with = "unbounded", default = "unbounded::infinity")]
    pub closest_distance: f64,
    pub closest_point: Option<Vec3>,
    pub score: u32,
    pub zone_points: u32,
    pub trajectory_distance: f64,
    pub scoring_zone: String,
    /// Seconds from the first sample to the end of the throw.
    pub duration: f64,
    pub end_reason: EndReason,
}

impl Throw {
    pub fn accepted_count(&self) -> usize {
        self.samples.iter().filter(|r| r.verdict.is_accepted()).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.samples.len() - self.accepted_count()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Round {
    #[serde(with = "uuid::serde::simple")]
    pub id: Uuid,
    pub player: String,
    pub round_number: u32,
    pub start_time: f64,
    #[serde(default)]
    pub throws: Vec<Throw>,
    pub total_score: u32,
}

impl Round {
    pub fn new(player: &str, round_number: u32, start_time: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            player: player.into(),
            round_number,
            start_time,
            throws: vec![],
            total_score: 0,
        }
    }

    pub fn score_sum(&self) -> u32 {
        self.throws.iter().map(|t| t.score).sum()
    }
}

/// A scoring bracket. `max_distance` is in target units at reference scale.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ScoringZone {
    pub name: String,
    /// `null` or absent in JSON means no upper bound.
    #[serde(with = "unbounded", default = "unbounded::infinity")]
    pub max_distance: f64,
    pub points: u32,
    pub color: String,
}

impl ScoringZone {
    pub fn new(name: &str, max_distance: f64, points: u32, color: &str) -> Self {
        Self {
            name: name.into(),
            max_distance,
            points,
            color: color.into(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ZoneScore {
    pub zone: String,
    pub points: u32,
}
