mod error;
pub mod one_euro;
pub mod scoring;
pub mod validator;

pub use error::ConfigError;
pub use one_euro::{OneEuroConfig, OneEuroFilter, OneEuroFilter3};
pub use scoring::{score, ScoringTable, DEFAULT_TARGET_SCALE};
pub use validator::{NoiseReducer, TrajectoryValidator, ValidatorConfig};

use model::*;
use serde_json::{json, Value};

/// Path length of a polyline; 0 for fewer than two points.
pub fn trajectory_length(points: &[Vec3]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

pub fn round_summary(round: &Round) -> Value {
    let mut throws = Vec::with_capacity(round.throws.len());
    for t in &round.throws {
        let closest = if t.closest_distance.is_finite() {
            json!(t.closest_distance)
        } else {
            Value::Null
        };
        throws.push(json!({
            "throw_number": t.throw_number,
            "score": t.score,
            "zone": t.scoring_zone,
            "zone_points": t.zone_points,
            "closest_distance": closest,
            "trajectory_distance": t.trajectory_distance,
            "accepted": t.accepted_count(),
            "rejected": t.rejected_count(),
            "duration_s": t.duration,
        }));
    }

    json!({
        "player": round.player,
        "round_number": round.round_number,
        "total_score": round.total_score,
        "throws": throws
    })
}

/// Rounds ranked by total score, best first. Ties keep the earlier round ahead.
pub fn leaderboard(rounds: &[Round], limit: usize) -> Value {
    let mut ranked: Vec<&Round> = rounds.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then(a.round_number.cmp(&b.round_number))
    });

    let mut rows = Vec::with_capacity(limit.min(ranked.len()));
    for (i, r) in ranked.into_iter().take(limit).enumerate() {
        let mut row = serde_json::Map::new();
        row.insert("rank".into(), json!(i + 1));
        row.insert("player".into(), json!(r.player));
        row.insert("round_number".into(), json!(r.round_number));
        row.insert("total_score".into(), json!(r.total_score));
        let best = r.throws.iter().map(|t| t.score).max().unwrap_or(0);
        row.insert("best_throw".into(), json!(best));
        rows.push(Value::Object(row));
    }

    Value::Array(rows)
}
