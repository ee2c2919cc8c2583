//! Outputs of the engine: visualization events and finished rounds.

use std::sync::Arc;

use model::{EndReason, Round, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    /// Unfiltered pass-through while no round is open.
    Preview,
    /// Accepted and smoothed sample of the active throw.
    Smoothed,
    /// Sample the validator dropped; raw position.
    Rejected,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct PositionUpdate {
    pub kind: PositionKind,
    pub position: Vec3,
    pub timestamp: f64,
}

/// What the visualization needs to highlight a finished throw.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ThrowSummary {
    #[serde(with = "uuid::serde::simple")]
    pub round_id: Uuid,
    pub player: String,
    pub throw_number: u32,
    pub score: u32,
    pub zone: String,
    pub zone_color: Option<String>,
    pub zone_points: u32,
    pub closest_point: Option<Vec3>,
    pub closest_distance: f64,
    pub trajectory_distance: f64,
    pub end_reason: EndReason,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    Position(PositionUpdate),
    ThrowCompleted(ThrowSummary),
    RoundCompleted(Round),
}

pub trait EventSink: Send {
    fn emit(&mut self, event: EngineEvent);
}

impl EventSink for () {
    fn emit(&mut self, _event: EngineEvent) {}
}

impl EventSink for Vec<EngineEvent> {
    fn emit(&mut self, event: EngineEvent) {
        self.push(event);
    }
}

impl EventSink for crossbeam_channel::Sender<EngineEvent> {
    fn emit(&mut self, event: EngineEvent) {
        if self.send(event).is_err() {
            debug!("event receiver gone, dropping event");
        }
    }
}

/// Receives every finalized round.
pub trait HistorySink: Send {
    fn store_round(&mut self, round: &Round);
}

impl HistorySink for () {
    fn store_round(&mut self, _round: &Round) {}
}

/// In-memory round history with a leaderboard view.
#[derive(Debug, Clone, Default)]
pub struct RoundHistory {
    rounds: Vec<Round>,
}

impl RoundHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn best_for(&self, player: &str) -> Option<&Round> {
        self.rounds
            .iter()
            .filter(|r| r.player == player)
            .max_by_key(|r| r.total_score)
    }

    pub fn leaderboard(&self, limit: usize) -> Value {
        analysis::leaderboard(&self.rounds, limit)
    }
}

impl HistorySink for RoundHistory {
    fn store_round(&mut self, round: &Round) {
        self.rounds.push(round.clone());
    }
}

pub type SharedHistory = Arc<Mutex<RoundHistory>>;

impl HistorySink for SharedHistory {
    fn store_round(&mut self, round: &Round) {
        self.lock().store_round(round);
    }
}
