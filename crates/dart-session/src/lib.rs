//! Throw and round lifecycle on top of the sample filter, validator and
//! scoring in `analysis`.

mod calibration;
mod config;
mod error;
pub mod feed;
mod session;
mod sink;
pub mod throw;
mod timer;

pub use calibration::{resolve_scale, CalibrationProvider, SharedCalibration, StaticCalibration};
pub use config::{EngineConfig, LifecycleConfig};
pub use error::SessionError;
pub use session::{RoundState, Session};
pub use sink::{
    EngineEvent, EventSink, HistorySink, PositionKind, PositionUpdate, RoundHistory, SharedHistory,
    ThrowSummary,
};
pub use throw::{SampleOutcome, ThrowTracker, TimerCheck};
pub use timer::AutoStop;
