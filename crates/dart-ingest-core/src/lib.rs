//! Raw sample feed: wire decoding, the source trait, and the channel that
//! carries samples to the single consumer driving the scoring session.

use std::io::BufRead;
use std::path::Path;

use anyhow::Context;
use model::Sample;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A sample as delivered by the feed. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RawSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub timestamp: Option<f64>,
    pub frame_id: Option<u64>,
}

impl RawSample {
    pub fn at(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            timestamp: Some(timestamp),
            frame_id: None,
        }
    }

    /// `None` when a coordinate is missing or not finite. A missing timestamp
    /// is replaced by `fallback_timestamp`.
    pub fn complete(&self, fallback_timestamp: f64) -> Option<Sample> {
        let (x, y, z) = (self.x?, self.y?, self.z?);
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return None;
        }
        Some(Sample {
            x,
            y,
            z,
            timestamp: self.timestamp.unwrap_or(fallback_timestamp),
            frame_id: self.frame_id,
        })
    }
}

/// Mapping applied to `point_3d` packets from the visual tracking system
/// (millimetres, x/y mirrored) into engine units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PointTransform {
    pub scale: f64,
    pub offset: [f64; 3],
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for PointTransform {
    fn default() -> Self {
        Self {
            scale: 0.1,
            offset: [0.0; 3],
            flip_x: true,
            flip_y: true,
        }
    }
}

impl PointTransform {
    pub const IDENTITY: PointTransform = PointTransform {
        scale: 1.0,
        offset: [0.0; 3],
        flip_x: false,
        flip_y: false,
    };

    fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let sx = if self.flip_x { -1.0 } else { 1.0 };
        let sy = if self.flip_y { -1.0 } else { 1.0 };
        [
            sx * p[0] * self.scale + self.offset[0],
            sy * p[1] * self.scale + self.offset[1],
            p[2] * self.scale + self.offset[2],
        ]
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Packet {
    VisualTracking {
        point_3d: Vec<f64>,
        timestamp: f64,
        #[serde(default)]
        frame_id: Option<u64>,
    },
    Flat(RawSample),
}

/// Decodes one JSON datagram. Accepts `{"x","y","z","timestamp"?}` and
/// `{"timestamp","point_3d":[x,y,z],"frame_id"?}`.
pub fn decode(payload: &[u8], transform: &PointTransform) -> Result<RawSample, IngestError> {
    match serde_json::from_slice::<Packet>(payload)? {
        Packet::Flat(raw) => Ok(raw),
        Packet::VisualTracking { point_3d, timestamp, frame_id } => {
            let [x, y, z] = match point_3d.as_slice() {
                [x, y, z, ..] => transform.apply([*x, *y, *z]),
                _ => return Err(IngestError::ShortPoint(point_3d.len())),
            };
            Ok(RawSample {
                x: Some(x),
                y: Some(y),
                z: Some(z),
                timestamp: Some(timestamp),
                frame_id,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("point_3d needs 3 coordinates, got {0}")]
    ShortPoint(usize),
    #[error("malformed sample packet: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("sample channel closed")]
    Disconnected,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SampleTx = crossbeam_channel::Sender<RawSample>;
pub type SampleRx = crossbeam_channel::Receiver<RawSample>;

/// Trait for any live sample feed
#[async_trait::async_trait]
pub trait SampleSource: Send + Sync {
    async fn run(&self, tx: SampleTx) -> Result<(), IngestError>;
}

pub fn channel() -> (SampleTx, SampleRx) {
    crossbeam_channel::unbounded()
}

/// Replays recorded samples, keeping their relative timing.
pub struct ReplaySource {
    samples: Vec<RawSample>,
    speed: f64,
}

impl ReplaySource {
    pub fn new(samples: Vec<RawSample>) -> Self {
        Self {
            samples,
            speed: 1.0,
        }
    }

    /// `speed` > 1 replays faster than recorded. Non-positive values are ignored.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
        self
    }

    /// One JSON datagram per line. Lines that fail to decode are skipped.
    pub fn from_ndjson(path: &Path, transform: &PointTransform) -> anyhow::Result<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open {}", path.display()))?;
        let rdr = std::io::BufReader::new(f);
        let mut samples = vec![];
        for (n, line) in rdr.lines().enumerate() {
            let s = line.with_context(|| format!("read {} line {}", path.display(), n + 1))?;
            if s.trim().is_empty() {
                continue;
            }
            match decode(s.as_bytes(), transform) {
                Ok(raw) => samples.push(raw),
                Err(e) => warn!(line = n + 1, error = %e, "skipping undecodable sample"),
            }
        }
        debug!(count = samples.len(), path = %path.display(), "loaded replay");
        Ok(Self::new(samples))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait::async_trait]
impl SampleSource for ReplaySource {
    async fn run(&self, tx: SampleTx) -> Result<(), IngestError> {
        let mut prev_ts: Option<f64> = None;
        for raw in &self.samples {
            if let (Some(prev), Some(ts)) = (prev_ts, raw.timestamp) {
                let gap = (ts - prev) / self.speed;
                if gap > 0.0 {
                    match std::time::Duration::try_from_secs_f64(gap) {
                        Ok(wait) => tokio::time::sleep(wait).await,
                        Err(_) => warn!(gap, "timestamp gap too large to replay, not waiting"),
                    }
                }
            }
            if raw.timestamp.is_some() {
                prev_ts = raw.timestamp;
            }
            tx.send(*raw).map_err(|_| IngestError::Disconnected)?;
        }
        Ok(())
    }
}
