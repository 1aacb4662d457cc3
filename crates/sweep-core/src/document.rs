//! Document model for structured sweep data.
//!
//! Documents decouple sweep execution from presentation and storage. The
//! controller broadcasts them as the run progresses; any number of
//! subscribers (CLI printer, log sink, future network layer) consume the
//! same stream instead of mutating shared UI state.
//!
//! # Document Flow
//!
//! ```text
//! StartDoc (1)
//!    │
//!    └── PointDoc (N, one per applied value)
//!    │
//! StopDoc (1)
//! ```

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new unique document ID
pub fn new_uid() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp in nanoseconds since Unix epoch
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Document types for sweep run data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Document {
    /// Run start - sweep parameters and intent
    Start(StartDoc),
    /// One applied sweep point
    Point(PointDoc),
    /// Run end - completion status
    Stop(StopDoc),
}

impl Document {
    /// Get the document UID
    pub fn uid(&self) -> &str {
        match self {
            Document::Start(d) => &d.uid,
            Document::Point(d) => &d.uid,
            Document::Stop(d) => &d.uid,
        }
    }

    /// Get the run UID this document belongs to
    pub fn run_uid(&self) -> &str {
        match self {
            Document::Start(d) => &d.uid, // Start doc UID is the run UID
            Document::Point(d) => &d.run_uid,
            Document::Stop(d) => &d.run_uid,
        }
    }

    /// Get the timestamp in nanoseconds
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            Document::Start(d) => d.time_ns,
            Document::Point(d) => d.time_ns,
            Document::Stop(d) => d.time_ns,
        }
    }
}

/// Start document - emitted when a sweep run begins
///
/// Records the full sweep parameters so the run is reproducible from the
/// document stream alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartDoc {
    /// Unique run identifier (this IS the run_uid)
    pub uid: String,
    /// Target device id
    pub device: String,
    /// Target attribute name
    pub attribute: String,
    /// Sweep start value (inclusive)
    pub start: f64,
    /// Sweep end value (exclusive)
    pub end: f64,
    /// Step increment
    pub step: f64,
    /// Number of points the sweep will visit
    pub num_points: usize,
    /// Timestamp when the run started
    pub time_ns: u64,
}

impl StartDoc {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &str,
        attribute: &str,
        start: f64,
        end: f64,
        step: f64,
        num_points: usize,
    ) -> Self {
        Self {
            uid: new_uid(),
            device: device.to_string(),
            attribute: attribute.to_string(),
            start,
            end,
            step,
            num_points,
            time_ns: now_ns(),
        }
    }
}

/// Point document - one value applied to the device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointDoc {
    /// Unique point ID
    pub uid: String,
    /// Links to StartDoc
    pub run_uid: String,
    /// Point sequence number within the run (0-based)
    pub seq_num: u32,
    /// Value that was applied
    pub value: f64,
    /// Timestamp
    pub time_ns: u64,
}

impl PointDoc {
    pub fn new(run_uid: &str, seq_num: u32, value: f64) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            seq_num,
            value,
            time_ns: now_ns(),
        }
    }
}

/// Stop document - emitted when a sweep run ends, whatever the outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopDoc {
    /// Unique stop doc ID
    pub uid: String,
    /// Links to StartDoc
    pub run_uid: String,
    /// Exit status: "success", "abort", "fail"
    pub exit_status: String,
    /// Reason for abort/failure
    pub reason: String,
    /// Number of points actually applied
    pub num_points: u32,
    /// Last value applied before the run ended (None if no point was applied)
    pub last_value: Option<f64>,
    /// Timestamp when the run ended
    pub time_ns: u64,
}

impl StopDoc {
    pub fn success(run_uid: &str, num_points: u32, last_value: Option<f64>) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            exit_status: "success".to_string(),
            reason: String::new(),
            num_points,
            last_value,
            time_ns: now_ns(),
        }
    }

    pub fn abort(run_uid: &str, reason: &str, num_points: u32, last_value: Option<f64>) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            exit_status: "abort".to_string(),
            reason: reason.to_string(),
            num_points,
            last_value,
            time_ns: now_ns(),
        }
    }

    pub fn fail(run_uid: &str, reason: &str, num_points: u32, last_value: Option<f64>) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            exit_status: "fail".to_string(),
            reason: reason.to_string(),
            num_points,
            last_value,
            time_ns: now_ns(),
        }
    }
}
