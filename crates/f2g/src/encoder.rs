//! The polymorphic encoder seam between the pipeline and the two output
//! formats.

use crate::error::PipelineResult;
use crate::intraday::{AlignedRecord, HrStats};
use chrono::{DateTime, FixedOffset};
use fitbit_client::Activity;

/// Everything an encoder needs for one activity: the cached summary, the
/// aggregate heart-rate statistics, and the aligned record stream.
/// Rebuilt on every encode call, never cached.
#[derive(Clone, Debug)]
pub struct NormalizedActivity {
    pub activity: Activity,
    pub start: DateTime<FixedOffset>,
    pub stats: HrStats,
    pub records: Vec<AlignedRecord>,
}

impl NormalizedActivity {
    pub fn duration_secs(&self) -> f64 {
        self.activity.duration as f64 / 1000.0
    }
}

pub trait ActivityEncoder {
    /// Serialize one activity to the target format. Deterministic: the
    /// same input must produce byte-identical output.
    fn encode(&self, normalized: &NormalizedActivity) -> PipelineResult<Vec<u8>>;

    /// Name of the output file for one activity, e.g. `exercise-123.tcx`.
    fn file_name(&self, log_id: i64) -> String;
}
