//! Intraday series parsing and heart-rate/calorie alignment.
//!
//! Heart-rate samples arrive at second resolution, calories at minute
//! resolution, each payload timestamped only with a day plus a wall-clock
//! time. Both are anchored to the activity's UTC offset so the two series
//! land on one timeline before alignment.

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct HrSample {
    pub ts: DateTime<FixedOffset>,
    pub bpm: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalSample {
    pub ts: DateTime<FixedOffset>,
    pub kcal_per_min: f64,
}

/// One heart-rate sample annotated with its per-second calorie rate, when
/// the minute bucket containing it exists.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedRecord {
    pub ts: DateTime<FixedOffset>,
    pub bpm: u32,
    pub calories_per_sec: Option<f64>,
}

/// Aggregate heart-rate statistics for one activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HrStats {
    pub min: u32,
    pub max: u32,
    /// Arithmetic mean rounded to the nearest integer.
    pub avg: u32,
}

impl HrStats {
    pub fn compute(samples: &[HrSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut min = u32::MAX;
        let mut max = 0u32;
        let mut sum = 0u64;
        for s in samples {
            min = min.min(s.bpm);
            max = max.max(s.bpm);
            sum += u64::from(s.bpm);
        }
        // ties round to even, matching the upstream mean
        let avg = (sum as f64 / samples.len() as f64).round_ties_even() as u32;
        Some(Self { min, max, avg })
    }
}

// Wire shape shared by the heart-rate and calorie intraday payloads:
// a one-element day list plus a dataset of "HH:MM:SS" entries.
#[derive(Deserialize)]
struct IntradayPayload {
    #[serde(rename = "activities-heart", alias = "activities-calories", default)]
    days: Vec<IntradayDay>,
    #[serde(
        rename = "activities-heart-intraday",
        alias = "activities-calories-intraday"
    )]
    intraday: IntradaySet,
}

#[derive(Deserialize)]
struct IntradayDay {
    #[serde(rename = "dateTime")]
    date_time: String,
}

#[derive(Deserialize)]
struct IntradaySet {
    dataset: Vec<IntradayEntry>,
}

#[derive(Deserialize)]
struct IntradayEntry {
    time: String,
    value: f64,
}

fn parse_payload(
    bytes: &[u8],
    offset: FixedOffset,
) -> PipelineResult<Vec<(DateTime<FixedOffset>, f64)>> {
    let payload: IntradayPayload =
        serde_json::from_slice(bytes).map_err(|e| PipelineError::Intraday(e.to_string()))?;
    let day = payload
        .days
        .first()
        .ok_or_else(|| PipelineError::Intraday("payload without a day entry".into()))?;
    let date = NaiveDate::parse_from_str(&day.date_time, "%Y-%m-%d")
        .map_err(|e| PipelineError::Intraday(format!("day {:?}: {e}", day.date_time)))?;

    let mut samples = Vec::with_capacity(payload.intraday.dataset.len());
    for entry in &payload.intraday.dataset {
        let time = NaiveTime::parse_from_str(&entry.time, "%H:%M:%S")
            .map_err(|e| PipelineError::Intraday(format!("time {:?}: {e}", entry.time)))?;
        let ts = date
            .and_time(time)
            .and_local_timezone(offset)
            .single()
            .ok_or_else(|| {
                PipelineError::Intraday(format!("ambiguous timestamp {} {}", date, entry.time))
            })?;
        samples.push((ts, entry.value));
    }
    Ok(samples)
}

pub fn parse_heart_rate(bytes: &[u8], offset: FixedOffset) -> PipelineResult<Vec<HrSample>> {
    Ok(parse_payload(bytes, offset)?
        .into_iter()
        .map(|(ts, value)| HrSample {
            ts,
            bpm: value.round() as u32,
        })
        .collect())
}

pub fn parse_calories(bytes: &[u8], offset: FixedOffset) -> PipelineResult<Vec<CalSample>> {
    Ok(parse_payload(bytes, offset)?
        .into_iter()
        .map(|(ts, value)| CalSample {
            ts,
            kcal_per_min: value,
        })
        .collect())
}

fn minute_bucket(ts: &DateTime<FixedOffset>) -> i64 {
    ts.timestamp().div_euclid(60)
}

/// Annotate each heart-rate sample with the calorie rate of the minute
/// bucket containing it. Duplicate minute keys are not expected but must
/// not crash; the last one wins. The output always has exactly one record
/// per heart-rate sample.
pub fn align(hr: &[HrSample], calories: Option<&[CalSample]>) -> Vec<AlignedRecord> {
    let buckets: HashMap<i64, f64> = calories
        .unwrap_or(&[])
        .iter()
        .map(|c| (minute_bucket(&c.ts), c.kcal_per_min))
        .collect();
    hr.iter()
        .map(|s| AlignedRecord {
            ts: s.ts,
            bpm: s.bpm,
            calories_per_sec: buckets.get(&minute_bucket(&s.ts)).map(|kcal| kcal / 60.0),
        })
        .collect()
}
