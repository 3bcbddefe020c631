//! FIT activity-file encoder.
//!
//! Emits the fixed message sequence file_id, file_creator, device_info,
//! lap, session, activity, then one record per aligned heart-rate sample.
//! Lap and session carry identical aggregate fields; both are message
//! index 0 and the counts are one lap, one session.

pub mod builder;
pub mod crc;
pub mod profile;

use crate::encoder::{ActivityEncoder, NormalizedActivity};
use crate::error::PipelineResult;
use crate::sport;
use builder::{Field, FitFileBuilder, Message};
use chrono::Utc;
use profile::{BaseType, Sport, SubSport, fit_timestamp};

pub struct FitEncoder;

struct Aggregates {
    start_ts: u32,
    duration_ms: u32,
    distance_cm: u32,
    calories: u32,
    avg_hr: u32,
    max_hr: u32,
    min_hr: u32,
    speed_mm_s: u32,
    ascent_m: u32,
    sport: Sport,
    sub_sport: Option<SubSport>,
}

impl Aggregates {
    fn from_normalized(n: &NormalizedActivity) -> Self {
        let activity = &n.activity;
        let duration_s = n.duration_secs();
        let distance_km = sport::effective_distance_km(
            activity,
            sport::fit_distance_relevant(&activity.activity_name),
        );
        let distance_m = distance_km * 1000.0;
        // zero distance or zero duration must yield zero speed, not a fault
        let avg_speed = if distance_m > 0.0 && duration_s > 0.0 {
            distance_m / duration_s
        } else {
            0.0
        };
        let start_ms = n.start.with_timezone(&Utc).timestamp_millis();
        Self {
            start_ts: fit_timestamp(start_ms),
            duration_ms: (duration_s * 1000.0).round() as u32,
            distance_cm: (distance_m * 100.0).round() as u32,
            calories: activity.calories,
            avg_hr: n.stats.avg,
            max_hr: n.stats.max,
            min_hr: n.stats.min,
            speed_mm_s: (avg_speed * 1000.0).round() as u32,
            ascent_m: sport::effective_elevation_gain_m(activity),
            sport: sport::fit_sport(&activity.activity_name),
            sub_sport: sport::fit_sub_sport(&activity.activity_name),
        }
    }
}

fn file_id_message(time_created: u32) -> Message {
    Message {
        global_num: profile::MSG_FILE_ID,
        fields: vec![
            Field::new(0, BaseType::Enum, profile::FILE_TYPE_ACTIVITY),
            Field::new(1, BaseType::Uint16, profile::MANUFACTURER_GARMIN),
            Field::new(2, BaseType::Uint16, profile::PRODUCT_CONNECT),
            Field::new(4, BaseType::Uint32, time_created),
        ],
    }
}

fn file_creator_message() -> Message {
    Message {
        global_num: profile::MSG_FILE_CREATOR,
        fields: vec![Field::new(
            0,
            BaseType::Uint16,
            profile::FILE_CREATOR_SOFTWARE_VERSION,
        )],
    }
}

fn device_info_message(timestamp: u32) -> Message {
    Message {
        global_num: profile::MSG_DEVICE_INFO,
        fields: vec![
            Field::new(253, BaseType::Uint32, timestamp),
            Field::new(0, BaseType::Uint8, profile::DEVICE_INDEX_CREATOR),
            Field::new(1, BaseType::Uint8, profile::CREATOR_DEVICE_TYPE),
            Field::new(2, BaseType::Uint16, profile::MANUFACTURER_GARMIN),
            Field::new(4, BaseType::Uint16, profile::PRODUCT_CONNECT),
        ],
    }
}

fn lap_message(agg: &Aggregates) -> Message {
    let mut fields = vec![
        Field::new(253, BaseType::Uint32, agg.start_ts),
        Field::new(2, BaseType::Uint32, agg.start_ts),
        Field::new(254, BaseType::Uint16, 0),
        Field::new(7, BaseType::Uint32, agg.duration_ms),
        Field::new(8, BaseType::Uint32, agg.duration_ms),
        Field::new(52, BaseType::Uint32, agg.duration_ms),
        Field::new(9, BaseType::Uint32, agg.distance_cm),
        Field::new(11, BaseType::Uint16, agg.calories),
        Field::new(15, BaseType::Uint8, agg.avg_hr),
        Field::new(16, BaseType::Uint8, agg.max_hr),
        Field::new(63, BaseType::Uint8, agg.min_hr),
        Field::new(13, BaseType::Uint16, agg.speed_mm_s),
        Field::new(110, BaseType::Uint32, agg.speed_mm_s),
        Field::new(21, BaseType::Uint16, agg.ascent_m),
        Field::new(25, BaseType::Enum, agg.sport.code()),
    ];
    if let Some(sub) = agg.sub_sport {
        fields.push(Field::new(39, BaseType::Enum, sub.code()));
    }
    Message {
        global_num: profile::MSG_LAP,
        fields,
    }
}

fn session_message(agg: &Aggregates) -> Message {
    let mut fields = vec![
        Field::new(253, BaseType::Uint32, agg.start_ts),
        Field::new(2, BaseType::Uint32, agg.start_ts),
        Field::new(254, BaseType::Uint16, 0),
        Field::new(5, BaseType::Enum, agg.sport.code()),
        Field::new(7, BaseType::Uint32, agg.duration_ms),
        Field::new(8, BaseType::Uint32, agg.duration_ms),
        Field::new(59, BaseType::Uint32, agg.duration_ms),
        Field::new(9, BaseType::Uint32, agg.distance_cm),
        Field::new(11, BaseType::Uint16, agg.calories),
        Field::new(16, BaseType::Uint8, agg.avg_hr),
        Field::new(17, BaseType::Uint8, agg.max_hr),
        Field::new(64, BaseType::Uint8, agg.min_hr),
        Field::new(14, BaseType::Uint16, agg.speed_mm_s),
        Field::new(124, BaseType::Uint32, agg.speed_mm_s),
        Field::new(22, BaseType::Uint16, agg.ascent_m),
        Field::new(26, BaseType::Uint16, 1),
    ];
    if let Some(sub) = agg.sub_sport {
        fields.push(Field::new(6, BaseType::Enum, sub.code()));
    }
    Message {
        global_num: profile::MSG_SESSION,
        fields,
    }
}

fn activity_message(agg: &Aggregates) -> Message {
    Message {
        global_num: profile::MSG_ACTIVITY,
        fields: vec![
            Field::new(253, BaseType::Uint32, agg.start_ts),
            Field::new(0, BaseType::Uint32, agg.duration_ms),
            Field::new(1, BaseType::Uint16, 1),
        ],
    }
}

impl ActivityEncoder for FitEncoder {
    fn encode(&self, normalized: &NormalizedActivity) -> PipelineResult<Vec<u8>> {
        let agg = Aggregates::from_normalized(normalized);
        let mut builder = FitFileBuilder::new();
        builder.add(&file_id_message(agg.start_ts));
        builder.add(&file_creator_message());
        builder.add(&device_info_message(agg.start_ts));
        builder.add(&lap_message(&agg));
        builder.add(&session_message(&agg));
        builder.add(&activity_message(&agg));

        let with_calories = normalized
            .records
            .iter()
            .any(|r| r.calories_per_sec.is_some());
        let mut layout = vec![(253u8, BaseType::Uint32), (3u8, BaseType::Uint8)];
        if with_calories {
            layout.push((33, BaseType::Uint16));
        }
        let rows: Vec<Vec<u32>> = normalized
            .records
            .iter()
            .map(|r| {
                let ts = fit_timestamp(r.ts.with_timezone(&Utc).timestamp_millis());
                let mut row = vec![ts, r.bpm];
                if with_calories {
                    row.push(
                        r.calories_per_sec
                            .map(|c| c.round() as u32)
                            .unwrap_or_else(|| BaseType::Uint16.invalid()),
                    );
                }
                row
            })
            .collect();
        builder.add_rows(profile::MSG_RECORD, &layout, &rows);

        Ok(builder.build())
    }

    fn file_name(&self, log_id: i64) -> String {
        format!("exercise-{log_id}.fit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intraday::{AlignedRecord, HrStats};
    use chrono::DateTime;
    use fitbit_client::Activity;
    use std::collections::HashMap;

    type Decoded = Vec<(u16, HashMap<u8, u64>)>;

    /// Minimal structural decoder for the files this encoder writes:
    /// walks definition/data records and returns (global_num, fields)
    /// per data message, values widened to u64.
    fn decode(bytes: &[u8]) -> Decoded {
        let data_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        assert_eq!(&bytes[8..12], b".FIT");
        assert_eq!(crate::fit::crc::checksum(bytes), 0);
        let mut body = &bytes[14..14 + data_size];

        let mut defs: HashMap<u8, (u16, Vec<(u8, u8)>)> = HashMap::new();
        let mut out = Vec::new();
        while !body.is_empty() {
            let header = body[0];
            let local = header & 0x0F;
            if header & 0x40 != 0 {
                let global = u16::from_le_bytes(body[3..5].try_into().unwrap());
                let n = body[5] as usize;
                let mut fields = Vec::with_capacity(n);
                for i in 0..n {
                    fields.push((body[6 + 3 * i], body[7 + 3 * i]));
                }
                defs.insert(local, (global, fields));
                body = &body[6 + 3 * n..];
            } else {
                let (global, fields) = defs.get(&local).expect("definition before data").clone();
                let mut cursor = &body[1..];
                let mut values = HashMap::new();
                for (num, size) in &fields {
                    let raw = &cursor[..*size as usize];
                    let value = raw
                        .iter()
                        .rev()
                        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
                    values.insert(*num, value);
                    cursor = &cursor[*size as usize..];
                }
                let consumed = 1 + fields.iter().map(|(_, s)| *s as usize).sum::<usize>();
                out.push((global, values));
                body = &body[consumed..];
            }
        }
        out
    }

    fn normalized(name: &str, with_calories: bool) -> NormalizedActivity {
        let value = serde_json::json!({
            "logId": 555,
            "activityName": name,
            "startTime": "2024-05-01T06:30:00.000-07:00",
            "duration": 120_000,
            "distance": 0.5,
            "calories": 42,
            "logType": "tracker"
        });
        let activity = Activity::from_value(&value).expect("activity");
        let start = DateTime::parse_from_rfc3339(&activity.start_time).expect("start");
        let records = (0..3)
            .map(|i| AlignedRecord {
                ts: start + chrono::Duration::seconds(i),
                bpm: 90 + i as u32,
                calories_per_sec: with_calories.then_some(0.1),
            })
            .collect();
        NormalizedActivity {
            activity,
            start,
            stats: HrStats {
                min: 90,
                max: 92,
                avg: 91,
            },
            records,
        }
    }

    #[test]
    fn message_sequence_and_record_count() {
        let bytes = FitEncoder.encode(&normalized("Run", true)).expect("encode");
        let messages = decode(&bytes);
        let globals: Vec<u16> = messages.iter().map(|(g, _)| *g).collect();
        assert_eq!(
            globals,
            vec![
                profile::MSG_FILE_ID,
                profile::MSG_FILE_CREATOR,
                profile::MSG_DEVICE_INFO,
                profile::MSG_LAP,
                profile::MSG_SESSION,
                profile::MSG_ACTIVITY,
                profile::MSG_RECORD,
                profile::MSG_RECORD,
                profile::MSG_RECORD,
            ]
        );
    }

    #[test]
    fn lap_and_session_share_aggregates() {
        let bytes = FitEncoder.encode(&normalized("Run", true)).expect("encode");
        let messages = decode(&bytes);
        let lap = &messages[3].1;
        let session = &messages[4].1;

        // message_index 0 on both
        assert_eq!(lap[&254], 0);
        assert_eq!(session[&254], 0);
        // distance, calories, elapsed time
        assert_eq!(lap[&9], session[&9]);
        assert_eq!(lap[&11], session[&11]);
        assert_eq!(lap[&7], session[&7]);
        // heart rate aggregates (different field numbers per message)
        assert_eq!(lap[&15], session[&16]);
        assert_eq!(lap[&16], session[&17]);
        assert_eq!(lap[&63], session[&64]);
        // one lap, one session
        assert_eq!(session[&26], 1);
        let activity = &messages[5].1;
        assert_eq!(activity[&1], 1);
    }

    #[test]
    fn records_carry_heart_rate_and_epoch_offset_timestamps() {
        let n = normalized("Run", false);
        let bytes = FitEncoder.encode(&n).expect("encode");
        let messages = decode(&bytes);
        let first = &messages[6].1;
        assert_eq!(first[&3], 90);
        let start_ms = n.start.with_timezone(&Utc).timestamp_millis();
        assert_eq!(first[&253], u64::from(fit_timestamp(start_ms)));
        // no calorie column when no record has one
        assert!(!first.contains_key(&33));
    }

    #[test]
    fn speed_guard_zero_distance_zero_duration() {
        let mut n = normalized("Yoga", false);
        n.activity.distance = Some(0.0);
        n.activity.duration = 0;
        let bytes = FitEncoder.encode(&n).expect("encode");
        let messages = decode(&bytes);
        let lap = &messages[3].1;
        assert_eq!(lap[&13], 0);
        assert_eq!(lap[&110], 0);
    }

    #[test]
    fn sub_sport_present_only_for_refined_names() {
        let bytes = FitEncoder
            .encode(&normalized("Weights", false))
            .expect("encode");
        let messages = decode(&bytes);
        assert_eq!(messages[3].1[&39], SubSport::StrengthTraining.code() as u64);
        assert_eq!(messages[4].1[&6], SubSport::StrengthTraining.code() as u64);

        let bytes = FitEncoder.encode(&normalized("Run", false)).expect("encode");
        let messages = decode(&bytes);
        assert!(!messages[3].1.contains_key(&39));
        assert_eq!(messages[4].1[&5], Sport::Running.code() as u64);
    }

    #[test]
    fn zero_rate_calorie_minute_is_still_encoded() {
        let mut n = normalized("Run", true);
        for record in &mut n.records {
            record.calories_per_sec = Some(0.0);
        }
        let bytes = FitEncoder.encode(&n).expect("encode");
        let messages = decode(&bytes);
        let first = &messages[6].1;
        assert_eq!(first[&33], 0);
    }

    #[test]
    fn encoding_is_deterministic() {
        let n = normalized("Run", true);
        let a = FitEncoder.encode(&n).expect("encode");
        let b = FitEncoder.encode(&n).expect("encode");
        assert_eq!(a, b);
    }
}
