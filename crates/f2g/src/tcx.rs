//! TCX (Training Center XML) activity encoder.
//!
//! One `<Activity>` with a single `<Lap>` whose `<Track>` holds one
//! `<Trackpoint>` per aligned heart-rate sample. Times are written in
//! UTC regardless of the activity's local offset.

use chrono::Utc;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use crate::encoder::{ActivityEncoder, NormalizedActivity};
use crate::error::{PipelineError, PipelineResult};
use crate::sport;

const TCX_NS: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const EXT_NS: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 \
     http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd";

pub struct TcxEncoder;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn heart_rate_element(writer: &mut XmlWriter, name: &str, bpm: u32) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    text_element(writer, "Value", &bpm.to_string())?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_document(normalized: &NormalizedActivity) -> std::io::Result<Vec<u8>> {
    let activity = &normalized.activity;
    let start_utc = normalized.start.with_timezone(&Utc);
    let start_text = start_utc.format("%Y-%m-%dT%H:%M:%S.000Z").to_string();
    let distance_m = sport::effective_distance_km(
        activity,
        sport::tcx_distance_relevant(&activity.activity_name),
    ) * 1000.0;

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("TrainingCenterDatabase");
    root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    root.push_attribute(("xmlns", TCX_NS));
    root.push_attribute(("xmlns:ext", EXT_NS));
    root.push_attribute(("xmlns:xsi", XSI_NS));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("Activities")))?;

    let mut activity_el = BytesStart::new("Activity");
    activity_el.push_attribute(("Sport", sport::tcx_sport(&activity.activity_name)));
    writer.write_event(Event::Start(activity_el))?;

    text_element(&mut writer, "Id", &start_text)?;

    let mut lap = BytesStart::new("Lap");
    lap.push_attribute(("StartTime", start_text.as_str()));
    writer.write_event(Event::Start(lap))?;

    text_element(
        &mut writer,
        "TotalTimeSeconds",
        &format!("{:.1}", normalized.duration_secs()),
    )?;
    text_element(&mut writer, "DistanceMeters", &format!("{distance_m:.2}"))?;
    text_element(&mut writer, "Calories", &activity.calories.to_string())?;
    heart_rate_element(&mut writer, "AverageHeartRateBpm", normalized.stats.avg)?;
    heart_rate_element(&mut writer, "MaximumHeartRateBpm", normalized.stats.max)?;
    text_element(&mut writer, "Intensity", "Active")?;
    text_element(&mut writer, "TriggerMethod", "Manual")?;

    writer.write_event(Event::Start(BytesStart::new("Track")))?;
    for record in &normalized.records {
        writer.write_event(Event::Start(BytesStart::new("Trackpoint")))?;
        let time = record
            .ts
            .with_timezone(&Utc)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        text_element(&mut writer, "Time", &time)?;
        heart_rate_element(&mut writer, "HeartRateBpm", record.bpm)?;
        // a zero-rate minute counts as "no calorie data" in this format
        // (the binary encoder keeps it; the two formats differ upstream)
        if let Some(cal_per_sec) = record.calories_per_sec.filter(|c| *c != 0.0) {
            writer.write_event(Event::Start(BytesStart::new("Extensions")))?;
            writer.write_event(Event::Start(BytesStart::new("ext:TPX")))?;
            text_element(&mut writer, "ext:Calories", &format!("{cal_per_sec:.5}"))?;
            writer.write_event(Event::End(BytesEnd::new("ext:TPX")))?;
            writer.write_event(Event::End(BytesEnd::new("Extensions")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Trackpoint")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Track")))?;
    writer.write_event(Event::End(BytesEnd::new("Lap")))?;

    let mut creator = BytesStart::new("Creator");
    creator.push_attribute(("xsi:type", "Device_t"));
    writer.write_event(Event::Start(creator))?;
    text_element(&mut writer, "Name", &activity.source.name)?;
    text_element(&mut writer, "UnitId", "0")?;
    text_element(&mut writer, "ProductID", "0")?;
    writer.write_event(Event::End(BytesEnd::new("Creator")))?;

    writer.write_event(Event::End(BytesEnd::new("Activity")))?;
    writer.write_event(Event::End(BytesEnd::new("Activities")))?;
    writer.write_event(Event::End(BytesEnd::new("TrainingCenterDatabase")))?;

    Ok(writer.into_inner().into_inner())
}

impl ActivityEncoder for TcxEncoder {
    fn encode(&self, normalized: &NormalizedActivity) -> PipelineResult<Vec<u8>> {
        write_document(normalized).map_err(|e| PipelineError::Encode(e.to_string()))
    }

    fn file_name(&self, log_id: i64) -> String {
        format!("exercise-{log_id}.tcx")
    }
}
