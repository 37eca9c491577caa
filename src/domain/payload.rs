use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::dates::ApiDate;
use crate::domain::models::{
    ActivityDailyRecord, DeviceRecord, HeartRateDailyRecord, HeartRateDay, HeartRateSample,
    SleepLog, SleepMinuteRecord, SleepSessionRecord, SleepStage,
};
use crate::domain::sleep_score::{SleepScoreInput, StageMinutes, compute_sleep_score};

const FITBIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),
}

#[derive(Debug, Deserialize)]
struct HeartRatePayload {
    #[serde(rename = "activities-heart", default)]
    daily: Vec<HeartRateDayPayload>,
    #[serde(rename = "activities-heart-intraday")]
    intraday: Option<IntradayPayload>,
}

#[derive(Debug, Deserialize)]
struct HeartRateDayPayload {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    #[serde(default)]
    value: HeartRateValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartRateValue {
    resting_heart_rate: Option<i64>,
    calories_out: Option<f64>,
    #[serde(default)]
    heart_rate_zones: Vec<HeartRateZone>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartRateZone {
    name: String,
    minutes: Option<i64>,
    calories_out: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IntradayPayload {
    #[serde(default)]
    dataset: Vec<IntradayPoint>,
}

#[derive(Debug, Deserialize)]
struct IntradayPoint {
    time: String,
    value: i64,
}

#[derive(Debug, Deserialize)]
struct SleepPayload {
    #[serde(default)]
    sleep: Vec<SleepEntryPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepEntryPayload {
    log_id: i64,
    date_of_sleep: String,
    start_time: String,
    end_time: String,
    duration: i64,
    efficiency: Option<i64>,
    info_code: Option<i64>,
    log_type: Option<String>,
    #[serde(rename = "type")]
    sleep_type: Option<String>,
    is_main_sleep: Option<bool>,
    awakenings_count: Option<i64>,
    time_in_bed: Option<i64>,
    minutes_asleep: Option<i64>,
    minutes_awake: Option<i64>,
    minutes_to_fall_asleep: Option<i64>,
    minutes_after_wakeup: Option<i64>,
    levels: Option<SleepLevels>,
}

#[derive(Debug, Deserialize)]
struct SleepLevels {
    #[serde(default)]
    data: Vec<SleepLevelEntry>,
    summary: Option<SleepLevelSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepLevelEntry {
    date_time: String,
    level: String,
    seconds: i64,
}

#[derive(Debug, Deserialize)]
struct SleepLevelSummary {
    deep: Option<StageSummary>,
    rem: Option<StageSummary>,
    wake: Option<StageSummary>,
}

#[derive(Debug, Deserialize)]
struct StageSummary {
    #[serde(default)]
    minutes: i64,
}

#[derive(Debug, Deserialize)]
struct ActivityPayload {
    summary: Option<ActivitySummaryPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivitySummaryPayload {
    steps: Option<i64>,
    floors: Option<i64>,
    calories_out: Option<i64>,
    activity_calories: Option<i64>,
    sedentary_minutes: Option<i64>,
    lightly_active_minutes: Option<i64>,
    fairly_active_minutes: Option<i64>,
    very_active_minutes: Option<i64>,
    #[serde(default)]
    distances: Vec<ActivityDistance>,
}

#[derive(Debug, Deserialize)]
struct ActivityDistance {
    activity: String,
    distance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicePayload {
    id: String,
    device_version: Option<String>,
    #[serde(rename = "type")]
    device_type: Option<String>,
    battery: Option<String>,
    battery_level: Option<i64>,
    last_sync_time: Option<String>,
    mac: Option<String>,
}

pub fn daily_heart_rate_summaries(payload: Value) -> Result<Vec<Value>, PayloadError> {
    match payload {
        Value::Object(mut object) => match object.remove("activities-heart") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(PayloadError::MissingField("activities-heart")),
        },
        _ => Err(PayloadError::MissingField("activities-heart")),
    }
}

/// Parses an intraday heart rate response. Sample timestamps use the date the
/// API reports for the day, falling back to the requested date.
pub fn parse_heart_rate_day(
    payload: &Value,
    requested: ApiDate,
) -> Result<HeartRateDay, PayloadError> {
    let parsed = HeartRatePayload::deserialize(payload)?;

    let daily_entry = parsed.daily.into_iter().next();
    let date = daily_entry
        .as_ref()
        .and_then(|entry| entry.date_time.clone())
        .unwrap_or_else(|| requested.to_string());

    let daily = daily_entry.map(|entry| {
        let zone = |name: &str| entry.value.heart_rate_zones.iter().find(|z| z.name == name);
        let minutes = |name: &str| zone(name).and_then(|z| z.minutes);
        let calories = |name: &str| zone(name).and_then(|z| z.calories_out);

        HeartRateDailyRecord {
            date: date.clone(),
            resting_heart_rate: entry.value.resting_heart_rate,
            calories_out: entry.value.calories_out,
            out_of_range_minutes: minutes("Out of Range"),
            out_of_range_calories: calories("Out of Range"),
            fat_burn_minutes: minutes("Fat Burn"),
            fat_burn_calories: calories("Fat Burn"),
            cardio_minutes: minutes("Cardio"),
            cardio_calories: calories("Cardio"),
            peak_minutes: minutes("Peak"),
            peak_calories: calories("Peak"),
        }
    });

    let samples = parsed
        .intraday
        .map(|intraday| intraday.dataset)
        .unwrap_or_default()
        .into_iter()
        .map(|point| HeartRateSample {
            datetime: format!("{date} {}", point.time),
            heart_rate: point.value,
        })
        .collect();

    Ok(HeartRateDay { daily, samples })
}

pub fn parse_sleep_logs(payload: &Value) -> Result<Vec<SleepLog>, PayloadError> {
    let parsed = SleepPayload::deserialize(payload)?;
    parsed.sleep.into_iter().map(build_sleep_log).collect()
}

fn build_sleep_log(entry: SleepEntryPayload) -> Result<SleepLog, PayloadError> {
    let stages = entry
        .levels
        .as_ref()
        .and_then(|levels| levels.summary.as_ref())
        .map(|summary| StageMinutes {
            deep: summary.deep.as_ref().map_or(0, |s| s.minutes),
            rem: summary.rem.as_ref().map_or(0, |s| s.minutes),
            wake: summary.wake.as_ref().map_or(0, |s| s.minutes),
        });

    let sleep_score = compute_sleep_score(&SleepScoreInput {
        minutes_asleep: entry.minutes_asleep.unwrap_or(0),
        efficiency: entry.efficiency.unwrap_or(0),
        stages,
    });

    let minutes = match &entry.levels {
        Some(levels) => expand_sleep_minutes(&levels.data)?,
        None => Vec::new(),
    };

    let session = SleepSessionRecord {
        log_id: entry.log_id,
        date_of_sleep: entry.date_of_sleep,
        start_time: normalize_timestamp(&entry.start_time)?,
        end_time: normalize_timestamp(&entry.end_time)?,
        duration_ms: entry.duration,
        efficiency: entry.efficiency,
        info_code: entry.info_code.unwrap_or(0),
        log_type: entry.log_type,
        sleep_type: entry.sleep_type,
        sleep_score,
        is_main_sleep: entry.is_main_sleep.unwrap_or(true),
        awakenings_count: entry.awakenings_count,
        time_in_bed_minutes: entry.time_in_bed,
        minutes_asleep: entry.minutes_asleep,
        minutes_awake: entry.minutes_awake,
        minutes_to_fall_asleep: entry.minutes_to_fall_asleep,
        minutes_after_wakeup: entry.minutes_after_wakeup,
    };

    Ok(SleepLog { session, minutes })
}

/// One record per whole minute of each level period. Periods shorter than a
/// minute produce nothing; a minute claimed twice keeps its first stage.
fn expand_sleep_minutes(
    entries: &[SleepLevelEntry],
) -> Result<Vec<SleepMinuteRecord>, PayloadError> {
    let mut minutes: Vec<SleepMinuteRecord> = Vec::new();

    for entry in entries {
        let period_start = parse_timestamp(&entry.date_time)?;
        let stage = SleepStage::from_level(&entry.level);

        for offset in 0..entry.seconds.max(0) / 60 {
            let minute_time = (period_start + chrono::Duration::minutes(offset))
                .format(STORAGE_TIMESTAMP_FORMAT)
                .to_string();
            if minutes.iter().any(|m| m.minute_time == minute_time) {
                continue;
            }
            minutes.push(SleepMinuteRecord { minute_time, stage });
        }
    }

    Ok(minutes)
}

pub fn parse_activity_summary(
    payload: &Value,
    date: ApiDate,
) -> Result<ActivityDailyRecord, PayloadError> {
    let parsed = ActivityPayload::deserialize(payload)?;
    let summary = parsed.summary.ok_or(PayloadError::MissingField("summary"))?;

    let distance_km = summary
        .distances
        .iter()
        .find(|distance| distance.activity == "total")
        .map(|distance| distance.distance);

    Ok(ActivityDailyRecord {
        date: date.to_string(),
        steps: summary.steps,
        distance_km,
        floors: summary.floors,
        calories_out: summary.calories_out,
        activity_calories: summary.activity_calories,
        sedentary_minutes: summary.sedentary_minutes,
        lightly_active_minutes: summary.lightly_active_minutes,
        fairly_active_minutes: summary.fairly_active_minutes,
        very_active_minutes: summary.very_active_minutes,
    })
}

pub fn parse_devices(payload: &Value) -> Result<Vec<DeviceRecord>, PayloadError> {
    let devices = Vec::<DevicePayload>::deserialize(payload)?;

    devices
        .into_iter()
        .map(|device| {
            Ok(DeviceRecord {
                device_id: device.id,
                device_version: device.device_version,
                device_type: device.device_type,
                battery: device.battery,
                battery_level: device.battery_level,
                last_sync_time: device
                    .last_sync_time
                    .as_deref()
                    .map(normalize_timestamp)
                    .transpose()?,
                mac: device.mac,
            })
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, PayloadError> {
    NaiveDateTime::parse_from_str(raw.trim(), FITBIT_TIMESTAMP_FORMAT)
        .map_err(|_| PayloadError::InvalidTimestamp(raw.to_string()))
}

/// Fitbit reports local wall-clock times without an offset; they are stored as-is.
pub fn normalize_timestamp(raw: &str) -> Result<String, PayloadError> {
    parse_timestamp(raw).map(|ts| ts.format(STORAGE_TIMESTAMP_FORMAT).to_string())
}
