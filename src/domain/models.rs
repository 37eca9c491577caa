use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateDailyRecord {
    pub date: String,
    pub resting_heart_rate: Option<i64>,
    pub calories_out: Option<f64>,
    pub out_of_range_minutes: Option<i64>,
    pub out_of_range_calories: Option<f64>,
    pub fat_burn_minutes: Option<i64>,
    pub fat_burn_calories: Option<f64>,
    pub cardio_minutes: Option<i64>,
    pub cardio_calories: Option<f64>,
    pub peak_minutes: Option<i64>,
    pub peak_calories: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartRateSample {
    pub datetime: String,
    pub heart_rate: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateDay {
    pub daily: Option<HeartRateDailyRecord>,
    pub samples: Vec<HeartRateSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepStage {
    Awake,
    Asleep,
    Restless,
    Light,
    Deep,
    Rem,
}

impl SleepStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Awake => "awake",
            Self::Asleep => "asleep",
            Self::Restless => "restless",
            Self::Light => "light",
            Self::Deep => "deep",
            Self::Rem => "rem",
        }
    }

    /// Maps a Fitbit `levels.data[].level` value. Unknown levels count as awake.
    pub fn from_level(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "asleep" => Self::Asleep,
            "restless" => Self::Restless,
            "light" => Self::Light,
            "deep" => Self::Deep,
            "rem" => Self::Rem,
            _ => Self::Awake,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleepSessionRecord {
    pub log_id: i64,
    pub date_of_sleep: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
    pub efficiency: Option<i64>,
    pub info_code: i64,
    pub log_type: Option<String>,
    pub sleep_type: Option<String>,
    pub sleep_score: i64,
    pub is_main_sleep: bool,
    pub awakenings_count: Option<i64>,
    pub time_in_bed_minutes: Option<i64>,
    pub minutes_asleep: Option<i64>,
    pub minutes_awake: Option<i64>,
    pub minutes_to_fall_asleep: Option<i64>,
    pub minutes_after_wakeup: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepMinuteRecord {
    pub minute_time: String,
    pub stage: SleepStage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleepLog {
    pub session: SleepSessionRecord,
    pub minutes: Vec<SleepMinuteRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDailyRecord {
    pub date: String,
    pub steps: Option<i64>,
    pub distance_km: Option<f64>,
    pub floors: Option<i64>,
    pub calories_out: Option<i64>,
    pub activity_calories: Option<i64>,
    pub sedentary_minutes: Option<i64>,
    pub lightly_active_minutes: Option<i64>,
    pub fairly_active_minutes: Option<i64>,
    pub very_active_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub device_version: Option<String>,
    pub device_type: Option<String>,
    pub battery: Option<String>,
    pub battery_level: Option<i64>,
    pub last_sync_time: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Failed,
    Partial,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "partial" => Ok(Self::Partial),
            other => Err(format!("unknown sync status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncLogRecord {
    pub sync_type: String,
    pub sync_date: Option<String>,
    pub records_synced: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogRecord {
    pub id: i64,
    pub sync_type: String,
    pub sync_date: Option<String>,
    pub records_synced: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}
