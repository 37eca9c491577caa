use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::adapters::fitbit_api::{ApiClientError, HealthDataSource};
use crate::domain::dates::{ApiDate, DateError, DateRange, DetailLevel};
use crate::domain::models::{NewSyncLogRecord, SyncLogRecord, SyncStatus};
use crate::domain::payload::{
    PayloadError, parse_activity_summary, parse_devices, parse_heart_rate_day, parse_sleep_logs,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] ApiClientError),
    #[error("could not interpret Fitbit payload: {0}")]
    Payload(#[from] PayloadError),
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
    #[error(transparent)]
    Date(#[from] DateError),
    #[error("every day of {year}-{month:02} failed to sync; last error: {last_error}")]
    MonthFailed {
        year: i32,
        month: u32,
        last_error: String,
    },
}

impl From<rusqlite::Error> for ServiceError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database(DbError::from(error))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    HeartRate,
    HeartRateMonth,
    Sleep,
    Activity,
    Devices,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::HeartRateMonth => "heart_rate_month",
            Self::Sleep => "sleep",
            Self::Activity => "activity",
            Self::Devices => "devices",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: SyncKind,
    pub records_synced: i64,
    pub status: SyncStatus,
    pub failed_days: Vec<String>,
}

impl SyncOutcome {
    fn success(kind: SyncKind, records_synced: i64) -> Self {
        Self {
            kind,
            records_synced,
            status: SyncStatus::Success,
            failed_days: Vec::new(),
        }
    }
}

/// Fetches from a [`HealthDataSource`] and upserts into SQLite. Every public
/// sync writes exactly one `sync_log` row, whatever the outcome.
pub struct SyncService<S> {
    source: S,
    connection: Connection,
}

impl<S: HealthDataSource> SyncService<S> {
    pub fn new(source: S, connection: Connection) -> Self {
        Self { source, connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn sync_heart_rate(&mut self, date: ApiDate) -> Result<SyncOutcome, ServiceError> {
        self.recorded(SyncKind::HeartRate, Some(date), |service| {
            let records = service.store_heart_rate_day(date)?;
            Ok(SyncOutcome::success(SyncKind::HeartRate, records))
        })
    }

    /// Days that fail are logged and skipped. The run is `partial` when some
    /// days fail and `failed` when none succeed.
    pub fn sync_heart_rate_month(
        &mut self,
        year: i32,
        month: u32,
    ) -> Result<SyncOutcome, ServiceError> {
        let range = DateRange::month(year, month)?;

        self.recorded(SyncKind::HeartRateMonth, Some(range.start), |service| {
            let mut records = 0;
            let mut failed_days = Vec::new();
            let mut last_error = None;

            for day in range.iter_days() {
                match service.store_heart_rate_day(day) {
                    Ok(count) => {
                        tracing::debug!(date = %day, records = count, "heart rate day synced");
                        records += count;
                    }
                    Err(error) => {
                        tracing::warn!(date = %day, error = %error, "heart rate day failed; continuing");
                        failed_days.push(day.to_string());
                        last_error = Some(error.to_string());
                    }
                }
            }

            if failed_days.len() as i64 == range.days() {
                return Err(ServiceError::MonthFailed {
                    year,
                    month,
                    last_error: last_error.unwrap_or_default(),
                });
            }

            let status = if failed_days.is_empty() {
                SyncStatus::Success
            } else {
                SyncStatus::Partial
            };

            Ok(SyncOutcome {
                kind: SyncKind::HeartRateMonth,
                records_synced: records,
                status,
                failed_days,
            })
        })
    }

    pub fn sync_sleep(&mut self, date: ApiDate) -> Result<SyncOutcome, ServiceError> {
        self.recorded(SyncKind::Sleep, Some(date), |service| {
            let payload = service.source.sleep(date)?;
            let logs = parse_sleep_logs(&payload)?;
            let updated_at = now_timestamp();

            let transaction = service.connection.transaction()?;
            let mut minutes = 0;
            for log in &logs {
                minutes += db::replace_sleep_log(&transaction, log, &updated_at)?;
            }
            transaction.commit()?;

            tracing::info!(date = %date, sessions = logs.len(), minutes, "sleep stored");
            Ok(SyncOutcome::success(SyncKind::Sleep, logs.len() as i64))
        })
    }

    pub fn sync_activity(&mut self, date: ApiDate) -> Result<SyncOutcome, ServiceError> {
        self.recorded(SyncKind::Activity, Some(date), |service| {
            let payload = service.source.activity_summary(date)?;
            let record = parse_activity_summary(&payload, date)?;
            db::upsert_activity_daily(&service.connection, &record, &now_timestamp())?;

            Ok(SyncOutcome::success(SyncKind::Activity, 1))
        })
    }

    pub fn sync_devices(&mut self) -> Result<SyncOutcome, ServiceError> {
        self.recorded(SyncKind::Devices, None, |service| {
            let payload = service.source.devices()?;
            let devices = parse_devices(&payload)?;
            let updated_at = now_timestamp();

            let transaction = service.connection.transaction()?;
            for device in &devices {
                db::upsert_device(&transaction, device, &updated_at)?;
            }
            transaction.commit()?;

            Ok(SyncOutcome::success(SyncKind::Devices, devices.len() as i64))
        })
    }

    pub fn recent_syncs(&self, limit: u32) -> Result<Vec<SyncLogRecord>, ServiceError> {
        Ok(db::list_sync_logs(&self.connection, limit)?)
    }

    fn store_heart_rate_day(&mut self, date: ApiDate) -> Result<i64, ServiceError> {
        let payload = self.source.heart_rate_intraday(date, DetailLevel::OneMinute)?;
        let day = parse_heart_rate_day(&payload, date)?;
        let updated_at = now_timestamp();

        let transaction = self.connection.transaction()?;
        let mut records = 0;
        if let Some(daily) = &day.daily {
            db::upsert_heart_rate_daily(&transaction, daily, &updated_at)?;
            records += 1;
        }
        records += db::upsert_heart_rate_samples(&transaction, &day.samples)? as i64;
        transaction.commit()?;

        Ok(records)
    }

    fn recorded<F>(
        &mut self,
        kind: SyncKind,
        sync_date: Option<ApiDate>,
        op: F,
    ) -> Result<SyncOutcome, ServiceError>
    where
        F: FnOnce(&mut Self) -> Result<SyncOutcome, ServiceError>,
    {
        let started_at = now_timestamp();
        let result = op(self);

        let (records_synced, status, error_message) = match &result {
            Ok(outcome) => (
                outcome.records_synced,
                outcome.status,
                (!outcome.failed_days.is_empty())
                    .then(|| format!("failed days: {}", outcome.failed_days.join(", "))),
            ),
            Err(error) => (0, SyncStatus::Failed, Some(error.to_string())),
        };

        let entry = NewSyncLogRecord {
            sync_type: kind.as_str().to_string(),
            sync_date: sync_date.map(|date| date.to_string()),
            records_synced,
            status,
            error_message,
            started_at,
            finished_at: now_timestamp(),
        };

        if let Err(log_error) = db::insert_sync_log(&self.connection, &entry) {
            tracing::warn!(sync_type = kind.as_str(), error = %log_error, "failed to write sync_log");
            if result.is_ok() {
                return Err(log_error.into());
            }
        }

        match &result {
            Ok(outcome) => tracing::info!(
                sync_type = kind.as_str(),
                records = outcome.records_synced,
                status = outcome.status.as_str(),
                "sync finished"
            ),
            Err(error) => tracing::error!(sync_type = kind.as_str(), error = %error, "sync failed"),
        }

        result
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
