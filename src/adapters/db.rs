use rusqlite::{Connection, params};
use thiserror::Error;

use crate::domain::models::{
    ActivityDailyRecord, DeviceRecord, HeartRateDailyRecord, HeartRateSample, NewSyncLogRecord,
    SleepLog, SleepMinuteRecord, SleepStage, SyncLogRecord, SyncStatus,
};

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS sleep_sessions (
    log_id INTEGER PRIMARY KEY,
    date_of_sleep TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    duration_minutes INTEGER GENERATED ALWAYS AS (duration_ms / 60000) STORED,
    efficiency INTEGER,
    info_code INTEGER NOT NULL DEFAULT 0,
    log_type TEXT,
    sleep_type TEXT,
    sleep_score INTEGER CHECK (sleep_score BETWEEN 0 AND 100),
    is_main_sleep INTEGER NOT NULL DEFAULT 1,
    awakenings_count INTEGER,
    time_in_bed_minutes INTEGER,
    minutes_asleep INTEGER,
    minutes_awake INTEGER,
    minutes_to_fall_asleep INTEGER,
    minutes_after_wakeup INTEGER,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sleep_sessions_date_of_sleep
ON sleep_sessions (date_of_sleep);

CREATE TABLE IF NOT EXISTS sleep_minutes (
    log_id INTEGER NOT NULL REFERENCES sleep_sessions (log_id) ON DELETE CASCADE,
    minute_time TEXT NOT NULL,
    stage TEXT NOT NULL CHECK (stage IN ('awake', 'asleep', 'restless', 'light', 'deep', 'rem')),
    PRIMARY KEY (log_id, minute_time)
);

CREATE TABLE IF NOT EXISTS heart_rate_daily (
    date TEXT PRIMARY KEY,
    resting_heart_rate INTEGER,
    calories_out REAL,
    out_of_range_minutes INTEGER,
    out_of_range_calories REAL,
    fat_burn_minutes INTEGER,
    fat_burn_calories REAL,
    cardio_minutes INTEGER,
    cardio_calories REAL,
    peak_minutes INTEGER,
    peak_calories REAL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS heart_rate_intraday (
    datetime TEXT PRIMARY KEY,
    heart_rate INTEGER NOT NULL CHECK (heart_rate >= 0),
    date TEXT GENERATED ALWAYS AS (substr(datetime, 1, 10)) STORED
);

CREATE INDEX IF NOT EXISTS idx_heart_rate_intraday_date
ON heart_rate_intraday (date);

CREATE TABLE IF NOT EXISTS activity_daily (
    date TEXT PRIMARY KEY,
    steps INTEGER,
    distance_km REAL,
    floors INTEGER,
    calories_out INTEGER,
    activity_calories INTEGER,
    sedentary_minutes INTEGER,
    lightly_active_minutes INTEGER,
    fairly_active_minutes INTEGER,
    very_active_minutes INTEGER,
    active_minutes INTEGER GENERATED ALWAYS AS (
        COALESCE(lightly_active_minutes, 0)
        + COALESCE(fairly_active_minutes, 0)
        + COALESCE(very_active_minutes, 0)
    ) STORED,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS devices (
    device_id TEXT PRIMARY KEY,
    device_version TEXT,
    device_type TEXT,
    battery TEXT,
    battery_level INTEGER,
    last_sync_time TEXT,
    mac TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sync_type TEXT NOT NULL,
    sync_date TEXT,
    records_synced INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL CHECK (status IN ('success', 'failed', 'partial')),
    error_message TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_sync_log_started_at_desc
ON sync_log (started_at DESC);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
    #[error("unexpected value `{value}` in column {column}")]
    InvalidColumn { column: &'static str, value: String },
}

/// Opens the database with foreign keys enforced, so sleep minutes follow
/// their session on delete.
pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    let connection = Connection::open(path)?;
    connection.pragma_update(None, "foreign_keys", true)?;
    Ok(connection)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

pub fn upsert_heart_rate_daily(
    connection: &Connection,
    record: &HeartRateDailyRecord,
    updated_at: &str,
) -> Result<(), DbError> {
    connection.execute(
        "INSERT INTO heart_rate_daily (
            date, resting_heart_rate, calories_out,
            out_of_range_minutes, out_of_range_calories,
            fat_burn_minutes, fat_burn_calories,
            cardio_minutes, cardio_calories,
            peak_minutes, peak_calories, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT (date) DO UPDATE SET
            resting_heart_rate = excluded.resting_heart_rate,
            calories_out = excluded.calories_out,
            out_of_range_minutes = excluded.out_of_range_minutes,
            out_of_range_calories = excluded.out_of_range_calories,
            fat_burn_minutes = excluded.fat_burn_minutes,
            fat_burn_calories = excluded.fat_burn_calories,
            cardio_minutes = excluded.cardio_minutes,
            cardio_calories = excluded.cardio_calories,
            peak_minutes = excluded.peak_minutes,
            peak_calories = excluded.peak_calories,
            updated_at = excluded.updated_at",
        params![
            record.date,
            record.resting_heart_rate,
            record.calories_out,
            record.out_of_range_minutes,
            record.out_of_range_calories,
            record.fat_burn_minutes,
            record.fat_burn_calories,
            record.cardio_minutes,
            record.cardio_calories,
            record.peak_minutes,
            record.peak_calories,
            updated_at,
        ],
    )?;

    Ok(())
}

pub fn upsert_heart_rate_samples(
    connection: &Connection,
    samples: &[HeartRateSample],
) -> Result<usize, DbError> {
    let mut statement = connection.prepare(
        "INSERT INTO heart_rate_intraday (datetime, heart_rate) VALUES (?1, ?2)
         ON CONFLICT (datetime) DO UPDATE SET heart_rate = excluded.heart_rate",
    )?;

    for sample in samples {
        statement.execute(params![sample.datetime, sample.heart_rate])?;
    }

    Ok(samples.len())
}

pub fn count_heart_rate_samples(connection: &Connection, date: &str) -> Result<i64, DbError> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM heart_rate_intraday WHERE date = ?1",
        params![date],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Upserts the session row and replaces its minute records. Runs inside the
/// caller's transaction when given one.
pub fn replace_sleep_log(
    connection: &Connection,
    log: &SleepLog,
    updated_at: &str,
) -> Result<usize, DbError> {
    let session = &log.session;
    connection.execute(
        "INSERT INTO sleep_sessions (
            log_id, date_of_sleep, start_time, end_time, duration_ms, efficiency,
            info_code, log_type, sleep_type, sleep_score, is_main_sleep,
            awakenings_count, time_in_bed_minutes, minutes_asleep, minutes_awake,
            minutes_to_fall_asleep, minutes_after_wakeup, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
         ON CONFLICT (log_id) DO UPDATE SET
            date_of_sleep = excluded.date_of_sleep,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            duration_ms = excluded.duration_ms,
            efficiency = excluded.efficiency,
            info_code = excluded.info_code,
            log_type = excluded.log_type,
            sleep_type = excluded.sleep_type,
            sleep_score = excluded.sleep_score,
            is_main_sleep = excluded.is_main_sleep,
            awakenings_count = excluded.awakenings_count,
            time_in_bed_minutes = excluded.time_in_bed_minutes,
            minutes_asleep = excluded.minutes_asleep,
            minutes_awake = excluded.minutes_awake,
            minutes_to_fall_asleep = excluded.minutes_to_fall_asleep,
            minutes_after_wakeup = excluded.minutes_after_wakeup,
            updated_at = excluded.updated_at",
        params![
            session.log_id,
            session.date_of_sleep,
            session.start_time,
            session.end_time,
            session.duration_ms,
            session.efficiency,
            session.info_code,
            session.log_type,
            session.sleep_type,
            session.sleep_score,
            session.is_main_sleep,
            session.awakenings_count,
            session.time_in_bed_minutes,
            session.minutes_asleep,
            session.minutes_awake,
            session.minutes_to_fall_asleep,
            session.minutes_after_wakeup,
            updated_at,
        ],
    )?;

    connection.execute(
        "DELETE FROM sleep_minutes WHERE log_id = ?1",
        params![session.log_id],
    )?;

    let mut statement = connection
        .prepare("INSERT INTO sleep_minutes (log_id, minute_time, stage) VALUES (?1, ?2, ?3)")?;
    for minute in &log.minutes {
        statement.execute(params![
            session.log_id,
            minute.minute_time,
            minute.stage.as_str()
        ])?;
    }

    Ok(log.minutes.len())
}

pub fn list_sleep_minutes(
    connection: &Connection,
    log_id: i64,
) -> Result<Vec<SleepMinuteRecord>, DbError> {
    let mut statement = connection.prepare(
        "SELECT minute_time, stage FROM sleep_minutes WHERE log_id = ?1 ORDER BY minute_time",
    )?;

    let rows = statement.query_map(params![log_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut minutes = Vec::new();
    for row in rows {
        let (minute_time, stage) = row?;
        minutes.push(SleepMinuteRecord {
            minute_time,
            stage: SleepStage::from_level(&stage),
        });
    }

    Ok(minutes)
}

pub fn upsert_activity_daily(
    connection: &Connection,
    record: &ActivityDailyRecord,
    updated_at: &str,
) -> Result<(), DbError> {
    connection.execute(
        "INSERT INTO activity_daily (
            date, steps, distance_km, floors, calories_out, activity_calories,
            sedentary_minutes, lightly_active_minutes, fairly_active_minutes,
            very_active_minutes, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (date) DO UPDATE SET
            steps = excluded.steps,
            distance_km = excluded.distance_km,
            floors = excluded.floors,
            calories_out = excluded.calories_out,
            activity_calories = excluded.activity_calories,
            sedentary_minutes = excluded.sedentary_minutes,
            lightly_active_minutes = excluded.lightly_active_minutes,
            fairly_active_minutes = excluded.fairly_active_minutes,
            very_active_minutes = excluded.very_active_minutes,
            updated_at = excluded.updated_at",
        params![
            record.date,
            record.steps,
            record.distance_km,
            record.floors,
            record.calories_out,
            record.activity_calories,
            record.sedentary_minutes,
            record.lightly_active_minutes,
            record.fairly_active_minutes,
            record.very_active_minutes,
            updated_at,
        ],
    )?;

    Ok(())
}

pub fn upsert_device(
    connection: &Connection,
    device: &DeviceRecord,
    updated_at: &str,
) -> Result<(), DbError> {
    connection.execute(
        "INSERT INTO devices (
            device_id, device_version, device_type, battery, battery_level,
            last_sync_time, mac, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (device_id) DO UPDATE SET
            device_version = excluded.device_version,
            device_type = excluded.device_type,
            battery = excluded.battery,
            battery_level = excluded.battery_level,
            last_sync_time = excluded.last_sync_time,
            mac = excluded.mac,
            updated_at = excluded.updated_at",
        params![
            device.device_id,
            device.device_version,
            device.device_type,
            device.battery,
            device.battery_level,
            device.last_sync_time,
            device.mac,
            updated_at,
        ],
    )?;

    Ok(())
}

pub fn insert_sync_log(connection: &Connection, entry: &NewSyncLogRecord) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO sync_log (
            sync_type, sync_date, records_synced, status, error_message, started_at, finished_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.sync_type,
            entry.sync_date,
            entry.records_synced,
            entry.status.as_str(),
            entry.error_message,
            entry.started_at,
            entry.finished_at,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn list_sync_logs(connection: &Connection, limit: u32) -> Result<Vec<SyncLogRecord>, DbError> {
    let mut statement = connection.prepare(
        "SELECT id, sync_type, sync_date, records_synced, status, error_message, started_at, finished_at
         FROM sync_log
         ORDER BY started_at DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = statement.query_map(params![i64::from(limit)], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, sync_type, sync_date, records_synced, status, error_message, started_at, finished_at) =
            row?;
        let status = status
            .parse::<SyncStatus>()
            .map_err(|_| DbError::InvalidColumn {
                column: "sync_log.status",
                value: status.clone(),
            })?;

        entries.push(SyncLogRecord {
            id,
            sync_type,
            sync_date,
            records_synced,
            status,
            error_message,
            started_at,
            finished_at,
        });
    }

    Ok(entries)
}
