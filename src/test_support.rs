use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Duration, Utc};
use reqwest::blocking::Client;
use rusqlite::Connection;
use url::Url;

use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::fitbit_api::FitbitClient;
use crate::adapters::oauth::{OAuthClient, OAuthSettings};
use crate::adapters::token_store::TokenStore;
use crate::domain::models::{SleepLog, SleepMinuteRecord, SleepSessionRecord, SleepStage};
use crate::domain::token::{TokenRecord, parse_scope};

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn open_test_connection(test_name: &str) -> Connection {
    let template = ensure_template_db();
    let test_db_path = unique_test_db_path(test_name);

    if let Some(parent) = test_db_path.parent() {
        std::fs::create_dir_all(parent).expect("test db dir should be creatable");
    }

    std::fs::copy(&template, &test_db_path).expect("template db should be copied");
    open_connection(test_db_path.to_string_lossy().as_ref()).expect("test db should open")
}

fn ensure_template_db() -> PathBuf {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH
        .get_or_init(|| {
            let template_path = std::env::var("TEST_DB_TEMPLATE_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_template_path);

            if let Some(parent) = template_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).expect("template parent dir should be creatable");
            }

            // stale templates from an older schema are rebuilt
            let _ = std::fs::remove_file(&template_path);
            let mut connection = open_connection(template_path.to_string_lossy().as_ref())
                .expect("template db opens");
            run_migrations(&mut connection).expect("template migrations should succeed");

            template_path
        })
        .clone()
}

fn default_template_path() -> PathBuf {
    Path::new("./target/testdb/fitbit_template.db").to_path_buf()
}

fn unique_test_db_path(test_name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    Path::new("./target/testdb")
        .join(format!("{test_name}-{now}-{counter}.sqlite"))
        .to_path_buf()
}

pub fn token_expiring_in(access: &str, refresh: &str, seconds: i64) -> TokenRecord {
    TokenRecord {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expires_at: Utc::now() + Duration::seconds(seconds),
        scope: parse_scope("activity heartrate profile sleep"),
        user_id: Some("ABC123".to_string()),
    }
}

pub fn oauth_client(server_url: &str) -> OAuthClient {
    OAuthClient::new(
        Client::new(),
        OAuthSettings {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            redirect_url: Url::parse("http://127.0.0.1:8080/redirect").expect("valid redirect"),
            authorize_url: Url::parse("https://www.fitbit.com/oauth2/authorize")
                .expect("valid authorize url"),
            token_url: Url::parse(&format!("{server_url}/oauth2/token"))
                .expect("valid token url"),
        },
    )
}

pub fn fitbit_client(server_url: &str, store: TokenStore) -> FitbitClient {
    FitbitClient::new(
        Client::new(),
        Url::parse(server_url).expect("valid base url"),
        store,
        oauth_client(server_url),
    )
}

pub fn sleep_minute(minute_time: &str, stage: SleepStage) -> SleepMinuteRecord {
    SleepMinuteRecord {
        minute_time: minute_time.to_string(),
        stage,
    }
}

pub fn sample_sleep_log(log_id: i64) -> SleepLog {
    SleepLog {
        session: SleepSessionRecord {
            log_id,
            date_of_sleep: "2025-10-02".to_string(),
            start_time: "2025-10-01 23:00:00".to_string(),
            end_time: "2025-10-02 07:00:00".to_string(),
            duration_ms: 28_800_000,
            efficiency: Some(92),
            info_code: 0,
            log_type: Some("auto_detected".to_string()),
            sleep_type: Some("stages".to_string()),
            sleep_score: 78,
            is_main_sleep: true,
            awakenings_count: None,
            time_in_bed_minutes: Some(480),
            minutes_asleep: Some(430),
            minutes_awake: Some(50),
            minutes_to_fall_asleep: Some(0),
            minutes_after_wakeup: Some(0),
        },
        minutes: vec![
            sleep_minute("2025-10-01 23:00:00", SleepStage::Awake),
            sleep_minute("2025-10-01 23:01:00", SleepStage::Light),
            sleep_minute("2025-10-01 23:02:00", SleepStage::Light),
        ],
    }
}
