use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::adapters::oauth::OAuthSettings;
use crate::app::AppError;

pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/redirect";
pub const DEFAULT_TOKEN_FILE: &str = ".fitbit_tokens.json";
pub const DEFAULT_API_BASE_URL: &str = "https://api.fitbit.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
pub const DEFAULT_DB_PATH: &str = "fitbit.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Url,
    pub token_file: PathBuf,
    pub api_base_url: Url,
    pub authorize_url: Url,
    pub token_url: Url,
    pub login_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub db_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub token_file: Option<PathBuf>,
    pub db_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            client_id: non_empty(&lookup, "FITBIT_CLIENT_ID"),
            client_secret: non_empty(&lookup, "FITBIT_CLIENT_SECRET"),
            redirect_url: url_or_default(&lookup, "FITBIT_REDIRECT_URL", DEFAULT_REDIRECT_URL)?,
            token_file: non_empty(&lookup, "FITBIT_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            api_base_url: url_or_default(&lookup, "FITBIT_API_BASE_URL", DEFAULT_API_BASE_URL)?,
            authorize_url: url_or_default(&lookup, "FITBIT_AUTHORIZE_URL", DEFAULT_AUTHORIZE_URL)?,
            token_url: url_or_default(&lookup, "FITBIT_TOKEN_URL", DEFAULT_TOKEN_URL)?,
            login_timeout_secs: parse_or_default(&lookup, "FITBIT_LOGIN_TIMEOUT_SECS", 120_u64)?,
            http_timeout_secs: parse_or_default(&lookup, "FITBIT_HTTP_TIMEOUT_SECS", 30_u64)?,
            db_path: non_empty(&lookup, "FITBIT_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        })
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, AppError> {
        if let Some(client_id) = trimmed(overrides.client_id) {
            self.client_id = Some(client_id);
        }
        if let Some(client_secret) = trimmed(overrides.client_secret) {
            self.client_secret = Some(client_secret);
        }
        if let Some(raw) = trimmed(overrides.redirect_url) {
            self.redirect_url = parse_url("--redirect-url", &raw)?;
        }
        if let Some(token_file) = overrides.token_file {
            self.token_file = token_file;
        }
        if let Some(db_path) = trimmed(overrides.db_path) {
            self.db_path = db_path;
        }
        Ok(self)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Client credentials are only needed by commands that talk to the token endpoint.
    pub fn oauth_settings(&self) -> Result<OAuthSettings, AppError> {
        let client_id = self
            .client_id
            .clone()
            .ok_or_else(|| AppError::config("FITBIT_CLIENT_ID (or --client-id) is required"))?;
        let client_secret = self.client_secret.clone().ok_or_else(|| {
            AppError::config("FITBIT_CLIENT_SECRET (or --client-secret) is required")
        })?;

        Ok(OAuthSettings {
            client_id,
            client_secret,
            redirect_url: self.redirect_url.clone(),
            authorize_url: self.authorize_url.clone(),
            token_url: self.token_url.clone(),
        })
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    trimmed(lookup(key))
}

fn url_or_default<F>(lookup: &F, key: &str, default: &str) -> Result<Url, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup, key).unwrap_or_else(|| default.to_string());
    parse_url(key, &raw)
}

fn parse_url(key: &str, raw: &str) -> Result<Url, AppError> {
    Url::parse(raw).map_err(|error| AppError::config(format!("{key} must be a valid URL: {error}")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
