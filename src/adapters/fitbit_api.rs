use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::adapters::oauth::{OAuthClient, OAuthError};
use crate::adapters::token_store::{TokenStore, TokenStoreError};
use crate::domain::dates::{ApiDate, DateError, DateRange, DetailLevel, MAX_SLEEP_RANGE_DAYS};
use crate::domain::payload::{PayloadError, daily_heart_rate_summaries};
use crate::domain::token::TokenRecord;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error(transparent)]
    Validation(#[from] DateError),
    #[error(transparent)]
    Token(#[from] TokenStoreError),
    #[error(transparent)]
    Refresh(#[from] OAuthError),
    #[error("Fitbit API returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {path} is not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("invalid API URL `{url}`: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

pub trait HealthDataSource {
    fn heart_rate_intraday(&self, date: ApiDate, detail: DetailLevel)
    -> Result<Value, ApiClientError>;
    fn sleep(&self, date: ApiDate) -> Result<Value, ApiClientError>;
    fn activity_summary(&self, date: ApiDate) -> Result<Value, ApiClientError>;
    fn devices(&self) -> Result<Value, ApiClientError>;
}

#[derive(Debug, Clone)]
pub struct FitbitClient {
    http: Client,
    base_url: Url,
    store: TokenStore,
    oauth: OAuthClient,
}

impl FitbitClient {
    pub fn new(http: Client, base_url: Url, store: TokenStore, oauth: OAuthClient) -> Self {
        Self {
            http,
            base_url,
            store,
            oauth,
        }
    }

    pub fn get_profile(&self) -> Result<Value, ApiClientError> {
        self.get_json("/1/user/-/profile.json")
    }

    pub fn get_devices(&self) -> Result<Value, ApiClientError> {
        self.get_json("/1/user/-/devices.json")
    }

    pub fn get_heart_rate_range(&self, range: DateRange) -> Result<Vec<Value>, ApiClientError> {
        let payload = self.get_json(&format!(
            "/1/user/-/activities/heart/date/{}/{}.json",
            range.start, range.end
        ))?;
        Ok(daily_heart_rate_summaries(payload)?)
    }

    pub fn get_heart_rate_intraday(
        &self,
        date: ApiDate,
        detail: DetailLevel,
    ) -> Result<Value, ApiClientError> {
        self.get_json(&format!(
            "/1/user/-/activities/heart/date/{date}/1d/{detail}.json"
        ))
    }

    pub fn get_sleep(&self, date: ApiDate) -> Result<Value, ApiClientError> {
        self.get_json(&format!("/1.2/user/-/sleep/date/{date}.json"))
    }

    pub fn get_sleep_range(&self, range: DateRange) -> Result<Value, ApiClientError> {
        let range = range.with_max_days(MAX_SLEEP_RANGE_DAYS)?;
        self.get_json(&format!(
            "/1.2/user/-/sleep/date/{}/{}.json",
            range.start, range.end
        ))
    }

    pub fn get_activity_summary(&self, date: ApiDate) -> Result<Value, ApiClientError> {
        self.get_json(&format!("/1/user/-/activities/date/{date}.json"))
    }

    /// Authenticated GET. Refreshes at most once per call: up front when the
    /// stored token has expired, otherwise after the first 401.
    pub fn get_json(&self, path: &str) -> Result<Value, ApiClientError> {
        let url = self.endpoint(path)?;
        let mut token = self.store.load()?;
        let mut refreshed = false;

        if token.is_expired(Utc::now()) {
            tracing::info!(path, "stored access token expired; refreshing");
            token = self.oauth.refresh_stored(&self.store)?;
            refreshed = true;
        }

        loop {
            let (status, body) = self.send(&url, path, &token)?;

            if status == StatusCode::UNAUTHORIZED && !refreshed {
                tracing::info!(path, "access token rejected; refreshing and retrying once");
                token = self.oauth.refresh_stored(&self.store)?;
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                return Err(ApiClientError::Status {
                    status: status.as_u16(),
                    path: path.to_string(),
                    body,
                });
            }

            tracing::debug!(path, status = status.as_u16(), bytes = body.len(), "API response");
            return serde_json::from_str(&body).map_err(|source| ApiClientError::Decode {
                path: path.to_string(),
                source,
            });
        }
    }

    fn send(
        &self,
        url: &Url,
        path: &str,
        token: &TokenRecord,
    ) -> Result<(StatusCode, String), ApiClientError> {
        let http_err = |source| ApiClientError::Http {
            path: path.to_string(),
            source,
        };

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&token.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(http_err)?;
        let status = response.status();
        let body = response.text().map_err(http_err)?;

        Ok((status, body))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiClientError> {
        let raw = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|source| ApiClientError::Url { url: raw, source })
    }
}

impl HealthDataSource for FitbitClient {
    fn heart_rate_intraday(
        &self,
        date: ApiDate,
        detail: DetailLevel,
    ) -> Result<Value, ApiClientError> {
        self.get_heart_rate_intraday(date, detail)
    }

    fn sleep(&self, date: ApiDate) -> Result<Value, ApiClientError> {
        self.get_sleep(date)
    }

    fn activity_summary(&self, date: ApiDate) -> Result<Value, ApiClientError> {
        self.get_activity_summary(date)
    }

    fn devices(&self) -> Result<Value, ApiClientError> {
        self.get_devices()
    }
}
