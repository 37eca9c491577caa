use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SCOPES: &[&str] = &["activity", "heartrate", "profile", "sleep"];

const TOKEN_REFRESH_BUFFER_SECONDS: i64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("token lifetime `expires_in = {0}` is out of range")]
pub struct ExpiryOutOfRange(pub i64);

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TokenRecord {
    pub fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<Self, ExpiryOutOfRange> {
        let expires_at = TimeDelta::try_seconds(response.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(ExpiryOutOfRange(response.expires_in))?;

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            expires_at,
            scope: parse_scope(response.scope.as_deref().unwrap_or_default()),
            user_id: response.user_id,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_BUFFER_SECONDS) >= self.expires_at
    }
}

pub fn parse_scope(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn default_token_type() -> String {
    "Bearer".to_string()
}
