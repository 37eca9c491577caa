use thiserror::Error;

use crate::adapters::db::DbError;
use crate::adapters::fitbit_api::ApiClientError;
use crate::adapters::json_file::JsonFileError;
use crate::adapters::oauth::OAuthError;
use crate::adapters::token_store::TokenStoreError;
use crate::app::services::ServiceError;
use crate::domain::dates::DateError;
use crate::domain::payload::PayloadError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("Fitbit API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("unexpected data: {0}")]
    Parse(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("sync failed: {0}")]
    Sync(String),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn http<E: std::fmt::Display>(error: E) -> Self {
        Self::Http(error.to_string())
    }
}

impl From<DateError> for AppError {
    fn from(error: DateError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<TokenStoreError> for AppError {
    fn from(error: TokenStoreError) -> Self {
        match error {
            TokenStoreError::NotFound(_) => Self::Auth(error.to_string()),
            TokenStoreError::Io { .. } => Self::Io(error.to_string()),
            TokenStoreError::Parse { .. } => Self::Parse(error.to_string()),
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::Auth(message) => Self::Auth(message),
            OAuthError::Timeout(_) => Self::Timeout(error.to_string()),
            OAuthError::Listener(_) => Self::Io(error.to_string()),
            OAuthError::Api { status, body } => Self::Api { status, body },
            OAuthError::Http(_) => Self::Http(error.to_string()),
            OAuthError::Store(store) => store.into(),
        }
    }
}

impl From<ApiClientError> for AppError {
    fn from(error: ApiClientError) -> Self {
        match error {
            ApiClientError::Validation(date) => date.into(),
            ApiClientError::Token(store) => store.into(),
            ApiClientError::Refresh(oauth) => oauth.into(),
            ApiClientError::Status { status, body, .. } => Self::Api { status, body },
            ApiClientError::Http { .. } => Self::Http(error.to_string()),
            ApiClientError::Decode { .. } | ApiClientError::Payload(_) => {
                Self::Parse(error.to_string())
            }
            ApiClientError::Url { .. } => Self::Config(error.to_string()),
        }
    }
}

impl From<JsonFileError> for AppError {
    fn from(error: JsonFileError) -> Self {
        match error {
            JsonFileError::Io { .. } => Self::Io(error.to_string()),
            JsonFileError::Serialize { .. } => Self::Parse(error.to_string()),
        }
    }
}

impl From<PayloadError> for AppError {
    fn from(error: PayloadError) -> Self {
        Self::Parse(error.to_string())
    }
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        Self::Database(error.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Source(source) => source.into(),
            ServiceError::Payload(payload) => payload.into(),
            ServiceError::Database(db) => db.into(),
            ServiceError::Date(date) => date.into(),
            ServiceError::MonthFailed { .. } => Self::Sync(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::adapters::fitbit_api::ApiClientError;
    use crate::adapters::oauth::OAuthError;
    use crate::adapters::token_store::TokenStoreError;
    use crate::domain::dates::ApiDate;

    use super::AppError;

    #[test]
    fn maps_logging_init_error_message() {
        let err = AppError::logging_init("subscriber already set");
        assert_eq!(
            err.to_string(),
            "failed to initialize logging: subscriber already set"
        );
    }

    #[test]
    fn invalid_date_is_a_validation_error() {
        let err: AppError = ApiDate::parse("2025-13-01").unwrap_err().into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn api_status_keeps_status_and_body() {
        let err: AppError = ApiClientError::Status {
            status: 429,
            path: "/1/user/-/profile.json".to_string(),
            body: "Too Many Requests".to_string(),
        }
        .into();

        assert!(matches!(
            err,
            AppError::Api { status: 429, ref body } if body == "Too Many Requests"
        ));
    }

    #[test]
    fn refresh_failures_keep_their_category() {
        let auth: AppError =
            ApiClientError::Refresh(OAuthError::Auth("invalid_grant".to_string())).into();
        assert!(matches!(auth, AppError::Auth(_)));

        let missing: AppError =
            ApiClientError::Token(TokenStoreError::NotFound(PathBuf::from("t.json"))).into();
        assert!(matches!(missing, AppError::Auth(message) if message.contains("fitbit login")));
    }
}
