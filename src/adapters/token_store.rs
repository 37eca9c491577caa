use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::adapters::json_file::{JsonFileError, write_pretty_atomic};
use crate::domain::token::TokenRecord;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token file not found at {0}; run `fitbit login` first")]
    NotFound(PathBuf),
    #[error("failed to access token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("token file {path} is not valid token JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<JsonFileError> for TokenStoreError {
    fn from(error: JsonFileError) -> Self {
        match error {
            JsonFileError::Io { path, source } => Self::Io { path, source },
            JsonFileError::Serialize { path, source } => Self::Parse { path, source },
        }
    }
}

/// JSON file holding the one live token record. Concurrent invocations are
/// not coordinated; the last writer wins.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<TokenRecord, TokenStoreError> {
        let content = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                TokenStoreError::NotFound(self.path.clone())
            } else {
                TokenStoreError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|source| TokenStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, token: &TokenRecord) -> Result<(), TokenStoreError> {
        write_pretty_atomic(&self.path, token)?;
        tracing::debug!(path = %self.path.display(), "token file written");
        Ok(())
    }

    pub fn clear(&self) -> Result<bool, TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(TokenStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};

    use crate::domain::token::TokenRecord;

    use super::{TokenStore, TokenStoreError};

    fn sample_token() -> TokenRecord {
        TokenRecord {
            access_token: "access-abc".to_string(),
            refresh_token: "refresh-xyz".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: Utc.with_ymd_and_hms(2025, 10, 1, 16, 0, 0).unwrap(),
            scope: BTreeSet::from(["heartrate".to_string(), "sleep".to_string()]),
            user_id: Some("ABC123".to_string()),
        }
    }

    #[test]
    fn load_returns_what_save_wrote() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        let token = sample_token();

        store.save(&token).expect("save should succeed");
        let loaded = store.load().expect("load should succeed");

        assert_eq!(loaded, token);
    }

    #[test]
    fn saving_a_loaded_token_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.save(&sample_token()).expect("save should succeed");
        let first = std::fs::read_to_string(store.path()).expect("file should exist");

        store
            .save(&store.load().expect("load should succeed"))
            .expect("second save should succeed");
        let second = std::fs::read_to_string(store.path()).expect("file should exist");

        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("absent.json"));

        assert!(matches!(store.load(), Err(TokenStoreError::NotFound(_))));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{\"access_token\": 42").expect("seed file");

        let result = TokenStore::new(&path).load();
        assert!(matches!(result, Err(TokenStoreError::Parse { .. })));
    }

    #[test]
    fn clear_removes_file_once() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.save(&sample_token()).expect("save should succeed");

        assert!(store.clear().expect("clear should succeed"));
        assert!(!store.clear().expect("second clear should succeed"));
        assert!(!store.path().exists());
    }
}
