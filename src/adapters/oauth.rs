use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

use crate::adapters::callback::{CallbackError, CallbackListener, CallbackParams, CallbackReply};
use crate::adapters::token_store::{TokenStore, TokenStoreError};
use crate::domain::token::{TokenRecord, TokenResponse};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("timed out after {0:?} waiting for the authorization redirect")]
    Timeout(Duration),
    #[error("redirect listener error: {0}")]
    Listener(#[source] CallbackError),
    #[error("token endpoint returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Store(#[from] TokenStoreError),
}

impl From<CallbackError> for OAuthError {
    fn from(error: CallbackError) -> Self {
        match error {
            CallbackError::Timeout(timeout) => Self::Timeout(timeout),
            other => Self::Listener(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
    pub authorize_url: Url,
    pub token_url: Url,
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    settings: OAuthSettings,
}

#[derive(Debug)]
pub struct PendingLogin {
    authorization_url: Url,
    state: String,
    code_verifier: String,
    listener: CallbackListener,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    code: String,
    code_verifier: String,
}

#[derive(Debug, Clone, Copy)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl OAuthClient {
    pub fn new(http: Client, settings: OAuthSettings) -> Self {
        Self { http, settings }
    }

    pub fn authorization_url(&self, scopes: &[String], state: &str, code_verifier: &str) -> Url {
        let mut url = self.settings.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.settings.redirect_url.as_str())
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", code_verifier)
            .append_pair("code_challenge_method", "plain");
        url
    }

    pub fn begin_login(&self, scopes: &[String]) -> Result<PendingLogin, OAuthError> {
        let listener = CallbackListener::bind_for(&self.settings.redirect_url)?;
        Ok(self.begin_login_with(scopes, listener))
    }

    pub fn begin_login_with(&self, scopes: &[String], listener: CallbackListener) -> PendingLogin {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let code_verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        let authorization_url = self.authorization_url(scopes, &state, &code_verifier);

        tracing::debug!(scopes = %scopes.join(" "), "login awaiting redirect");

        PendingLogin {
            authorization_url,
            state,
            code_verifier,
            listener,
        }
    }

    pub fn exchange_code(&self, code: &AuthorizationCode) -> Result<TokenRecord, OAuthError> {
        let redirect_uri = self.settings.redirect_url.as_str();
        self.token_request(
            Grant::AuthorizationCode,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code.code.as_str()),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code.code_verifier.as_str()),
            ],
        )
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, OAuthError> {
        self.token_request(
            Grant::RefreshToken,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
    }

    pub fn login<F>(
        &self,
        store: &TokenStore,
        scopes: &[String],
        timeout: Duration,
        present_url: F,
    ) -> Result<TokenRecord, OAuthError>
    where
        F: FnOnce(&Url),
    {
        let pending = self.begin_login(scopes)?;
        self.complete_login(pending, store, timeout, present_url)
    }

    pub fn complete_login<F>(
        &self,
        pending: PendingLogin,
        store: &TokenStore,
        timeout: Duration,
        present_url: F,
    ) -> Result<TokenRecord, OAuthError>
    where
        F: FnOnce(&Url),
    {
        present_url(pending.authorization_url());

        let code = pending.wait_for_code(timeout)?;
        let token = self.exchange_code(&code)?;
        store.save(&token)?;

        tracing::info!(
            token_file = %store.path().display(),
            expires_at = %token.expires_at,
            "login completed"
        );
        Ok(token)
    }

    pub fn refresh_stored(&self, store: &TokenStore) -> Result<TokenRecord, OAuthError> {
        let current = store.load()?;
        let mut renewed = self.refresh(&current.refresh_token)?;
        if renewed.scope.is_empty() {
            renewed.scope = current.scope;
        }
        if renewed.user_id.is_none() {
            renewed.user_id = current.user_id;
        }
        store.save(&renewed)?;

        tracing::info!(expires_at = %renewed.expires_at, "access token refreshed");
        Ok(renewed)
    }

    fn token_request(&self, grant: Grant, form: &[(&str, &str)]) -> Result<TokenRecord, OAuthError> {
        let response = self
            .http
            .post(self.settings.token_url.clone())
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_token_failure(grant, status, body));
        }

        let parsed: TokenResponse = response.json()?;
        TokenRecord::from_response(parsed, Utc::now()).map_err(|error| {
            OAuthError::Auth(format!("token endpoint returned an unusable token: {error}"))
        })
    }
}

fn classify_token_failure(grant: Grant, status: StatusCode, body: String) -> OAuthError {
    match grant {
        Grant::AuthorizationCode => OAuthError::Auth(format!(
            "token exchange rejected with {}: {body}",
            status.as_u16()
        )),
        Grant::RefreshToken if body.contains("invalid_grant") => OAuthError::Auth(
            "refresh token was rejected (invalid_grant); run `fitbit login` again".to_string(),
        ),
        Grant::RefreshToken => OAuthError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

impl PendingLogin {
    pub fn authorization_url(&self) -> &Url {
        &self.authorization_url
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Serves one redirect request. A state mismatch never yields a code.
    pub fn wait_for_code(self, timeout: Duration) -> Result<AuthorizationCode, OAuthError> {
        let expected_state = self.state;
        let params = self.listener.accept_one(timeout, |params| {
            match validate_callback(params, &expected_state) {
                Ok(_) => CallbackReply::Success,
                Err(error) => CallbackReply::Failure(error.to_string()),
            }
        })?;

        let code = validate_callback(&params, &expected_state)?;
        tracing::debug!("authorization code received");

        Ok(AuthorizationCode {
            code,
            code_verifier: self.code_verifier,
        })
    }
}

fn validate_callback(params: &CallbackParams, expected_state: &str) -> Result<String, OAuthError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or("no description");
        return Err(OAuthError::Auth(format!(
            "authorization server returned `{error}`: {description}"
        )));
    }

    match params.state.as_deref() {
        Some(state) if state == expected_state => {}
        Some(_) => return Err(OAuthError::Auth("state parameter mismatch".to_string())),
        None => return Err(OAuthError::Auth("state parameter missing".to_string())),
    }

    params
        .code
        .clone()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| OAuthError::Auth("authorization code missing from redirect".to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    use mockito::Matcher;
    use reqwest::blocking::Client;
    use url::Url;

    use crate::adapters::callback::{CallbackListener, CallbackParams};
    use crate::adapters::token_store::TokenStore;
    use crate::domain::token::DEFAULT_SCOPES;

    use super::{AuthorizationCode, OAuthClient, OAuthError, OAuthSettings, validate_callback};

    const TOKEN_BODY: &str = r#"{
        "access_token": "fresh-access",
        "refresh_token": "fresh-refresh",
        "expires_in": 28800,
        "token_type": "Bearer",
        "scope": "activity heartrate profile sleep",
        "user_id": "ABC123"
    }"#;

    fn scopes() -> Vec<String> {
        DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
    }

    fn client(token_url: &str, redirect_port: u16) -> OAuthClient {
        OAuthClient::new(
            Client::new(),
            OAuthSettings {
                client_id: "client-1".to_string(),
                client_secret: "secret-1".to_string(),
                redirect_url: Url::parse(&format!("http://127.0.0.1:{redirect_port}/redirect"))
                    .expect("valid redirect"),
                authorize_url: Url::parse("https://www.fitbit.com/oauth2/authorize")
                    .expect("valid authorize url"),
                token_url: Url::parse(token_url).expect("valid token url"),
            },
        )
    }

    fn simulate_browser(port: u16, query: String) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let mut stream =
                TcpStream::connect(("127.0.0.1", port)).expect("browser should connect");
            stream
                .write_all(format!("GET /redirect?{query} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
                .expect("request should be sent");
            let mut response = String::new();
            stream.read_to_string(&mut response).ok();
            response
        })
    }

    fn query_value(url: &Url, key: &str) -> String {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn authorization_url_carries_client_scopes_state_and_challenge() {
        let oauth = client("http://127.0.0.1:1/oauth2/token", 8080);
        let url = oauth.authorization_url(&scopes(), "state-1", "verifier-1");

        assert_eq!(url.host_str(), Some("www.fitbit.com"));
        assert_eq!(query_value(&url, "client_id"), "client-1");
        assert_eq!(query_value(&url, "response_type"), "code");
        assert_eq!(query_value(&url, "scope"), "activity heartrate profile sleep");
        assert_eq!(query_value(&url, "state"), "state-1");
        assert_eq!(query_value(&url, "code_challenge"), "verifier-1");
        assert_eq!(query_value(&url, "redirect_uri"), "http://127.0.0.1:8080/redirect");
    }

    #[test]
    fn validate_callback_rejects_mismatched_or_missing_state() {
        let mismatched = CallbackParams {
            code: Some("code".to_string()),
            state: Some("forged".to_string()),
            ..CallbackParams::default()
        };
        assert!(matches!(
            validate_callback(&mismatched, "expected"),
            Err(OAuthError::Auth(_))
        ));

        let missing_state = CallbackParams {
            code: Some("code".to_string()),
            ..CallbackParams::default()
        };
        assert!(matches!(
            validate_callback(&missing_state, "expected"),
            Err(OAuthError::Auth(_))
        ));

        let missing_code = CallbackParams {
            state: Some("expected".to_string()),
            ..CallbackParams::default()
        };
        assert!(matches!(
            validate_callback(&missing_code, "expected"),
            Err(OAuthError::Auth(_))
        ));
    }

    #[test]
    fn validate_callback_turns_error_redirect_into_auth_failure() {
        let denied = CallbackParams {
            state: Some("expected".to_string()),
            error: Some("access_denied".to_string()),
            error_description: Some("User denied".to_string()),
            ..CallbackParams::default()
        };

        assert!(matches!(
            validate_callback(&denied, "expected"),
            Err(OAuthError::Auth(message)) if message.contains("access_denied")
        ));
    }

    #[test]
    fn rejected_code_exchange_is_auth_failure() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"errors":[{"errorType":"invalid_request"}],"success":false}"#)
            .create();

        let oauth = client(&format!("{}/oauth2/token", server.url()), 8080);
        let code = AuthorizationCode {
            code: "used-code".to_string(),
            code_verifier: "verifier-1".to_string(),
        };

        assert!(matches!(oauth.exchange_code(&code), Err(OAuthError::Auth(_))));
    }

    #[test]
    fn token_with_unrepresentable_lifetime_is_auth_failure() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"a","refresh_token":"r","expires_in":9223372036854775807}"#,
            )
            .create();

        let oauth = client(&format!("{}/oauth2/token", server.url()), 8080);

        assert!(matches!(
            oauth.refresh("some-refresh"),
            Err(OAuthError::Auth(message)) if message.contains("out of range")
        ));
    }

    #[test]
    fn login_with_valid_redirect_persists_tokens() {
        let mut server = mockito::Server::new();
        let token_mock = server
            .mock("POST", "/oauth2/token")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".to_string(), "authorization_code".to_string()),
                Matcher::UrlEncoded("code".to_string(), "good-code".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(1)
            .create();

        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("addr").port();
        let oauth = client(&format!("{}/oauth2/token", server.url()), port);
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("tokens.json"));

        let pending = oauth.begin_login_with(&scopes(), CallbackListener::from_listener(listener));
        let browser = simulate_browser(port, format!("code=good-code&state={}", pending.state()));

        let token = oauth
            .complete_login(pending, &store, Duration::from_secs(5), |_| {})
            .expect("login should succeed");
        let page = browser.join().expect("browser thread should finish");

        token_mock.assert();
        assert!(page.contains("Authorization successful"));
        assert_eq!(token.access_token, "fresh-access");

        let persisted = store.load().expect("token file should exist");
        assert!(!persisted.access_token.is_empty());
        assert!(!persisted.refresh_token.is_empty());
        assert_eq!(persisted, token);
    }

    #[test]
    fn mismatched_state_never_reaches_token_endpoint() {
        let mut server = mockito::Server::new();
        let token_mock = server.mock("POST", "/oauth2/token").expect(0).create();

        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("addr").port();
        let oauth = client(&format!("{}/oauth2/token", server.url()), port);
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("tokens.json"));

        let pending = oauth.begin_login_with(&scopes(), CallbackListener::from_listener(listener));
        let browser = simulate_browser(port, "code=good-code&state=forged".to_string());

        let result = oauth.complete_login(pending, &store, Duration::from_secs(5), |_| {});
        let page = browser.join().expect("browser thread should finish");

        assert!(matches!(result, Err(OAuthError::Auth(_))));
        assert!(page.starts_with("HTTP/1.1 400"));
        assert!(!store.path().exists());
        token_mock.assert();
    }

    #[test]
    fn login_times_out_without_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("addr").port();
        let oauth = client("http://127.0.0.1:1/oauth2/token", port);

        let pending = oauth.begin_login_with(&scopes(), CallbackListener::from_listener(listener));
        let result = pending.wait_for_code(Duration::from_millis(200));

        assert!(matches!(result, Err(OAuthError::Timeout(_))));
    }

    #[test]
    fn refresh_persists_renewed_token() {
        let mut server = mockito::Server::new();
        let token_mock = server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".to_string(), "refresh_token".to_string()),
                Matcher::UrlEncoded("refresh_token".to_string(), "old-refresh".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(1)
            .create();

        let oauth = client(&format!("{}/oauth2/token", server.url()), 8080);
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store
            .save(&crate::test_support::token_expiring_in("old-access", "old-refresh", -60))
            .expect("seed token");

        let renewed = oauth.refresh_stored(&store).expect("refresh should succeed");

        token_mock.assert();
        assert_eq!(renewed.refresh_token, "fresh-refresh");
        assert_eq!(store.load().expect("token file").access_token, "fresh-access");
    }

    #[test]
    fn refresh_with_invalid_grant_requires_login() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"errors":[{"errorType":"invalid_grant","message":"Refresh token invalid"}],"success":false}"#)
            .create();

        let oauth = client(&format!("{}/oauth2/token", server.url()), 8080);
        let result = oauth.refresh("stale-refresh");

        assert!(matches!(result, Err(OAuthError::Auth(message)) if message.contains("login")));
    }

    #[test]
    fn refresh_with_server_error_surfaces_status_and_body() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/oauth2/token")
            .with_status(503)
            .with_body("maintenance")
            .create();

        let oauth = client(&format!("{}/oauth2/token", server.url()), 8080);
        let result = oauth.refresh("some-refresh");

        assert!(matches!(
            result,
            Err(OAuthError::Api { status: 503, ref body }) if body == "maintenance"
        ));
    }
}
