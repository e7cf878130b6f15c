//! Session establishment and recovery
//!
//! `SessionManager` turns a resolved credential into a validated `Session`:
//!
//! ```text
//! Token ──validate──► Valid ───────────────────────────────► Session
//!                 └─► Expired ─► RequiresInteractiveCredentials
//!                                   │ prompt ─► login ─► persist ─► Session
//!                                   └ declined / rejected ─► Authentication
//! UsernamePassword ──login──► persist ─► Session   (rejected ─► Authentication)
//! ```

use super::login::{
    extract_login_token, has_login_error, is_logged_in, redirects_to_login, session_cookie,
};
use super::prompt::{CredentialProvider, PromptReason};
use super::types::{Credential, LoginCredentials, ResolvedCredential, SessionState};
use crate::config::{update_config_file, ConfigUpdate, HarvestConfig, SESSION_COOKIE};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const LOGIN_PATH: &str = "/login/index.php";
const DASHBOARD_PATH: &str = "/my/";
const AJAX_PATH: &str = "/lib/ajax/service.php";

// ============================================================================
// Session
// ============================================================================

/// An authenticated connection to one Moodle site
///
/// Every request carries the session token as the `MoodleSession` cookie.
/// Once established a session is only read, so it can be shared by the
/// fetch workers.
#[derive(Clone)]
pub struct Session {
    client: HttpClient,
    base_url: String,
    token: String,
    state: SessionState,
}

impl Session {
    /// Build an unvalidated session around a token
    pub fn from_token(
        base_url: impl Into<String>,
        token: impl Into<String>,
        http: &HttpClientConfig,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let token = token.into();
        let config = HttpClientConfigBuilder::from_config(http.clone())
            .base_url(&base_url)
            .header("Cookie", format!("{SESSION_COOKIE}={token}"))
            .build();

        Ok(Self {
            client: HttpClient::with_config(config)?,
            base_url,
            token,
            state: SessionState::Unvalidated,
        })
    }

    fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    /// Site root
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// HTTP client carrying the session cookie
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Call one Moodle AJAX web service method and return its `data`
    pub async fn call_service(&self, sesskey: &str, method: &str, args: Value) -> Result<Value> {
        let request = RequestConfig::new()
            .query("sesskey", sesskey)
            .query("info", method)
            .json(json!([{ "index": 0, "methodname": method, "args": args }]));

        let mut responses: Vec<Value> = self
            .client
            .request_json(reqwest::Method::POST, AJAX_PATH, request)
            .await?;

        if responses.is_empty() {
            return Err(Error::Other(format!("{method}: empty service response")));
        }
        let mut response = responses.swap_remove(0);

        if response.get("error").and_then(Value::as_bool).unwrap_or(false) {
            let message = response
                .pointer("/exception/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(Error::Other(format!("{method}: {message}")));
        }

        Ok(response.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session Manager
// ============================================================================

/// Validates tokens, logs in and persists new tokens
pub struct SessionManager {
    client: HttpClient,
    base_url: String,
    http: HttpClientConfig,
    config_path: PathBuf,
    provider: Arc<dyn CredentialProvider>,
}

impl SessionManager {
    /// Create a manager for the site and credential file in `config`
    pub fn new(config: &HarvestConfig, provider: Arc<dyn CredentialProvider>) -> Result<Self> {
        // Login and validation look at raw redirects
        let client_config = HttpClientConfigBuilder::from_config(config.http.clone())
            .base_url(&config.base_url)
            .no_redirects()
            .build();

        Ok(Self {
            client: HttpClient::with_config(client_config)?,
            base_url: config.base_url.clone(),
            http: config.http.clone(),
            config_path: config.config_path.clone(),
            provider,
        })
    }

    /// Check a token against the dashboard
    ///
    /// Only a 2xx page containing the logged-in marker is `Valid`. Anything
    /// else, including errors left after the client's retries, is `Expired`.
    pub async fn validate(&self, token: &str) -> Result<SessionState> {
        let request = RequestConfig::new().header("Cookie", format!("{SESSION_COOKIE}={token}"));

        let response = match self.client.get_with_config(DASHBOARD_PATH, request).await {
            Ok(response) => response,
            Err(Error::HttpStatus { status, .. }) if !(500..600).contains(&status) && status != 429 => {
                debug!(status, "Dashboard rejected token");
                return Ok(SessionState::Expired);
            }
            Err(e) if e.is_retryable() || matches!(e, Error::MaxRetriesExceeded { .. }) => {
                warn!(error = %e, "Could not reach site to validate session, treating it as expired");
                return Ok(SessionState::Expired);
            }
            Err(e) => return Err(e),
        };

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Dashboard did not return a page");
            return Ok(SessionState::Expired);
        }

        match response.text().await {
            Ok(body) if is_logged_in(&body) => Ok(SessionState::Valid),
            Ok(_) => Ok(SessionState::Expired),
            Err(e) => {
                warn!(error = %e, "Failed to read dashboard, treating session as expired");
                Ok(SessionState::Expired)
            }
        }
    }

    /// Log in with a username and password and return the new session token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        info!(username, "Logging in");

        let form_response = self.client.get(LOGIN_PATH).await?;
        let pre_login_cookie = session_cookie(form_response.headers());
        let form = form_response.text().await?;
        let login_token = extract_login_token(&form)?;

        let mut request = RequestConfig::new()
            .form_field("username", username)
            .form_field("password", password);
        if let Some(login_token) = &login_token {
            request = request.form_field("logintoken", login_token);
        } else {
            debug!("Login form has no logintoken");
        }
        if let Some(cookie) = &pre_login_cookie {
            request = request.header("Cookie", format!("{SESSION_COOKIE}={cookie}"));
        }

        let response = self.client.post_with_config(LOGIN_PATH, request).await?;
        let headers = response.headers().clone();

        if response.status().is_redirection() {
            if redirects_to_login(&headers) {
                return Err(Error::auth(format!("login rejected for user '{username}'")));
            }
        } else {
            let body = response.text().await?;
            if has_login_error(&body)? {
                return Err(Error::auth(format!("invalid login for user '{username}'")));
            }
        }

        let token = session_cookie(&headers)
            .or(pre_login_cookie)
            .ok_or_else(|| Error::auth("login response carried no session cookie"))?;

        info!(username, "Login succeeded");
        Ok(token)
    }

    /// Turn a resolved credential into a validated session
    pub async fn establish(&self, resolved: ResolvedCredential) -> Result<Session> {
        match resolved.credential {
            Credential::Token(token) => {
                info!("Validating session");
                match self.validate(&token).await? {
                    SessionState::Valid => {
                        info!("Session is valid");
                        self.session(token, SessionState::Valid)
                    }
                    state => {
                        warn!(?state, source = %resolved.source, "Stored session is invalid or expired");
                        self.recover(PromptReason::TokenExpired).await
                    }
                }
            }
            Credential::UsernamePassword { username, password } => {
                let token = self.login(&username, &password).await?;
                self.persist(&ConfigUpdate::cookie(token.clone()));
                self.session(token, SessionState::Valid)
            }
        }
    }

    /// Ask the operator for credentials, log in and persist the new token
    pub async fn login_interactive(&self, reason: PromptReason) -> Result<Session> {
        let credentials = self
            .ask(reason)
            .await?
            .ok_or_else(|| Error::auth("no credentials entered"))?;
        self.login_with(credentials).await
    }

    /// Log in with operator-supplied credentials and persist the result
    pub async fn login_with(&self, credentials: LoginCredentials) -> Result<Session> {
        let token = self
            .login(&credentials.username, &credentials.password)
            .await?;

        let mut update = ConfigUpdate::cookie(token.clone());
        if credentials.remember {
            update = update.with_login(&credentials.username, &credentials.password);
        }
        self.persist(&update);

        self.session(token, SessionState::Valid)
    }

    async fn recover(&self, reason: PromptReason) -> Result<Session> {
        debug!(state = ?SessionState::RequiresInteractiveCredentials, "Requesting credentials");
        match self.ask(reason).await? {
            Some(credentials) => self.login_with(credentials).await,
            None => Err(Error::auth(
                "stored session expired and no credentials were entered",
            )),
        }
    }

    /// Run the blocking provider off the async worker
    async fn ask(&self, reason: PromptReason) -> Result<Option<LoginCredentials>> {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || provider.request_credentials(reason))
            .await
            .map_err(|e| Error::auth(format!("credential prompt failed: {e}")))
    }

    fn session(&self, token: String, state: SessionState) -> Result<Session> {
        Ok(Session::from_token(&self.base_url, token, &self.http)?.with_state(state))
    }

    fn persist(&self, update: &ConfigUpdate) {
        match update_config_file(&self.config_path, update) {
            Ok(()) => info!(path = %self.config_path.display(), "Saved session token"),
            Err(e) => warn!(
                path = %self.config_path.display(),
                error = %e,
                "Failed to save session token"
            ),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.base_url)
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}
