//! Configuration for moodle-harvest
//!
//! Two layers live here:
//! - `ConfigFile`: the operator's `key=value` credential file (`.config`)
//! - `HarvestConfig`: runtime settings for one invocation (site, pool size,
//!   output locations, HTTP policy)

use crate::error::{Error, Result};
use crate::http::HttpClientConfig;
use crate::types::OptionStringExt;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

/// Default Moodle site
pub const DEFAULT_BASE_URL: &str = "https://paatshala.ictkerala.org";

/// Name of Moodle's session cookie
pub const SESSION_COOKIE: &str = "MoodleSession";

/// Environment variable holding a session token
pub const SESSION_ENV_VAR: &str = "MOODLE_SESSION_ID";

/// Default credential file
pub const DEFAULT_CONFIG_FILE: &str = ".config";

/// File remembering the last course used
pub const DEFAULT_MEMORY_FILE: &str = ".last_session";

/// Root directory for reports
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default worker pool size for the fetch stage
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default quiz name filter (case-insensitive substring)
pub const DEFAULT_QUIZ_FILTER: &str = "practice quiz";

// ============================================================================
// Credential File
// ============================================================================

/// Parsed contents of the credential file
///
/// Recognized keys are `cookie`, `username` and `password`. Keys are
/// case-insensitive, values may be quoted, and `#` starts a comment line.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Stored session token
    pub cookie: Option<String>,
    /// Stored username
    pub username: Option<String>,
    /// Stored password
    pub password: Option<String>,
}

impl ConfigFile {
    /// Parse file contents
    pub fn parse(contents: &str) -> Self {
        let mut config = Self::default();

        for line in contents.lines() {
            let Some((key, value)) = split_entry(line) else {
                continue;
            };
            let value = unquote(value).to_string().none_if_empty();
            match key.as_str() {
                "cookie" => config.cookie = value,
                "username" => config.username = value,
                "password" => config.password = value,
                _ => {}
            }
        }

        config
    }

    /// Load from disk; a missing file yields an empty config
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Username and password, when both are stored
    pub fn login(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        }
    }
}

impl fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFile")
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Values to write into the credential file; `None` leaves a key untouched
#[derive(Clone, Default)]
pub struct ConfigUpdate {
    /// New session token
    pub cookie: Option<String>,
    /// New username
    pub username: Option<String>,
    /// New password
    pub password: Option<String>,
}

impl ConfigUpdate {
    /// Update only the session token
    pub fn cookie(token: impl Into<String>) -> Self {
        Self {
            cookie: Some(token.into()),
            ..Self::default()
        }
    }

    /// Also store username and password
    #[must_use]
    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn replaces(&self, key: &str) -> bool {
        match key {
            "cookie" => self.cookie.is_some(),
            "username" => self.username.is_some(),
            "password" => self.password.is_some(),
            _ => false,
        }
    }
}

/// Rewrite the credential file with `update` applied
///
/// Comments, blank lines and unrelated keys are preserved. Replaced keys are
/// dropped from their old position; the cookie goes first and credentials
/// last. The write goes through a temp file and a rename, and the file is
/// created owner-only on Unix.
pub fn update_config_file(path: impl AsRef<Path>, update: &ConfigUpdate) -> Result<()> {
    let path = path.as_ref();
    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut lines: Vec<String> = Vec::new();
    if let Some(cookie) = &update.cookie {
        lines.push(format!("cookie={cookie}"));
    }
    for line in existing.lines() {
        match split_entry(line) {
            Some((key, _)) if update.replaces(&key) => {}
            _ => lines.push(line.to_string()),
        }
    }
    if let Some(username) = &update.username {
        lines.push(format!("username={username}"));
    }
    if let Some(password) = &update.password {
        lines.push(format!("password={password}"));
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    write_private(path, contents.as_bytes())?;

    debug!(path = %path.display(), "Updated config file");
    Ok(())
}

/// Split a `key=value` line; comments and blank lines yield None
fn split_entry(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim().to_lowercase(), value.trim()))
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"').trim_matches('\'')
}

/// Write `contents` to `path` atomically with owner-only permissions
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

// ============================================================================
// Runtime Configuration
// ============================================================================

/// Settings for one harvest invocation
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Moodle site root
    pub base_url: String,
    /// Fetch pool size
    pub concurrency: usize,
    /// Root directory for reports
    pub output_dir: PathBuf,
    /// Credential file
    pub config_path: PathBuf,
    /// Last-course memory file
    pub memory_path: PathBuf,
    /// Only quizzes whose name contains this (case-insensitive) are exported
    pub quiz_filter: Option<String>,
    /// HTTP client policy
    pub http: HttpClientConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            memory_path: PathBuf::from(DEFAULT_MEMORY_FILE),
            quiz_filter: Some(DEFAULT_QUIZ_FILTER.to_string()),
            http: HttpClientConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Create a config for a site with defaults elsewhere
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Set the fetch pool size
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the report root directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the credential file
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Set the last-course memory file
    #[must_use]
    pub fn with_memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_path = path.into();
        self
    }

    /// Set or clear the quiz name filter
    #[must_use]
    pub fn with_quiz_filter(mut self, filter: Option<String>) -> Self {
        self.quiz_filter = filter.none_if_empty();
        self
    }

    /// Set the HTTP policy
    #[must_use]
    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    /// Directory holding one course's reports
    pub fn course_dir(&self, course_id: &str) -> PathBuf {
        self.output_dir.join(format!("course_{course_id}"))
    }
}
