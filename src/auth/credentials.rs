//! Layered credential resolution
//!
//! Sources are consulted in a fixed order and the first one present wins:
//! explicit token, explicit username/password, environment token, config
//! file token, config file username/password. Resolution is read-only.

use super::types::{Credential, CredentialSource, ResolvedCredential};
use crate::config::{ConfigFile, SESSION_ENV_VAR};
use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Credentials passed directly on the command line
#[derive(Debug, Clone, Default)]
pub struct ExplicitCredentials {
    /// Session token
    pub token: Option<String>,
    /// Username (used only together with `password`)
    pub username: Option<String>,
    /// Password (used only together with `username`)
    pub password: Option<String>,
}

impl ExplicitCredentials {
    /// Explicit token only
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Explicit username and password only
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }
}

/// Resolves a credential from the layered sources
#[derive(Debug, Clone)]
pub struct CredentialStore {
    config_path: PathBuf,
    env_token: Option<String>,
}

impl CredentialStore {
    /// Create a store reading `config_path` and the process environment
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_token: std::env::var(SESSION_ENV_VAR).ok().none_if_empty(),
        }
    }

    /// Replace the environment token (tests use this instead of mutating the process env)
    #[must_use]
    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        self.env_token = token.none_if_empty();
        self
    }

    /// Path of the config file backing this store
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Resolve the highest-priority credential available
    pub fn resolve(&self, explicit: &ExplicitCredentials) -> Result<ResolvedCredential> {
        if let Some(token) = explicit.token.clone().none_if_empty() {
            return Ok(found(Credential::Token(token), CredentialSource::ExplicitToken));
        }

        let username = explicit.username.clone().none_if_empty();
        let password = explicit.password.clone().none_if_empty();
        if let (Some(username), Some(password)) = (username, password) {
            return Ok(found(
                Credential::login(username, password),
                CredentialSource::ExplicitLogin,
            ));
        }

        if let Some(token) = self.env_token.clone() {
            return Ok(found(Credential::Token(token), CredentialSource::Environment));
        }

        let file = ConfigFile::load(&self.config_path)?;
        if let Some(token) = file.cookie.clone() {
            return Ok(found(Credential::Token(token), CredentialSource::ConfigToken));
        }
        if let Some((username, password)) = file.login() {
            return Ok(found(
                Credential::login(username, password),
                CredentialSource::ConfigLogin,
            ));
        }

        Err(Error::no_credential(format!(
            "pass --token or --username/--password, set {SESSION_ENV_VAR}, \
             or add cookie= / username= and password= to {}",
            self.config_path.display()
        )))
    }
}

fn found(credential: Credential, source: CredentialSource) -> ResolvedCredential {
    info!(%source, "Resolved credential");
    ResolvedCredential::new(credential, source)
}
