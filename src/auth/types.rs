//! Credential and session state types

use std::fmt;

/// A credential resolved for one run
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// An existing session token (the `MoodleSession` cookie value)
    Token(String),
    /// A username and password to log in with
    UsernamePassword {
        /// Login name
        username: String,
        /// Password
        password: String,
    },
}

impl Credential {
    /// Build a username/password credential
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether this is a bare token
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `--token`
    ExplicitToken,
    /// `--username` and `--password`
    ExplicitLogin,
    /// The session environment variable
    Environment,
    /// `cookie=` in the config file
    ConfigToken,
    /// `username=` and `password=` in the config file
    ConfigLogin,
    /// Typed in at the prompt
    Interactive,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ExplicitToken => "explicit token",
            Self::ExplicitLogin => "explicit username/password",
            Self::Environment => "environment",
            Self::ConfigToken => "config file cookie",
            Self::ConfigLogin => "config file username/password",
            Self::Interactive => "interactive prompt",
        };
        f.write_str(label)
    }
}

/// A credential tagged with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    /// The credential itself
    pub credential: Credential,
    /// Where it was found
    pub source: CredentialSource,
}

impl ResolvedCredential {
    /// Create a resolved credential
    pub fn new(credential: Credential, source: CredentialSource) -> Self {
        Self { credential, source }
    }
}

/// Username and password supplied by a `CredentialProvider`
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    /// Login name
    pub username: String,
    /// Password
    pub password: String,
    /// Whether the operator asked to store these in the config file
    pub remember: bool,
}

impl LoginCredentials {
    /// Create login credentials that are not remembered
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember: false,
        }
    }

    /// Mark these credentials to be stored after a successful login
    #[must_use]
    pub fn remembered(mut self) -> Self {
        self.remember = true;
        self
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remember", &self.remember)
            .finish()
    }
}

/// Lifecycle of an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Token obtained but not yet checked against the site
    Unvalidated,
    /// Site accepted the token
    Valid,
    /// Site rejected the token
    Expired,
    /// Token rejected and only a username/password from the operator can recover
    RequiresInteractiveCredentials,
}
