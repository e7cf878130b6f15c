//! Authentication module
//!
//! Resolves a credential from layered sources, validates or obtains a
//! Moodle session token, and persists new tokens to the config file.
//!
//! The `SessionManager` owns the whole state machine. Interactive input is
//! injected through the `CredentialProvider` trait.

mod credentials;
pub mod login;
mod prompt;
mod session;
mod types;

pub use credentials::{CredentialStore, ExplicitCredentials};
pub use prompt::{CannedCredentials, ConsolePrompt, CredentialProvider, PromptReason};
pub use session::{Session, SessionManager};
pub use types::{
    Credential, CredentialSource, LoginCredentials, ResolvedCredential, SessionState,
};
