//! Interactive credential capability
//!
//! The session manager never reads the console itself. It asks a
//! `CredentialProvider`, which is `ConsolePrompt` in the binary and
//! `CannedCredentials` in tests.

use super::types::LoginCredentials;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Why credentials are being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReason {
    /// Nothing is configured yet (first-time setup)
    FirstLogin,
    /// The stored token was rejected by the site
    TokenExpired,
}

/// Supplies a username and password on demand
///
/// Implementations block until an answer is available. `None` means the
/// operator declined, which the session manager treats as fatal.
pub trait CredentialProvider: Send + Sync {
    /// Ask for credentials
    fn request_credentials(&self, reason: PromptReason) -> Option<LoginCredentials>;
}

// ============================================================================
// Console
// ============================================================================

/// Prompts on stderr and reads answers from stdin
#[derive(Debug, Clone, Default)]
pub struct ConsolePrompt {
    offer_remember: bool,
}

impl ConsolePrompt {
    /// Create a console prompt
    pub fn new() -> Self {
        Self::default()
    }

    /// Also ask whether to store the credentials in the config file
    #[must_use]
    pub fn offering_remember(mut self) -> Self {
        self.offer_remember = true;
        self
    }

    /// Run the prompt against arbitrary streams, reading the password from `input` too
    pub fn prompt<R: BufRead, W: Write>(
        &self,
        reason: PromptReason,
        input: &mut R,
        output: &mut W,
    ) -> Option<LoginCredentials> {
        self.prompt_with(reason, input, output, |input, output| {
            ask(input, output, "Password: ")
        })
    }

    /// Run the prompt, reading the password through `read_password`
    pub fn prompt_with<R, W, P>(
        &self,
        reason: PromptReason,
        input: &mut R,
        output: &mut W,
        read_password: P,
    ) -> Option<LoginCredentials>
    where
        R: BufRead,
        W: Write,
        P: FnOnce(&mut R, &mut W) -> Option<String>,
    {
        let intro = match reason {
            PromptReason::FirstLogin => "No authentication configured.",
            PromptReason::TokenExpired => "Stored session is invalid or expired.",
        };
        writeln!(output, "\n{intro}\nPlease enter your credentials:").ok()?;

        let username = ask(input, output, "Username: ")?;
        let password = read_password(input, output).filter(|p| !p.is_empty())?;

        let remember = if self.offer_remember {
            ask(input, output, "Save credentials to config file? (y/n): ")
                .is_some_and(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes"))
        } else {
            false
        };

        Some(LoginCredentials {
            username,
            password,
            remember,
        })
    }
}

impl CredentialProvider for ConsolePrompt {
    fn request_credentials(&self, reason: PromptReason) -> Option<LoginCredentials> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stderr();
        // The password is read from the terminal with echo disabled
        self.prompt_with(reason, &mut input, &mut output, |_, _| {
            rpassword::prompt_password("Password: ").ok()
        })
    }
}

/// Print `label` and read one trimmed, non-empty line
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Option<String> {
    write!(output, "{label}").ok()?;
    output.flush().ok()?;

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = line.trim().to_string();
            (!line.is_empty()).then_some(line)
        }
    }
}

// ============================================================================
// Canned
// ============================================================================

/// Returns preset answers in order, then declines
#[derive(Debug, Default)]
pub struct CannedCredentials {
    answers: Mutex<VecDeque<LoginCredentials>>,
    calls: AtomicUsize,
}

impl CannedCredentials {
    /// A provider that answers with `credentials` once
    pub fn new(credentials: LoginCredentials) -> Self {
        Self::sequence(vec![credentials])
    }

    /// A provider that answers with each entry in turn
    pub fn sequence(answers: Vec<LoginCredentials>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that always declines
    pub fn declining() -> Self {
        Self::default()
    }

    /// How many times credentials were requested
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for CannedCredentials {
    fn request_credentials(&self, _reason: PromptReason) -> Option<LoginCredentials> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers.lock().ok()?.pop_front()
    }
}

#[cfg(test)]
mod prompt_tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_console_prompt_reads_credentials() {
        let mut input = Cursor::new("alice\nhunter2\n");
        let mut output = Vec::new();

        let creds = ConsolePrompt::new()
            .prompt(PromptReason::TokenExpired, &mut input, &mut output)
            .unwrap();

        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "hunter2");
        assert!(!creds.remember);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("invalid or expired"));
        assert!(shown.contains("Password: "));
    }

    #[test]
    fn test_console_prompt_password_bypasses_input_stream() {
        let mut input = Cursor::new("alice\ny\n");
        let mut output = Vec::new();

        let creds = ConsolePrompt::new()
            .offering_remember()
            .prompt_with(PromptReason::FirstLogin, &mut input, &mut output, |_, _| {
                Some("s3cret".to_string())
            })
            .unwrap();

        assert_eq!(creds.password, "s3cret");
        assert!(creds.remember);

        let shown = String::from_utf8(output).unwrap();
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn test_console_prompt_hidden_password_declined() {
        let mut input = Cursor::new("alice\n");
        let mut output = Vec::new();

        assert!(ConsolePrompt::new()
            .prompt_with(PromptReason::FirstLogin, &mut input, &mut output, |_, _| None)
            .is_none());
    }

    #[test]
    fn test_console_prompt_remember() {
        let mut input = Cursor::new("bob\npw\nYes\n");
        let mut output = Vec::new();

        let creds = ConsolePrompt::new()
            .offering_remember()
            .prompt(PromptReason::FirstLogin, &mut input, &mut output)
            .unwrap();

        assert!(creds.remember);
    }

    #[test]
    fn test_console_prompt_empty_username_declines() {
        let mut input = Cursor::new("\npw\n");
        let mut output = Vec::new();

        assert!(ConsolePrompt::new()
            .prompt(PromptReason::FirstLogin, &mut input, &mut output)
            .is_none());
    }

    #[test]
    fn test_console_prompt_eof_declines() {
        let mut input = Cursor::new("carol\n");
        let mut output = Vec::new();

        assert!(ConsolePrompt::new()
            .prompt(PromptReason::TokenExpired, &mut input, &mut output)
            .is_none());
    }

    #[test]
    fn test_canned_credentials_sequence() {
        let provider = CannedCredentials::sequence(vec![
            LoginCredentials::new("a", "1"),
            LoginCredentials::new("b", "2"),
        ]);

        assert_eq!(
            provider
                .request_credentials(PromptReason::TokenExpired)
                .map(|c| c.username),
            Some("a".to_string())
        );
        assert_eq!(
            provider
                .request_credentials(PromptReason::TokenExpired)
                .map(|c| c.username),
            Some("b".to_string())
        );
        assert!(provider
            .request_credentials(PromptReason::TokenExpired)
            .is_none());
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn test_declining_provider() {
        let provider = CannedCredentials::declining();
        assert!(provider.request_credentials(PromptReason::FirstLogin).is_none());
        assert_eq!(provider.calls(), 1);
    }
}
