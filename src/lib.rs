// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # moodle-harvest
//!
//! Exports course data from a Moodle site into CSV reports: assignment
//! lists, best quiz scores per student, grading tables and course lists.
//!
//! ## Features
//!
//! - **Layered credentials**: CLI token, CLI login, `MOODLE_SESSION_ID`, config file
//! - **Session recovery**: an expired token triggers a prompt and a fresh login
//! - **Bounded fetching**: a fixed-size concurrent pool with rate limiting
//! - **Tolerant extraction**: landmark-based HTML parsing per page kind
//! - **Fixed-schema reports**: atomic CSV writes with stable column order
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use moodle_harvest::auth::{ConsolePrompt, CredentialStore, ExplicitCredentials, SessionManager};
//! use moodle_harvest::engine::Pipeline;
//! use moodle_harvest::config::HarvestConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> moodle_harvest::Result<()> {
//!     let config = HarvestConfig::new("https://lms.example.org");
//!     let resolved = CredentialStore::new(&config.config_path)
//!         .resolve(&ExplicitCredentials::default())?;
//!
//!     let manager = SessionManager::new(&config, Arc::new(ConsolePrompt::new()))?;
//!     let session = manager.establish(resolved).await?;
//!
//!     let pipeline = Pipeline::new(session, config);
//!     let outcome = pipeline.export_tasks("450").await?;
//!     println!("{} rows -> {}", outcome.rows, outcome.report_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     CLI (clap Runner)                     │
//! └───────────────────────────────────────────────────────────┘
//!                               │
//! ┌───────────────────────────────────────────────────────────┐
//! │          Pipeline: tasks / quiz / submissions / all       │
//! └───────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────┬───────────┬──────┴──────┬───────────┬──────────┐
//! │   Auth   │   HTTP    │    Fetch    │  Extract  │  Report  │
//! ├──────────┼───────────┼─────────────┼───────────┼──────────┤
//! │ Resolve  │ Cookies   │ Bounded     │ Outline   │ Schemas  │
//! │ Validate │ Retry     │ pool        │ Summary   │ CSV      │
//! │ Login    │ Rate limit│ Isolation   │ Grading   │ Atomic   │
//! │ Persist  │ Backoff   │             │ Attempts  │ write    │
//! └──────────┴───────────┴─────────────┴───────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Resource references and raw pages
pub mod types;

/// Config file handling and run settings
pub mod config;

/// Credential resolution, login and session validation
pub mod auth;

/// HTTP client with cookies, retry and rate limiting
pub mod http;

/// Bounded concurrent page fetching
pub mod fetch;

/// HTML extraction per page kind
pub mod extract;

/// Report schemas and CSV output
pub mod report;

/// Last-course memory
pub mod state;

/// Harvest pipeline
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use engine::Pipeline;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
