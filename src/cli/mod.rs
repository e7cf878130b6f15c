//! CLI module
//!
//! Command-line interface for running harvests.
//!
//! # Commands
//!
//! - `tasks` - Export the assignment list of a course
//! - `quiz` - Export best quiz scores per student
//! - `submissions` - Export one assignment's grading table
//! - `all` - Run every course export
//! - `groups` - List an assignment's groups
//! - `courses` - List your courses
//! - `login` - Save a fresh session token

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
