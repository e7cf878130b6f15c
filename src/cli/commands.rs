//! CLI commands and argument parsing

use crate::config::{DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_CONFIG_FILE, DEFAULT_OUTPUT_DIR};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Harvest quiz scores, assignments and submissions from Moodle into CSV
#[derive(Parser, Debug)]
#[command(name = "moodle-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Credential file (key=value lines: cookie, username, password)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Moodle site root
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Session token (MoodleSession cookie value)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Login username
    #[arg(long, global = true, requires = "password")]
    pub username: Option<String>,

    /// Login password
    #[arg(long, global = true, requires = "username")]
    pub password: Option<String>,

    /// Concurrent page fetches
    #[arg(short = 't', long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    pub threads: usize,

    /// Report root directory
    #[arg(short, long, global = true, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the assignment list with due dates and grading counts
    Tasks {
        /// Course ID (defaults to the last course used)
        course: Option<String>,
    },

    /// Export the best quiz score per student and quiz
    Quiz {
        /// Course ID (defaults to the last course used)
        course: Option<String>,

        /// Include every quiz, not only practice quizzes
        #[arg(long)]
        all_quizzes: bool,
    },

    /// Export the grading table of one assignment
    Submissions {
        /// Course ID (defaults to the last course used)
        course: Option<String>,

        /// Assignment module ID
        #[arg(short, long)]
        module: String,

        /// Group ID to filter by
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Export tasks, quiz scores and the submissions of every assignment
    All {
        /// Course ID (defaults to the last course used)
        course: Option<String>,

        /// Include every quiz, not only practice quizzes
        #[arg(long)]
        all_quizzes: bool,
    },

    /// List the groups of an assignment
    Groups {
        /// Assignment module ID
        #[arg(short, long)]
        module: String,
    },

    /// List your courses into courses.csv
    Courses,

    /// Log in and save a fresh session token
    Login {
        /// Also save the username and password
        #[arg(long)]
        remember: bool,
    },
}

impl Commands {
    /// Course argument of course-scoped commands
    pub fn course(&self) -> Option<&str> {
        match self {
            Commands::Tasks { course }
            | Commands::Quiz { course, .. }
            | Commands::Submissions { course, .. }
            | Commands::All { course, .. } => course.as_deref(),
            Commands::Groups { .. } | Commands::Courses | Commands::Login { .. } => None,
        }
    }

    /// Whether the command exports every quiz
    pub fn all_quizzes(&self) -> bool {
        matches!(
            self,
            Commands::Quiz {
                all_quizzes: true,
                ..
            } | Commands::All {
                all_quizzes: true,
                ..
            }
        )
    }
}
