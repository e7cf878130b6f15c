//! CLI runner - executes commands

use crate::auth::{
    ConsolePrompt, CredentialStore, ExplicitCredentials, LoginCredentials, PromptReason, Session,
    SessionManager,
};
use crate::cli::commands::{Cli, Commands};
use crate::config::HarvestConfig;
use crate::engine::{Pipeline, RunSummary, StageOutcome};
use crate::error::{Error, Result};
use crate::state::MemoryStore;
use std::sync::Arc;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.harvest_config();

        if let Commands::Login { remember } = &self.cli.command {
            return self.login(&config, *remember).await;
        }

        // Course resolution is local, so a missing course fails before any login
        let course = match self.cli.command.course() {
            Some(course) => Some(course.to_string()),
            None if self.needs_course() => Some(self.last_course(&config)?),
            None => None,
        };

        let session = self.session(&config).await?;
        let pipeline = Pipeline::new(session, config);

        match (&self.cli.command, course.as_deref()) {
            (Commands::Tasks { .. }, Some(course)) => {
                print_outcome(&pipeline.export_tasks(course).await?);
            }
            (Commands::Quiz { .. }, Some(course)) => {
                print_outcome(&pipeline.export_quiz_scores(course).await?);
            }
            (Commands::Submissions { module, group, .. }, Some(course)) => {
                let outcome = pipeline
                    .export_submissions(course, module, group.as_deref())
                    .await?;
                print_outcome(&outcome);
            }
            (Commands::All { .. }, Some(course)) => {
                print_summary(&pipeline.export_all(course).await?);
            }
            (Commands::Groups { module }, _) => {
                let Some(groups) = tolerate(pipeline.list_groups(module).await, "list groups")?
                else {
                    return Ok(());
                };
                if groups.is_empty() {
                    println!("No groups on module {module}");
                } else {
                    println!("Groups on module {module}:");
                    for group in groups {
                        println!("  {:<10} {}", group.id, group.name);
                    }
                }
            }
            (Commands::Courses, _) => {
                if let Some(outcome) = tolerate(pipeline.list_courses().await, "list courses")? {
                    print_outcome(&outcome);
                }
            }
            (command, _) => {
                return Err(Error::config(format!("No course for command {command:?}")));
            }
        }

        Ok(())
    }

    /// Build the run configuration from the global flags
    fn harvest_config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::new(&self.cli.base_url)
            .with_concurrency(self.cli.threads)
            .with_output_dir(&self.cli.output)
            .with_config_path(&self.cli.config);
        if self.cli.command.all_quizzes() {
            config = config.with_quiz_filter(None);
        }
        config
    }

    fn needs_course(&self) -> bool {
        matches!(
            self.cli.command,
            Commands::Tasks { .. }
                | Commands::Quiz { .. }
                | Commands::Submissions { .. }
                | Commands::All { .. }
        )
    }

    /// Fall back to the course remembered from the previous run
    fn last_course(&self, config: &HarvestConfig) -> Result<String> {
        let memory = MemoryStore::new(&config.memory_path).load().ok_or_else(|| {
            Error::config("No course given and no previous course remembered (pass a course ID)")
        })?;
        info!(course = %memory.label(), "Using last course");
        Ok(memory.course_id)
    }

    fn explicit_credentials(&self) -> ExplicitCredentials {
        ExplicitCredentials {
            token: self.cli.token.clone(),
            username: self.cli.username.clone(),
            password: self.cli.password.clone(),
        }
    }

    fn session_manager(&self, config: &HarvestConfig) -> Result<SessionManager> {
        SessionManager::new(config, Arc::new(ConsolePrompt::new().offering_remember()))
    }

    /// Resolve a credential and turn it into a validated session
    async fn session(&self, config: &HarvestConfig) -> Result<Session> {
        let resolved =
            CredentialStore::new(&config.config_path).resolve(&self.explicit_credentials())?;
        self.session_manager(config)?.establish(resolved).await
    }

    async fn login(&self, config: &HarvestConfig, remember: bool) -> Result<()> {
        let manager = self.session_manager(config)?;

        let session = match (&self.cli.username, &self.cli.password) {
            (Some(username), Some(password)) => {
                let mut credentials = LoginCredentials::new(username, password);
                if remember {
                    credentials = credentials.remembered();
                }
                manager.login_with(credentials).await?
            }
            _ => manager.login_interactive(PromptReason::FirstLogin).await?,
        };

        println!("Logged in to {}", session.base_url());
        println!("Session saved to {}", config.config_path.display());
        Ok(())
    }
}

/// Let per-resource failures through as a warning; anything else ends the run
fn tolerate<T>(result: Result<T>, action: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ (Error::Fetch { .. } | Error::Extraction { .. })) => {
            warn!(error = %e, "Could not {action}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn print_outcome(outcome: &StageOutcome) {
    println!(
        "{}: {} rows -> {} ({:.1}s)",
        outcome.kind,
        outcome.rows,
        outcome.report_path.display(),
        outcome.elapsed.as_secs_f64()
    );
    if !outcome.is_clean() {
        println!("  {} resources skipped (see log)", outcome.warnings);
    }
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        print_outcome(outcome);
    }
    if summary.skipped > 0 {
        println!("{} grading tables could not be fetched", summary.skipped);
    }

    let stats = summary.stats();
    println!(
        "Done: {} reports, {} rows, {} warnings",
        stats.reports, stats.rows, stats.warnings
    );
}
