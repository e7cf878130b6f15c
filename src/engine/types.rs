//! Pipeline types

use crate::extract::columns::{MODULE_ID, MODULE_NAME, MODULE_TYPE, URL};
use crate::extract::ExtractedRecord;
use crate::report::ReportKind;
use std::path::PathBuf;
use std::time::Duration;

/// Module type of assignments in the course outline
pub const ASSIGNMENT_TYPE: &str = "assign";

/// Module type of quizzes in the course outline
pub const QUIZ_TYPE: &str = "quiz";

/// One activity listed on a course page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module ID (`cmid`)
    pub id: String,
    /// Display name
    pub name: String,
    /// Module type (`assign`, `quiz`, ...), empty when unknown
    pub module_type: String,
    /// Absolute link to the activity
    pub url: String,
}

impl Module {
    /// Read a module back from a course outline record
    pub fn from_record(record: &ExtractedRecord) -> Self {
        Self {
            id: record.render(MODULE_ID),
            name: record.render(MODULE_NAME),
            module_type: record.render(MODULE_TYPE),
            url: record.render(URL),
        }
    }

    /// Whether this is an assignment
    pub fn is_assignment(&self) -> bool {
        self.module_type == ASSIGNMENT_TYPE
    }

    /// Whether this is a quiz
    pub fn is_quiz(&self) -> bool {
        self.module_type == QUIZ_TYPE
    }
}

/// A course's title and activities, in page order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseOutline {
    /// Course ID
    pub course_id: String,
    /// Course title, when the page has one
    pub title: Option<String>,
    /// Activities in page order
    pub modules: Vec<Module>,
}

impl CourseOutline {
    /// An outline with no modules
    pub fn empty(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            ..Self::default()
        }
    }

    /// Assignments in page order
    pub fn assignments(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|m| m.is_assignment())
    }

    /// Quizzes whose name contains `filter` (case-insensitive), in page order
    pub fn quizzes<'a>(&'a self, filter: Option<&'a str>) -> impl Iterator<Item = &'a Module> {
        let filter = filter.map(str::to_lowercase);
        self.modules.iter().filter(move |m| {
            m.is_quiz()
                && filter
                    .as_deref()
                    .is_none_or(|f| m.name.to_lowercase().contains(f))
        })
    }

    /// Find a module by ID
    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }
}

/// Result of one pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    /// Report produced
    pub kind: ReportKind,
    /// Where the report was written
    pub report_path: PathBuf,
    /// Rows written
    pub rows: usize,
    /// Resources that failed and were skipped
    pub warnings: usize,
    /// Wall time of the stage
    pub elapsed: Duration,
}

impl StageOutcome {
    /// Whether every resource of the stage succeeded
    pub fn is_clean(&self) -> bool {
        self.warnings == 0
    }
}

/// Totals over several stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Reports written
    pub reports: usize,
    /// Rows written across all reports
    pub rows: usize,
    /// Skipped resources across all stages
    pub warnings: usize,
}

impl RunStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one stage
    pub fn add(&mut self, outcome: &StageOutcome) {
        self.reports += 1;
        self.rows += outcome.rows;
        self.warnings += outcome.warnings;
    }
}

impl<'a> FromIterator<&'a StageOutcome> for RunStats {
    fn from_iter<I: IntoIterator<Item = &'a StageOutcome>>(iter: I) -> Self {
        let mut stats = Self::new();
        for outcome in iter {
            stats.add(outcome);
        }
        stats
    }
}

/// Outcomes of a multi-stage run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// One outcome per report written
    pub outcomes: Vec<StageOutcome>,
    /// Resources that failed without producing a report
    pub skipped: usize,
}

impl RunSummary {
    /// Totals over all outcomes
    pub fn stats(&self) -> RunStats {
        let mut stats: RunStats = self.outcomes.iter().collect();
        stats.warnings += self.skipped;
        stats
    }
}
