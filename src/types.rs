//! Common types used throughout moodle-harvest
//!
//! This module contains the resource addressing types shared by the fetch,
//! extract and engine modules, plus small utilities.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// ============================================================================
// Resource Kind
// ============================================================================

/// Category of Moodle page that can be fetched and extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// The logged-in dashboard (`/my/`)
    Dashboard,
    /// A course's main page listing its activities
    CourseOutline,
    /// The overview report of a quiz (one row per attempt)
    QuizOverview,
    /// An assignment's summary page
    AssignmentSummary,
    /// An assignment's grading table (one row per student)
    GradingTable,
}

impl ResourceKind {
    /// Stable snake_case name, used in logs and error messages
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "dashboard",
            ResourceKind::CourseOutline => "course_outline",
            ResourceKind::QuizOverview => "quiz_overview",
            ResourceKind::AssignmentSummary => "assignment_summary",
            ResourceKind::GradingTable => "grading_table",
        }
    }

    /// Path relative to the site root
    fn path(self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "my/",
            ResourceKind::CourseOutline => "course/view.php",
            ResourceKind::QuizOverview => "mod/quiz/report.php",
            ResourceKind::AssignmentSummary | ResourceKind::GradingTable => "mod/assign/view.php",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resource Reference
// ============================================================================

/// Identifies one fetchable page: a kind tag plus an opaque identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    /// What kind of page this is
    pub kind: ResourceKind,
    /// Course ID or module ID (empty for the dashboard)
    pub id: String,
    /// Optional group filter (grading tables only)
    pub group: Option<String>,
}

impl ResourceRef {
    /// Create a reference with no group filter
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            group: None,
        }
    }

    /// The logged-in dashboard
    pub fn dashboard() -> Self {
        Self::new(ResourceKind::Dashboard, "")
    }

    /// A course main page
    pub fn course(course_id: impl Into<String>) -> Self {
        Self::new(ResourceKind::CourseOutline, course_id)
    }

    /// A quiz overview report
    pub fn quiz(module_id: impl Into<String>) -> Self {
        Self::new(ResourceKind::QuizOverview, module_id)
    }

    /// An assignment summary page
    pub fn assignment(module_id: impl Into<String>) -> Self {
        Self::new(ResourceKind::AssignmentSummary, module_id)
    }

    /// An assignment grading table, optionally filtered by group
    pub fn grading(module_id: impl Into<String>, group: Option<String>) -> Self {
        Self {
            kind: ResourceKind::GradingTable,
            id: module_id.into(),
            group: group.none_if_empty(),
        }
    }

    /// Build the absolute URL of this resource under `base_url`
    pub fn url(&self, base_url: &str) -> Result<String> {
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        let mut url = base.join(self.kind.path())?;

        {
            let mut query = url.query_pairs_mut();
            match self.kind {
                ResourceKind::Dashboard => {}
                ResourceKind::CourseOutline | ResourceKind::AssignmentSummary => {
                    query.append_pair("id", &self.id);
                }
                ResourceKind::QuizOverview => {
                    query.append_pair("id", &self.id);
                    query.append_pair("mode", "overview");
                }
                ResourceKind::GradingTable => {
                    query.append_pair("id", &self.id);
                    query.append_pair("action", "grading");
                    if let Some(group) = &self.group {
                        query.append_pair("group", group);
                    }
                }
            }
        }

        // An empty query_pairs_mut() still leaves a trailing '?'
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url.into())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)?;
        if let Some(group) = &self.group {
            write!(f, "@{group}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Raw Page
// ============================================================================

/// A fetched page, not yet parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// The reference this page was fetched for
    pub reference: ResourceRef,
    /// Final URL after redirects
    pub url: String,
    /// Response body
    pub html: String,
}

impl RawPage {
    /// Create a raw page
    pub fn new(reference: ResourceRef, url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            reference,
            url: url.into(),
            html: html.into(),
        }
    }

    /// Kind of the page
    pub fn kind(&self) -> ResourceKind {
        self.reference.kind
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.trim().is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
