//! HTML extraction module
//!
//! Turns fetched Moodle pages into normalized records.
//!
//! # Overview
//!
//! `extract` dispatches on the page's `ResourceKind` to one parser per kind.
//! Parsers locate a structural landmark and tolerate everything else:
//! missing cells become `Empty`, numbers and dates are normalized, and an
//! empty but present table yields zero records.

pub mod html;
pub mod normalize;
mod parsers;
mod types;

pub use parsers::{course_title, groups, service_courses, sesskey, Group};
pub use types::{CellValue, ExtractedRecord, DATE_FORMAT, DATE_FORMAT_SECONDS};

use crate::error::Result;
use crate::types::{RawPage, ResourceKind};

/// Column names produced by the parsers
pub mod columns {
    // Course outline
    pub const MODULE_NAME: &str = "Module Name";
    pub const MODULE_ID: &str = "Module ID";
    pub const MODULE_TYPE: &str = "Module Type";
    pub const URL: &str = "URL";

    // Quiz overview
    pub const STUDENT_NAME: &str = "Student Name";
    pub const SCORE: &str = "Score";
    pub const ATTEMPTS: &str = "Attempts";

    // Assignment summary
    pub const DUE_DATE: &str = "Due Date";
    pub const TIME_REMAINING: &str = "Time Remaining";
    pub const LATE_POLICY: &str = "Late Policy";
    pub const MAX_GRADE: &str = "Max Grade";
    pub const SUBMISSION_STATUS: &str = "Submission Status";
    pub const GRADING_STATUS: &str = "Grading Status";
    pub const LAST_MODIFIED: &str = "Last Modified";
    pub const SUBMISSION_COMMENTS: &str = "Submission Comments";
    pub const PARTICIPANTS: &str = "Participants";
    pub const DRAFTS: &str = "Drafts";
    pub const SUBMITTED: &str = "Submitted";
    pub const NEEDS_GRADING: &str = "Needs Grading";

    // Grading table
    pub const NAME: &str = "Name";
    pub const STATUS: &str = "Status";
    pub const SUBMISSION: &str = "Submission";
    pub const FEEDBACK_COMMENTS: &str = "Feedback Comments";
    pub const FINAL_GRADE: &str = "Final Grade";

    // Dashboard
    pub const COURSE_ID: &str = "Course ID";
    pub const COURSE_NAME: &str = "Course Name";
    pub const CATEGORY: &str = "Category";
    pub const STARRED: &str = "Starred";

    pub const OUTLINE_COLUMNS: &[&str] = &[MODULE_NAME, MODULE_ID, MODULE_TYPE, URL];

    pub const QUIZ_COLUMNS: &[&str] = &[STUDENT_NAME, SCORE, ATTEMPTS];

    pub const SUMMARY_COLUMNS: &[&str] = &[
        DUE_DATE,
        TIME_REMAINING,
        LATE_POLICY,
        MAX_GRADE,
        SUBMISSION_STATUS,
        GRADING_STATUS,
        LAST_MODIFIED,
        SUBMISSION_COMMENTS,
        PARTICIPANTS,
        DRAFTS,
        SUBMITTED,
        NEEDS_GRADING,
    ];

    pub const GRADING_COLUMNS: &[&str] = &[
        NAME,
        STATUS,
        LAST_MODIFIED,
        SUBMISSION,
        FEEDBACK_COMMENTS,
        FINAL_GRADE,
    ];

    pub const COURSE_COLUMNS: &[&str] = &[COURSE_ID, COURSE_NAME, CATEGORY, STARRED];
}

/// Parse a fetched page into records according to its kind
pub fn extract(kind: ResourceKind, page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    match kind {
        ResourceKind::Dashboard => parsers::dashboard(page),
        ResourceKind::CourseOutline => parsers::course_outline(page),
        ResourceKind::QuizOverview => parsers::quiz_overview(page),
        ResourceKind::AssignmentSummary => parsers::assignment_summary(page),
        ResourceKind::GradingTable => parsers::grading_table(page),
    }
}

/// Parse a page according to the kind it was fetched as
pub fn extract_page(page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    extract(page.kind(), page)
}
