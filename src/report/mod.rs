//! Report module
//!
//! Aggregates extracted records into fixed-schema reports and serializes
//! them to CSV.
//!
//! # Overview
//!
//! - `ReportSchema` fixes the column order for each report kind
//! - `Report` checks every record against its schema on insertion
//! - `write_report` writes atomically; `read_report` parses a report back

mod schema;
mod writer;

pub use schema::{Column, ColumnType, Report, ReportKind, ReportSchema, GROUP_ID, TASK_NAME};
pub use writer::{
    quiz_scores_file, read_report, read_rows, render_report, submissions_file, tasks_file,
    write_report, COURSES_FILE,
};

#[cfg(test)]
mod tests;
