//! Report schemas and the validated `Report` container

use crate::error::{Error, Result};
use crate::extract::columns::*;
use crate::extract::ExtractedRecord;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Kind of report produced by a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// One row per assignment with its summary fields
    Tasks,
    /// Students by quizzes, best score per cell
    QuizScores,
    /// One row per student of an assignment grading table
    Submissions,
    /// One row per enrolled course
    Courses,
}

impl ReportKind {
    /// Stable name, used in file names and errors
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Tasks => "tasks",
            ReportKind::QuizScores => "quiz_scores",
            ReportKind::Submissions => "submissions",
            ReportKind::Courses => "courses",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a column's text is interpreted when a report is read back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Always text
    Text,
    /// Number when parseable, else text
    Number,
    /// Date when parseable, else text
    Date,
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header text
    pub name: String,
    /// Read-back interpretation
    pub column_type: ColumnType,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    /// Text column
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    /// Number column
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Number)
    }

    /// Date column
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }
}

/// Fixed column order for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSchema {
    kind: ReportKind,
    columns: Vec<Column>,
}

/// Column name for a task's display name
pub const TASK_NAME: &str = "Task Name";

/// Column name for the group filter of a submissions report
pub const GROUP_ID: &str = "Group ID";

impl ReportSchema {
    /// Create a schema from columns
    pub fn new(kind: ReportKind, columns: Vec<Column>) -> Self {
        Self { kind, columns }
    }

    /// `tasks_<course>.csv`
    pub fn tasks() -> Self {
        Self::new(
            ReportKind::Tasks,
            vec![
                Column::text(TASK_NAME),
                Column::text(MODULE_ID),
                Column::date(DUE_DATE),
                Column::text(TIME_REMAINING),
                Column::text(LATE_POLICY),
                Column::number(MAX_GRADE),
                Column::text(SUBMISSION_STATUS),
                Column::text(GRADING_STATUS),
                Column::date(LAST_MODIFIED),
                Column::number(SUBMISSION_COMMENTS),
                Column::number(PARTICIPANTS),
                Column::number(DRAFTS),
                Column::number(SUBMITTED),
                Column::number(NEEDS_GRADING),
                Column::text(URL),
            ],
        )
    }

    /// `quiz_scores_<course>.csv`: one score column per quiz
    pub fn quiz_scores<I, S>(quiz_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = vec![Column::text(STUDENT_NAME)];
        columns.extend(quiz_columns.into_iter().map(Column::number));
        Self::new(ReportKind::QuizScores, columns)
    }

    /// `submissions_<course>_mod<module>[_grp<group>].csv`
    pub fn submissions(with_group: bool) -> Self {
        let mut columns = vec![Column::text(TASK_NAME), Column::text(MODULE_ID)];
        if with_group {
            columns.push(Column::text(GROUP_ID));
        }
        columns.extend([
            Column::text(NAME),
            Column::text(STATUS),
            Column::date(LAST_MODIFIED),
            Column::text(SUBMISSION),
            Column::text(FEEDBACK_COMMENTS),
            Column::number(FINAL_GRADE),
        ]);
        Self::new(ReportKind::Submissions, columns)
    }

    /// `courses.csv`
    pub fn courses() -> Self {
        Self::new(
            ReportKind::Courses,
            vec![
                Column::text(COURSE_ID),
                Column::text(COURSE_NAME),
                Column::text(CATEGORY),
                Column::text(STARRED),
            ],
        )
    }

    /// Report kind
    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Columns in output order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in output order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// An all-`Empty` record with this schema's columns
    pub fn empty_record(&self) -> ExtractedRecord {
        ExtractedRecord::with_columns(self.column_names())
    }

    /// Check that `record` has exactly this schema's columns
    pub fn validate(&self, record: &ExtractedRecord, index: usize) -> Result<()> {
        let expected: BTreeSet<&str> = self.column_names().collect();
        let actual: BTreeSet<&str> = record.columns().collect();
        if expected == actual {
            return Ok(());
        }

        Err(Error::ReportSchema {
            report: self.kind.to_string(),
            index,
            missing: expected.difference(&actual).map(|s| (*s).to_string()).collect(),
            unexpected: actual.difference(&expected).map(|s| (*s).to_string()).collect(),
        })
    }
}

/// Ordered records sharing one schema
///
/// Every record is validated on insertion, so a `Report` that exists is
/// always writable.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    schema: ReportSchema,
    records: Vec<ExtractedRecord>,
}

impl Report {
    /// An empty report
    pub fn new(schema: ReportSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Build a report from records, validating each one
    pub fn from_records(schema: ReportSchema, records: Vec<ExtractedRecord>) -> Result<Self> {
        let mut report = Self::new(schema);
        for record in records {
            report.push(record)?;
        }
        Ok(report)
    }

    /// Append a record
    pub fn push(&mut self, record: ExtractedRecord) -> Result<()> {
        self.schema.validate(&record, self.records.len())?;
        self.records.push(record);
        Ok(())
    }

    /// Stable sort by the rendered text of one column
    pub fn sort_by_column(&mut self, column: &str) {
        self.records
            .sort_by(|a, b| a.render(column).cmp(&b.render(column)));
    }

    /// Stable sort with a custom comparator
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&ExtractedRecord, &ExtractedRecord) -> Ordering,
    {
        self.records.sort_by(compare);
    }

    /// Schema
    pub fn schema(&self) -> &ReportSchema {
        &self.schema
    }

    /// Records in order
    pub fn records(&self) -> &[ExtractedRecord] {
        &self.records
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the report has no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
