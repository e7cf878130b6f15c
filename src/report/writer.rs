//! CSV report writer and reader
//!
//! Reports are rendered fully in memory, written to a temp file next to the
//! destination, then renamed into place. A crash never leaves a half-written
//! report under the final name.

use super::schema::{ColumnType, Report, ReportSchema};
use crate::error::{Error, Result, ResultExt};
use crate::extract::normalize::{date_cell, number_cell};
use crate::extract::{CellValue, ExtractedRecord};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File holding the course list
pub const COURSES_FILE: &str = "courses.csv";

/// `tasks_<course>.csv`
pub fn tasks_file(course_id: &str) -> String {
    format!("tasks_{course_id}.csv")
}

/// `quiz_scores_<course>.csv`
pub fn quiz_scores_file(course_id: &str) -> String {
    format!("quiz_scores_{course_id}.csv")
}

/// `submissions_<course>_mod<module>[_grp<group>].csv`
pub fn submissions_file(course_id: &str, module_id: &str, group: Option<&str>) -> String {
    match group {
        Some(group) => format!("submissions_{course_id}_mod{module_id}_grp{group}.csv"),
        None => format!("submissions_{course_id}_mod{module_id}.csv"),
    }
}

/// Render a report to CSV bytes
pub fn render_report(report: &Report) -> Result<Vec<u8>> {
    let schema = report.schema();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(schema.column_names())?;
    for (index, record) in report.records().iter().enumerate() {
        schema.validate(record, index)?;
        writer.write_record(schema.column_names().map(|column| record.render(column)))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

/// Write a report to `path` atomically, creating parent directories
pub fn write_report(report: &Report, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let bytes = render_report(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let temp_path = temp_path_for(path);
    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("replacing {}", path.display()))?;

    debug!(
        report = %report.schema().kind(),
        rows = report.len(),
        path = %path.display(),
        "Wrote report"
    );
    Ok(path.to_path_buf())
}

/// Read a report back, interpreting cells by the schema's column types
///
/// The header must match the schema's column order exactly.
pub fn read_report(path: impl AsRef<Path>, schema: ReportSchema) -> Result<Report> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let expected: Vec<&str> = schema.column_names().collect();
    if headers != expected {
        return Err(Error::ReportSchema {
            report: schema.kind().to_string(),
            index: 0,
            missing: expected
                .iter()
                .filter(|c| !headers.iter().any(|h| h == *c))
                .map(|c| (*c).to_string())
                .collect(),
            unexpected: headers
                .iter()
                .filter(|h| !expected.contains(&h.as_str()))
                .cloned()
                .collect(),
        });
    }

    let mut report = Report::new(schema.clone());
    for row in reader.records() {
        let row = row?;
        let mut record = ExtractedRecord::new();
        for (column, raw) in schema.columns().iter().zip(row.iter()) {
            let cell = match column.column_type {
                ColumnType::Text => CellValue::text(raw),
                ColumnType::Number => number_cell(raw),
                ColumnType::Date => date_cell(raw),
            };
            record.set(column.name.clone(), cell);
        }
        report.push(record)?;
    }

    Ok(report)
}

/// Read just the header and rows of a CSV as strings
///
/// Used for loosely coupled lookups, like finding a task name in an
/// existing tasks report.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Vec<(String, String)>>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(row.iter().map(str::to_string))
                .collect(),
        );
    }
    Ok(rows)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}
