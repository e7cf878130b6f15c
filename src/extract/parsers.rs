//! Page parsers, one per resource kind
//!
//! Each parser locates a structural landmark first. A missing landmark is an
//! `Extraction` error; anything inside it that is missing or oddly shaped
//! degrades to `Empty` cells or skipped rows.

use super::columns::*;
use super::html::{
    absolute_url, cells, find_landmark, has_class, id_param, select_all, select_first, selector,
    text, visible_text,
};
use super::normalize::{comments_count, date_cell, number_cell, parse_number};
use super::types::{CellValue, ExtractedRecord};
use crate::error::{Error, Result};
use crate::types::{RawPage, ResourceKind};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

static SESSKEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""sesskey":"([^"]+)""#).unwrap());

static MODULE_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/mod/([a-z0-9_]+)/view\.php").unwrap());

fn missing(kind: ResourceKind, landmark: &str) -> Error {
    Error::extraction(kind.as_str(), format!("no {landmark} found on page"))
}

// ============================================================================
// Course Outline
// ============================================================================

const OUTLINE_LANDMARKS: &[&str] = &[".course-content", "#region-main", r#"[role="main"]"#];

/// One record per activity on a course page
pub fn course_outline(page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    let document = Html::parse_document(&page.html);
    let content = find_landmark(&document, OUTLINE_LANDMARKS)?
        .ok_or_else(|| missing(ResourceKind::CourseOutline, "course content"))?;

    let mut items = select_all(content, "li.activity")?;
    if items.is_empty() {
        items = select_all(content, r#"li[class*="modtype_"]"#)?;
    }

    let link_selector = selector(r#"a[href*="/mod/"]"#)?;
    let name_selector = selector(".instancename")?;
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for item in items {
        let Some(link) = item.select(&link_selector).find(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| MODULE_PATH_REGEX.is_match(href))
        }) else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default();

        let Some(module_id) = id_param(href).or_else(|| item_module_id(item)) else {
            continue;
        };
        if !seen.insert(module_id.clone()) {
            continue;
        }

        let module_type = module_type(item).or_else(|| {
            MODULE_PATH_REGEX
                .captures(href)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });

        let name = link
            .select(&name_selector)
            .next()
            .map_or_else(|| visible_text(link), visible_text);

        records.push(
            ExtractedRecord::with_columns(OUTLINE_COLUMNS)
                .with(MODULE_NAME, name)
                .with(MODULE_ID, module_id)
                .with(MODULE_TYPE, module_type)
                .with(URL, absolute_url(&page.url, href)),
        );
    }

    Ok(records)
}

/// `modtype_quiz` → `quiz`
fn module_type(item: ElementRef<'_>) -> Option<String> {
    item.value()
        .classes()
        .find_map(|c| c.strip_prefix("modtype_"))
        .map(str::to_string)
}

/// `id="module-123"` → `123`
fn item_module_id(item: ElementRef<'_>) -> Option<String> {
    item.value()
        .id()
        .and_then(|id| id.strip_prefix("module-"))
        .map(str::to_string)
}

/// Course title from a course page heading
pub fn course_title(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let heading = find_landmark(&document, &[".page-header-headings h1", "#page-header h1", "h1"])?
        .map(visible_text)
        .filter(|t| !t.is_empty());
    Ok(heading)
}

// ============================================================================
// Quiz Overview
// ============================================================================

const GRADE_FALLBACK_INDEX: usize = 8;

/// Best score per student from a quiz overview report
///
/// A student with several graded attempts keeps the maximum. Students are
/// keyed by display name, so two accounts sharing a name collapse into one
/// record, matching the name-keyed `quiz_scores` report.
pub fn quiz_overview(page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    let document = Html::parse_document(&page.html);
    let table = find_landmark(&document, &["table#attempts", "table.generaltable"])?
        .ok_or_else(|| missing(ResourceKind::QuizOverview, "attempts table"))?;

    let headers = header_texts(table)?;
    let grade_index = headers
        .iter()
        .position(|h| h.starts_with("grade"))
        .unwrap_or(GRADE_FALLBACK_INDEX);

    let user_link = selector(r#"a[href*="user/view.php"]"#)?;
    let mut best: BTreeMap<String, (f64, u32)> = BTreeMap::new();

    for row in body_rows(table)? {
        let Some(student) = row.select(&user_link).next().map(visible_text) else {
            continue;
        };
        if student.is_empty() {
            continue;
        }
        let row_cells = cells(row);
        let Some(grade) = row_cells.get(grade_index).and_then(|c| parse_number(&text(*c))) else {
            continue;
        };

        let entry = best.entry(student).or_insert((grade, 0));
        entry.0 = entry.0.max(grade);
        entry.1 += 1;
    }

    Ok(best
        .into_iter()
        .map(|(student, (score, attempts))| {
            ExtractedRecord::with_columns(QUIZ_COLUMNS)
                .with(STUDENT_NAME, student)
                .with(SCORE, score)
                .with(ATTEMPTS, f64::from(attempts))
        })
        .collect())
}

// ============================================================================
// Assignment Summary
// ============================================================================

/// Label fragments (lowercase) and the column each one fills
const SUMMARY_LABELS: &[(&str, &str)] = &[
    ("participants", PARTICIPANTS),
    ("drafts", DRAFTS),
    ("submitted", SUBMITTED),
    ("needs grading", NEEDS_GRADING),
    ("due date", DUE_DATE),
    ("time remaining", TIME_REMAINING),
    ("late submissions", LATE_POLICY),
    ("submission status", SUBMISSION_STATUS),
    ("grading status", GRADING_STATUS),
    ("last modified", LAST_MODIFIED),
    ("maximum grade", MAX_GRADE),
    ("max grade", MAX_GRADE),
];

/// The single summary record of an assignment page
pub fn assignment_summary(page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    let document = Html::parse_document(&page.html);
    let root = find_landmark(&document, &["#region-main", r#"[role="main"]"#, "table"])?
        .ok_or_else(|| missing(ResourceKind::AssignmentSummary, "main region"))?;

    let mut found: BTreeMap<&str, String> = BTreeMap::new();
    scan_labels(root, &mut found)?;
    // The student-facing status table wins over the grading overview
    for status_table in select_all(root, ".submissionstatustable")? {
        scan_labels(status_table, &mut found)?;
    }

    let mut record = ExtractedRecord::with_columns(SUMMARY_COLUMNS);
    for (column, value) in found {
        let cell = match column {
            PARTICIPANTS | DRAFTS | SUBMITTED | NEEDS_GRADING | MAX_GRADE => number_cell(&value),
            DUE_DATE | LAST_MODIFIED => date_cell(&value),
            _ => CellValue::text(value),
        };
        record.set(column, cell);
    }

    let comments = select_all(root, "a")?
        .into_iter()
        .find_map(|a| comments_count(&text(a)));
    record.set(SUBMISSION_COMMENTS, comments);

    Ok(vec![record])
}

fn scan_labels(root: ElementRef<'_>, found: &mut BTreeMap<&'static str, String>) -> Result<()> {
    let th = selector("th")?;
    let td = selector("td")?;

    for row in select_all(root, "tr")? {
        let (Some(label), Some(value)) = (row.select(&th).next(), row.select(&td).next()) else {
            continue;
        };
        let label = text(label).to_lowercase();
        let value = text(value);
        if value.is_empty() {
            continue;
        }
        for &(fragment, column) in SUMMARY_LABELS {
            if label.contains(fragment) {
                found.insert(column, value.clone());
            }
        }
    }
    Ok(())
}

// ============================================================================
// Grading Table
// ============================================================================

/// Fallback cell positions in Moodle's default grading table layout
const NAME_INDEX: usize = 2;
const STATUS_INDEX: usize = 4;
const LAST_MODIFIED_INDEX: usize = 7;
const SUBMISSION_INDEX: usize = 8;
const FEEDBACK_INDEX: usize = 11;
const FINAL_GRADE_INDEX: usize = 13;

/// One record per student row of an assignment grading table
pub fn grading_table(page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    let document = Html::parse_document(&page.html);
    let table = find_landmark(&document, &["table.flexible.generaltable", "table.generaltable"])?
        .ok_or_else(|| missing(ResourceKind::GradingTable, "grading table"))?;

    let headers = header_texts(table)?;
    let column = |predicate: &dyn Fn(&str) -> bool, fallback: usize| {
        headers
            .iter()
            .position(|h| predicate(h.as_str()))
            .unwrap_or(fallback)
    };
    let name_at = column(&|h| h.contains("name") && !h.contains("user"), NAME_INDEX);
    let status_at = column(&|h| h == "status", STATUS_INDEX);
    let modified_at = column(&|h| h.starts_with("last modified"), LAST_MODIFIED_INDEX);
    let submission_at = column(
        &|h| {
            (h.contains("submission") || h.contains("online text"))
                && !h.contains("comment")
                && !h.starts_with("last modified")
        },
        SUBMISSION_INDEX,
    );
    let feedback_at = column(&|h| h.starts_with("feedback comments"), FEEDBACK_INDEX);
    let grade_at = column(&|h| h.starts_with("final grade"), FINAL_GRADE_INDEX);

    let anchor = selector("a")?;
    let mut records = Vec::new();

    for row in body_rows(table)? {
        let row_cells = cells(row);
        let Some(name_cell) = row_cells.get(name_at) else {
            continue;
        };
        let name = name_cell
            .select(&anchor)
            .next()
            .map_or_else(|| visible_text(*name_cell), visible_text);
        if name.is_empty() {
            continue;
        }

        let cell_text = |index: usize| row_cells.get(index).map(|c| text(*c)).unwrap_or_default();

        let mut record = ExtractedRecord::with_columns(GRADING_COLUMNS).with(NAME, name);
        if let Some(status) = row_cells.get(status_at) {
            record.set(STATUS, status_text(*status)?);
        }
        record.set(LAST_MODIFIED, date_cell(&cell_text(modified_at)));
        if let Some(submission) = row_cells.get(submission_at) {
            record.set(SUBMISSION, submission_text(*submission)?);
        }
        record.set(FEEDBACK_COMMENTS, cell_text(feedback_at));
        record.set(FINAL_GRADE, number_cell(&cell_text(grade_at)));
        records.push(record);
    }

    Ok(records)
}

/// Status badges joined with ` | `
fn status_text(cell: ElementRef<'_>) -> Result<String> {
    let parts: Vec<String> = select_all(cell, "div")?
        .into_iter()
        .map(text)
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        Ok(text(cell))
    } else {
        Ok(parts.join(" | "))
    }
}

/// Uploaded file names, else online text, else the cell text
fn submission_text(cell: ElementRef<'_>) -> Result<String> {
    let files: Vec<String> = select_all(cell, r#"a[href*="pluginfile.php"]"#)?
        .into_iter()
        .map(text)
        .filter(|t| !t.is_empty())
        .collect();
    if !files.is_empty() {
        return Ok(files.join(", "));
    }
    if let Some(online) = select_first(cell, ".no-overflow")? {
        return Ok(text(online));
    }
    Ok(text(cell))
}

/// Groups offered by the group selector on a grading page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group ID (the `group` query value)
    pub id: String,
    /// Display name
    pub name: String,
}

/// Options of `select[name="group"]`; no selector means no groups
pub fn groups(html: &str) -> Result<Vec<Group>> {
    let document = Html::parse_document(html);
    let Some(select) = find_landmark(&document, &[r#"select[name="group"]"#])? else {
        return Ok(Vec::new());
    };

    Ok(select_all(select, "option")?
        .into_iter()
        .filter_map(|option| {
            let id = option.value().attr("value")?.trim().to_string();
            let name = text(option);
            (!id.is_empty() && !name.is_empty()).then_some(Group { id, name })
        })
        .collect())
}

// ============================================================================
// Dashboard
// ============================================================================

/// One record per distinct course link on the dashboard
pub fn dashboard(page: &RawPage) -> Result<Vec<ExtractedRecord>> {
    let document = Html::parse_document(&page.html);
    let body = find_landmark(&document, &["body"])?
        .ok_or_else(|| missing(ResourceKind::Dashboard, "body"))?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for link in select_all(body, r#"a[href*="/course/view.php"]"#)? {
        let Some(course_id) = link.value().attr("href").and_then(id_param) else {
            continue;
        };
        if !course_id.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let name = visible_text(link);
        if name.is_empty() || !seen.insert(course_id.clone()) {
            continue;
        }
        records.push(course_record(course_id, name, None, false));
    }

    Ok(records)
}

/// Course records from a Moodle course-listing web service response
///
/// Accepts both `{"courses": [...]}` and a bare array.
pub fn service_courses(data: &Value) -> Vec<ExtractedRecord> {
    let courses = data
        .get("courses")
        .and_then(Value::as_array)
        .or_else(|| data.as_array());

    courses
        .into_iter()
        .flatten()
        .filter_map(|course| {
            let id = match course.get("id")? {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                _ => return None,
            };
            let name = course.get("fullname").and_then(Value::as_str).unwrap_or_default();
            let category = course.get("coursecategory").and_then(Value::as_str);
            let starred = course
                .get("isfavourite")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(course_record(id, name.to_string(), category, starred))
        })
        .collect()
}

fn course_record(id: String, name: String, category: Option<&str>, starred: bool) -> ExtractedRecord {
    ExtractedRecord::with_columns(COURSE_COLUMNS)
        .with(COURSE_ID, id)
        .with(COURSE_NAME, name)
        .with(CATEGORY, category)
        .with(STARRED, if starred { "Yes" } else { "No" })
}

/// Session key embedded in the page's JavaScript config
pub fn sesskey(html: &str) -> Option<String> {
    SESSKEY_REGEX
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// ============================================================================
// Table helpers
// ============================================================================

/// Lowercased header texts of a table
fn header_texts(table: ElementRef<'_>) -> Result<Vec<String>> {
    let header_row = match select_first(table, "thead tr")? {
        Some(row) => Some(row),
        None => select_all(table, "tr")?
            .into_iter()
            .find(|row| is_header_row(*row)),
    };

    Ok(header_row
        .map(|row| {
            cells(row)
                .into_iter()
                .map(|c| visible_text(c).to_lowercase())
                .collect()
        })
        .unwrap_or_default())
}

/// Data rows of a table, without header or `emptyrow` placeholders
fn body_rows(table: ElementRef<'_>) -> Result<Vec<ElementRef<'_>>> {
    let has_thead = select_first(table, "thead")?.is_some();
    let rows = match select_first(table, "tbody")? {
        Some(tbody) if has_thead => select_all(tbody, "tr")?,
        _ => select_all(table, "tr")?
            .into_iter()
            .filter(|row| !is_header_row(*row))
            .collect(),
    };

    Ok(rows.into_iter().filter(|row| !has_class(*row, "emptyrow")).collect())
}

/// A row made only of `th` cells
fn is_header_row(row: ElementRef<'_>) -> bool {
    let row_cells = cells(row);
    !row_cells.is_empty() && row_cells.iter().all(|c| c.value().name() == "th")
}
