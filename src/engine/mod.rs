//! Execution engine module
//!
//! Orchestrates the harvest stages over an established session.
//!
//! # Overview
//!
//! Every stage follows the same shape:
//!
//! ```text
//! course outline ─► refs ─► fetch_all (bounded pool) ─► extract (sequential)
//!                                                      ─► Report ─► CSV
//! ```
//!
//! Per-resource failures are logged, counted as warnings and left out of the
//! report. Only fatal errors (see `Error::is_fatal`) and failures to write
//! output end a stage early.

mod types;

pub use types::{
    CourseOutline, Module, RunStats, RunSummary, StageOutcome, ASSIGNMENT_TYPE, QUIZ_TYPE,
};

use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::extract::columns::{MODULE_ID, SCORE, STUDENT_NAME, URL};
use crate::extract::{
    self, columns, course_title, groups, service_courses, sesskey, ExtractedRecord, Group,
};
use crate::fetch::{fetch_all, partition_results, PageSource};
use crate::report::{
    quiz_scores_file, read_rows, submissions_file, tasks_file, write_report, Report, ReportSchema,
    COURSES_FILE, GROUP_ID, TASK_NAME,
};
use crate::state::{MemoryStore, SessionMemory};
use crate::types::{RawPage, ResourceRef};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Enrolled-course listing web service
pub const ENROLLED_COURSES_METHOD: &str =
    "core_course_get_enrolled_courses_by_timeline_classification";

/// Recently accessed courses web service
pub const RECENT_COURSES_METHOD: &str = "core_course_get_recent_courses";

/// Runs harvest stages against one page source
pub struct Pipeline<S> {
    source: S,
    config: HarvestConfig,
}

impl<S: PageSource> Pipeline<S> {
    /// Create a pipeline
    pub fn new(source: S, config: HarvestConfig) -> Self {
        Self { source, config }
    }

    /// Harvest settings
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Page source
    pub fn source(&self) -> &S {
        &self.source
    }

    // ========================================================================
    // Course outline
    // ========================================================================

    /// Fetch and parse a course page
    pub async fn course_modules(&self, course_id: &str) -> Result<CourseOutline> {
        let page = self.fetch_one(&ResourceRef::course(course_id)).await?;
        let modules = extract::extract_page(&page)?
            .iter()
            .map(Module::from_record)
            .collect::<Vec<_>>();

        debug!(course = course_id, modules = modules.len(), "Parsed course outline");
        Ok(CourseOutline {
            course_id: course_id.to_string(),
            title: course_title(&page.html)?,
            modules,
        })
    }

    /// Course outline, or an empty one plus a warning when it cannot be read
    async fn load_outline(&self, course_id: &str) -> Result<(CourseOutline, usize)> {
        match self.course_modules(course_id).await {
            Ok(outline) => {
                self.remember(&outline).await;
                Ok((outline, 0))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(course = course_id, error = %e, "Course outline unavailable");
                Ok((CourseOutline::empty(course_id), 1))
            }
        }
    }

    async fn remember(&self, outline: &CourseOutline) {
        let memory = SessionMemory::new(&outline.course_id).with_name(outline.title.clone());
        if let Err(e) = MemoryStore::new(&self.config.memory_path).save(&memory).await {
            warn!(error = %e, "Could not remember course");
        }
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Write `tasks_<course>.csv`: one row per assignment, in course order
    pub async fn export_tasks(&self, course_id: &str) -> Result<StageOutcome> {
        let start = Instant::now();
        let (outline, outline_warnings) = self.load_outline(course_id).await?;
        self.tasks_stage(&outline, outline_warnings, start).await
    }

    async fn tasks_stage(
        &self,
        outline: &CourseOutline,
        mut warnings: usize,
        start: Instant,
    ) -> Result<StageOutcome> {
        let assignments: Vec<&Module> = outline.assignments().collect();
        info!(
            course = %outline.course_id,
            "Found {} assignments, fetching details",
            assignments.len()
        );

        let refs: Vec<ResourceRef> = assignments
            .iter()
            .map(|m| ResourceRef::assignment(&m.id))
            .collect();
        let mut results = fetch_all(&self.source, &refs, self.config.concurrency).await;

        let schema = ReportSchema::tasks();
        let mut report = Report::new(schema.clone());

        for (module, reference) in assignments.iter().zip(&refs) {
            let summary = results
                .remove(reference)
                .unwrap_or_else(|| Err(Error::fetch(reference.to_string(), "no result")))
                .and_then(|page| single_record(&page));

            match summary {
                Ok(summary) => {
                    let mut row = schema
                        .empty_record()
                        .with(TASK_NAME, module.name.as_str())
                        .with(MODULE_ID, module.id.as_str())
                        .with(URL, module.url.as_str());
                    copy_columns(&summary, &mut row, columns::SUMMARY_COLUMNS);
                    report.push(row)?;
                }
                Err(e) => {
                    warnings += 1;
                    warn!(task = %module.name, error = %e, "Skipping task");
                }
            }
        }

        let path = self
            .config
            .course_dir(&outline.course_id)
            .join(tasks_file(&outline.course_id));
        finish(&report, path, warnings, start)
    }

    // ========================================================================
    // Quiz scores
    // ========================================================================

    /// Write `quiz_scores_<course>.csv`: students by quizzes, best score each
    pub async fn export_quiz_scores(&self, course_id: &str) -> Result<StageOutcome> {
        let start = Instant::now();
        let (outline, outline_warnings) = self.load_outline(course_id).await?;
        self.quiz_stage(&outline, outline_warnings, start).await
    }

    async fn quiz_stage(
        &self,
        outline: &CourseOutline,
        mut warnings: usize,
        start: Instant,
    ) -> Result<StageOutcome> {
        let quizzes = quiz_columns(outline.quizzes(self.config.quiz_filter.as_deref()));
        info!(course = %outline.course_id, "Found {} quizzes", quizzes.len());

        let refs: Vec<ResourceRef> = quizzes
            .iter()
            .map(|(module, _)| ResourceRef::quiz(&module.id))
            .collect();
        let mut results = fetch_all(&self.source, &refs, self.config.concurrency).await;

        let mut kept_columns = Vec::new();
        let mut scores: BTreeMap<String, HashMap<String, f64>> = BTreeMap::new();

        for ((module, column), reference) in quizzes.iter().zip(&refs) {
            let records = results
                .remove(reference)
                .unwrap_or_else(|| Err(Error::fetch(reference.to_string(), "no result")))
                .and_then(|page| extract::extract_page(&page));

            match records {
                Ok(records) => {
                    debug!(quiz = %module.name, students = records.len(), "Parsed quiz overview");
                    for record in records {
                        let Some(score) = record.value(SCORE).as_number() else {
                            continue;
                        };
                        let best = scores
                            .entry(record.render(STUDENT_NAME))
                            .or_default()
                            .entry(column.clone())
                            .or_insert(score);
                        *best = best.max(score);
                    }
                    kept_columns.push(column.clone());
                }
                Err(e) => {
                    warnings += 1;
                    warn!(quiz = %module.name, error = %e, "Skipping quiz");
                }
            }
        }

        // Students come out of the BTreeMap already sorted by name
        let schema = ReportSchema::quiz_scores(kept_columns.iter().cloned());
        let mut report = Report::new(schema.clone());
        for (student, by_quiz) in scores {
            let mut row = schema.empty_record().with(STUDENT_NAME, student);
            for (column, score) in by_quiz {
                row.set(column, score);
            }
            report.push(row)?;
        }

        let path = self
            .config
            .course_dir(&outline.course_id)
            .join(quiz_scores_file(&outline.course_id));
        finish(&report, path, warnings, start)
    }

    // ========================================================================
    // Submissions
    // ========================================================================

    /// Write `submissions_<course>_mod<module>[_grp<group>].csv`
    pub async fn export_submissions(
        &self,
        course_id: &str,
        module_id: &str,
        group: Option<&str>,
    ) -> Result<StageOutcome> {
        let start = Instant::now();
        let task_name = self.task_name(course_id, module_id).await;
        info!(task = %task_name, group = group.unwrap_or("all"), "Fetching submissions");

        let reference = ResourceRef::grading(module_id, group.map(str::to_string));
        let (records, warnings) = match self
            .fetch_one(&reference)
            .await
            .and_then(|page| extract::extract_page(&page))
        {
            Ok(records) => (records, 0),
            Err(e) => {
                warn!(task = %task_name, error = %e, "Grading table unavailable");
                (Vec::new(), 1)
            }
        };

        let report = submissions_report(&task_name, module_id, group, records)?;
        let path = self
            .config
            .course_dir(course_id)
            .join(submissions_file(course_id, module_id, group));
        finish(&report, path, warnings, start)
    }

    /// Display name of a module
    ///
    /// Looked up in an existing tasks report first, then in the course
    /// outline, falling back to `Module <id>`.
    pub async fn task_name(&self, course_id: &str, module_id: &str) -> String {
        let tasks_path = self.config.course_dir(course_id).join(tasks_file(course_id));
        if tasks_path.exists() {
            match read_rows(&tasks_path) {
                Ok(rows) => {
                    if let Some(name) = rows.iter().find_map(|row| task_name_in_row(row, module_id))
                    {
                        return name;
                    }
                }
                Err(e) => debug!(error = %e, "Could not read tasks report"),
            }
        }

        match self.course_modules(course_id).await {
            Ok(outline) => {
                if let Some(module) = outline.module(module_id).filter(|m| !m.name.is_empty()) {
                    return module.name.clone();
                }
            }
            Err(e) => debug!(error = %e, "Could not read course outline"),
        }

        format!("Module {module_id}")
    }

    // ========================================================================
    // Everything
    // ========================================================================

    /// Tasks, quiz scores, then the submissions of every assignment
    pub async fn export_all(&self, course_id: &str) -> Result<RunSummary> {
        let start = Instant::now();
        let (outline, outline_warnings) = self.load_outline(course_id).await?;

        let mut summary = RunSummary::default();
        summary
            .outcomes
            .push(self.tasks_stage(&outline, outline_warnings, start).await?);
        summary
            .outcomes
            .push(self.quiz_stage(&outline, 0, Instant::now()).await?);

        let refs: Vec<ResourceRef> = outline
            .assignments()
            .map(|m| ResourceRef::grading(&m.id, None))
            .collect();
        info!("Fetching submissions for {} assignments", refs.len());
        let results = fetch_all(&self.source, &refs, self.config.concurrency).await;
        let (pages, failures) = partition_results(&refs, results);

        for (reference, e) in failures {
            summary.skipped += 1;
            warn!(resource = %reference, error = %e, "Skipping submissions");
        }

        for page in pages {
            let stage_start = Instant::now();
            let Some(module) = outline.module(&page.reference.id) else {
                continue;
            };

            match extract::extract_page(&page) {
                Ok(records) => {
                    let report = submissions_report(&module.name, &module.id, None, records)?;
                    let path = self
                        .config
                        .course_dir(course_id)
                        .join(submissions_file(course_id, &module.id, None));
                    summary.outcomes.push(finish(&report, path, 0, stage_start)?);
                }
                Err(e) => {
                    summary.skipped += 1;
                    warn!(task = %module.name, error = %e, "Skipping submissions");
                }
            }
        }

        let stats = summary.stats();
        info!(
            reports = stats.reports,
            rows = stats.rows,
            warnings = stats.warnings,
            "Completed all stages in {:.2?}",
            start.elapsed()
        );
        Ok(summary)
    }

    // ========================================================================
    // Groups and courses
    // ========================================================================

    /// Groups offered on an assignment's grading page
    pub async fn list_groups(&self, module_id: &str) -> Result<Vec<Group>> {
        let page = self.fetch_one(&ResourceRef::grading(module_id, None)).await?;
        groups(&page.html)
    }

    /// Write `courses.csv`: every course the user can see, starred first
    pub async fn list_courses(&self) -> Result<StageOutcome> {
        let start = Instant::now();
        let page = self.fetch_one(&ResourceRef::dashboard()).await?;
        let mut warnings = 0;
        let mut records = Vec::new();

        match sesskey(&page.html) {
            Some(key) => {
                let calls = [
                    (
                        ENROLLED_COURSES_METHOD,
                        json!({
                            "offset": 0,
                            "limit": 0,
                            "classification": "all",
                            "sort": "fullname",
                            "customfieldname": "",
                            "customfieldvalue": ""
                        }),
                    ),
                    (
                        RECENT_COURSES_METHOD,
                        json!({ "userid": 0, "limit": 0, "offset": 0, "sort": "fullname" }),
                    ),
                ];
                for (method, args) in calls {
                    match self.source.call_service(&key, method, args).await {
                        Ok(data) => records.extend(service_courses(&data)),
                        Err(e) => {
                            warnings += 1;
                            warn!(method, error = %e, "Course service call failed");
                        }
                    }
                }
            }
            None => debug!("No sesskey on dashboard, using page links only"),
        }

        records.extend(extract::extract_page(&page)?);

        let schema = ReportSchema::courses();
        let mut seen = HashSet::new();
        let mut report = Report::new(schema);
        for record in records {
            let id = record.render(columns::COURSE_ID);
            if id.is_empty() || !seen.insert(id) {
                continue;
            }
            report.push(record)?;
        }
        report.sort_by(|a, b| {
            let starred = |r: &ExtractedRecord| r.render(columns::STARRED) == "Yes";
            starred(b).cmp(&starred(a)).then_with(|| {
                a.render(columns::COURSE_NAME)
                    .to_lowercase()
                    .cmp(&b.render(columns::COURSE_NAME).to_lowercase())
            })
        });

        let path = self.config.output_dir.join(COURSES_FILE);
        finish(&report, path, warnings, start)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn fetch_one(&self, reference: &ResourceRef) -> Result<RawPage> {
        self.source.fetch(reference).await.map_err(|e| match e {
            Error::Fetch { .. } => e,
            other => Error::fetch(reference.to_string(), other.to_string()),
        })
    }
}

/// Quizzes paired with unique column names
///
/// A repeated quiz name gets ` (<module id>)` appended.
fn quiz_columns<'a>(quizzes: impl Iterator<Item = &'a Module>) -> Vec<(&'a Module, String)> {
    let mut used = HashSet::new();
    quizzes
        .map(|module| {
            let mut column = module.name.clone();
            if column.is_empty() || !used.insert(column.clone()) {
                column = format!("{} ({})", module.name, module.id);
                used.insert(column.clone());
            }
            (module, column)
        })
        .collect()
}

fn single_record(page: &RawPage) -> Result<ExtractedRecord> {
    extract::extract_page(page)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::extraction(page.kind().as_str(), "no record on page"))
}

fn copy_columns(from: &ExtractedRecord, to: &mut ExtractedRecord, columns: &[&str]) {
    for column in columns {
        to.set(*column, from.value(column));
    }
}

fn task_name_in_row(row: &[(String, String)], module_id: &str) -> Option<String> {
    let field = |name: &str| {
        row.iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value.trim())
    };
    if field(MODULE_ID)? != module_id {
        return None;
    }
    field(TASK_NAME)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn submissions_report(
    task_name: &str,
    module_id: &str,
    group: Option<&str>,
    records: Vec<ExtractedRecord>,
) -> Result<Report> {
    let schema = ReportSchema::submissions(group.is_some());
    let mut report = Report::new(schema.clone());
    for record in records {
        let mut row = schema
            .empty_record()
            .with(TASK_NAME, task_name)
            .with(MODULE_ID, module_id);
        if let Some(group) = group {
            row.set(GROUP_ID, group);
        }
        copy_columns(&record, &mut row, columns::GRADING_COLUMNS);
        report.push(row)?;
    }
    Ok(report)
}

fn finish(report: &Report, path: PathBuf, warnings: usize, start: Instant) -> Result<StageOutcome> {
    let report_path = write_report(report, &path)?;
    let outcome = StageOutcome {
        kind: report.schema().kind(),
        report_path,
        rows: report.len(),
        warnings,
        elapsed: start.elapsed(),
    };

    if warnings > 0 {
        warn!(
            report = %outcome.kind,
            rows = outcome.rows,
            warnings,
            "Saved {} with skipped resources",
            outcome.report_path.display()
        );
    } else {
        info!(
            report = %outcome.kind,
            rows = outcome.rows,
            "Saved {} in {:.2?}",
            outcome.report_path.display(),
            outcome.elapsed
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests;
