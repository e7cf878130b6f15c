//! Tests for engine module

use super::*;
use crate::extract::columns::*;
use crate::extract::CellValue;
use crate::report::{read_report, read_rows, ReportKind};
use crate::state::MemoryStore;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

const BASE: &str = "https://lms.example.org";

/// Serves canned HTML per reference; anything unknown is a 404
#[derive(Default)]
struct FakeMoodle {
    pages: HashMap<ResourceRef, String>,
    services: HashMap<String, Value>,
    service_calls: Mutex<Vec<(String, String, Value)>>,
}

impl FakeMoodle {
    fn page(mut self, reference: ResourceRef, html: impl Into<String>) -> Self {
        self.pages.insert(reference, html.into());
        self
    }

    fn service(mut self, method: &str, data: Value) -> Self {
        self.services.insert(method.to_string(), data);
        self
    }
}

#[async_trait]
impl PageSource for FakeMoodle {
    async fn fetch(&self, reference: &ResourceRef) -> Result<RawPage> {
        let html = self
            .pages
            .get(reference)
            .ok_or_else(|| Error::http_status(404, "Not found"))?;
        Ok(RawPage::new(reference.clone(), reference.url(BASE)?, html.clone()))
    }

    async fn call_service(&self, sesskey: &str, method: &str, args: Value) -> Result<Value> {
        self.service_calls
            .lock()
            .unwrap()
            .push((sesskey.to_string(), method.to_string(), args));
        self.services
            .get(method)
            .cloned()
            .ok_or_else(|| Error::Other(format!("{method}: unknown method")))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn activity(module_type: &str, id: &str, name: &str) -> String {
    let path = if module_type == "assign" { "assign" } else { "quiz" };
    format!(
        r#"<li class="activity {module_type} modtype_{module_type}" id="module-{id}">
        <a href="{BASE}/mod/{path}/view.php?id={id}"><span class="instancename">{name}</span></a></li>"#
    )
}

fn course_page(title: &str, activities: &[String]) -> String {
    format!(
        r#"<html><body><div class="page-header-headings"><h1>{title}</h1></div>
        <div id="region-main"><div class="course-content"><ul>{}</ul></div></div></body></html>"#,
        activities.concat()
    )
}

fn assignment_page(participants: u32, due: &str) -> String {
    format!(
        r#"<div id="region-main"><table class="generaltable">
        <tr><th>Participants</th><td>{participants}</td></tr>
        <tr><th>Due date</th><td>{due}</td></tr>
        <tr><th>Submitted</th><td>3</td></tr>
        </table></div>"#
    )
}

fn quiz_page(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(name, grade)| {
            format!(
                r#"<tr><td></td><td></td><td><a href="{BASE}/user/view.php?id=1">{name}</a></td>
                <td></td><td>Finished</td><td></td><td></td><td></td><td>{grade}</td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<table id="attempts" class="generaltable"><thead><tr><th></th><th></th><th>Name</th>
        <th>Email</th><th>State</th><th>Started</th><th>Completed</th><th>Time</th>
        <th>Grade/10.00</th></tr></thead><tbody>{body}</tbody></table>"#
    )
}

fn grading_page(students: &[(&str, &str)]) -> String {
    let body: String = students
        .iter()
        .map(|(name, grade)| {
            format!(
                r#"<tr><td></td><td></td><td><a href="/user/view.php?id=9">{name}</a></td><td></td>
                <td><div>Submitted for grading</div></td><td></td><td></td>
                <td>-</td><td><div class="no-overflow">answer</div></td><td></td>
                <td></td><td>Good</td><td></td><td>{grade}</td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<div id="region-main"><select name="group"><option value="12">Batch A</option>
        <option value="13">Batch B</option></select>
        <table class="flexible generaltable"><thead><tr>
        <th>Select</th><th>Picture</th><th>First name / Last name</th><th>Email address</th>
        <th>Status</th><th>Grade</th><th>Edit</th><th>Last modified (submission)</th>
        <th>File submissions</th><th>Submission comments</th><th>Last modified (grade)</th>
        <th>Feedback comments</th><th>Annotate PDF</th><th>Final grade</th>
        </tr></thead><tbody>{body}</tbody></table></div>"#
    )
}

fn pipeline(source: FakeMoodle, dir: &TempDir) -> Pipeline<FakeMoodle> {
    let config = HarvestConfig::new(BASE)
        .with_output_dir(dir.path().join("output"))
        .with_memory_path(dir.path().join(".last_session"))
        .with_config_path(dir.path().join(".config"))
        .with_concurrency(2);
    Pipeline::new(source, config)
}

/// A course with five assignments and three quizzes
fn five_assignments() -> FakeMoodle {
    let activities = vec![
        activity("assign", "81", "Week 1"),
        activity("quiz", "77", "Practice Quiz 1"),
        activity("assign", "82", "Week 2"),
        activity("assign", "83", "Week 3"),
        activity("quiz", "78", "Final Exam"),
        activity("assign", "84", "Week 4"),
        activity("quiz", "79", "Practice Quiz 1"),
        activity("assign", "85", "Week 5"),
    ];
    let mut source = FakeMoodle::default().page(
        ResourceRef::course("450"),
        course_page("Rust Programming", &activities),
    );
    for id in ["81", "82", "84", "85"] {
        source = source.page(
            ResourceRef::assignment(id),
            assignment_page(30, "Friday, 15 March 2024, 11:59 PM"),
        );
    }
    source
        .page(
            ResourceRef::quiz("77"),
            quiz_page(&[("Ben Thomas", "6.00"), ("Asha Nair", "7.50"), ("Asha Nair", "9.00")]),
        )
        .page(ResourceRef::quiz("79"), quiz_page(&[("Asha Nair", "4.00")]))
        .page(ResourceRef::quiz("78"), quiz_page(&[("Asha Nair", "10.00")]))
}

// ============================================================================
// Course outline
// ============================================================================

#[tokio::test]
async fn test_course_modules() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(five_assignments(), &dir);

    let outline = pipeline.course_modules("450").await.unwrap();
    assert_eq!(outline.title.as_deref(), Some("Rust Programming"));
    assert_eq!(outline.modules.len(), 8);
    assert_eq!(outline.assignments().count(), 5);

    let quizzes: Vec<&str> = outline
        .quizzes(Some("PRACTICE quiz"))
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(quizzes, vec!["77", "79"]);
    assert_eq!(outline.quizzes(None).count(), 3);
}

#[tokio::test]
async fn test_course_modules_fetch_failure() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(FakeMoodle::default(), &dir);

    let err = pipeline.course_modules("1").await.unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
}

// ============================================================================
// Tasks
// ============================================================================

#[tokio::test]
async fn test_export_tasks_skips_failed_assignment() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(five_assignments(), &dir);

    let outcome = pipeline.export_tasks("450").await.unwrap();
    assert_eq!(outcome.kind, ReportKind::Tasks);
    assert_eq!(outcome.rows, 4);
    assert_eq!(outcome.warnings, 1);
    assert!(!outcome.is_clean());
    assert_eq!(
        outcome.report_path,
        dir.path().join("output/course_450/tasks_450.csv")
    );

    let report = read_report(&outcome.report_path, ReportSchema::tasks()).unwrap();
    let names: Vec<String> = report.records().iter().map(|r| r.render(TASK_NAME)).collect();
    assert_eq!(names, vec!["Week 1", "Week 2", "Week 4", "Week 5"]);

    let first = &report.records()[0];
    assert_eq!(first.value(PARTICIPANTS), CellValue::Number(30.0));
    assert_eq!(first.render(DUE_DATE), "2024-03-15 23:59");
    assert_eq!(first.render(URL), format!("{BASE}/mod/assign/view.php?id=81"));
    assert_eq!(first.value(GRADING_STATUS), CellValue::Empty);
}

#[tokio::test]
async fn test_export_tasks_remembers_course() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(five_assignments(), &dir);

    pipeline.export_tasks("450").await.unwrap();

    let memory = MemoryStore::new(dir.path().join(".last_session"))
        .load()
        .unwrap();
    assert_eq!(memory.course_id, "450");
    assert_eq!(memory.course_name.as_deref(), Some("Rust Programming"));
}

#[tokio::test]
async fn test_missing_outline_writes_empty_report() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(FakeMoodle::default(), &dir);

    let outcome = pipeline.export_tasks("9").await.unwrap();
    assert_eq!(outcome.rows, 0);
    assert_eq!(outcome.warnings, 1);

    let contents = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert!(contents.starts_with("Task Name,Module ID,Due Date"));
    assert_eq!(contents.lines().count(), 1);
    assert!(!dir.path().join(".last_session").exists());
}

// ============================================================================
// Quiz scores
// ============================================================================

#[tokio::test]
async fn test_export_quiz_scores_pivot() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(five_assignments(), &dir);

    let outcome = pipeline.export_quiz_scores("450").await.unwrap();
    assert_eq!(outcome.rows, 2);
    assert_eq!(outcome.warnings, 0);

    let schema = ReportSchema::quiz_scores(["Practice Quiz 1", "Practice Quiz 1 (79)"]);
    let report = read_report(&outcome.report_path, schema).unwrap();

    let asha = &report.records()[0];
    assert_eq!(asha.render(STUDENT_NAME), "Asha Nair");
    assert_eq!(asha.value("Practice Quiz 1"), CellValue::Number(9.0));
    assert_eq!(asha.value("Practice Quiz 1 (79)"), CellValue::Number(4.0));

    let ben = &report.records()[1];
    assert_eq!(ben.render(STUDENT_NAME), "Ben Thomas");
    assert_eq!(ben.value("Practice Quiz 1"), CellValue::Number(6.0));
    assert_eq!(ben.value("Practice Quiz 1 (79)"), CellValue::Empty);
}

#[tokio::test]
async fn test_export_quiz_scores_without_filter() {
    let dir = tempdir().unwrap();
    let mut pipeline = pipeline(five_assignments(), &dir);
    pipeline.config = pipeline.config.clone().with_quiz_filter(None);

    let outcome = pipeline.export_quiz_scores("450").await.unwrap();
    let rows = read_rows(&outcome.report_path).unwrap();
    let headers: Vec<&str> = rows[0].iter().map(|(h, _)| h.as_str()).collect();
    assert_eq!(
        headers,
        vec![STUDENT_NAME, "Practice Quiz 1", "Final Exam", "Practice Quiz 1 (79)"]
    );
}

#[tokio::test]
async fn test_failed_quiz_column_is_left_out() {
    let dir = tempdir().unwrap();
    let mut source = five_assignments();
    source.pages.remove(&ResourceRef::quiz("79"));
    let pipeline = pipeline(source, &dir);

    let outcome = pipeline.export_quiz_scores("450").await.unwrap();
    assert_eq!(outcome.warnings, 1);

    let report = read_report(
        &outcome.report_path,
        ReportSchema::quiz_scores(["Practice Quiz 1"]),
    )
    .unwrap();
    assert_eq!(report.len(), 2);
}

// ============================================================================
// Submissions
// ============================================================================

#[tokio::test]
async fn test_export_submissions_with_group() {
    let dir = tempdir().unwrap();
    let source = five_assignments().page(
        ResourceRef::grading("81", Some("12".into())),
        grading_page(&[("Asha Nair", "85.00"), ("Ben Thomas", "-")]),
    );
    let pipeline = pipeline(source, &dir);

    let outcome = pipeline
        .export_submissions("450", "81", Some("12"))
        .await
        .unwrap();
    assert_eq!(
        outcome.report_path,
        dir.path().join("output/course_450/submissions_450_mod81_grp12.csv")
    );

    let report = read_report(&outcome.report_path, ReportSchema::submissions(true)).unwrap();
    assert_eq!(report.len(), 2);
    let asha = &report.records()[0];
    assert_eq!(asha.render(TASK_NAME), "Week 1");
    assert_eq!(asha.render(GROUP_ID), "12");
    assert_eq!(asha.value(FINAL_GRADE), CellValue::Number(85.0));
    assert_eq!(asha.render(STATUS), "Submitted for grading");
}

#[tokio::test]
async fn test_task_name_prefers_tasks_report() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(five_assignments(), &dir);

    let tasks_dir = dir.path().join("output/course_450");
    std::fs::create_dir_all(&tasks_dir).unwrap();
    std::fs::write(
        tasks_dir.join("tasks_450.csv"),
        "Task Name,Module ID\nRenamed Week 1,81\n",
    )
    .unwrap();

    assert_eq!(pipeline.task_name("450", "81").await, "Renamed Week 1");
    assert_eq!(pipeline.task_name("450", "82").await, "Week 2");
    assert_eq!(pipeline.task_name("450", "999").await, "Module 999");
}

#[tokio::test]
async fn test_export_submissions_unavailable() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(FakeMoodle::default(), &dir);

    let outcome = pipeline.export_submissions("1", "5", None).await.unwrap();
    assert_eq!(outcome.rows, 0);
    assert_eq!(outcome.warnings, 1);
    assert!(outcome.report_path.ends_with("submissions_1_mod5.csv"));
}

// ============================================================================
// Everything
// ============================================================================

#[tokio::test]
async fn test_export_all() {
    let dir = tempdir().unwrap();
    let source = five_assignments()
        .page(
            ResourceRef::grading("81", None),
            grading_page(&[("Asha Nair", "85.00")]),
        )
        .page(ResourceRef::grading("82", None), grading_page(&[]));
    let pipeline = pipeline(source, &dir);

    let summary = pipeline.export_all("450").await.unwrap();

    // tasks, quiz scores, two submission reports
    assert_eq!(summary.outcomes.len(), 4);
    assert_eq!(summary.skipped, 3);

    let stats = summary.stats();
    assert_eq!(stats.reports, 4);
    assert_eq!(stats.rows, 4 + 2 + 1);
    assert_eq!(stats.warnings, 1 + 3);

    let course_dir = dir.path().join("output/course_450");
    assert!(course_dir.join("submissions_450_mod81.csv").exists());
    assert!(course_dir.join("submissions_450_mod82.csv").exists());
    assert!(!course_dir.join("submissions_450_mod83.csv").exists());
}

// ============================================================================
// Groups and courses
// ============================================================================

#[tokio::test]
async fn test_list_groups() {
    let dir = tempdir().unwrap();
    let source = FakeMoodle::default().page(ResourceRef::grading("81", None), grading_page(&[]));
    let pipeline = pipeline(source, &dir);

    let groups = pipeline.list_groups("81").await.unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Batch A", "Batch B"]);

    assert!(pipeline.list_groups("82").await.is_err());
}

#[tokio::test]
async fn test_list_courses_merges_and_sorts() {
    let dir = tempdir().unwrap();
    let dashboard = format!(
        r#"<html><head><script>M.cfg = {{"sesskey":"key123"}};</script></head><body>
        <a href="{BASE}/course/view.php?id=3">algebra</a>
        <a href="{BASE}/course/view.php?id=450">Rust Programming</a>
        </body></html>"#
    );
    let source = FakeMoodle::default()
        .page(ResourceRef::dashboard(), dashboard)
        .service(
            ENROLLED_COURSES_METHOD,
            json!({ "courses": [
                { "id": 450, "fullname": "Rust Programming", "coursecategory": "CS", "isfavourite": false },
                { "id": 12, "fullname": "Zoology", "isfavourite": true }
            ]}),
        )
        .service(
            RECENT_COURSES_METHOD,
            json!([{ "id": 7, "fullname": "Databases", "isfavourite": false }]),
        );
    let pipeline = pipeline(source, &dir);

    let outcome = pipeline.list_courses().await.unwrap();
    assert_eq!(outcome.report_path, dir.path().join("output/courses.csv"));
    assert_eq!(outcome.rows, 4);
    assert_eq!(outcome.warnings, 0);

    let report = read_report(&outcome.report_path, ReportSchema::courses()).unwrap();
    let names: Vec<String> = report.records().iter().map(|r| r.render(COURSE_NAME)).collect();
    assert_eq!(names, vec!["Zoology", "algebra", "Databases", "Rust Programming"]);
    assert_eq!(report.records()[3].render(CATEGORY), "CS");

    let calls = pipeline.source().service_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "key123");
    assert_eq!(calls[0].2["classification"], "all");
}

#[tokio::test]
async fn test_list_courses_without_services() {
    let dir = tempdir().unwrap();
    let dashboard = format!(
        r#"<html><body><a href="{BASE}/course/view.php?id=3">Algebra</a></body></html>"#
    );
    let source = FakeMoodle::default().page(ResourceRef::dashboard(), dashboard);
    let pipeline = pipeline(source, &dir);

    let outcome = pipeline.list_courses().await.unwrap();
    assert_eq!(outcome.rows, 1);
    assert_eq!(outcome.warnings, 0);
    assert!(pipeline.source().service_calls.lock().unwrap().is_empty());
}

#[test]
fn test_quiz_columns_dedupe() {
    let module = |id: &str, name: &str| Module {
        id: id.into(),
        name: name.into(),
        module_type: QUIZ_TYPE.into(),
        url: String::new(),
    };
    let modules = [module("1", "Quiz"), module("2", "Quiz"), module("3", "Other")];
    let columns: Vec<String> = quiz_columns(modules.iter())
        .into_iter()
        .map(|(_, c)| c)
        .collect();
    assert_eq!(columns, vec!["Quiz", "Quiz (2)", "Other"]);
}
