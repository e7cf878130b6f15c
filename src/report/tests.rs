//! Tests for the report module

use super::*;
use crate::error::Error;
use crate::extract::columns::*;
use crate::extract::{CellValue, ExtractedRecord};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn task(name: &str, module_id: &str) -> ExtractedRecord {
    ReportSchema::tasks()
        .empty_record()
        .with(TASK_NAME, name)
        .with(MODULE_ID, module_id)
        .with(URL, format!("https://lms.example.org/mod/assign/view.php?id={module_id}"))
}

#[test]
fn test_push_rejects_wrong_columns() {
    let mut report = Report::new(ReportSchema::tasks());
    let record = ExtractedRecord::with_columns([TASK_NAME, "Surprise"]);

    let err = report.push(record).unwrap_err();
    match err {
        Error::ReportSchema {
            report,
            index,
            missing,
            unexpected,
        } => {
            assert_eq!(report, "tasks");
            assert_eq!(index, 0);
            assert!(missing.contains(&MODULE_ID.to_string()));
            assert_eq!(unexpected, vec!["Surprise".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(report.is_empty());
}

#[test]
fn test_schema_violation_is_fatal() {
    let err = ReportSchema::courses()
        .validate(&ExtractedRecord::new(), 3)
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("record 3"));
}

#[test]
fn test_submissions_schema_group_column() {
    let schema = ReportSchema::submissions(true);
    let names: Vec<&str> = schema.column_names().collect();
    assert_eq!(names[..3], [TASK_NAME, MODULE_ID, GROUP_ID]);
    assert_eq!(ReportSchema::submissions(false).columns().len(), 8);
}

#[test]
fn test_quiz_schema_columns() {
    let schema = ReportSchema::quiz_scores(["Practice Quiz 1", "Practice Quiz 2"]);
    let names: Vec<&str> = schema.column_names().collect();
    assert_eq!(names, vec![STUDENT_NAME, "Practice Quiz 1", "Practice Quiz 2"]);
    assert_eq!(schema.columns()[1].column_type, ColumnType::Number);
}

#[test]
fn test_file_names() {
    assert_eq!(tasks_file("450"), "tasks_450.csv");
    assert_eq!(quiz_scores_file("450"), "quiz_scores_450.csv");
    assert_eq!(submissions_file("450", "81", None), "submissions_450_mod81.csv");
    assert_eq!(
        submissions_file("450", "81", Some("12")),
        "submissions_450_mod81_grp12.csv"
    );
}

#[test]
fn test_render_header_and_quoting() {
    let report = Report::from_records(
        ReportSchema::courses(),
        vec![ReportSchema::courses()
            .empty_record()
            .with(COURSE_ID, "7")
            .with(COURSE_NAME, "Rust, \"Advanced\"")
            .with(STARRED, "No")],
    )
    .unwrap();

    let csv = String::from_utf8(render_report(&report).unwrap()).unwrap();
    assert_eq!(
        csv,
        "Course ID,Course Name,Category,Starred\n7,\"Rust, \"\"Advanced\"\"\",,No\n"
    );
}

#[test]
fn test_write_and_read_back_is_lossless() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("course_450").join(tasks_file("450"));

    let due = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(23, 59, 0)
        .unwrap();
    let modified = NaiveDate::from_ymd_opt(2024, 3, 10)
        .unwrap()
        .and_hms_opt(8, 5, 42)
        .unwrap();

    let records = vec![
        task("Week 1 Exercise", "81")
            .with(DUE_DATE, due)
            .with(LAST_MODIFIED, modified)
            .with(MAX_GRADE, 100.0)
            .with(PARTICIPANTS, 32.0)
            .with(SUBMISSION_COMMENTS, 3.0)
            .with(TIME_REMAINING, "2 days 3 hours")
            .with(SUBMISSION_STATUS, "No attempt"),
        task("Week 2, \"Pairs\"", "82")
            .with(DUE_DATE, "No deadline")
            .with(MAX_GRADE, "Scale: Pass/Fail")
            .with(NEEDS_GRADING, 7.25),
        task("Week 3", "83"),
    ];
    let report = Report::from_records(ReportSchema::tasks(), records).unwrap();

    let written = write_report(&report, &path).unwrap();
    assert_eq!(written, path);
    assert!(!dir
        .path()
        .join("course_450")
        .join(".tasks_450.csv.tmp")
        .exists());

    let read = read_report(&path, ReportSchema::tasks()).unwrap();
    assert_eq!(read, report);
    assert_eq!(read.records()[1].value(DUE_DATE), CellValue::text("No deadline"));
}

#[test]
fn test_rewrite_replaces_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(COURSES_FILE);
    let schema = ReportSchema::courses();

    let first = Report::from_records(
        schema.clone(),
        vec![schema.empty_record().with(COURSE_ID, "1"), schema.empty_record().with(COURSE_ID, "2")],
    )
    .unwrap();
    write_report(&first, &path).unwrap();

    let second = Report::new(schema.clone());
    write_report(&second, &path).unwrap();

    let read = read_report(&path, schema).unwrap();
    assert!(read.is_empty());
}

#[test]
fn test_read_with_wrong_header_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks.csv");
    std::fs::write(&path, "Task Name,Bogus\nA,B\n").unwrap();

    let err = read_report(&path, ReportSchema::tasks()).unwrap_err();
    assert!(matches!(err, Error::ReportSchema { .. }));
}

#[test]
fn test_read_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks.csv");
    std::fs::write(&path, "Task Name,Module ID\nWeek 1,81\n").unwrap();

    let rows = read_rows(&path).unwrap();
    assert_eq!(
        rows,
        vec![vec![
            ("Task Name".to_string(), "Week 1".to_string()),
            ("Module ID".to_string(), "81".to_string()),
        ]]
    );
}

#[test]
fn test_sort_by_column() {
    let schema = ReportSchema::courses();
    let mut report = Report::from_records(
        schema.clone(),
        vec![
            schema.empty_record().with(COURSE_NAME, "Zoology"),
            schema.empty_record().with(COURSE_NAME, "Algebra"),
        ],
    )
    .unwrap();

    report.sort_by_column(COURSE_NAME);
    assert_eq!(report.records()[0].render(COURSE_NAME), "Algebra");
}
