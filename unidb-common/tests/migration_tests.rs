//! Integration tests for the raw -> destination migration
//!
//! Seeds the four extract collections with a small slice of the dataset
//! (including the malformed values the real exports contain) and checks
//! the destination collections the migration produces.

use serde_json::{json, Value};
use std::collections::HashSet;
use unidb_common::db::{
    audit_collection, deduplicate, install_all_validators, open_in_memory,
};
use unidb_common::etl::{
    run_migration, Course, Grade, MigrationOutcome, Student, DEFAULT_GUARD_COLLECTION, MISSING,
};
use unidb_common::{Document, DocumentStore, Error};

fn docs(values: Value) -> Vec<Document> {
    values
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
}

async fn seeded_store() -> DocumentStore {
    let store = open_in_memory().await.unwrap();

    store
        .insert_many(
            "raw_courses",
            &docs(json!([
                {"code_module": "AAA", "code_presentation": "2013J", "module_presentation_length": 268},
                {"code_module": "AAA", "code_presentation": "2014J", "module_presentation_length": 269},
                {"code_module": "BBB", "code_presentation": "2013B", "module_presentation_length": "?"},
                {"code_module": "CCC", "code_presentation": "2014B", "module_presentation_length": 241}
            ])),
        )
        .await
        .unwrap();

    store
        .insert_many(
            "raw_assessments",
            &docs(json!([
                {"code_module": "AAA", "code_presentation": "2013J", "id_assessment": 5,
                 "assessment_type": "TMA", "date": 19, "weight": 10},
                {"code_module": "AAA", "code_presentation": "2013J", "id_assessment": 6,
                 "assessment_type": "Exam", "date": "?", "weight": 100},
                {"code_module": "AAA", "code_presentation": "2014J", "id_assessment": 7,
                 "assessment_type": "CMA", "date": 54, "weight": "n/a"},
                {"code_module": "BBB", "code_presentation": "2013B", "id_assessment": "x9",
                 "assessment_type": "TMA", "date": 20, "weight": 5}
            ])),
        )
        .await
        .unwrap();

    store
        .insert_many(
            "raw_studentInfo",
            &docs(json!([
                {"code_module": "AAA", "code_presentation": "2013J", "id_student": 101,
                 "gender": "M", "region": "Scotland", "highest_education": "HE Qualification",
                 "imd_band": "90-100%", "age_band": "55<=", "num_of_prev_attempts": 0,
                 "studied_credits": 240, "disability": "N", "final_result": "Pass"},
                {"code_module": "AAA", "code_presentation": "2013J", "id_student": "202",
                 "gender": "F", "region": "Wales", "highest_education": "A Level or Equivalent",
                 "age_band": "35-55", "num_of_prev_attempts": "?", "studied_credits": 60,
                 "disability": "Y", "final_result": "Withdrawn"},
                {"code_module": "AAA", "code_presentation": "2013J", "id_student": "unknown",
                 "gender": "F", "final_result": "Fail"}
            ])),
        )
        .await
        .unwrap();

    store
        .insert_many(
            "raw_studentAssessment",
            &docs(json!([
                {"id_assessment": 5, "id_student": 101, "date_submitted": 18, "is_banked": 0, "score": 78},
                {"id_assessment": 5, "id_student": 101, "date_submitted": 21, "is_banked": 0, "score": 85},
                {"id_assessment": 6, "id_student": 202, "date_submitted": "?", "is_banked": 1, "score": "?"},
                {"id_assessment": 7, "id_student": 202, "date_submitted": 50, "is_banked": 0},
                {"id_assessment": 999, "id_student": 101, "date_submitted": 10, "is_banked": 0, "score": 50},
                {"id_assessment": 5, "id_student": "n/a", "date_submitted": 10, "is_banked": 0, "score": 40}
            ])),
        )
        .await
        .unwrap();

    store
}

async fn migrated_store() -> DocumentStore {
    let store = seeded_store().await;
    let outcome = run_migration(&store, DEFAULT_GUARD_COLLECTION).await.unwrap();
    assert!(matches!(outcome, MigrationOutcome::Completed(_)));
    store
}

#[tokio::test]
async fn test_migration_report_counts() {
    let store = seeded_store().await;
    let MigrationOutcome::Completed(report) =
        run_migration(&store, DEFAULT_GUARD_COLLECTION).await.unwrap()
    else {
        panic!("migration should run on an empty grades collection");
    };

    assert_eq!(report.courses.read, 4);
    assert_eq!(report.courses.written, 4);
    // The "x9" assessment is dropped from the BBB course
    assert_eq!(report.courses.dropped, 1);

    assert_eq!(report.students.read, 3);
    assert_eq!(report.students.written, 2);
    assert_eq!(report.students.dropped, 1);
    assert_eq!(report.student_cleanup.removed, 0);

    // 999 has no assessment row; "n/a" is not a student id
    assert_eq!(report.grades.read, 6);
    assert_eq!(report.grades.written, 4);
    assert_eq!(report.grades.dropped, 1);
}

#[tokio::test]
async fn test_course_keys_are_unique() {
    let store = migrated_store().await;
    let courses: Vec<Course> = store.find_all_as("courses").await.unwrap();

    let keys: HashSet<(String, String)> = courses
        .iter()
        .map(|c| {
            (
                c.code_module.clone().unwrap(),
                c.code_presentation.clone().unwrap(),
            )
        })
        .collect();
    assert_eq!(keys.len(), courses.len());
}

#[tokio::test]
async fn test_course_embeds_assessments_of_every_presentation() {
    let store = migrated_store().await;
    let courses: Vec<Course> = store.find_all_as("courses").await.unwrap();

    let aaa_2013 = &courses[0];
    assert_eq!(aaa_2013.code_presentation.as_deref(), Some("2013J"));
    assert_eq!(aaa_2013.length_days, Some(268));
    let ids: Vec<i32> = aaa_2013.assessments.iter().map(|a| a.assessment_id).collect();
    assert_eq!(ids, vec![5, 6, 7]);
    assert_eq!(courses[1].assessments.len(), 3);

    let bbb = &courses[2];
    assert_eq!(bbb.length_days, None);
    assert!(bbb.assessments.is_empty());

    let ccc = &courses[3];
    assert!(ccc.assessments.is_empty());
}

#[tokio::test]
async fn test_non_numeric_date_becomes_sentinel() {
    let store = migrated_store().await;
    let courses: Vec<Course> = store.find_all_as("courses").await.unwrap();

    let exam = courses[0]
        .assessments
        .iter()
        .find(|a| a.assessment_id == 6)
        .unwrap();
    assert_eq!(exam.date_due, MISSING);

    // The field is present in the stored document, not omitted
    let stored = store.find_all("courses").await.unwrap();
    assert_eq!(stored[0].get("assessments").unwrap()[1]["date_due"], json!(-1));

    let cma = courses[0]
        .assessments
        .iter()
        .find(|a| a.assessment_id == 7)
        .unwrap();
    assert_eq!(cma.weight, 0.0);
}

#[tokio::test]
async fn test_non_numeric_student_id_is_dropped() {
    let store = migrated_store().await;
    let students: Vec<Student> = store.find_all_as("students").await.unwrap();

    let ids: Vec<i32> = students.iter().map(|s| s.id_student).collect();
    assert_eq!(ids, vec![101, 202]);

    let withdrawn = &students[1];
    assert_eq!(withdrawn.study_history.num_of_prev_attempts, 0);
    assert_eq!(withdrawn.study_history.studied_credits, 60);
    assert_eq!(withdrawn.demographics.gender.as_deref(), Some("F"));
    assert_eq!(withdrawn.demographics.disability.as_deref(), Some("Y"));
}

#[tokio::test]
async fn test_scores_are_in_range_or_sentinel() {
    let store = migrated_store().await;
    let grades: Vec<Grade> = store.find_all_as("grades").await.unwrap();

    assert!(!grades.is_empty());
    for grade in &grades {
        assert!(
            (0..=100).contains(&grade.score) || grade.score == MISSING,
            "score {} out of domain",
            grade.score
        );
    }
}

#[tokio::test]
async fn test_grades_are_denormalized() {
    let store = migrated_store().await;
    let grades: Vec<Grade> = store.find_all_as("grades").await.unwrap();

    let exam = grades.iter().find(|g| g.assessment_id == 6).unwrap();
    assert_eq!(exam.id_student, 202);
    assert_eq!(exam.score, MISSING);
    assert_eq!(exam.date_submitted, MISSING);
    assert!(exam.is_banked);
    assert_eq!(exam.course_info.code_module.as_deref(), Some("AAA"));
    assert_eq!(exam.course_info.code_presentation.as_deref(), Some("2013J"));
    assert_eq!(exam.assessment_info.assessment_type.as_deref(), Some("Exam"));
    assert_eq!(exam.assessment_info.date_due, MISSING);
    assert_eq!(exam.assessment_info.weight, 100.0);

    // Missing score field
    let cma = grades.iter().find(|g| g.assessment_id == 7).unwrap();
    assert_eq!(cma.score, MISSING);
    assert!(!grades.iter().any(|g| g.assessment_id == 999));
}

#[tokio::test]
async fn test_duplicate_submissions_are_kept() {
    // Grades have no cleanup step: repeated (student, assessment) rows all
    // survive the migration
    let store = migrated_store().await;
    let grades: Vec<Grade> = store.find_all_as("grades").await.unwrap();

    let mut scores: Vec<i32> = grades
        .iter()
        .filter(|g| g.id_student == 101 && g.assessment_id == 5)
        .map(|g| g.score)
        .collect();
    scores.sort();
    assert_eq!(scores, vec![78, 85]);
}

#[tokio::test]
async fn test_rerun_with_grades_present_writes_nothing() {
    let store = migrated_store().await;

    // Change a raw extract; a real rerun would pick this up
    store
        .insert_many(
            "raw_courses",
            &docs(json!([{"code_module": "DDD", "code_presentation": "2014J"}])),
        )
        .await
        .unwrap();
    let courses_before = store.find_all("courses").await.unwrap();
    let grades_before = store.find_all("grades").await.unwrap();

    let outcome = run_migration(&store, DEFAULT_GUARD_COLLECTION).await.unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Skipped {
            guard_collection: "grades".to_string(),
            existing: grades_before.len() as u64,
        }
    );

    assert_eq!(store.find_all("courses").await.unwrap(), courses_before);
    assert_eq!(store.find_all("grades").await.unwrap(), grades_before);
}

#[tokio::test]
async fn test_migration_discards_destination_validators() {
    let store = seeded_store().await;
    install_all_validators(&store).await.unwrap();
    assert!(store.collection_options("grades").await.unwrap().unwrap().validator.is_some());

    run_migration(&store, DEFAULT_GUARD_COLLECTION).await.unwrap();

    // The rebuilt collection carries no validator, so -1 scores were accepted
    let options = store.collection_options("grades").await.unwrap().unwrap();
    assert!(options.validator.is_none());
}

#[tokio::test]
async fn test_sentinel_scores_violate_the_grades_validator() {
    let store = migrated_store().await;
    install_all_validators(&store).await.unwrap();

    let audit = audit_collection(&store, "grades").await.unwrap();
    assert_eq!(audit.scanned, 4);
    assert_eq!(audit.violations.len(), 2);
    assert!(audit.violations[0].reasons.iter().any(|r| r.starts_with("score")));

    let rejected = store
        .insert_many(
            "grades",
            &docs(json!([{"id_student": 303, "assessment_id": 5, "score": -1}])),
        )
        .await;
    assert!(matches!(rejected, Err(Error::DocumentValidation { .. })));
}

#[tokio::test]
async fn test_students_unique_after_cleanup() {
    let store = open_in_memory().await.unwrap();
    store
        .insert_many(
            "students",
            &docs(json!([
                {"id_student": 101, "code_module": "AAA"},
                {"id_student": 202, "code_module": "AAA"},
                {"id_student": 101, "code_module": "BBB"},
                {"id_student": 202, "code_module": "CCC"},
                {"id_student": 303, "code_module": "CCC"}
            ])),
        )
        .await
        .unwrap();

    let report = deduplicate(&store, "students", "id_student").await.unwrap();
    assert_eq!(report.removed, 2);

    let remaining = store.find_all("students").await.unwrap();
    let ids: Vec<i64> = remaining
        .iter()
        .map(|d| d.get("id_student").and_then(Value::as_i64).unwrap())
        .collect();
    let distinct: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), distinct.len());
    assert_eq!(distinct.len(), 3);
    assert_eq!(remaining[0].get("code_module"), Some(&json!("AAA")));
}

#[tokio::test]
async fn test_repeat_registration_keeps_first_student() {
    let store = seeded_store().await;
    store
        .insert_many(
            "raw_studentInfo",
            &docs(json!([
                {"code_module": "BBB", "code_presentation": "2014B", "id_student": 202,
                 "gender": "F", "region": "Wales", "num_of_prev_attempts": 1,
                 "studied_credits": 30, "disability": "Y", "final_result": "Pass"}
            ])),
        )
        .await
        .unwrap();

    let MigrationOutcome::Completed(report) =
        run_migration(&store, DEFAULT_GUARD_COLLECTION).await.unwrap()
    else {
        panic!("migration should run on an empty grades collection");
    };
    assert_eq!(report.students.written, 3);
    assert_eq!(report.student_cleanup.duplicate_groups, 1);
    assert_eq!(report.student_cleanup.removed, 1);

    let students: Vec<Student> = store.find_all_as("students").await.unwrap();
    assert_eq!(students.len(), 2);
    let kept = students.iter().find(|s| s.id_student == 202).unwrap();
    assert_eq!(kept.code_module.as_deref(), Some("AAA"));
    assert_eq!(kept.final_result.as_deref(), Some("Withdrawn"));
}
