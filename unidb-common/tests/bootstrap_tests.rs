//! End-to-end tests for the bootstrap runbook
//!
//! Writes a small CSV export to a temporary directory, bootstraps a
//! file-backed store from it, then runs the bootstrap a second time to
//! check that a repeat run leaves the migrated data alone.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use unidb_common::bootstrap::{run_bootstrap, BootstrapConfig};
use unidb_common::db::{list_indexes, open_store, InstallOutcome};
use unidb_common::etl::{Grade, MigrationOutcome, Student};

fn write_export(dir: &Path) {
    fs::write(
        dir.join("courses.csv"),
        "code_module,code_presentation,module_presentation_length\n\
         AAA,2013J,268\n\
         BBB,2013B,240\n",
    )
    .unwrap();
    fs::write(
        dir.join("assessments.csv"),
        "code_module,code_presentation,id_assessment,assessment_type,date,weight\n\
         AAA,2013J,1752,TMA,19,10.0\n\
         AAA,2013J,1757,Exam,,100.0\n\
         BBB,2013B,14984,CMA,?,0.0\n",
    )
    .unwrap();
    fs::write(
        dir.join("studentInfo.csv"),
        "code_module,code_presentation,id_student,gender,region,highest_education,imd_band,age_band,num_of_prev_attempts,studied_credits,disability,final_result\n\
         AAA,2013J,11391,M,East Anglian Region,HE Qualification,90-100%,55<=,0,240,N,Pass\n\
         BBB,2013B,28400,F,Scotland,HE Qualification,20-30%,35-55,?,60,N,Distinction\n",
    )
    .unwrap();
    fs::write(
        dir.join("studentAssessment.csv"),
        "id_assessment,id_student,date_submitted,is_banked,score\n\
         1752,11391,18,0,78\n\
         1757,11391,230,0,\n\
         14984,28400,22,1,?\n",
    )
    .unwrap();
}

#[tokio::test]
async fn test_full_bootstrap_from_csv_export() {
    let import = TempDir::new().unwrap();
    write_export(import.path());
    let data = TempDir::new().unwrap();
    let store = open_store(&data.path().join("university.db")).await.unwrap();

    let config = BootstrapConfig {
        import_dir: Some(import.path().to_path_buf()),
        ..BootstrapConfig::default()
    };
    let report = run_bootstrap(&store, &config).await.unwrap();

    let import_report = report.import.as_ref().unwrap();
    assert_eq!(import_report.imported.len(), 4);
    assert_eq!(import_report.total_documents(), 10);

    assert!(report
        .validators
        .iter()
        .all(|v| v.outcome == InstallOutcome::Created));
    assert_eq!(report.baseline_indexes.created.len(), 5);
    assert_eq!(report.dedup.removed, 0);

    let MigrationOutcome::Completed(migration) = &report.migration else {
        panic!("first bootstrap must migrate");
    };
    assert_eq!(migration.courses.written, 2);
    assert_eq!(migration.students.written, 2);
    assert_eq!(migration.grades.written, 3);

    // Destinations were rebuilt, so every post-migration index is new
    assert_eq!(report.query_indexes.created.len(), 7);
    assert!(report.finished_at >= report.started_at);

    let students: Vec<Student> = store.find_all_as("students").await.unwrap();
    assert_eq!(students[1].study_history.num_of_prev_attempts, 0);

    let grades: Vec<Grade> = store.find_all_as("grades").await.unwrap();
    let exam = grades.iter().find(|g| g.assessment_id == 1757).unwrap();
    assert_eq!(exam.score, -1);
    assert_eq!(exam.assessment_info.date_due, -1);
    let banked = grades.iter().find(|g| g.assessment_id == 14984).unwrap();
    assert!(banked.is_banked);
    assert_eq!(banked.score, -1);
}

#[tokio::test]
async fn test_second_bootstrap_keeps_migrated_data() {
    let import = TempDir::new().unwrap();
    write_export(import.path());
    let data = TempDir::new().unwrap();
    let db_path = data.path().join("university.db");

    let config = BootstrapConfig {
        import_dir: Some(import.path().to_path_buf()),
        ..BootstrapConfig::default()
    };

    {
        let store = open_store(&db_path).await.unwrap();
        run_bootstrap(&store, &config).await.unwrap();
    }

    let store = open_store(&db_path).await.unwrap();
    let grades_before = store.find_all("grades").await.unwrap();
    let indexes_before = list_indexes(&store, "grades").await.unwrap();

    let report = run_bootstrap(&store, &config).await.unwrap();

    assert!(report
        .validators
        .iter()
        .all(|v| v.outcome == InstallOutcome::Updated));
    assert_eq!(
        report.migration,
        MigrationOutcome::Skipped {
            guard_collection: "grades".to_string(),
            existing: 3,
        }
    );
    assert!(report.query_indexes.created.is_empty());
    assert_eq!(report.query_indexes.existing.len(), 7);

    assert_eq!(store.find_all("grades").await.unwrap(), grades_before);

    // Baseline grades index is covered by the post-migration one; only the
    // composite module/type/score index is new
    let indexes_after = list_indexes(&store, "grades").await.unwrap();
    assert_eq!(indexes_after.len(), indexes_before.len() + 1);
    assert!(indexes_after.iter().any(|i| i.name == "idx_module_type_score"));
    assert!(!indexes_after.iter().any(|i| i.name == "idx_grades_student_id"));
}

#[tokio::test]
async fn test_bootstrap_without_import_on_empty_store() {
    let data = TempDir::new().unwrap();
    let store = open_store(&data.path().join("university.db")).await.unwrap();

    let report = run_bootstrap(&store, &BootstrapConfig::default()).await.unwrap();

    assert!(report.import.is_none());
    let MigrationOutcome::Completed(migration) = &report.migration else {
        panic!("empty grades collection must not block the migration");
    };
    assert_eq!(migration.courses.read, 0);
    assert_eq!(migration.grades.written, 0);
    assert_eq!(store.count_documents("grades").await.unwrap(), 0);
}

#[tokio::test]
async fn test_repeat_registration_survives_second_bootstrap() {
    let import = TempDir::new().unwrap();
    write_export(import.path());
    // 11391 registered on both courses
    fs::write(
        import.path().join("studentInfo.csv"),
        "code_module,code_presentation,id_student,gender,region,highest_education,imd_band,age_band,num_of_prev_attempts,studied_credits,disability,final_result\n\
         AAA,2013J,11391,M,East Anglian Region,HE Qualification,90-100%,55<=,0,240,N,Pass\n\
         BBB,2013B,28400,F,Scotland,HE Qualification,20-30%,35-55,?,60,N,Distinction\n\
         BBB,2013B,11391,M,East Anglian Region,HE Qualification,90-100%,55<=,1,60,N,Withdrawn\n",
    )
    .unwrap();
    let data = TempDir::new().unwrap();
    let db_path = data.path().join("university.db");

    let config = BootstrapConfig {
        import_dir: Some(import.path().to_path_buf()),
        ..BootstrapConfig::default()
    };

    {
        let store = open_store(&db_path).await.unwrap();
        let report = run_bootstrap(&store, &config).await.unwrap();
        let MigrationOutcome::Completed(migration) = &report.migration else {
            panic!("first bootstrap must migrate");
        };
        assert_eq!(migration.students.written, 3);
        assert_eq!(migration.student_cleanup.duplicate_groups, 1);
        assert_eq!(migration.student_cleanup.removed, 1);

        let mut ids: Vec<i32> = store
            .find_all_as::<Student>("students")
            .await
            .unwrap()
            .iter()
            .map(|s| s.id_student)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![11391, 28400]);
    }

    let store = open_store(&db_path).await.unwrap();
    let report = run_bootstrap(&store, &config).await.unwrap();

    assert!(report.migration.is_skipped());
    assert!(report
        .baseline_indexes
        .created
        .iter()
        .any(|label| label == "students.idx_students_id"));

    // First registration in the export is the one kept
    let students: Vec<Student> = store.find_all_as("students").await.unwrap();
    assert_eq!(students.len(), 2);
    let kept = students.iter().find(|s| s.id_student == 11391).unwrap();
    assert_eq!(kept.code_module.as_deref(), Some("AAA"));
    assert_eq!(kept.final_result.as_deref(), Some("Pass"));
}
