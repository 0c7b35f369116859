//! Destination collection validators
//!
//! Single source of truth for the document shapes enforced on `students`,
//! `grades` and `courses`. Each struct declares the validator for one
//! collection.
//!
//! Installation is idempotent: a missing collection is created with the
//! validator attached, an existing one is modified in place with strict,
//! rejecting enforcement.
//!
//! The `grades` score rule allows only 0..=100 while the migration writes -1
//! for ungraded submissions, and the `students` rule requires a top-level
//! `gender` while the migration nests it under `demographics`. Both rules are
//! kept as declared; [`audit_collection`] reports the documents they reject.

use crate::db::store::DocumentStore;
use crate::db::validator::{BsonType, CollectionOptions, SchemaRule, Validator};
use crate::etl::{AssessmentType, FinalResult, Gender, COURSES, GRADES, STUDENTS};
use crate::{Error, Result};
use tracing::{info, warn};

/// Declares the validator for one collection
pub trait CollectionSchema {
    /// Collection name in the store
    fn collection_name() -> &'static str;

    /// Validator attached to the collection
    fn validator() -> Validator;
}

/// `students` validator
pub struct StudentsSchema;

impl CollectionSchema for StudentsSchema {
    fn collection_name() -> &'static str {
        STUDENTS
    }

    fn validator() -> Validator {
        Validator::new(
            SchemaRule::object()
                .title("Student Document Validation")
                .required(["id_student", "gender", "final_result"])
                .property(
                    "id_student",
                    SchemaRule::of(BsonType::Int)
                        .description("Unique student id (required, integer)."),
                )
                .property(
                    "gender",
                    SchemaRule::of(BsonType::String)
                        .description("Student gender (required, 'M' or 'F').")
                        .one_of(Gender::ALL.iter().map(|g| g.as_str())),
                )
                .property(
                    "region",
                    SchemaRule::of(BsonType::String).description("Region of residence."),
                )
                .property(
                    "final_result",
                    SchemaRule::of(BsonType::String)
                        .description("Final outcome (required, one of the listed values).")
                        .one_of(FinalResult::ALL.iter().map(|r| r.as_str())),
                )
                .property(
                    "demographics",
                    SchemaRule::object()
                        .property("age_band", SchemaRule::of(BsonType::String))
                        .property("highest_education", SchemaRule::of(BsonType::String)),
                ),
        )
    }
}

/// `grades` validator
pub struct GradesSchema;

impl CollectionSchema for GradesSchema {
    fn collection_name() -> &'static str {
        GRADES
    }

    fn validator() -> Validator {
        Validator::new(
            SchemaRule::object()
                .title("Grade Document Validation")
                .required(["id_student", "assessment_id", "score"])
                .property(
                    "id_student",
                    SchemaRule::of(BsonType::Int).description("Student the grade belongs to."),
                )
                .property(
                    "score",
                    SchemaRule::of(BsonType::Int)
                        .description("Score (required, integer from 0 to 100).")
                        .minimum(0.0)
                        .maximum(100.0),
                )
                .property(
                    "date_submitted",
                    SchemaRule::of(BsonType::Int)
                        .description("Submission day relative to the presentation start."),
                )
                .property(
                    "assessment_id",
                    SchemaRule::of(BsonType::Int).description("Assessment id from the extract."),
                )
                .property(
                    "type",
                    SchemaRule::of(BsonType::String)
                        .one_of(AssessmentType::ALL.iter().map(|t| t.as_str())),
                ),
        )
    }
}

/// `courses` validator
pub struct CoursesSchema;

impl CollectionSchema for CoursesSchema {
    fn collection_name() -> &'static str {
        COURSES
    }

    fn validator() -> Validator {
        Validator::new(
            SchemaRule::object()
                .title("Course Document Validation")
                .required(["code_module", "code_presentation"])
                .property("code_module", SchemaRule::of(BsonType::String))
                .property("code_presentation", SchemaRule::of(BsonType::String))
                .property(
                    "length_days",
                    SchemaRule::of(BsonType::Int).description("Presentation length in days."),
                )
                .property("assessments", SchemaRule::of(BsonType::Array)),
        )
    }
}

/// How a validator ended up on its collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Collection did not exist and was created with the validator
    Created,
    /// Collection existed and its validator was replaced
    Updated,
}

/// Result of installing one validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorInstall {
    pub collection: String,
    pub outcome: InstallOutcome,
}

/// Install or update the validator declared by `T`
pub async fn install_schema<T: CollectionSchema>(store: &DocumentStore) -> Result<ValidatorInstall> {
    let collection = T::collection_name();
    let options = CollectionOptions::with_validator(T::validator());

    let outcome = match store.create_collection(collection, options.clone()).await {
        Ok(()) => {
            info!("  ✓ Validator for '{}' created", collection);
            InstallOutcome::Created
        }
        Err(Error::CollectionExists(_)) => {
            // Existing collection: switch to the declared validator in place
            store.modify_collection(collection, options).await?;
            info!("  ✓ Validator for '{}' updated", collection);
            InstallOutcome::Updated
        }
        Err(e) => return Err(e),
    };

    Ok(ValidatorInstall {
        collection: collection.to_string(),
        outcome,
    })
}

/// Install validators on every destination collection
pub async fn install_all_validators(store: &DocumentStore) -> Result<Vec<ValidatorInstall>> {
    info!("=== Schema validation: installing validators ===");

    let installs = vec![
        install_schema::<StudentsSchema>(store).await?,
        install_schema::<GradesSchema>(store).await?,
        install_schema::<CoursesSchema>(store).await?,
    ];

    info!("=== Schema validation complete ===");
    Ok(installs)
}

/// Stored document rejected by its collection's validator
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentViolation {
    pub id: i64,
    pub reasons: Vec<String>,
}

/// Validator check over every stored document of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub collection: String,
    pub has_validator: bool,
    pub scanned: usize,
    pub violations: Vec<DocumentViolation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Re-check stored documents against the installed validator
///
/// Writes are validated on insert only, so documents written before a
/// validator was installed (or while none was attached) can violate it.
pub async fn audit_collection(store: &DocumentStore, collection: &str) -> Result<AuditReport> {
    let options = store.collection_options(collection).await?;
    let validator = options.and_then(|o| o.validator);

    let Some(validator) = validator else {
        return Ok(AuditReport {
            collection: collection.to_string(),
            has_validator: false,
            scanned: 0,
            violations: Vec::new(),
        });
    };

    let docs = store.find_all(collection).await?;
    let violations: Vec<DocumentViolation> = docs
        .iter()
        .filter_map(|doc| {
            let reasons = validator.validate(&doc.body);
            (!reasons.is_empty()).then_some(DocumentViolation { id: doc.id, reasons })
        })
        .collect();

    if !violations.is_empty() {
        warn!(
            "Audit: {} of {} documents in '{}' violate the installed validator",
            violations.len(),
            docs.len(),
            collection
        );
    }

    Ok(AuditReport {
        collection: collection.to_string(),
        has_validator: true,
        scanned: docs.len(),
        violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::open_in_memory;
    use crate::db::validator::{ValidationAction, ValidationLevel};
    use crate::Document;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_install_creates_then_updates() {
        let store = open_in_memory().await.unwrap();

        let first = install_all_validators(&store).await.unwrap();
        assert!(first.iter().all(|i| i.outcome == InstallOutcome::Created));
        assert_eq!(first.len(), 3);

        let second = install_all_validators(&store).await.unwrap();
        assert!(second.iter().all(|i| i.outcome == InstallOutcome::Updated));

        let options = store.collection_options(GRADES).await.unwrap().unwrap();
        assert_eq!(options.validator, Some(GradesSchema::validator()));
        assert_eq!(options.validation_level, ValidationLevel::Strict);
        assert_eq!(options.validation_action, ValidationAction::Error);
    }

    #[tokio::test]
    async fn test_update_switches_relaxed_collection_to_strict() {
        let store = open_in_memory().await.unwrap();
        store
            .create_collection(
                STUDENTS,
                CollectionOptions {
                    validator: None,
                    validation_level: ValidationLevel::Off,
                    validation_action: ValidationAction::Warn,
                },
            )
            .await
            .unwrap();

        let install = install_schema::<StudentsSchema>(&store).await.unwrap();
        assert_eq!(install.outcome, InstallOutcome::Updated);

        let options = store.collection_options(STUDENTS).await.unwrap().unwrap();
        assert_eq!(options.validation_level, ValidationLevel::Strict);
        assert_eq!(options.validation_action, ValidationAction::Error);
    }

    #[tokio::test]
    async fn test_installed_grade_validator_rejects_missing_score_sentinel() {
        let store = open_in_memory().await.unwrap();
        install_schema::<GradesSchema>(&store).await.unwrap();

        let ungraded = doc(json!({"id_student": 1, "assessment_id": 5, "score": -1}));
        let err = store.insert_many(GRADES, &[ungraded]).await.unwrap_err();
        assert!(matches!(err, Error::DocumentValidation { .. }));

        let graded = doc(json!({"id_student": 1, "assessment_id": 5, "score": 0}));
        store.insert_many(GRADES, &[graded]).await.unwrap();
    }

    #[tokio::test]
    async fn test_audit_reports_documents_written_before_validator() {
        let store = open_in_memory().await.unwrap();
        store
            .insert_many(
                GRADES,
                &[
                    doc(json!({"id_student": 1, "assessment_id": 5, "score": 80})),
                    doc(json!({"id_student": 2, "assessment_id": 5, "score": -1})),
                ],
            )
            .await
            .unwrap();

        let before = audit_collection(&store, GRADES).await.unwrap();
        assert!(!before.has_validator);

        install_schema::<GradesSchema>(&store).await.unwrap();
        let report = audit_collection(&store, GRADES).await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].reasons[0].contains("below minimum"));
    }

    #[test]
    fn test_student_validator_requires_top_level_gender() {
        let migrated_shape = doc(json!({
            "id_student": 11391,
            "final_result": "Pass",
            "demographics": {"gender": "M"}
        }));
        let violations = StudentsSchema::validator().validate(&migrated_shape);
        assert_eq!(violations, vec!["gender: required field missing".to_string()]);
    }
}
