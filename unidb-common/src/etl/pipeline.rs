//! Pipeline stages
//!
//! Each destination is produced by the same sequence of stages:
//! 1. **Extract** - read a raw collection into its [`RawShape`]
//! 2. **Join** - [`lookup`] attaches matching metadata rows to every input
//!    row (outer: unmatched rows keep an empty list); [`unwind`] turns that
//!    into one pair per match (inner: unmatched rows disappear)
//! 3. **Reshape** - rename fields and convert types under the field
//!    policies; a `None` from a policy drops the record
//! 4. **Materialize** - atomically replace the destination's contents

use crate::db::store::{to_document, DocumentStore};
use crate::etl::loose::{JoinKey, Loose};
use crate::etl::policy::{
    ASSESSMENT_ID, DATE_DUE, DATE_SUBMITTED, PREV_ATTEMPTS, SCORE, STUDENT_ID, STUDIED_CREDITS,
    WEIGHT,
};
use crate::etl::raw::{RawAssessment, RawCourse, RawShape, RawStudentAssessment, RawStudentInfo};
use crate::etl::records::{
    AssessmentInfo, Course, CourseAssessment, CourseInfo, Demographics, Grade, Student,
    StudyHistory,
};
use crate::etl::{COURSES, GRADES, STUDENTS};
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Counts for one destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Rows read from the driving raw collection
    pub read: usize,
    /// Documents materialized
    pub written: u64,
    /// Records dropped by a field policy (nested assessments for courses)
    pub dropped: usize,
}

/// Read every row of an extract collection
pub async fn extract<T: RawShape>(store: &DocumentStore) -> Result<Vec<T>> {
    store.find_all_as(T::SOURCE.collection()).await
}

/// Left join: every left row with the right rows whose key is equal
///
/// Output follows the left order; matches follow the right order.
pub fn lookup<'a, L, R>(
    left: &'a [L],
    right: &'a [R],
    left_key: fn(&L) -> &Loose,
    right_key: fn(&R) -> &Loose,
) -> Vec<(&'a L, Vec<&'a R>)> {
    let mut by_key: HashMap<JoinKey, Vec<&'a R>> = HashMap::new();
    for row in right {
        by_key.entry(right_key(row).join_key()).or_default().push(row);
    }

    left.iter()
        .map(|row| {
            let matches = by_key
                .get(&left_key(row).join_key())
                .cloned()
                .unwrap_or_default();
            (row, matches)
        })
        .collect()
}

/// One pair per match; rows without matches are dropped
pub fn unwind<'a, L, R>(joined: Vec<(&'a L, Vec<&'a R>)>) -> Vec<(&'a L, &'a R)> {
    joined
        .into_iter()
        .flat_map(|(left, matches)| matches.into_iter().map(move |right| (left, right)))
        .collect()
}

/// Atomically replace the destination's contents with `records`
pub async fn materialize<T: Serialize>(
    store: &DocumentStore,
    destination: &str,
    records: &[T],
) -> Result<u64> {
    let docs = records
        .iter()
        .map(to_document)
        .collect::<Result<Vec<_>>>()?;
    store.replace_contents(destination, &docs).await
}

/// Course with its embedded assessments; nested assessments with an
/// unusable id are left out
pub fn reshape_course(course: &RawCourse, assessments: &[&RawAssessment]) -> Course {
    Course {
        code_module: course.code_module.to_text(),
        code_presentation: course.code_presentation.to_text(),
        length_days: course.module_presentation_length.to_int().into_option(),
        assessments: assessments
            .iter()
            .filter_map(|a| reshape_course_assessment(a))
            .collect(),
    }
}

fn reshape_course_assessment(raw: &RawAssessment) -> Option<CourseAssessment> {
    let Some(assessment_id) = ASSESSMENT_ID.convert(&raw.id_assessment) else {
        debug!(
            "Dropping nested assessment: {} = {:?}",
            ASSESSMENT_ID.field, raw.id_assessment
        );
        return None;
    };

    Some(CourseAssessment {
        assessment_id,
        assessment_type: raw.assessment_type.to_text(),
        date_due: DATE_DUE.convert(&raw.date)?,
        weight: WEIGHT.convert(&raw.weight)?,
    })
}

/// Student with nested demographics and study history
pub fn reshape_student(raw: &RawStudentInfo) -> Option<Student> {
    let Some(id_student) = STUDENT_ID.convert(&raw.id_student) else {
        debug!("Dropping student row: {} = {:?}", STUDENT_ID.field, raw.id_student);
        return None;
    };

    Some(Student {
        id_student,
        code_module: raw.code_module.to_text(),
        code_presentation: raw.code_presentation.to_text(),
        final_result: raw.final_result.to_text(),
        demographics: Demographics {
            gender: raw.gender.to_text(),
            region: raw.region.to_text(),
            age_band: raw.age_band.to_text(),
            highest_education: raw.highest_education.to_text(),
            disability: raw.disability.to_text(),
        },
        study_history: StudyHistory {
            num_of_prev_attempts: PREV_ATTEMPTS.convert(&raw.num_of_prev_attempts)?,
            studied_credits: STUDIED_CREDITS.convert(&raw.studied_credits)?,
        },
    })
}

/// Grade enriched with the course and assessment it belongs to
pub fn reshape_grade(raw: &RawStudentAssessment, assessment: &RawAssessment) -> Option<Grade> {
    let (Some(id_student), Some(assessment_id)) = (
        STUDENT_ID.convert(&raw.id_student),
        ASSESSMENT_ID.convert(&raw.id_assessment),
    ) else {
        debug!(
            "Dropping submission: {} = {:?}, {} = {:?}",
            STUDENT_ID.field, raw.id_student, ASSESSMENT_ID.field, raw.id_assessment
        );
        return None;
    };

    Some(Grade {
        id_student,
        assessment_id,
        score: SCORE.convert(&raw.score)?,
        date_submitted: DATE_SUBMITTED.convert(&raw.date_submitted)?,
        is_banked: raw.is_banked.to_bool(),
        course_info: CourseInfo {
            code_module: assessment.code_module.to_text(),
            code_presentation: assessment.code_presentation.to_text(),
        },
        assessment_info: AssessmentInfo {
            assessment_type: assessment.assessment_type.to_text(),
            date_due: DATE_DUE.convert(&assessment.date)?,
            weight: WEIGHT.convert(&assessment.weight)?,
        },
    })
}

/// `raw_courses` + `raw_assessments` -> `courses`
///
/// Assessments are matched on `code_module` alone, so a course embeds the
/// assessments of every presentation of its module.
pub async fn build_courses(store: &DocumentStore) -> Result<StageReport> {
    let courses: Vec<RawCourse> = extract(store).await?;
    let assessments: Vec<RawAssessment> = extract(store).await?;

    let joined = lookup(&courses, &assessments, |c| &c.code_module, |a| &a.code_module);

    let mut dropped = 0;
    let records: Vec<Course> = joined
        .iter()
        .map(|(course, matches)| {
            let record = reshape_course(course, matches);
            dropped += matches.len() - record.assessments.len();
            record
        })
        .collect();

    let written = materialize(store, COURSES, &records).await?;
    Ok(StageReport {
        read: courses.len(),
        written,
        dropped,
    })
}

/// `raw_studentInfo` -> `students`
pub async fn build_students(store: &DocumentStore) -> Result<StageReport> {
    let rows: Vec<RawStudentInfo> = extract(store).await?;
    let records: Vec<Student> = rows.iter().filter_map(reshape_student).collect();

    let written = materialize(store, STUDENTS, &records).await?;
    Ok(StageReport {
        read: rows.len(),
        written,
        dropped: rows.len() - records.len(),
    })
}

/// `raw_studentAssessment` + `raw_assessments` -> `grades`
///
/// Submissions without a matching assessment are dropped. Repeated
/// submissions for the same (student, assessment) pair are all kept.
pub async fn build_grades(store: &DocumentStore) -> Result<StageReport> {
    let submissions: Vec<RawStudentAssessment> = extract(store).await?;
    let assessments: Vec<RawAssessment> = extract(store).await?;

    let pairs = unwind(lookup(
        &submissions,
        &assessments,
        |s| &s.id_assessment,
        |a| &a.id_assessment,
    ));
    let records: Vec<Grade> = pairs
        .iter()
        .filter_map(|(submission, assessment)| reshape_grade(submission, assessment))
        .collect();

    let written = materialize(store, GRADES, &records).await?;
    Ok(StageReport {
        read: submissions.len(),
        written,
        dropped: pairs.len() - records.len(),
    })
}
