//! Raw extract shapes
//!
//! The four extract collections as imported from the source dataset. Every
//! field is a [`Loose`] value: nothing is checked until a pipeline converts
//! the record, and unknown fields are ignored.

use crate::etl::loose::Loose;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

/// The extract collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawSource {
    Courses,
    Assessments,
    StudentInfo,
    StudentAssessment,
}

impl RawSource {
    pub const ALL: [RawSource; 4] = [
        RawSource::Courses,
        RawSource::Assessments,
        RawSource::StudentInfo,
        RawSource::StudentAssessment,
    ];

    /// Collection holding this extract
    pub fn collection(&self) -> &'static str {
        match self {
            RawSource::Courses => "raw_courses",
            RawSource::Assessments => "raw_assessments",
            RawSource::StudentInfo => "raw_studentInfo",
            RawSource::StudentAssessment => "raw_studentAssessment",
        }
    }

    /// File stem of the dataset export (`courses.csv`, ...)
    pub fn file_stem(&self) -> &'static str {
        match self {
            RawSource::Courses => "courses",
            RawSource::Assessments => "assessments",
            RawSource::StudentInfo => "studentInfo",
            RawSource::StudentAssessment => "studentAssessment",
        }
    }
}

impl fmt::Display for RawSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.collection())
    }
}

/// A record type read from one extract collection
pub trait RawShape: DeserializeOwned {
    const SOURCE: RawSource;
}

/// `raw_courses` row
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawCourse {
    pub code_module: Loose,
    pub code_presentation: Loose,
    pub module_presentation_length: Loose,
}

/// `raw_assessments` row
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawAssessment {
    pub code_module: Loose,
    pub code_presentation: Loose,
    pub id_assessment: Loose,
    pub assessment_type: Loose,
    pub date: Loose,
    pub weight: Loose,
}

/// `raw_studentInfo` row
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawStudentInfo {
    pub code_module: Loose,
    pub code_presentation: Loose,
    pub id_student: Loose,
    pub gender: Loose,
    pub region: Loose,
    pub highest_education: Loose,
    pub age_band: Loose,
    pub num_of_prev_attempts: Loose,
    pub studied_credits: Loose,
    pub disability: Loose,
    pub final_result: Loose,
}

/// `raw_studentAssessment` row
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawStudentAssessment {
    pub id_assessment: Loose,
    pub id_student: Loose,
    pub date_submitted: Loose,
    pub is_banked: Loose,
    pub score: Loose,
}

impl RawShape for RawCourse {
    const SOURCE: RawSource = RawSource::Courses;
}

impl RawShape for RawAssessment {
    const SOURCE: RawSource = RawSource::Assessments;
}

impl RawShape for RawStudentInfo {
    const SOURCE: RawSource = RawSource::StudentInfo;
}

impl RawShape for RawStudentAssessment {
    const SOURCE: RawSource = RawSource::StudentAssessment;
}
