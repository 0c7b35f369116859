//! Destination records
//!
//! Strongly-typed shapes of the documents written to `courses`, `students`
//! and `grades`. Text fields that may be absent in the extract are `Option`s
//! and are left out of the document when missing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Out-of-domain value meaning "missing" (scores, dates)
pub const MISSING: i32 = -1;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Every value of the domain, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Kind of assessment
    AssessmentType {
        Tma => "TMA",
        Cma => "CMA",
        Exam => "Exam",
    }
);

text_enum!(
    /// Final outcome of a student registration
    FinalResult {
        Pass => "Pass",
        Fail => "Fail",
        Withdrawn => "Withdrawn",
        Distinction => "Distinction",
    }
);

text_enum!(
    Gender {
        Male => "M",
        Female => "F",
    }
);

/// Assessment embedded in a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseAssessment {
    pub assessment_id: i32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub assessment_type: Option<String>,
    /// Due day relative to the presentation start, or [`MISSING`]
    pub date_due: i32,
    pub weight: f64,
}

/// `courses` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_days: Option<i32>,
    pub assessments: Vec<CourseAssessment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_band: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disability: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyHistory {
    pub num_of_prev_attempts: i32,
    pub studied_credits: i32,
}

/// `students` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id_student: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<String>,
    pub demographics: Demographics,
    pub study_history: StudyHistory,
}

/// Course identity denormalized into a grade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_presentation: Option<String>,
}

/// Assessment metadata denormalized into a grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub assessment_type: Option<String>,
    pub date_due: i32,
    pub weight: f64,
}

/// `grades` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id_student: i32,
    pub assessment_id: i32,
    /// 0..=100, or [`MISSING`] when ungraded
    pub score: i32,
    /// Submission day, or [`MISSING`]
    pub date_submitted: i32,
    pub is_banked: bool,
    pub course_info: CourseInfo,
    pub assessment_info: AssessmentInfo,
}

impl Grade {
    pub fn is_graded(&self) -> bool {
        self.score != MISSING
    }

    pub fn assessment_kind(&self) -> Option<AssessmentType> {
        self.assessment_info.assessment_type.as_deref()?.parse().ok()
    }
}
