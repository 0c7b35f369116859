//! Per-field conversion policies
//!
//! Every numeric destination field declares what happens when its raw value
//! is missing or cannot be converted: the whole record is dropped, or a
//! fixed value is substituted.
//!
//! | Field | Target | On failure / null |
//! |---|---|---|
//! | `id_student` | int | drop record |
//! | `id_assessment` | int | drop record |
//! | `score` | int | -1 |
//! | `date_submitted` | int | -1 |
//! | assessment `date` | int | -1 |
//! | assessment `weight` | double | 0.0 |
//! | `num_of_prev_attempts` | int | 0 |
//! | `studied_credits` | int | 0 |

use crate::etl::loose::{Conversion, Loose};
use crate::etl::records::MISSING;

/// What to do with a value that is null or not convertible
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OnInvalid<T> {
    /// Drop the record the value belongs to
    DropRecord,
    /// Use this value instead
    Substitute(T),
}

impl<T: Copy> OnInvalid<T> {
    fn resolve(&self) -> Option<T> {
        match self {
            OnInvalid::DropRecord => None,
            OnInvalid::Substitute(value) => Some(*value),
        }
    }
}

/// Conversion policy for one raw field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPolicy<T> {
    /// Raw field name
    pub field: &'static str,
    pub on_error: OnInvalid<T>,
    pub on_null: OnInvalid<T>,
}

impl<T: Copy> FieldPolicy<T> {
    /// Drop the record on conversion failure or null
    pub const fn drop_record(field: &'static str) -> Self {
        Self {
            field,
            on_error: OnInvalid::DropRecord,
            on_null: OnInvalid::DropRecord,
        }
    }

    /// Substitute `value` on conversion failure or null
    pub const fn substitute(field: &'static str, value: T) -> Self {
        Self {
            field,
            on_error: OnInvalid::Substitute(value),
            on_null: OnInvalid::Substitute(value),
        }
    }

    /// Apply the policy; `None` means the record must be dropped
    pub fn resolve(&self, conversion: Conversion<T>) -> Option<T> {
        match conversion {
            Conversion::Value(value) => Some(value),
            Conversion::Null => self.on_null.resolve(),
            Conversion::Failed => self.on_error.resolve(),
        }
    }
}

impl FieldPolicy<i32> {
    pub fn convert(&self, raw: &Loose) -> Option<i32> {
        self.resolve(raw.to_int())
    }
}

impl FieldPolicy<f64> {
    pub fn convert(&self, raw: &Loose) -> Option<f64> {
        self.resolve(raw.to_double())
    }
}

pub const STUDENT_ID: FieldPolicy<i32> = FieldPolicy::drop_record("id_student");
pub const ASSESSMENT_ID: FieldPolicy<i32> = FieldPolicy::drop_record("id_assessment");
pub const SCORE: FieldPolicy<i32> = FieldPolicy::substitute("score", MISSING);
pub const DATE_SUBMITTED: FieldPolicy<i32> = FieldPolicy::substitute("date_submitted", MISSING);
pub const DATE_DUE: FieldPolicy<i32> = FieldPolicy::substitute("date", MISSING);
pub const WEIGHT: FieldPolicy<f64> = FieldPolicy::substitute("weight", 0.0);
pub const PREV_ATTEMPTS: FieldPolicy<i32> = FieldPolicy::substitute("num_of_prev_attempts", 0);
pub const STUDIED_CREDITS: FieldPolicy<i32> = FieldPolicy::substitute("studied_credits", 0);
