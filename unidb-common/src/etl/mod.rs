//! ETL from the raw extract collections to the destination collections

pub mod loose;
pub mod migrate;
pub mod pipeline;
pub mod policy;
pub mod raw;
pub mod records;

pub use loose::{Conversion, Loose};
pub use migrate::*;
pub use raw::*;
pub use records::*;

/// Destination collection: courses with embedded assessments
pub const COURSES: &str = "courses";
/// Destination collection: one document per student registration
pub const STUDENTS: &str = "students";
/// Destination collection: denormalized assessment results
pub const GRADES: &str = "grades";

/// Business key of `students`
pub const STUDENT_KEY: &str = "id_student";

/// Destination collections in migration order
pub const DESTINATIONS: [&str; 3] = [COURSES, STUDENTS, GRADES];
