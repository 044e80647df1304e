//! FILENAME: engine/src/lib.rs
//! PURPOSE: Main library entry point for the grade table engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//!
//! The engine is a pure, synchronous computation library over an in-memory
//! table value: a compiled course schema ([`CourseInfo`]), a formula library
//! over (schema, data), and an immutable, validating table store ([`Grades`])
//! that reconstructs the fully computed table on demand. Persistence and
//! transport belong to surrounding layers.

pub mod course;
pub mod formulas;
pub mod result;
pub mod row;
pub mod table;
pub mod util;
pub mod value;

// Re-export commonly used types at the crate root
pub use course::{
    CalcRowProps, CalcRowSpec, ColDetail, ColFn, ColKind, ColProps, ColSpec, CourseData,
    CourseInfo, RowFn, DEFAULT_SCORE_MAX, DEFAULT_SCORE_MIN,
};
pub use formulas::{
    category_drop_avg, col_avg, col_count, col_max, col_min, weighted_sum, weights, Weight,
    Weights,
};
pub use result::{err_result, ErrorCode, Errors, GradeError, GradeResult};
pub use row::{FullTable, GradeRow, Patches, RawRow, RawTable, Row, STAT_HDR};
pub use table::Grades;
pub use util::{csv_to_rows, sort_grades};
pub use value::{Grade, RawValue};
