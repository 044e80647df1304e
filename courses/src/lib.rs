//! FILENAME: courses/src/lib.rs
//! PURPOSE: Course catalogs for the grade table engine.
//! CONTEXT: Each module wires one course offering as an explicit configuration
//! value; the registry here hands out the compiled schema by course id. The
//! engine itself never sees these as globals: callers pass the `CourseInfo`
//! in by reference.

use std::sync::Arc;

use once_cell::sync::Lazy;

use engine::{err_result, CourseInfo, ErrorCode, GradeResult};

pub mod intro;
pub mod webdev;

static WEBDEV: Lazy<Arc<CourseInfo>> = Lazy::new(|| Arc::new(webdev::course()));
static INTRO: Lazy<Arc<CourseInfo>> = Lazy::new(|| Arc::new(intro::course()));

/// Course ids known to the registry.
pub fn course_ids() -> &'static [&'static str] {
    &["webdev", "intro"]
}

/// Looks up the compiled schema for `course_id`.
///
/// Errors:
///   `BAD_ARG`: `course_id` is not a known course.
pub fn course_info(course_id: &str) -> GradeResult<Arc<CourseInfo>> {
    match course_id {
        "webdev" => Ok(Arc::clone(&WEBDEV)),
        "intro" => Ok(Arc::clone(&INTRO)),
        _ => err_result(
            format!("unknown course id '{}'", course_id),
            ErrorCode::BadArg,
        ),
    }
}
