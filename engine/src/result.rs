//! FILENAME: engine/src/result.rs
//! PURPOSE: Typed error values and the outcome type used by every engine component.
//! CONTEXT: Validation and formula evaluation never panic and never throw; they
//! return `GradeResult<T>`, whose error side is an ordered list of coded errors.
//! `Result::and_then` is the propagating combinator: a formula failure anywhere in
//! a dependency chain surfaces as a failure of the dependent computation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed taxonomy of engine error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Bad argument: unknown column, calculated column used as data, extra or
    /// missing column relative to the established set, null cell, unresolved
    /// row identifier, unknown category, unresolved weight lookup.
    #[serde(rename = "BAD_ARG")]
    BadArg,

    /// Numeric score value outside its column's declared `[min, max]`.
    #[serde(rename = "RANGE")]
    Range,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::BadArg => write!(f, "BAD_ARG"),
            ErrorCode::Range => write!(f, "RANGE"),
        }
    }
}

/// A single coded error.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct GradeError {
    pub message: String,
    pub code: ErrorCode,
}

impl GradeError {
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        GradeError {
            message: message.into(),
            code,
        }
    }
}

/// An ordered list of errors.
///
/// Validators that must report several simultaneous problems (not merely the
/// first) accumulate into one of these with [`Errors::add`] and convert to a
/// result at the end with [`Errors::into_result`]. A non-empty `Errors` is also
/// the error marker stored in full-table cells whose formula failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Errors {
    pub errors: Vec<GradeError>,
}

impl Errors {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Errors { errors: Vec::new() }
    }

    /// Creates a list holding a single error.
    pub fn one(message: impl Into<String>, code: ErrorCode) -> Self {
        Errors {
            errors: vec![GradeError::new(message, code)],
        }
    }

    /// Appends an error to the list.
    pub fn add(&mut self, message: impl Into<String>, code: ErrorCode) {
        self.errors.push(GradeError::new(message, code));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(ok)` if no errors were accumulated, otherwise `Err(self)`.
    pub fn into_result<T>(self, ok: T) -> GradeResult<T> {
        if self.errors.is_empty() {
            Ok(ok)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} [{}]", e.message, e.code)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

/// The outcome type used throughout the engine.
pub type GradeResult<T> = std::result::Result<T, Errors>;

/// Shorthand for a failed [`GradeResult`] holding a single error.
pub fn err_result<T>(message: impl Into<String>, code: ErrorCode) -> GradeResult<T> {
    Err(Errors::one(message, code))
}
