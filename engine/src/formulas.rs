//! FILENAME: engine/src/formulas.rs
//! PURPOSE: The formula library: row statistics and column statistics.
//! CONTEXT: Row formulas compute one calculated column's value for one row;
//! column formulas compute one statistic across all computed values of one
//! column. All of them are pure functions over (schema, data) returning
//! `GradeResult`, so a failure is a value, never a panic.

use std::sync::Arc;

use crate::course::{cell_value, CourseInfo, RowFn};
use crate::result::{err_result, ErrorCode, Errors, GradeResult};
use crate::row::GradeRow;
use crate::value::{Grade, RawValue};

// ============================================================================
// ROW FORMULAS
// ============================================================================

/// Average of a score category after dropping the lowest `n_drop` values.
///
/// Collects every score column in `category` that has an entry in the row;
/// an ungraded `""` entry counts as 0. Unknown categories are `BAD_ARG`; an
/// error marker in a collected cell is propagated. If nothing remains after
/// dropping, the average is 0.
pub fn category_drop_avg(category: impl Into<String>, n_drop: usize) -> RowFn {
    let category = category.into();
    Arc::new(move |course: &CourseInfo, row: &GradeRow| {
        let col_ids: Vec<&str> = course
            .score_cols_in_category(&category)
            .map(|c| c.col_id.as_str())
            .collect();
        if col_ids.is_empty() {
            return err_result(
                format!("no columns for category '{}'", category),
                ErrorCode::BadArg,
            );
        }
        let mut vals = Vec::with_capacity(col_ids.len());
        for col_id in col_ids {
            match row.get(col_id) {
                // column not yet established for this table
                None => continue,
                Some(Grade::Error(errs)) => return Err(errs.clone()),
                Some(Grade::Value(v)) => vals.push(v.numeric_or_zero()),
            }
        }
        vals.sort_by(f64::total_cmp);
        let kept = &vals[n_drop.min(vals.len())..];
        let avg = if kept.is_empty() {
            0.0
        } else {
            kept.iter().sum::<f64>() / kept.len() as f64
        };
        Ok(RawValue::Number(avg))
    })
}

/// A weight: a plain scalar, or a table keyed by the string value of an extra
/// key read from the row (per-section weighting), resolved recursively.
#[derive(Debug, Clone)]
pub enum Weight {
    Scalar(f64),
    ByKey(Vec<(String, Weight)>),
}

impl Weight {
    /// Builds a key-conditional weight from (key, scalar) pairs.
    pub fn by_key<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        Weight::ByKey(
            pairs
                .into_iter()
                .map(|(k, w)| (k.into(), Weight::Scalar(w)))
                .collect(),
        )
    }

    fn resolve(&self, keys: &[String], col_id: &str) -> GradeResult<f64> {
        let mut weight = self;
        let mut depth = 0;
        loop {
            match weight {
                Weight::Scalar(w) => return Ok(*w),
                Weight::ByKey(table) => {
                    let key = keys.get(depth).ok_or_else(|| {
                        Errors::one(
                            format!("no key to resolve weight for '{}'", col_id),
                            ErrorCode::BadArg,
                        )
                    })?;
                    weight = table
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, w)| w)
                        .ok_or_else(|| {
                            Errors::one(
                                format!("no weight for '{}' under key '{}'", col_id, key),
                                ErrorCode::BadArg,
                            )
                        })?;
                    depth += 1;
                }
            }
        }
    }
}

impl From<f64> for Weight {
    fn from(w: f64) -> Self {
        Weight::Scalar(w)
    }
}

/// Ordered (column id, weight) pairs for [`weighted_sum`].
pub type Weights = Vec<(String, Weight)>;

/// Convenience constructor for a [`Weights`] list.
pub fn weights<K: Into<String>, W: Into<Weight>>(
    pairs: impl IntoIterator<Item = (K, W)>,
) -> Weights {
    pairs
        .into_iter()
        .map(|(k, w)| (k.into(), w.into()))
        .collect()
}

/// Weighted sum over the columns named by `weights`.
///
/// Each weight is a scalar or a mapping keyed by the string value of an
/// `extra_keys` entry read from the row. `BAD_ARG` if any weighted column or
/// extra key is absent from the row or a weight cannot be resolved; an error
/// marker found in a referenced cell is propagated, so calculated columns can
/// depend on earlier calculated columns and inherit their failures.
pub fn weighted_sum(weights: Weights, extra_keys: &[&str]) -> RowFn {
    let extra_keys: Vec<String> = extra_keys.iter().map(|k| k.to_string()).collect();
    Arc::new(move |_course: &CourseInfo, row: &GradeRow| {
        let mut key_vals = Vec::with_capacity(extra_keys.len());
        for key in &extra_keys {
            key_vals.push(cell_value(row, key)?.to_string());
        }
        let mut sum = 0.0;
        for (col_id, weight) in &weights {
            let val = cell_value(row, col_id)?.numeric_or_zero();
            sum += val * weight.resolve(&key_vals, col_id)?;
        }
        Ok(RawValue::Number(sum))
    })
}

// ============================================================================
// COLUMN FORMULAS
// ============================================================================

/// Extracts the numeric values of a column, propagating the first error marker
/// found and skipping non-numeric entries (ungraded `""`, labels).
fn clean_col(col: &[Grade]) -> GradeResult<Vec<f64>> {
    for grade in col {
        if let Grade::Error(errs) = grade {
            return Err(errs.clone());
        }
    }
    Ok(col.iter().filter_map(Grade::as_number).collect())
}

/// Count of numeric entries in the column.
pub fn col_count(_course: &CourseInfo, col: &[Grade]) -> GradeResult<RawValue> {
    clean_col(col).map(|vals| RawValue::Number(vals.len() as f64))
}

/// Maximum numeric entry. `BAD_ARG` when the column has no numeric entries.
pub fn col_max(_course: &CourseInfo, col: &[Grade]) -> GradeResult<RawValue> {
    clean_col(col).and_then(|vals| {
        vals.into_iter()
            .reduce(f64::max)
            .map(RawValue::Number)
            .ok_or_else(|| {
                Errors::one("no numeric values to aggregate", ErrorCode::BadArg)
            })
    })
}

/// Minimum numeric entry. `BAD_ARG` when the column has no numeric entries.
pub fn col_min(_course: &CourseInfo, col: &[Grade]) -> GradeResult<RawValue> {
    clean_col(col).and_then(|vals| {
        vals.into_iter()
            .reduce(f64::min)
            .map(RawValue::Number)
            .ok_or_else(|| {
                Errors::one("no numeric values to aggregate", ErrorCode::BadArg)
            })
    })
}

/// Average of the numeric entries; 0 when the column has none.
pub fn col_avg(_course: &CourseInfo, col: &[Grade]) -> GradeResult<RawValue> {
    clean_col(col).map(|vals| {
        let n = vals.len();
        let avg = if n == 0 {
            0.0
        } else {
            vals.iter().sum::<f64>() / n as f64
        };
        RawValue::Number(avg)
    })
}
