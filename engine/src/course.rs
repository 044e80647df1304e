//! FILENAME: engine/src/course.rs
//! PURPOSE: The course schema model.
//! CONTEXT: A `CourseData` is the declarative specification (what the user
//! writes); `compile` turns it into a `CourseInfo`, the indexed, read-only form
//! every other component looks columns and statistic rows up in. The split
//! mirrors the definition/compiled layering used elsewhere in the engine.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::result::{err_result, ErrorCode, Errors, GradeResult};
use crate::row::GradeRow;
use crate::value::{Grade, RawValue};

/// Default score range for score columns without explicit bounds.
pub const DEFAULT_SCORE_MIN: f64 = 0.0;
pub const DEFAULT_SCORE_MAX: f64 = 100.0;

/// A row formula: computes one calculated column's value for one row.
/// The row it sees combines raw values with every calculated value computed
/// so far, so later calculated columns may reference earlier ones.
pub type RowFn = Arc<dyn Fn(&CourseInfo, &GradeRow) -> GradeResult<RawValue> + Send + Sync>;

/// A column formula: computes one statistic across all computed values of one
/// column. Errors among the inputs are propagated, not skipped.
pub type ColFn = Arc<dyn Fn(&CourseInfo, &[Grade]) -> GradeResult<RawValue> + Send + Sync>;

// ============================================================================
// DECLARATIVE SPECIFICATION
// ============================================================================

/// One column of the declarative course specification.
///
/// The four kinds form a tagged union; everywhere column behavior differs the
/// engine matches on the kind exhaustively.
#[derive(Clone)]
pub enum ColSpec {
    /// Uniquely identifies a row. Exactly one per course.
    Id { col_id: String, name: Option<String> },

    /// Free-form descriptive string; not used in computation.
    Info { col_id: String, name: Option<String> },

    /// A raw numeric grade with a declared range, tagged with a category
    /// (e.g. "quiz") used by drop-average formulas.
    Score {
        col_id: String,
        name: Option<String>,
        category: String,
        min: Option<f64>,
        max: Option<f64>,
    },

    /// No stored value; derived by a row formula applied to the rest of the row.
    Calc {
        col_id: String,
        name: Option<String>,
        formula: RowFn,
    },
}

impl ColSpec {
    pub fn id(col_id: impl Into<String>) -> Self {
        ColSpec::Id {
            col_id: col_id.into(),
            name: None,
        }
    }

    pub fn info(col_id: impl Into<String>) -> Self {
        ColSpec::Info {
            col_id: col_id.into(),
            name: None,
        }
    }

    pub fn score(col_id: impl Into<String>, category: impl Into<String>) -> Self {
        ColSpec::Score {
            col_id: col_id.into(),
            name: None,
            category: category.into(),
            min: None,
            max: None,
        }
    }

    pub fn score_ranged(
        col_id: impl Into<String>,
        category: impl Into<String>,
        min: f64,
        max: f64,
    ) -> Self {
        ColSpec::Score {
            col_id: col_id.into(),
            name: None,
            category: category.into(),
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn calc(
        col_id: impl Into<String>,
        formula: impl Fn(&CourseInfo, &GradeRow) -> GradeResult<RawValue> + Send + Sync + 'static,
    ) -> Self {
        ColSpec::Calc {
            col_id: col_id.into(),
            name: None,
            formula: Arc::new(formula),
        }
    }

    /// Like [`ColSpec::calc`] but takes an already-built [`RowFn`], e.g. from
    /// the formula library's factories.
    pub fn calc_fn(col_id: impl Into<String>, formula: RowFn) -> Self {
        ColSpec::Calc {
            col_id: col_id.into(),
            name: None,
            formula,
        }
    }

    /// Overrides the display name (defaults to the column id).
    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        let slot = match &mut self {
            ColSpec::Id { name, .. }
            | ColSpec::Info { name, .. }
            | ColSpec::Score { name, .. }
            | ColSpec::Calc { name, .. } => name,
        };
        *slot = Some(display_name.into());
        self
    }

    pub fn col_id(&self) -> &str {
        match self {
            ColSpec::Id { col_id, .. }
            | ColSpec::Info { col_id, .. }
            | ColSpec::Score { col_id, .. }
            | ColSpec::Calc { col_id, .. } => col_id,
        }
    }
}

/// One statistic row of the declarative course specification: its formula is
/// applied to every column of the table to produce a synthetic summary row.
#[derive(Clone)]
pub struct CalcRowSpec {
    pub row_id: String,
    pub name: Option<String>,
    pub formula: ColFn,
}

impl CalcRowSpec {
    pub fn new(
        row_id: impl Into<String>,
        formula: impl Fn(&CourseInfo, &[Grade]) -> GradeResult<RawValue> + Send + Sync + 'static,
    ) -> Self {
        CalcRowSpec {
            row_id: row_id.into(),
            name: None,
            formula: Arc::new(formula),
        }
    }

    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        self.name = Some(display_name.into());
        self
    }
}

/// The complete declarative specification for one course offering.
#[derive(Clone)]
pub struct CourseData {
    pub id: String,
    pub name: String,
    pub cols: Vec<ColSpec>,
    pub calc_rows: Vec<CalcRowSpec>,
}

// ============================================================================
// COMPILED SCHEMA
// ============================================================================

/// Kind discriminant for a compiled column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColKind {
    Id,
    Info,
    Score,
    Calc,
}

/// Kind-specific data of a compiled column.
#[derive(Clone)]
pub enum ColDetail {
    Id,
    Info,
    Score { category: String, min: f64, max: f64 },
    Calc { formula: RowFn },
}

impl std::fmt::Debug for ColDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColDetail::Id => write!(f, "Id"),
            ColDetail::Info => write!(f, "Info"),
            ColDetail::Score { category, min, max } => f
                .debug_struct("Score")
                .field("category", category)
                .field("min", min)
                .field("max", max)
                .finish(),
            ColDetail::Calc { .. } => write!(f, "Calc {{ .. }}"),
        }
    }
}

/// A compiled column: id, display name, position in declaration order, and
/// kind-specific data. Positions define canonical column ordering everywhere
/// raw data is materialized.
#[derive(Debug, Clone)]
pub struct ColProps {
    pub col_id: String,
    pub name: String,
    pub col_index: usize,
    pub detail: ColDetail,
}

impl ColProps {
    pub fn kind(&self) -> ColKind {
        match self.detail {
            ColDetail::Id => ColKind::Id,
            ColDetail::Info => ColKind::Info,
            ColDetail::Score { .. } => ColKind::Score,
            ColDetail::Calc { .. } => ColKind::Calc,
        }
    }

    pub fn is_calc(&self) -> bool {
        matches!(self.detail, ColDetail::Calc { .. })
    }

    pub fn is_score(&self) -> bool {
        matches!(self.detail, ColDetail::Score { .. })
    }

    /// Identifier and info columns hold labels rather than grades.
    pub fn is_label(&self) -> bool {
        matches!(self.detail, ColDetail::Id | ColDetail::Info)
    }

    pub fn category(&self) -> Option<&str> {
        match &self.detail {
            ColDetail::Score { category, .. } => Some(category),
            _ => None,
        }
    }

    pub fn score_range(&self) -> Option<(f64, f64)> {
        match self.detail {
            ColDetail::Score { min, max, .. } => Some((min, max)),
            _ => None,
        }
    }

    pub fn row_fn(&self) -> Option<&RowFn> {
        match &self.detail {
            ColDetail::Calc { formula } => Some(formula),
            _ => None,
        }
    }
}

/// A compiled statistic row.
#[derive(Clone)]
pub struct CalcRowProps {
    pub row_id: String,
    pub name: String,
    pub formula: ColFn,
}

impl std::fmt::Debug for CalcRowProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalcRowProps")
            .field("row_id", &self.row_id)
            .field("name", &self.name)
            .finish()
    }
}

/// The compiled, immutable course schema.
///
/// Built once by [`CourseData::compile`], then shared by reference; it is never
/// mutated. Lookup by column id and statistic-row id is O(1).
#[derive(Debug, Clone)]
pub struct CourseInfo {
    pub id: String,
    pub name: String,
    row_id_col: String,
    cols: Vec<ColProps>,
    col_positions: FxHashMap<String, usize>,
    calc_rows: Vec<CalcRowProps>,
}

impl CourseInfo {
    /// The id of the single identifier column.
    pub fn row_id_col(&self) -> &str {
        &self.row_id_col
    }

    /// Columns in declaration (position) order.
    pub fn cols(&self) -> impl Iterator<Item = &ColProps> {
        self.cols.iter()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn col(&self, col_id: &str) -> Option<&ColProps> {
        self.col_positions.get(col_id).map(|&i| &self.cols[i])
    }

    /// Position of `col_id`, or `usize::MAX` for unknown ids so they sort last.
    pub fn position(&self, col_id: &str) -> usize {
        self.col_positions.get(col_id).copied().unwrap_or(usize::MAX)
    }

    /// Statistic rows in declaration order.
    pub fn calc_rows(&self) -> impl Iterator<Item = &CalcRowProps> {
        self.calc_rows.iter()
    }

    pub fn calc_row(&self, row_id: &str) -> Option<&CalcRowProps> {
        self.calc_rows.iter().find(|r| r.row_id == row_id)
    }

    /// Score columns tagged with `category`, in position order.
    pub fn score_cols_in_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a ColProps> {
        self.cols
            .iter()
            .filter(move |c| c.category() == Some(category))
    }
}

impl CourseData {
    /// Compiles the declarative specification into an indexed schema.
    ///
    /// Assigns positional indices in declaration order, fills in default
    /// display names and the default score range, and locates the identifier
    /// column. Errors (all `BAD_ARG`) are accumulated: duplicate column ids,
    /// zero or multiple identifier columns.
    pub fn compile(self) -> GradeResult<CourseInfo> {
        let mut errs = Errors::new();
        let mut cols = Vec::with_capacity(self.cols.len());
        let mut col_positions = FxHashMap::default();
        let mut row_id_col: Option<String> = None;

        for (col_index, spec) in self.cols.into_iter().enumerate() {
            let col_id = spec.col_id().to_string();
            if col_positions.contains_key(&col_id) {
                errs.add(
                    format!("duplicate column id '{}'", col_id),
                    ErrorCode::BadArg,
                );
                continue;
            }
            let (name, detail) = match spec {
                ColSpec::Id { name, .. } => {
                    if let Some(prev) = &row_id_col {
                        errs.add(
                            format!(
                                "multiple identifier columns: '{}' and '{}'",
                                prev, col_id
                            ),
                            ErrorCode::BadArg,
                        );
                    } else {
                        row_id_col = Some(col_id.clone());
                    }
                    (name, ColDetail::Id)
                }
                ColSpec::Info { name, .. } => (name, ColDetail::Info),
                ColSpec::Score {
                    name,
                    category,
                    min,
                    max,
                    ..
                } => (
                    name,
                    ColDetail::Score {
                        category,
                        min: min.unwrap_or(DEFAULT_SCORE_MIN),
                        max: max.unwrap_or(DEFAULT_SCORE_MAX),
                    },
                ),
                ColSpec::Calc { name, formula, .. } => (name, ColDetail::Calc { formula }),
            };
            col_positions.insert(col_id.clone(), col_index);
            cols.push(ColProps {
                name: name.unwrap_or_else(|| col_id.clone()),
                col_id,
                col_index,
                detail,
            });
        }

        let row_id_col = match row_id_col {
            Some(id) => id,
            None => {
                errs.add("course has no identifier column", ErrorCode::BadArg);
                String::new()
            }
        };

        let calc_rows = self
            .calc_rows
            .into_iter()
            .map(|r| CalcRowProps {
                name: r.name.unwrap_or_else(|| r.row_id.clone()),
                row_id: r.row_id,
                formula: r.formula,
            })
            .collect();

        errs.into_result(CourseInfo {
            id: self.id,
            name: self.name,
            row_id_col,
            cols,
            col_positions,
            calc_rows,
        })
    }
}

/// Looks up a grade cell by column id, treating a missing entry as `BAD_ARG`
/// and propagating an error marker found in the cell. Shared by row formulas.
pub fn cell_value(row: &GradeRow, col_id: &str) -> GradeResult<RawValue> {
    match row.get(col_id) {
        None => err_result(format!("no value for '{}'", col_id), ErrorCode::BadArg),
        Some(Grade::Error(errs)) => Err(errs.clone()),
        Some(Grade::Value(v)) => Ok(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course_data() -> CourseData {
        CourseData {
            id: "t1".to_string(),
            name: "Test Course".to_string(),
            cols: vec![
                ColSpec::id("student").named("Student"),
                ColSpec::info("section"),
                ColSpec::score("q1", "quiz"),
                ColSpec::score_ranged("q2", "quiz", 1.0, 11.0),
                ColSpec::calc("qAvg", |_course, _row| Ok(RawValue::Number(0.0))),
            ],
            calc_rows: vec![CalcRowSpec::new("Count", |_course, _col| {
                Ok(RawValue::Number(0.0))
            })],
        }
    }

    #[test]
    fn compile_assigns_positions_in_declaration_order() {
        let info = course_data().compile().unwrap();
        let positions: Vec<usize> = info.cols().map(|c| c.col_index).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
        assert_eq!(info.position("q2"), 3);
        assert_eq!(info.position("nope"), usize::MAX);
    }

    #[test]
    fn compile_fills_defaults() {
        let info = course_data().compile().unwrap();
        assert_eq!(info.col("student").unwrap().name, "Student");
        assert_eq!(info.col("section").unwrap().name, "section");
        assert_eq!(info.col("q1").unwrap().score_range(), Some((0.0, 100.0)));
        assert_eq!(info.col("q2").unwrap().score_range(), Some((1.0, 11.0)));
        assert_eq!(info.row_id_col(), "student");
    }

    #[test]
    fn compile_rejects_missing_identifier() {
        let mut data = course_data();
        data.cols.remove(0);
        let errs = data.compile().unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors[0].code, ErrorCode::BadArg);
    }

    #[test]
    fn compile_rejects_duplicate_and_double_identifier() {
        let mut data = course_data();
        data.cols.push(ColSpec::id("student2"));
        data.cols.push(ColSpec::score("q1", "quiz"));
        let errs = data.compile().unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn category_lookup_finds_score_cols_only() {
        let info = course_data().compile().unwrap();
        let ids: Vec<&str> = info
            .score_cols_in_category("quiz")
            .map(|c| c.col_id.as_str())
            .collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(info.score_cols_in_category("paper").count(), 0);
    }
}
