//! FILENAME: engine/src/table.rs
//! PURPOSE: The immutable, validating grade table store.
//! CONTEXT: A `Grades` value holds the raw rows for one course. Every mutating
//! operation validates against the schema, aggregates all violations, and on
//! success returns a brand-new `Grades` sharing row storage with its parent.
//! Older instances stay valid and independently queryable, so concurrent
//! readers never need locks.

use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::course::{ColDetail, CourseInfo};
use crate::result::{err_result, ErrorCode, Errors, GradeResult};
use crate::row::{FullTable, GradeRow, Patches, RawRow, RawTable, STAT_HDR};
use crate::value::{Grade, RawValue};

/// The grade table for one course offering.
///
/// Immutable: `upsert_row`, `add_column`, and `patch` leave the receiver
/// untouched and return a new instance. Row storage is shared between
/// instances (`Arc` per row), so a mutation costs O(changed rows) plus one
/// map clone, not a deep copy of the table.
#[derive(Debug, Clone)]
pub struct Grades {
    course: Arc<CourseInfo>,

    /// Raw column ids accepted by this table. `None` until the first row is
    /// inserted; fixed afterwards except for `add_column`.
    col_ids: Option<FxHashSet<String>>,

    /// Row id → raw row, entries in schema position order.
    rows: FxHashMap<String, Arc<RawRow>>,

    /// Memoized full table. Safe because the instance never changes after
    /// construction.
    full: OnceCell<FullTable>,
}

impl Grades {
    /// Creates an empty table for `course`.
    pub fn new(course: Arc<CourseInfo>) -> Self {
        Grades {
            course,
            col_ids: None,
            rows: FxHashMap::default(),
            full: OnceCell::new(),
        }
    }

    pub fn course(&self) -> &CourseInfo {
        &self.course
    }

    /// Row ids currently stored, in ascending order.
    pub fn row_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The raw row stored under `row_id`, if any.
    pub fn raw_row(&self, row_id: &str) -> Option<RawRow> {
        self.rows.get(row_id).map(|r| (**r).clone())
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Inserts `row` or replaces the stored row with the same identifier.
    ///
    /// The first successful upsert establishes the table's raw column set;
    /// afterwards every row must supply exactly that set. All violations in
    /// the row are collected before returning:
    /// - `BAD_ARG`: unknown column, calculated column, extra or missing column
    ///   relative to the established set, null cell, unresolved identifier.
    /// - `RANGE`: numeric score value outside the column's declared range.
    pub fn upsert_row(&self, row: RawRow) -> GradeResult<Grades> {
        let course = &self.course;
        let mut errs = Errors::new();

        if let Some(established) = &self.col_ids {
            for col_id in row.col_ids() {
                if !established.contains(col_id) {
                    errs.add(format!("new column '{}'", col_id), ErrorCode::BadArg);
                }
            }
            // iterate the schema, not the set, for a stable error order
            for col in course.cols() {
                if established.contains(&col.col_id) && !row.contains(&col.col_id) {
                    errs.add(format!("missing column '{}'", col.col_id), ErrorCode::BadArg);
                }
            }
        }

        let mut row_id: Option<String> = None;
        for (col_id, val) in row.iter() {
            if val.is_null() {
                errs.add(format!("'{}' is null", col_id), ErrorCode::BadArg);
            }
            match course.col(col_id) {
                None => {
                    errs.add(format!("unknown column '{}'", col_id), ErrorCode::BadArg);
                }
                Some(col) => match &col.detail {
                    ColDetail::Id => {
                        if let RawValue::Text(s) = val {
                            row_id = Some(s.clone());
                        }
                    }
                    ColDetail::Info => {}
                    ColDetail::Score { min, max, .. } => {
                        if let RawValue::Number(n) = val {
                            if n < min || n > max {
                                errs.add(
                                    format!(
                                        "'{}' value {} out of range [{}, {}]",
                                        col_id, n, min, max
                                    ),
                                    ErrorCode::Range,
                                );
                            }
                        }
                    }
                    ColDetail::Calc { .. } => {
                        errs.add(
                            format!("cannot supply data for calculated column '{}'", col_id),
                            ErrorCode::BadArg,
                        );
                    }
                },
            }
        }

        let row_id = match row_id {
            Some(id) => id,
            None => {
                errs.add(
                    format!("no entry for identifier column '{}'", course.row_id_col()),
                    ErrorCode::BadArg,
                );
                String::new()
            }
        };
        if !errs.is_empty() {
            debug!(
                "upsert into '{}' rejected with {} error(s)",
                course.id,
                errs.len()
            );
            return Err(errs);
        }

        let col_ids = match &self.col_ids {
            Some(established) => established.clone(),
            None => row.col_ids().map(str::to_string).collect(),
        };
        let sorted = row.sorted_by_position(|id| course.position(id));
        let mut rows = self.rows.clone();
        rows.insert(row_id, Arc::new(sorted));
        Ok(Grades {
            course: Arc::clone(&self.course),
            col_ids: Some(col_ids),
            rows,
            full: OnceCell::new(),
        })
    }

    /// Adds an empty column for `col_id`: every stored row gains an ungraded
    /// `""` placeholder at the column's schema position.
    ///
    /// `BAD_ARG` if `col_id` is unknown, not a score/info column, already in
    /// the established set, or no column set has been established yet.
    pub fn add_column(&self, col_id: &str) -> GradeResult<Grades> {
        let course = &self.course;
        let Some(established) = &self.col_ids else {
            return err_result(
                format!("no columns established yet, cannot add '{}'", col_id),
                ErrorCode::BadArg,
            );
        };
        let valid_kind = matches!(
            course.col(col_id).map(|c| &c.detail),
            Some(ColDetail::Score { .. }) | Some(ColDetail::Info)
        );
        if !valid_kind || established.contains(col_id) {
            return err_result(
                format!("'{}' is not a valid column to add", col_id),
                ErrorCode::BadArg,
            );
        }

        let position = course.position(col_id);
        let mut rows = FxHashMap::default();
        rows.reserve(self.rows.len());
        for (row_id, row) in &self.rows {
            let mut new_row = (**row).clone();
            let at = new_row
                .col_ids()
                .position(|id| course.position(id) > position)
                .unwrap_or(new_row.len());
            new_row.insert_at(at, col_id, RawValue::missing());
            rows.insert(row_id.clone(), Arc::new(new_row));
        }
        let mut col_ids = established.clone();
        col_ids.insert(col_id.to_string());
        Ok(Grades {
            course: Arc::clone(&self.course),
            col_ids: Some(col_ids),
            rows,
            full: OnceCell::new(),
        })
    }

    /// Applies cell updates, all-or-nothing.
    ///
    /// Every referenced row id must exist; every referenced column must be
    /// established, not calculated, and not the identifier column; score
    /// values must be numeric and in range. All violations across the whole
    /// patch set are accumulated; on any failure no cell is overwritten.
    pub fn patch(&self, patches: &Patches) -> GradeResult<Grades> {
        let course = &self.course;
        let mut errs = Errors::new();

        let mut row_ids: Vec<&str> = patches.keys().map(String::as_str).collect();
        row_ids.sort_unstable();

        for &row_id in &row_ids {
            if !self.rows.contains_key(row_id) {
                errs.add(format!("unknown row id '{}'", row_id), ErrorCode::BadArg);
            }
            for (col_id, val) in patches[row_id].iter() {
                if col_id == course.row_id_col() {
                    errs.add(
                        format!("cannot patch identifier column '{}'", col_id),
                        ErrorCode::BadArg,
                    );
                    continue;
                }
                let established = self
                    .col_ids
                    .as_ref()
                    .is_some_and(|ids| ids.contains(col_id));
                if !established {
                    errs.add(format!("unknown column id '{}'", col_id), ErrorCode::BadArg);
                    continue;
                }
                if val.is_null() {
                    errs.add(
                        format!("'{}' is null on row '{}'", col_id, row_id),
                        ErrorCode::BadArg,
                    );
                    continue;
                }
                match course.col(col_id).map(|c| &c.detail) {
                    Some(ColDetail::Score { min, max, .. }) => {
                        let in_range = val.as_number().is_some_and(|n| n >= *min && n <= *max);
                        if !in_range {
                            errs.add(
                                format!("invalid patch value for '{}' on row '{}'", col_id, row_id),
                                ErrorCode::Range,
                            );
                        }
                    }
                    Some(ColDetail::Calc { .. }) => {
                        errs.add(
                            format!("cannot patch calculated column '{}'", col_id),
                            ErrorCode::BadArg,
                        );
                    }
                    _ => {}
                }
            }
        }
        if !errs.is_empty() {
            debug!(
                "patch of '{}' rejected with {} error(s)",
                course.id,
                errs.len()
            );
            return Err(errs);
        }

        let mut rows = self.rows.clone();
        for (row_id, patch_row) in patches {
            if let Some(existing) = rows.get(row_id.as_str()) {
                let mut new_row = (**existing).clone();
                for (col_id, val) in patch_row.iter() {
                    new_row.set(col_id, val.clone());
                }
                rows.insert(row_id.clone(), Arc::new(new_row));
            }
        }
        Ok(Grades {
            course: Arc::clone(&self.course),
            col_ids: self.col_ids.clone(),
            rows,
            full: OnceCell::new(),
        })
    }

    // ========================================================================
    // READERS
    // ========================================================================

    /// Every stored row, columns in schema position order, rows in ascending
    /// row-id order. Empty if no columns are established.
    pub fn raw_table(&self) -> RawTable {
        if self.col_ids.is_none() {
            return Vec::new();
        }
        let mut rows: Vec<(&String, &Arc<RawRow>)> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows.into_iter().map(|(_, r)| (**r).clone()).collect()
    }

    /// The fully computed table: one row per data row (raw values plus every
    /// calculated column), followed by one synthetic row per statistic-row
    /// descriptor. Memoized per instance.
    ///
    /// A formula failure never aborts the computation; it is stored as an
    /// error marker in the affected cell.
    pub fn full_table(&self) -> &FullTable {
        self.full.get_or_init(|| self.compute_full_table())
    }

    fn compute_full_table(&self) -> FullTable {
        let course = &self.course;
        if self.col_ids.is_none() {
            return Vec::new();
        }
        debug!(
            "computing full table for '{}' ({} rows)",
            course.id,
            self.rows.len()
        );

        let mut sorted_rows: Vec<(&String, &Arc<RawRow>)> = self.rows.iter().collect();
        sorted_rows.sort_by(|a, b| a.0.cmp(b.0));

        let mut data_rows: Vec<GradeRow> = Vec::with_capacity(sorted_rows.len());
        for (_row_id, raw) in sorted_rows {
            let mut grow: GradeRow = raw
                .iter()
                .map(|(id, v)| (id.to_string(), Grade::Value(v.clone())))
                .collect();
            // schema order, so later calc columns see earlier ones
            for col in course.cols() {
                if let ColDetail::Calc { formula } = &col.detail {
                    let grade = match formula(course, &grow) {
                        Ok(v) => Grade::Value(v),
                        Err(e) => Grade::Error(e),
                    };
                    let at = grow
                        .col_ids()
                        .position(|id| course.position(id) > col.col_index)
                        .unwrap_or(grow.len());
                    grow.insert_at(at, col.col_id.clone(), grade);
                }
            }
            grow.set(STAT_HDR, Grade::from(""));
            data_rows.push(grow);
        }

        let mut table = data_rows.clone();
        for calc_row in course.calc_rows() {
            let mut stat_row = GradeRow::with_capacity(course.ncols() + 1);
            for col in course.cols() {
                let included = col.is_calc()
                    || self
                        .col_ids
                        .as_ref()
                        .is_some_and(|ids| ids.contains(&col.col_id));
                if !included {
                    continue;
                }
                let grade = if col.is_label() {
                    Grade::from(calc_row.name.as_str())
                } else {
                    let col_vals: Vec<Grade> = data_rows
                        .iter()
                        .filter_map(|r| r.get(&col.col_id).cloned())
                        .collect();
                    match (calc_row.formula)(course, &col_vals) {
                        Ok(v) => Grade::Value(v),
                        Err(e) => Grade::Error(e),
                    }
                };
                stat_row.set(col.col_id.clone(), grade);
            }
            stat_row.set(STAT_HDR, Grade::from(calc_row.name.as_str()));
            table.push(stat_row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CalcRowSpec, ColSpec, CourseData};
    use crate::formulas::{category_drop_avg, col_avg, col_count, weighted_sum, weights, Weight};

    fn course() -> Arc<CourseInfo> {
        Arc::new(
            CourseData {
                id: "t1".to_string(),
                name: "Test Course".to_string(),
                cols: vec![
                    ColSpec::id("student"),
                    ColSpec::info("section"),
                    ColSpec::score_ranged("q1", "quiz", 0.0, 10.0),
                    ColSpec::score_ranged("q2", "quiz", 0.0, 10.0),
                    ColSpec::score("exam", "exam"),
                    ColSpec::calc_fn("qAvg", category_drop_avg("quiz", 1)),
                    ColSpec::calc_fn(
                        "total",
                        weighted_sum(
                            weights([
                                ("qAvg", Weight::Scalar(0.4)),
                                ("exam", Weight::by_key([("ug", 0.5), ("grad", 0.6)])),
                            ]),
                            &["section"],
                        ),
                    ),
                ],
                calc_rows: vec![
                    CalcRowSpec::new("Count", col_count),
                    CalcRowSpec::new("Avg", col_avg),
                ],
            }
            .compile()
            .unwrap(),
        )
    }

    fn row(pairs: &[(&str, RawValue)]) -> RawRow {
        pairs
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect()
    }

    fn sam() -> RawRow {
        row(&[
            ("student", "sam".into()),
            ("section", "ug".into()),
            ("q1", 8.0.into()),
            ("q2", 6.0.into()),
            ("exam", 80.0.into()),
        ])
    }

    fn pat() -> RawRow {
        row(&[
            ("student", "pat".into()),
            ("section", "grad".into()),
            ("q1", 9.0.into()),
            ("q2", "".into()),
            ("exam", 70.0.into()),
        ])
    }

    fn load() -> Grades {
        let grades = Grades::new(course());
        let grades = grades.upsert_row(sam()).unwrap();
        grades.upsert_row(pat()).unwrap()
    }

    #[test]
    fn empty_table_has_no_rows() {
        let grades = Grades::new(course());
        assert!(grades.raw_table().is_empty());
        assert!(grades.full_table().is_empty());
    }

    #[test]
    fn upsert_establishes_columns_and_orders_them() {
        let grades = Grades::new(course());
        let scrambled = row(&[
            ("exam", 80.0.into()),
            ("student", "sam".into()),
            ("q2", 6.0.into()),
            ("section", "ug".into()),
            ("q1", 8.0.into()),
        ]);
        let grades = grades.upsert_row(scrambled).unwrap();
        let table = grades.raw_table();
        let ids: Vec<&str> = table[0].col_ids().collect();
        assert_eq!(ids, vec!["student", "section", "q1", "q2", "exam"]);
    }

    #[test]
    fn upsert_replaces_row_with_same_id() {
        let grades = load();
        let mut updated = sam();
        updated.set("q1", RawValue::from(10.0));
        let grades = grades.upsert_row(updated).unwrap();
        assert_eq!(grades.raw_table().len(), 2);
        let sam_row = grades.raw_row("sam").unwrap();
        assert_eq!(sam_row.get("q1"), Some(&RawValue::Number(10.0)));
    }

    #[test]
    fn upsert_rejects_numeric_identifier() {
        let grades = Grades::new(course());
        let mut bad = sam();
        bad.set("student", RawValue::from(42.0));
        let errs = grades.upsert_row(bad).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors[0].code, ErrorCode::BadArg);
    }

    #[test]
    fn upsert_rejects_calc_column_data() {
        let grades = Grades::new(course());
        let mut bad = sam();
        bad.set("qAvg", RawValue::from(99.0));
        let errs = grades.upsert_row(bad).unwrap_err();
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn upsert_out_of_range_score_is_range_error() {
        let grades = Grades::new(course());
        let mut bad = sam();
        bad.set("q1", RawValue::from(12.0));
        let errs = grades.upsert_row(bad).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors[0].code, ErrorCode::Range);
    }

    #[test]
    fn upsert_collects_all_violations() {
        // established set {student, section, q1}; the incoming row has a
        // known-but-unestablished extra column, a missing column, and a null
        // cell: exactly three BAD_ARG errors
        let slim = Grades::new(course())
            .upsert_row(row(&[
                ("student", "sam".into()),
                ("section", "ug".into()),
                ("q1", 8.0.into()),
            ]))
            .unwrap();
        let bad = row(&[
            ("student", "kim".into()),
            ("q1", RawValue::Null),
            ("q2", 7.0.into()),
        ]);
        let errs = slim.upsert_row(bad).unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(errs.errors.iter().all(|e| e.code == ErrorCode::BadArg));
    }

    #[test]
    fn upsert_reports_overlapping_violations_independently() {
        // a column both unknown to the schema and extra relative to the
        // established set contributes two errors
        let grades = load();
        let mut bad = sam();
        bad.set("mystery", RawValue::from(1.0));
        let errs = grades.upsert_row(bad).unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn upsert_does_not_touch_receiver() {
        let grades = load();
        let before = grades.raw_table();
        let mut updated = sam();
        updated.set("q1", RawValue::from(1.0));
        let _ = grades.upsert_row(updated).unwrap();
        let _ = grades.upsert_row(row(&[("student", "x".into())])).unwrap_err();
        assert_eq!(grades.raw_table(), before);
    }

    #[test]
    fn add_column_backfills_placeholder() {
        let grades = load();
        assert!(grades.add_column("exam").is_err()); // already established

        let slim = Grades::new(course())
            .upsert_row(row(&[
                ("student", "sam".into()),
                ("section", "ug".into()),
                ("q1", 8.0.into()),
            ]))
            .unwrap();
        let widened = slim.add_column("q2").unwrap();
        let table = widened.raw_table();
        assert_eq!(table.len(), 1);
        let ids: Vec<&str> = table[0].col_ids().collect();
        assert_eq!(ids, vec!["student", "section", "q1", "q2"]);
        assert_eq!(table[0].get("q2"), Some(&RawValue::missing()));
        // receiver unchanged
        assert!(!slim.raw_table()[0].contains("q2"));
    }

    #[test]
    fn add_column_rejects_unknown_calc_and_unestablished() {
        let grades = load();
        assert!(grades.add_column("nope").is_err());
        assert!(grades.add_column("qAvg").is_err());
        assert!(Grades::new(course()).add_column("q1").is_err());
    }

    #[test]
    fn patch_is_atomic() {
        let grades = load();
        let before = grades.raw_table();
        let mut patches = Patches::new();
        patches.insert("sam".to_string(), row(&[("q1", 3.0.into())]));
        patches.insert("pat".to_string(), row(&[("q1", 99.0.into())]));
        let errs = grades.patch(&patches).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors[0].code, ErrorCode::Range);
        assert_eq!(grades.raw_table(), before);
    }

    #[test]
    fn patch_applies_all_cells() {
        let grades = load();
        let mut patches = Patches::new();
        patches.insert(
            "sam".to_string(),
            row(&[("q1", 3.0.into()), ("exam", 91.0.into())]),
        );
        patches.insert("pat".to_string(), row(&[("q2", 4.0.into())]));
        let patched = grades.patch(&patches).unwrap();
        assert_eq!(patched.raw_row("sam").unwrap().get("q1"), Some(&RawValue::Number(3.0)));
        assert_eq!(patched.raw_row("sam").unwrap().get("exam"), Some(&RawValue::Number(91.0)));
        assert_eq!(patched.raw_row("pat").unwrap().get("q2"), Some(&RawValue::Number(4.0)));
        // untouched cells survive
        assert_eq!(patched.raw_row("pat").unwrap().get("q1"), Some(&RawValue::Number(9.0)));
    }

    #[test]
    fn patch_rejects_bad_row_col_and_identifier() {
        let grades = load();
        let mut patches = Patches::new();
        patches.insert("ghost".to_string(), row(&[("q1", 3.0.into())]));
        patches.insert("sam".to_string(), row(&[("student", "newid".into())]));
        patches.insert("pat".to_string(), row(&[("qAvg", 1.0.into())]));
        let errs = grades.patch(&patches).unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(errs.errors.iter().all(|e| e.code == ErrorCode::BadArg));
    }

    #[test]
    fn full_table_computes_calc_columns_and_stat_rows() {
        let grades = load();
        let full = grades.full_table();
        assert_eq!(full.len(), 4); // 2 data rows + Count + Avg

        let sam_row = &full[1]; // rows sorted by id: pat, sam
        assert_eq!(sam_row.get("student").unwrap().as_text(), Some("sam"));
        // quiz drop-avg: [6, 8] drop 6 -> 8
        assert_eq!(sam_row.get("qAvg").unwrap().as_number(), Some(8.0));
        // total: 8*0.4 + 80*0.5 (section ug)
        assert!((sam_row.get("total").unwrap().as_number().unwrap() - 43.2).abs() < 1e-9);
        assert_eq!(sam_row.get(STAT_HDR).unwrap().as_text(), Some(""));

        let pat_row = &full[0];
        // quiz drop-avg: ['' -> 0, 9] drop 0 -> 9
        assert_eq!(pat_row.get("qAvg").unwrap().as_number(), Some(9.0));
        // total: 9*0.4 + 70*0.6 (section grad)
        assert!((pat_row.get("total").unwrap().as_number().unwrap() - 45.6).abs() < 1e-9);

        let count_row = &full[2];
        assert_eq!(count_row.get(STAT_HDR).unwrap().as_text(), Some("Count"));
        assert_eq!(count_row.get("student").unwrap().as_text(), Some("Count"));
        assert_eq!(count_row.get("section").unwrap().as_text(), Some("Count"));
        assert_eq!(count_row.get("q1").unwrap().as_number(), Some(2.0));
        assert_eq!(count_row.get("q2").unwrap().as_number(), Some(1.0)); // pat's q2 ungraded
        assert_eq!(count_row.get("total").unwrap().as_number(), Some(2.0));

        let avg_row = &full[3];
        assert_eq!(avg_row.get("q1").unwrap().as_number(), Some(8.5));
    }

    #[test]
    fn full_table_rows_keep_schema_column_order() {
        let grades = load();
        for r in grades.full_table() {
            let ids: Vec<&str> = r.col_ids().collect();
            assert_eq!(
                ids,
                vec!["student", "section", "q1", "q2", "exam", "qAvg", "total", STAT_HDR]
            );
        }
    }

    #[test]
    fn full_table_is_memoized_per_instance() {
        let grades = load();
        let first: *const FullTable = grades.full_table();
        let second: *const FullTable = grades.full_table();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn upsert_idempotence() {
        let grades = Grades::new(course());
        let once = grades.upsert_row(sam()).unwrap();
        let twice = once.upsert_row(sam()).unwrap();
        assert_eq!(once.raw_table(), twice.raw_table());
    }

    #[test]
    fn snapshots_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Grades>();
    }
}
