//! FILENAME: engine/tests/common/mod.rs
//! Test harness and fixtures for grade-engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use engine::{
    category_drop_avg, col_avg, col_count, col_max, col_min, weighted_sum, weights, CalcRowSpec,
    ColSpec, CourseData, CourseInfo, Grades, RawRow, RawValue, Weight,
};

/// A small course exercising every column kind.
///
/// The `bonus` score column is deliberately left out of the fixture rows, so
/// until `add_column("bonus")` is applied the `total` formula fails and the
/// failure propagates into `curved` and the statistic rows.
pub fn course() -> Arc<CourseInfo> {
    Arc::new(
        CourseData {
            id: "fix1".to_string(),
            name: "Fixture Course".to_string(),
            cols: vec![
                ColSpec::id("student"),
                ColSpec::info("section"),
                ColSpec::score_ranged("q1", "quiz", 0.0, 10.0),
                ColSpec::score_ranged("q2", "quiz", 0.0, 10.0),
                ColSpec::score_ranged("q3", "quiz", 0.0, 10.0),
                ColSpec::score_ranged("bonus", "extra", 0.0, 5.0),
                ColSpec::calc_fn("qAvg", category_drop_avg("quiz", 1)),
                ColSpec::calc_fn(
                    "total",
                    weighted_sum(
                        weights([("qAvg", Weight::Scalar(1.0)), ("bonus", Weight::Scalar(1.0))]),
                        &[],
                    ),
                ),
                ColSpec::calc_fn(
                    "curved",
                    weighted_sum(
                        weights([("total", Weight::by_key([("ug", 1.1), ("grad", 1.0)]))]),
                        &["section"],
                    ),
                ),
            ],
            calc_rows: vec![
                CalcRowSpec::new("Count", col_count),
                CalcRowSpec::new("Max", col_max),
                CalcRowSpec::new("Min", col_min),
                CalcRowSpec::new("Avg", col_avg),
            ],
        }
        .compile()
        .expect("fixture course must compile"),
    )
}

/// Builds a raw row from (column id, value) pairs, keeping the given order.
pub fn row(pairs: &[(&str, RawValue)]) -> RawRow {
    pairs
        .iter()
        .map(|(id, v)| (id.to_string(), v.clone()))
        .collect()
}

pub fn sam() -> RawRow {
    row(&[
        ("student", "sam".into()),
        ("section", "ug".into()),
        ("q1", 8.0.into()),
        ("q2", 6.0.into()),
        ("q3", 9.0.into()),
    ])
}

pub fn pat() -> RawRow {
    row(&[
        ("student", "pat".into()),
        ("section", "grad".into()),
        ("q1", 9.0.into()),
        ("q2", "".into()),
        ("q3", 7.0.into()),
    ])
}

/// Upserts `rows` into a fresh table, panicking on any rejection.
pub fn load(rows: &[RawRow]) -> Grades {
    let mut grades = Grades::new(course());
    for r in rows {
        grades = grades
            .upsert_row(r.clone())
            .unwrap_or_else(|e| panic!("fixture row rejected: {}", e));
    }
    grades
}
