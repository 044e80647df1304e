//! FILENAME: courses/src/intro.rs
//! The "Introduction to Programming" course. Its total is a hand-written row
//! formula over the category averages rather than a weighted-sum table.

use engine::{
    category_drop_avg, col_avg, col_count, col_max, col_min, CalcRowSpec, ColSpec, CourseData,
    CourseInfo, Grade, GradeResult, GradeRow, RawValue,
};

/// Course total: fixed weights over the category averages. A missing entry
/// counts as 0; an error marker in any referenced average is propagated.
fn total(_course: &CourseInfo, row: &GradeRow) -> GradeResult<RawValue> {
    const FIELDS: [(&str, f64); 4] = [
        ("labAvg", 0.2),
        ("hwAvg", 0.25),
        ("qzAvg", 0.15),
        ("examAvg", 0.4),
    ];
    let mut sum = 0.0;
    for (col_id, weight) in FIELDS {
        match row.get(col_id) {
            None => {}
            Some(Grade::Error(errs)) => return Err(errs.clone()),
            Some(Grade::Value(v)) => sum += weight * v.numeric_or_zero(),
        }
    }
    Ok(RawValue::Number(sum))
}

/// Builds and compiles the course schema.
pub fn course() -> CourseInfo {
    CourseData {
        id: "intro".to_string(),
        name: "Introduction to Programming".to_string(),
        cols: vec![
            ColSpec::id("email").named("Email"),
            ColSpec::info("firstName").named("First Name"),
            ColSpec::info("lastName").named("Last Name"),
            ColSpec::score_ranged("lab1", "lab", 0.0, 10.0),
            ColSpec::score_ranged("lab2", "lab", 0.0, 10.0),
            ColSpec::score_ranged("lab3", "lab", 0.0, 10.0),
            ColSpec::score("hw1", "homework"),
            ColSpec::score("hw2", "homework"),
            ColSpec::score("hw3", "homework"),
            ColSpec::score_ranged("qz1", "quiz", 0.0, 12.0),
            ColSpec::score_ranged("qz2", "quiz", 0.0, 12.0),
            ColSpec::score_ranged("qz3", "quiz", 0.0, 12.0),
            ColSpec::score("exam1", "exam"),
            ColSpec::score("exam2", "exam"),
            ColSpec::calc_fn("labAvg", category_drop_avg("lab", 1)),
            ColSpec::calc_fn("hwAvg", category_drop_avg("homework", 1)),
            ColSpec::calc_fn("qzAvg", category_drop_avg("quiz", 1)),
            ColSpec::calc_fn("examAvg", category_drop_avg("exam", 0)),
            ColSpec::calc("total", total),
        ],
        calc_rows: vec![
            CalcRowSpec::new("count", col_count),
            CalcRowSpec::new("max", col_max),
            CalcRowSpec::new("min", col_min),
            CalcRowSpec::new("avg", col_avg),
        ],
    }
    .compile()
    .expect("intro course catalog must compile")
}
