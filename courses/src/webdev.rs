//! FILENAME: courses/src/webdev.rs
//! The "Web Stack Development" course: cross-listed undergrad/grad sections,
//! drop-lowest averages per category, and a section-conditional weighted total.

use engine::{
    category_drop_avg, col_avg, col_count, col_max, col_min, weighted_sum, weights, CalcRowSpec,
    ColSpec, CourseData, CourseInfo, Weight, Weights,
};

/// Weights for the `total` column. `hwAvg` and `paper` depend on which
/// section the student is enrolled in (the grad section writes a paper).
fn total_weights() -> Weights {
    weights([
        ("qzAvg", Weight::Scalar(1.0)),
        ("prjAvg", Weight::Scalar(0.35)),
        ("hwAvg", Weight::by_key([("ug", 0.25), ("grad", 0.22)])),
        ("paper", Weight::by_key([("ug", 0.0), ("grad", 1.0)])),
        ("midterm", Weight::Scalar(0.14)),
        ("final", Weight::Scalar(0.15)),
        ("extra", Weight::Scalar(1.0)),
    ])
}

/// Builds and compiles the course schema.
pub fn course() -> CourseInfo {
    CourseData {
        id: "webdev".to_string(),
        name: "Web Stack Development".to_string(),
        cols: vec![
            ColSpec::info("campusId").named("Campus ID"),
            ColSpec::info("firstName").named("First Name"),
            ColSpec::info("lastName").named("Last Name"),
            ColSpec::id("emailId").named("Email"),
            ColSpec::info("section").named("Section"),
            ColSpec::score("prj1", "project"),
            ColSpec::score("prj2", "project"),
            ColSpec::score("prj3", "project"),
            ColSpec::score("prj4", "project"),
            ColSpec::score("hw1", "homework"),
            ColSpec::score("hw2", "homework"),
            ColSpec::score("hw3", "homework"),
            ColSpec::score_ranged("qz1", "quiz", 1.0, 11.0),
            ColSpec::score_ranged("qz2", "quiz", 1.0, 11.0),
            ColSpec::score_ranged("qz3", "quiz", 1.0, 11.0),
            ColSpec::score_ranged("qz4", "quiz", 1.0, 11.0),
            ColSpec::score_ranged("paper", "paper", 1.0, 3.0),
            ColSpec::score("midterm", "exam"),
            ColSpec::score("final", "exam"),
            ColSpec::score_ranged("extra", "extra", 0.0, 3.0),
            ColSpec::calc_fn("prjAvg", category_drop_avg("project", 1)),
            ColSpec::calc_fn("hwAvg", category_drop_avg("homework", 1)),
            ColSpec::calc_fn("qzAvg", category_drop_avg("quiz", 1)),
            ColSpec::calc_fn("total", weighted_sum(total_weights(), &["section"])),
        ],
        calc_rows: vec![
            CalcRowSpec::new("Count", col_count),
            CalcRowSpec::new("Max", col_max),
            CalcRowSpec::new("Min", col_min),
            CalcRowSpec::new("Avg", col_avg),
        ],
    }
    .compile()
    .expect("webdev course catalog must compile")
}
