//! FILENAME: engine/src/util.rs
//! PURPOSE: Boundary helpers around the table shapes.
//! CONTEXT: Deterministic ordering of full-table rows for display layers, and
//! CSV ingest for grade sheets exported from external tools.

use crate::result::{ErrorCode, Errors, GradeResult};
use crate::row::{GradeRow, RawRow, STAT_HDR};
use crate::value::{Grade, RawValue};

/// Sorts full-table rows by the `$stat` cell first and the identifier cell
/// second. Data rows, whose `$stat` is `""`, always precede statistic rows;
/// statistic rows come out in label order.
pub fn sort_grades(rows: &mut [GradeRow], row_id_col: &str) {
    fn text_key(row: &GradeRow, col_id: &str) -> String {
        match row.get(col_id) {
            Some(Grade::Value(v)) => v.to_string(),
            _ => String::new(),
        }
    }
    rows.sort_by(|a, b| {
        let stat = text_key(a, STAT_HDR).cmp(&text_key(b, STAT_HDR));
        stat.then_with(|| text_key(a, row_id_col).cmp(&text_key(b, row_id_col)))
    });
}

/// Parses CSV text into raw rows. The first record is the header naming the
/// column ids; numeric-looking fields become numbers, everything else stays
/// text, and empty fields stay the `""` ungraded sentinel.
pub fn csv_to_rows(text: &str) -> GradeResult<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Errors::one(format!("bad CSV header: {}", e), ErrorCode::BadArg))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Errors::one(format!("bad CSV record: {}", e), ErrorCode::BadArg))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(id, field)| (id.clone(), parse_field(field)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn parse_field(field: &str) -> RawValue {
    if field.is_empty() {
        return RawValue::missing();
    }
    match field.parse::<f64>() {
        Ok(n) if n.is_finite() => RawValue::Number(n),
        _ => RawValue::Text(field.to_string()),
    }
}
