use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Dataset};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row followed by one record per line
/// * `.json`    – `[{ "col": value, ... }, ...]`
/// * `.parquet` – flat scalar columns (strings, ints, floats, bools)
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading dataset {}", path.display()))?;

    log::debug!(
        "loaded {} rows x {} columns from {}",
        dataset.len(),
        dataset.columns.len(),
        path.display()
    );
    Ok(dataset)
}

/// Write a dataset as CSV: header row, then one record per row, no index column.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(&dataset.columns)
        .context("writing CSV header")?;
    for (row_no, row) in dataset.rows.iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }
    writer.flush().context("flushing CSV writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, every field type-guessed.
/// Ragged records are rejected by the reader.
fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.is_empty() {
        bail!("CSV has no header row");
    }

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(CellValue::parse).collect());
    }

    Ok(Dataset::new(columns, rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "gender": "female", "reading_score": 72, "math_score": 71 },
///   ...
/// ]
/// ```
///
/// Columns are the union of keys over all records; missing keys become `Null`.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows: Vec<Vec<CellValue>> = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            columns
                .iter()
                .map(|col| obj.get(col).map_or(CellValue::Null, json_to_cell))
                .collect()
        })
        .collect();

    Ok(Dataset::new(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::parse(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one scalar value per cell.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Nested columns are rendered as their
/// type name so they show up as a single categorical level.
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows: Vec<Vec<CellValue>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(Dataset::new(columns, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::parse(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => CellValue::parse(col.as_string::<i64>().value(row)),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => {
            let v = col.as_primitive::<Float64Type>().value(row);
            if v.is_nan() { CellValue::Null } else { CellValue::Float(v) }
        }
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    #[test]
    fn csv_round_trip_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.csv");
        std::fs::write(&src, "gender,lunch,math_score\nfemale,standard,72\nmale,,69.5\n").unwrap();

        let ds = load_file(&src).unwrap();
        assert_eq!(ds.columns, vec!["gender", "lunch", "math_score"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[1][1], CellValue::Null);

        let out = dir.path().join("out.csv");
        write_csv(&ds, &out).unwrap();
        assert_eq!(load_file(&out).unwrap(), ds);
    }

    #[test]
    fn csv_padded_text_is_written_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.csv");
        std::fs::write(&src, "lunch,math_score\n\" free \", 72 \n").unwrap();

        let dataset = load_file(&src).unwrap();
        assert_eq!(dataset.rows[0][0], CellValue::String(" free ".into()));
        assert_eq!(dataset.rows[0][1], CellValue::Integer(72));

        let out = dir.path().join("out.csv");
        write_csv(&dataset, &out).unwrap();
        assert_eq!(load_file(&out).unwrap(), dataset);
    }

    #[test]
    fn csv_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bad.csv");
        std::fs::write(&src, "a,b\n1,2\n3\n").unwrap();
        assert!(load_file(&src).is_err());
    }

    #[test]
    fn json_records_fill_missing_keys_with_null() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.json");
        std::fs::write(
            &src,
            r#"[{"gender":"female","score":72},{"gender":"male"}]"#,
        )
        .unwrap();

        let ds = load_file(&src).unwrap();
        assert_eq!(ds.len(), 2);
        let score = ds.column_index("score").unwrap();
        assert_eq!(ds.rows[0][score], CellValue::Integer(72));
        assert_eq!(ds.rows[1][score], CellValue::Null);
    }

    #[test]
    fn parquet_scalar_columns_load() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("gender", DataType::Utf8, false),
            Field::new("reading_score", DataType::Int64, false),
            Field::new("ratio", DataType::Float64, true),
            Field::new("passed", DataType::Boolean, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["female", "male"])),
                Arc::new(Int64Array::from(vec![72, 90])),
                Arc::new(Float64Array::from(vec![Some(0.5), None])),
                Arc::new(BooleanArray::from(vec![true, false])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&src).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(&src).unwrap();
        assert_eq!(ds.columns, vec!["gender", "reading_score", "ratio", "passed"]);
        assert_eq!(ds.rows[0], vec![
            CellValue::String("female".into()),
            CellValue::Integer(72),
            CellValue::Float(0.5),
            CellValue::Bool(true),
        ]);
        assert_eq!(ds.rows[1][2], CellValue::Null);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = load_file(Path::new("data.xlsx")).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }
}
