use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::ChunkReader;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{CellValue, ColumnInfo, ColumnType, DataError, Dataset};

/// Cell spellings read as missing, matching the usual dataframe CSV defaults.
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A", "<NA>",
];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned {status} for dataset '{dataset}': {message}")]
    Catalog {
        dataset: String,
        status: u16,
        message: String,
    },
    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),
    #[error("malformed data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, dtypes inferred per column (the default)
/// * `.parquet` – any flat schema; list/struct columns are shown as text
/// * `.json`    – records-oriented: `[{ "col": value, ... }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => {
            let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            read_parquet(file)
        }
        "json" => {
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            read_json_records(&text)
        }
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Dataset, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_csv(file)
}

/// Read CSV with a header row.  Every column's dtype is inferred from all of
/// its cells before any cell is converted, so a column reads as `Integer` only
/// when every cell is an integer.
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Dataset, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut raw: Vec<csv::StringRecord> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(LoadError::Malformed(format!(
                "CSV row {row_no} has {} fields, header has {}",
                record.len(),
                headers.len()
            )));
        }
        raw.push(record);
    }

    let dtypes: Vec<ColumnType> = (0..headers.len())
        .map(|col| infer_text_column(raw.iter().map(|rec| rec.get(col).unwrap_or(""))))
        .collect();

    let rows = raw
        .iter()
        .map(|rec| {
            rec.iter()
                .zip(&dtypes)
                .map(|(cell, dtype)| parse_text_cell(cell, *dtype))
                .collect()
        })
        .collect();

    let columns = headers
        .into_iter()
        .zip(dtypes)
        .map(|(name, dtype)| ColumnInfo::new(name, dtype))
        .collect();
    Ok(Dataset::new(columns, rows)?)
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn infer_text_column<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut saw_missing = false;
    let mut saw_value = false;
    let (mut all_int, mut all_float, mut all_bool) = (true, true, true);

    for cell in cells {
        if is_missing(cell) {
            saw_missing = true;
            continue;
        }
        saw_value = true;
        let trimmed = cell.trim();
        all_int &= trimmed.parse::<i64>().is_ok();
        all_float &= trimmed.parse::<f64>().is_ok();
        all_bool &= parse_bool(trimmed).is_some();
    }

    if !saw_value {
        // An all-missing column loads as float (all NaN).
        return ColumnType::Float;
    }
    match (all_int, all_float, all_bool) {
        (true, _, _) if !saw_missing => ColumnType::Integer,
        (_, true, _) => ColumnType::Float,
        (_, _, true) if !saw_missing => ColumnType::Bool,
        _ => ColumnType::Text,
    }
}

fn parse_text_cell(cell: &str, dtype: ColumnType) -> CellValue {
    if is_missing(cell) {
        return CellValue::Null;
    }
    let trimmed = cell.trim();
    let parsed = match dtype {
        ColumnType::Integer => trimmed.parse().ok().map(CellValue::Integer),
        ColumnType::Float => trimmed.parse().ok().map(CellValue::Float),
        ColumnType::Bool => parse_bool(trimmed).map(CellValue::Bool),
        ColumnType::Text => None,
    };
    parsed.unwrap_or_else(|| CellValue::Text(cell.to_string()))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')` layout.
/// Columns appear in first-seen key order; keys missing from a record are null.
pub fn read_json_records(text: &str) -> Result<Dataset, LoadError> {
    let root: JsonValue = serde_json::from_str(text)?;
    let records = root
        .as_array()
        .ok_or_else(|| LoadError::Malformed("expected a top-level JSON array".into()))?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| LoadError::Malformed(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let cell = |rec: &JsonValue, name: &str| rec.get(name).cloned().unwrap_or(JsonValue::Null);

    let dtypes: Vec<ColumnType> = names
        .iter()
        .map(|name| infer_json_column(records.iter().map(|rec| cell(rec, name))))
        .collect();

    let rows = records
        .iter()
        .map(|rec| {
            names
                .iter()
                .zip(&dtypes)
                .map(|(name, dtype)| json_to_cell(&cell(rec, name), *dtype))
                .collect()
        })
        .collect();

    let columns = names
        .into_iter()
        .zip(dtypes)
        .map(|(name, dtype)| ColumnInfo::new(name, dtype))
        .collect();
    Ok(Dataset::new(columns, rows)?)
}

fn infer_json_column(values: impl Iterator<Item = JsonValue>) -> ColumnType {
    let mut saw_null = false;
    let mut saw_value = false;
    let (mut all_int, mut all_num, mut all_bool) = (true, true, true);
    for value in values {
        if value.is_null() {
            saw_null = true;
            continue;
        }
        saw_value = true;
        // u64 values past i64::MAX make the column float64
        all_int &= value.is_i64();
        all_num &= value.is_number();
        all_bool &= value.is_boolean();
    }
    if !saw_value {
        return ColumnType::Float;
    }
    match (all_int, all_num, all_bool) {
        (true, _, _) if !saw_null => ColumnType::Integer,
        (_, true, _) => ColumnType::Float,
        (_, _, true) if !saw_null => ColumnType::Bool,
        _ => ColumnType::Text,
    }
}

fn json_to_cell(value: &JsonValue, dtype: ColumnType) -> CellValue {
    match (value, dtype) {
        (JsonValue::Null, _) => CellValue::Null,
        (JsonValue::Number(n), ColumnType::Integer) => {
            n.as_i64().map_or(CellValue::Null, CellValue::Integer)
        }
        (JsonValue::Number(n), ColumnType::Float) => CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        (JsonValue::Bool(b), ColumnType::Bool) => CellValue::Bool(*b),
        (JsonValue::String(s), _) => CellValue::Text(s.clone()),
        (other, _) => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Read a Parquet file or an in-memory Parquet payload (catalog downloads).
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
pub fn read_parquet<R: ChunkReader + 'static>(reader: R) -> Result<Dataset, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let columns: Vec<ColumnInfo> = schema
        .fields()
        .iter()
        .map(|f| ColumnInfo::new(f.name().clone(), arrow_dtype(f.data_type())))
        .collect();

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let converted: Vec<ArrayRef> = columns
            .iter()
            .enumerate()
            .map(|(i, info)| normalise_array(batch.column(i), info.dtype))
            .collect::<Result<_, _>>()?;

        for row in 0..batch.num_rows() {
            rows.push(
                converted
                    .iter()
                    .zip(&columns)
                    .map(|(col, info)| arrow_cell(col, info.dtype, row))
                    .collect(),
            );
        }
    }

    Ok(Dataset::new(columns, rows)?)
}

fn arrow_dtype(dt: &DataType) -> ColumnType {
    match dt {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ColumnType::Integer,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => ColumnType::Float,
        DataType::Boolean => ColumnType::Bool,
        _ => ColumnType::Text,
    }
}

/// Cast a column to the one physical type read for its dtype.
fn normalise_array(col: &ArrayRef, dtype: ColumnType) -> Result<ArrayRef, LoadError> {
    let target = match dtype {
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Text => DataType::Utf8,
    };
    if col.data_type() == &target {
        return Ok(col.clone());
    }
    Ok(cast(col, &target)?)
}

fn arrow_cell(col: &ArrayRef, dtype: ColumnType, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match dtype {
        ColumnType::Integer => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        ColumnType::Float => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        ColumnType::Bool => CellValue::Bool(col.as_boolean().value(row)),
        ColumnType::Text => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn dtypes(ds: &Dataset) -> Vec<(&str, ColumnType)> {
        ds.columns()
            .iter()
            .map(|c| (c.name.as_str(), c.dtype))
            .collect()
    }

    #[test]
    fn test_csv_dtype_inference() {
        let text = "\
Receipt_ID,count,score,gap,flag,empty
R1,1,0.5,1,true,
R2,2,3,,false,
R3,3,4.25,7,true,
";
        let ds = read_csv(text.as_bytes()).unwrap();
        assert_eq!(
            dtypes(&ds),
            vec![
                ("Receipt_ID", ColumnType::Text),
                ("count", ColumnType::Integer),
                ("score", ColumnType::Float),
                ("gap", ColumnType::Float),
                ("flag", ColumnType::Bool),
                ("empty", ColumnType::Float),
            ]
        );
        assert_eq!(ds.len(), 3);
        let row = ds.row(1).unwrap();
        assert_eq!(row[0], CellValue::Text("R2".into()));
        assert_eq!(row[1], CellValue::Integer(2));
        assert_eq!(row[2], CellValue::Float(3.0));
        assert_eq!(row[3], CellValue::Null);
        assert_eq!(row[4], CellValue::Bool(false));
    }

    #[test]
    fn test_csv_numeric_looking_text_stays_text() {
        let ds = read_csv("id\n001\nabc\n".as_bytes()).unwrap();
        assert_eq!(ds.columns()[0].dtype, ColumnType::Text);
        assert_eq!(ds.row(0).unwrap()[0], CellValue::Text("001".into()));
    }

    #[test]
    fn test_csv_ragged_row_is_an_error() {
        let err = read_csv("a,b\n1,2\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Csv(_) | LoadError::Malformed(_)));
    }

    #[test]
    fn test_load_file_csv_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x,y\n1,2\n3,4").unwrap();
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(dtypes(&ds), vec![("x", ColumnType::Integer), ("y", ColumnType::Integer)]);
    }

    #[test]
    fn test_load_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("Dummy_dashboardV2.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_file(Path::new("table.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "xlsx"));
    }

    #[test]
    fn test_json_records_keep_key_order() {
        let text = r#"[
            {"Receipt_ID": "R1", "b": 1, "a": 0.5},
            {"Receipt_ID": "R2", "b": 2, "a": null}
        ]"#;
        let ds = read_json_records(text).unwrap();
        assert_eq!(
            dtypes(&ds),
            vec![
                ("Receipt_ID", ColumnType::Text),
                ("b", ColumnType::Integer),
                ("a", ColumnType::Float),
            ]
        );
        assert_eq!(ds.row(1).unwrap()[2], CellValue::Null);
    }

    #[test]
    fn test_json_integers_beyond_i64_make_a_float_column() {
        let text = r#"[{"id": 1}, {"id": 18446744073709551615}]"#;
        let ds = read_json_records(text).unwrap();
        assert_eq!(dtypes(&ds), vec![("id", ColumnType::Float)]);
        assert_eq!(ds.row(0).unwrap()[0], CellValue::Float(1.0));
        assert_eq!(ds.row(1).unwrap()[0], CellValue::Float(18446744073709551615.0));
    }

    #[test]
    fn test_parquet_round_trip_through_file() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("analysisjobs_getRegion", DataType::Utf8, false),
            Field::new("cells", DataType::Int32, false),
            Field::new("area", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["north", "south"])),
                Arc::new(Int32Array::from(vec![10, 20])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(
            dtypes(&ds),
            vec![
                ("analysisjobs_getRegion", ColumnType::Text),
                ("cells", ColumnType::Integer),
                ("area", ColumnType::Float),
            ]
        );
        assert_eq!(
            ds.row(1).unwrap(),
            &[
                CellValue::Text("south".into()),
                CellValue::Integer(20),
                CellValue::Null
            ]
        );
    }
}
