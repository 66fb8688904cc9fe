use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::LoadError;
use super::model::{
    format_bool, Dataset, FarmRecord, RowDefect, RowDefectKind, COL_AREA, COL_AUDIT_DATE,
    COL_CROP_TYPE, COL_DEPARTMENT, COL_FARM_ID, COL_IRRIGATION, COL_PRICE, COL_PRODUCTION,
    COL_SOIL_TYPE, COL_TECHNIFICATION, STRUCTURAL_COLUMNS,
};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Csv,
    Json,
    Parquet,
}

impl SourceFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Csv),
            "json" => Ok(SourceFormat::Json),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Csv => f.write_str("csv"),
            SourceFormat::Json => f.write_str("json"),
            SourceFormat::Parquet => f.write_str("parquet"),
        }
    }
}

/// Load a farm dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – delimited text with a header row (`,` or `;`)
/// * `.json`         – `[{ "ID_Finca": "F001", "Departamento": "Huila", ... }, ...]`
/// * `.parquet`      – one Arrow column per source column
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Csv => load_csv(&std::fs::read(path)?),
        SourceFormat::Json => load_json(&std::fs::read(path)?),
        SourceFormat::Parquet => load_parquet(path),
    }
}

// ---------------------------------------------------------------------------
// Column layout: header names → cell positions
// ---------------------------------------------------------------------------

/// Positions of the known columns inside a row. Structural columns are
/// mandatory; the rest fall back to defaults when absent.
#[derive(Debug, Clone)]
struct ColumnLayout {
    farm_id: Option<usize>,
    department: usize,
    crop_type: usize,
    soil_type: Option<usize>,
    technification: Option<usize>,
    irrigation: Option<usize>,
    area: usize,
    production: usize,
    price: usize,
    audit_date: Option<usize>,
}

impl ColumnLayout {
    fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self, LoadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.as_ref().trim().trim_start_matches('\u{feff}') == name)
        };

        let missing: Vec<String> = STRUCTURAL_COLUMNS
            .into_iter()
            .filter(|&col| find(col).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MalformedSource { missing });
        }

        for optional in [COL_FARM_ID, COL_SOIL_TYPE, COL_TECHNIFICATION, COL_IRRIGATION] {
            if find(optional).is_none() {
                warn!("column '{optional}' not found; using defaults");
            }
        }

        let required = |name: &str| {
            find(name).ok_or_else(|| LoadError::MalformedSource {
                missing: vec![name.to_string()],
            })
        };

        Ok(ColumnLayout {
            farm_id: find(COL_FARM_ID),
            department: required(COL_DEPARTMENT)?,
            crop_type: required(COL_CROP_TYPE)?,
            soil_type: find(COL_SOIL_TYPE),
            technification: find(COL_TECHNIFICATION),
            irrigation: find(COL_IRRIGATION),
            area: required(COL_AREA)?,
            production: required(COL_PRODUCTION)?,
            price: required(COL_PRICE)?,
            audit_date: find(COL_AUDIT_DATE),
        })
    }

    /// Every cell position a row parse reads.
    fn positions(&self) -> Vec<usize> {
        [
            self.farm_id,
            Some(self.department),
            Some(self.crop_type),
            self.soil_type,
            self.technification,
            self.irrigation,
            Some(self.area),
            Some(self.production),
            Some(self.price),
            self.audit_date,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Coerce one row of text cells into a typed record.
    fn parse_row<C: RowCells + ?Sized>(&self, cells: &C) -> Result<FarmRecord, RowDefectKind> {
        let text = |idx: Option<usize>| idx.map(|i| cells.cell(i).to_string()).unwrap_or_default();

        let irrigation_technified = match self.irrigation {
            Some(i) => parse_bool(cells.cell(i)).ok_or_else(|| RowDefectKind::InvalidBool {
                column: COL_IRRIGATION.to_string(),
                value: cells.cell(i).to_string(),
            })?,
            None => false,
        };

        let last_audit_date = match self.audit_date {
            Some(i) => parse_date(cells.cell(i))?,
            None => None,
        };

        Ok(FarmRecord {
            farm_id: text(self.farm_id),
            department: cells.cell(self.department).to_string(),
            crop_type: cells.cell(self.crop_type).to_string(),
            soil_type: text(self.soil_type),
            technification_level: text(self.technification),
            irrigation_technified,
            area_hectares: parse_number(cells.cell(self.area), COL_AREA)?,
            annual_production_tons: parse_number(cells.cell(self.production), COL_PRODUCTION)?,
            sale_price_per_ton: parse_number(cells.cell(self.price), COL_PRICE)?,
            last_audit_date,
        })
    }
}

/// Positional access to the trimmed text of a row.
trait RowCells {
    fn cell(&self, idx: usize) -> &str;
}

impl RowCells for csv::StringRecord {
    fn cell(&self, idx: usize) -> &str {
        self.get(idx).unwrap_or("").trim()
    }
}

impl RowCells for [String] {
    fn cell(&self, idx: usize) -> &str {
        self.get(idx).map(|s| s.trim()).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Row accumulation shared by every format
// ---------------------------------------------------------------------------

struct RowSink {
    layout: ColumnLayout,
    format: SourceFormat,
    records: Vec<FarmRecord>,
    rejected: Vec<RowDefect>,
}

impl RowSink {
    fn new(layout: ColumnLayout, format: SourceFormat) -> Self {
        RowSink {
            layout,
            format,
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }

    fn push<C: RowCells + ?Sized>(&mut self, row: usize, cells: &C) {
        match self.layout.parse_row(cells) {
            Ok(record) => {
                if record.area_hectares < 0.0
                    || record.annual_production_tons < 0.0
                    || record.sale_price_per_ton < 0.0
                {
                    debug!("row {row}: farm '{}' has negative numeric values", record.farm_id);
                }
                self.records.push(record);
            }
            Err(kind) => self.reject(row, kind),
        }
    }

    fn reject(&mut self, row: usize, kind: RowDefectKind) {
        let defect = RowDefect { row, kind };
        warn!("excluding {defect}");
        self.rejected.push(defect);
    }

    fn finish(self) -> Dataset {
        info!(
            "loaded {} farm records from {} source ({} rows excluded)",
            self.records.len(),
            self.format,
            self.rejected.len()
        );
        Dataset::from_records(self.records, self.layout.audit_date.is_some(), self.rejected)
    }
}

// ---------------------------------------------------------------------------
// Delimited-text loader
// ---------------------------------------------------------------------------

/// Parse delimited UTF-8 text with a header row. The delimiter is sniffed
/// from the header line (`;` when it outnumbers `,`).
pub fn load_csv(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut sink = RowSink::new(ColumnLayout::resolve(&headers)?, SourceFormat::Csv);

    for (idx, result) in reader.records().enumerate() {
        let row = idx + 1;
        match result {
            Ok(record) => sink.push(row, &record),
            Err(err) => sink.reject(
                row,
                RowDefectKind::Unreadable {
                    reason: err.to_string(),
                },
            ),
        }
    }

    Ok(sink.finish())
}

fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let commas = header.iter().filter(|b| **b == b',').count();
    let semicolons = header.iter().filter(|b| **b == b';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "ID_Finca": "F001", "Departamento": "Huila", "Area_Hectareas": 12.5, ... },
///   ...
/// ]
/// ```
pub fn load_json(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let root: JsonValue = serde_json::from_slice(bytes)?;
    let rows = root.as_array().ok_or(LoadError::JsonShape)?;

    let headers: Vec<String> = rows
        .iter()
        .filter_map(|row| row.as_object())
        .flat_map(|obj| obj.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    let mut sink = RowSink::new(ColumnLayout::resolve(&headers)?, SourceFormat::Json);

    for (idx, row) in rows.iter().enumerate() {
        let Some(obj) = row.as_object() else {
            sink.reject(
                idx + 1,
                RowDefectKind::Unreadable {
                    reason: "not a JSON object".to_string(),
                },
            );
            continue;
        };
        let cells: Vec<String> = headers
            .iter()
            .map(|h| obj.get(h).map(json_cell_text).unwrap_or_default())
            .collect();
        sink.push(idx + 1, cells.as_slice());
    }

    Ok(sink.finish())
}

fn json_cell_text(val: &JsonValue) -> String {
    match val {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => format_bool(*b).to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file whose columns carry the source column names.
///
/// Text, float, integer, boolean, `Date32`, `Timestamp` and dictionary-encoded
/// text columns are accepted; every cell goes through the same coercion as
/// delimited text. A cell of any other type rejects its row.
pub fn load_parquet(path: &Path) -> Result<Dataset, LoadError> {
    load_parquet_file(File::open(path)?)
}

/// Same as [`load_parquet`], reading from an already opened handle.
pub fn load_parquet_file(file: File) -> Result<Dataset, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let mut sink = RowSink::new(ColumnLayout::resolve(&headers)?, SourceFormat::Parquet);
    let used = sink.layout.positions();
    let reader = builder.build()?;

    let mut row = 0;
    for batch_result in reader {
        let batch = batch_result?;
        let columns: Vec<ArrayRef> = batch.columns().iter().map(normalize_column).collect();
        for batch_row in 0..batch.num_rows() {
            row += 1;
            let cells: Result<Vec<String>, RowDefectKind> = columns
                .iter()
                .enumerate()
                .map(|(idx, col)| {
                    if used.contains(&idx) {
                        arrow_cell_text(col, batch_row)
                    } else {
                        Ok(String::new())
                    }
                })
                .collect();
            match cells {
                Ok(cells) => sink.push(row, cells.as_slice()),
                Err(kind) => sink.reject(row, kind),
            }
        }
    }

    Ok(sink.finish())
}

/// Cast dictionary and timestamp encodings into types `arrow_cell_text` reads:
/// categoricals become `Utf8`, timestamps become `Date32`.
fn normalize_column(col: &ArrayRef) -> ArrayRef {
    let target = match col.data_type() {
        DataType::Dictionary(_, _) => DataType::Utf8,
        DataType::Timestamp(_, _) | DataType::Date64 => DataType::Date32,
        _ => return Arc::clone(col),
    };
    match cast(col, &target) {
        Ok(converted) => converted,
        Err(err) => {
            warn!("cannot convert {} column to {target}: {err}", col.data_type());
            Arc::clone(col)
        }
    }
}

/// Render a single Arrow cell as text for the shared coercion path.
fn arrow_cell_text(col: &ArrayRef, row: usize) -> Result<String, RowDefectKind> {
    if col.is_null(row) {
        return Ok(String::new());
    }
    let text = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row).to_string(),
        DataType::Float32 => f64::from(col.as_primitive::<Float32Type>().value(row)).to_string(),
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Boolean => format_bool(col.as_boolean().value(row)).to_string(),
        DataType::Date32 => {
            let days = col.as_primitive::<Date32Type>().value(row);
            NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| {
                    epoch.checked_add_signed(chrono::Duration::days(i64::from(days)))
                })
                .map(|d| d.format("%Y-%m-%d").to_string())
                .ok_or_else(|| RowDefectKind::Unreadable {
                    reason: format!("date32 value {days} is out of range"),
                })?
        }
        other => {
            return Err(RowDefectKind::Unreadable {
                reason: format!("unsupported column type {other}"),
            })
        }
    };
    Ok(text)
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

fn parse_number(s: &str, column: &str) -> Result<f64, RowDefectKind> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RowDefectKind::InvalidNumber {
            column: column.to_string(),
            value: s.to_string(),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "si" | "sí" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Empty cells mean "never audited".
fn parse_date(s: &str) -> Result<Option<NaiveDate>, RowDefectKind> {
    if s.is_empty() {
        return Ok(None);
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(Some(date));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Some(dt.date()));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.date_naive()));
    }
    Err(RowDefectKind::InvalidDate {
        value: s.to_string(),
    })
}
