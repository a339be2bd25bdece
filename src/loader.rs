use crate::error::PartitionError;
use crate::types::Record;
use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use serde_json::{Number, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const EMPTY_HEADER: &str = "__EMPTY";

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub headers: Vec<String>,
    pub total_rows: usize,
    pub blank_rows: usize,
}

/// How text cells of a CSV export are read. Workbooks carry typed cells and
/// ignore these settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub delimiter: u8,
    /// Read `100,5` as `100.5` (and `1.234,5` as `1234.5`).
    pub decimal_comma: bool,
}

impl ReadOptions {
    /// `;` exports come from locales that also write decimal commas.
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            decimal_comma: delimiter == b';',
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::with_delimiter(b',')
    }
}

/// Read the production sheet into records.
///
/// - `.xlsx`, `.xlsm`, `.xlsb`, `.xls` and `.ods` files are read from their
///   first worksheet; anything else is read as CSV with a header row.
/// - Field order follows the header row.
/// - Empty cells become `null`; short rows are padded with `null`.
/// - Rows with no non-empty cell are skipped.
pub fn load_records(path: &Path, opts: &ReadOptions) -> Result<(Vec<Record>, LoadReport), PartitionError> {
    if !path.is_file() {
        return Err(PartitionError::SourceMissing(path.to_path_buf()));
    }
    if is_workbook(path) {
        load_workbook(path)
    } else {
        load_csv(path, opts)
    }
}

pub fn is_workbook(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    matches!(ext.as_deref(), Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods"))
}

fn load_csv(path: &Path, opts: &ReadOptions) -> Result<(Vec<Record>, LoadReport), PartitionError> {
    let csv_err = |source| PartitionError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .flexible(true)
        .trim(Trim::None)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = unique_headers(rdr.headers().map_err(csv_err)?.iter());

    let mut records = Vec::new();
    let mut total_rows = 0usize;
    let mut blank_rows = 0usize;
    for result in rdr.records() {
        let row = result.map_err(csv_err)?;
        total_rows += 1;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            blank_rows += 1;
            continue;
        }
        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            record.insert(header.clone(), parse_cell(row.get(i).unwrap_or(""), opts.decimal_comma));
        }
        records.push(record);
    }

    let report = LoadReport {
        headers,
        total_rows,
        blank_rows,
    };
    Ok((records, report))
}

fn load_workbook(path: &Path) -> Result<(Vec<Record>, LoadReport), PartitionError> {
    let wb_err = |source| PartitionError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(wb_err)?;
    let Some(sheet) = workbook.worksheet_range_at(0) else {
        return Err(PartitionError::EmptyDataset(path.to_path_buf()));
    };
    let sheet = sheet.map_err(wb_err)?;

    let mut rows = sheet.rows();
    let header_cells: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(header_text).collect())
        .unwrap_or_default();
    let headers = unique_headers(header_cells.iter().map(String::as_str));

    let mut records = Vec::new();
    let mut total_rows = 0usize;
    let mut blank_rows = 0usize;
    for cells in rows {
        total_rows += 1;
        if cells.iter().all(is_blank) {
            blank_rows += 1;
            continue;
        }
        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            record.insert(header.clone(), cells.get(i).map_or(Value::Null, workbook_cell));
        }
        records.push(record);
    }

    let report = LoadReport {
        headers,
        total_rows,
        blank_rows,
    };
    Ok((records, report))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Native workbook values: numbers stay numbers (whole floats become
/// integers), dates become their serial number, errors become `null`.
fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => float_value(*f),
        Data::DateTime(dt) => float_value(dt.as_f64()),
    }
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Value::Number((f as i64).into());
    }
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Blank headers become `__EMPTY`; repeats get `_1`, `_2`, ... appended,
/// skipping any suffix a real header already uses, so no column overwrites
/// another inside a record.
fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for h in raw {
        let base = if h.trim().is_empty() { EMPTY_HEADER } else { h };
        let mut name = base.to_string();
        if used.contains(&name) {
            let n = next_suffix.entry(name.clone()).or_insert(1);
            loop {
                name = format!("{}_{}", base, n);
                *n += 1;
                if !used.contains(&name) {
                    break;
                }
            }
        }
        used.insert(name.clone());
        out.push(name);
    }
    out
}

/// Type one CSV cell the way a spreadsheet would have stored it.
pub fn parse_cell(raw: &str, decimal_comma: bool) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Null;
    }
    // codes like "0042" must keep their zeros
    let leading_zero = s.len() > 1 && s.starts_with('0') && !s.starts_with("0.") && !s.starts_with("0,");
    if leading_zero {
        return Value::String(raw.to_string());
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }

    let normalized = if decimal_comma && s.contains(',') {
        s.replace('.', "").replacen(',', ".", 1)
    } else {
        s.to_string()
    };
    // integers too long for i64 are codes, not quantities
    let has_fraction_or_exponent = normalized.contains(|c: char| matches!(c, '.' | 'e' | 'E'));
    let numeric_chars = normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if has_fraction_or_exponent && numeric_chars {
        if let Some(n) = normalized.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}
