// ABOUTME: Raw sheet parsing for CSV text and Excel (.xlsx) workbooks, and xlsx writing.
// ABOUTME: Sheets are a header row plus string rows; the first row of a worksheet is the header.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::Workbook;

use crate::error::{CorpusError, Result};

/// A header row plus data rows, all cells as strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    /// Cell value for `column` in `row`, empty when the row is short.
    pub fn cell<'a>(&'a self, row: &'a [String], column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h.trim() == column)?;
        Some(row.get(idx).map(String::as_str).unwrap_or(""))
    }
}

/// Parses CSV text with a header row.
pub fn parse_csv(text: &str) -> Result<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(RawSheet { headers, rows })
}

/// Parses the first worksheet holding data in an xlsx workbook.
pub fn parse_xlsx(data: &[u8]) -> Result<RawSheet> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(data)).map_err(CorpusError::spreadsheet)?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };
        if let Some(sheet) = range_to_raw_sheet(&range) {
            return Ok(sheet);
        }
    }
    Err(CorpusError::spreadsheet("no sheet with data found in workbook"))
}

/// Writes a sheet as a single-worksheet xlsx workbook. Every cell is a string; empty cells stay blank.
pub fn write_xlsx(sheet: &RawSheet) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let lines = std::iter::once(&sheet.headers).chain(sheet.rows.iter());
    for (row, values) in lines.enumerate() {
        let row = u32::try_from(row)
            .map_err(|_| CorpusError::spreadsheet("too many rows for an xlsx worksheet"))?;
        for (column, value) in values.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let column = u16::try_from(column)
                .map_err(|_| CorpusError::spreadsheet("too many columns for an xlsx worksheet"))?;
            worksheet
                .write_string(row, column, value.as_str())
                .map_err(CorpusError::spreadsheet)?;
        }
    }
    workbook.save_to_buffer().map_err(CorpusError::spreadsheet)
}

fn range_to_raw_sheet(range: &calamine::Range<Data>) -> Option<RawSheet> {
    let mut row_iter = range.rows();
    let headers: Vec<String> = row_iter.next()?.iter().map(cell_to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return None;
    }

    let rows: Vec<Vec<String>> = row_iter
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|values| values.iter().any(|v| !v.is_empty()))
        .collect();
    Some(RawSheet { headers, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

/// Excel serial day number (1900 date system) as `YYYY-MM-DD HH:MM:SS`.
fn excel_serial_to_string(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return serial.to_string();
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    (epoch + Duration::milliseconds(millis))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
