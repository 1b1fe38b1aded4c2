//! Panel CSV ingest.
//!
//! Turns a country-year CSV into a validated `PanelTable`:
//!
//! - headers are normalized (trim, BOM strip, lowercase, spaces/hyphens to `_`)
//! - every study variable must have a column (exit code 2 otherwise)
//! - `NA`, `NaN`, `.` and empty cells are missing values
//! - unparseable rows are skipped and reported, not fatal
//! - duplicate (entity, time) pairs abort the run
//! - entities whose unemployment series was interpolated upstream must be complete

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::Variable;
use crate::error::AppError;
use crate::panel::PanelTable;

const ENTITY_HEADERS: [&str; 3] = ["country", "entity", "country_name"];
const TIME_HEADERS: [&str; 3] = ["year", "time", "period"];
const MISSING_MARKERS: [&str; 6] = ["", "na", "nan", "n/a", ".", "null"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub entity: Option<String>,
    pub message: String,
}

/// Ingest output: the validated table + what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedPanel {
    pub table: PanelTable,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
    /// Columns present in the file but not part of the study.
    pub ignored_columns: Vec<String>,
}

/// Load the panel CSV at `path`.
pub fn load_panel(path: &Path, complete_entities: &[String]) -> Result<IngestedPanel, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let ingested = read_panel(file, complete_entities)?;
    info!(
        path = %path.display(),
        rows_read = ingested.rows_read,
        rows_used = ingested.rows_used,
        entities = ingested.table.n_entities(),
        "panel loaded"
    );
    Ok(ingested)
}

/// Read a panel CSV from any reader.
pub fn read_panel<R: Read>(reader: R, complete_entities: &[String]) -> Result<IngestedPanel, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let entity_col = find_column(&header_map, &ENTITY_HEADERS, "entity (country)")?;
    let time_col = find_column(&header_map, &TIME_HEADERS, "time (year)")?;
    for variable in Variable::ALL {
        if !header_map.contains_key(variable.column()) {
            return Err(AppError::new(
                2,
                format!("Missing required column: `{}` ({})", variable.column(), variable.display_name()),
            ));
        }
    }
    let mut ignored_columns: Vec<String> = header_map
        .keys()
        .filter(|name| {
            Variable::from_column(name).is_none()
                && !ENTITY_HEADERS.contains(&name.as_str())
                && !TIME_HEADERS.contains(&name.as_str())
        })
        .cloned()
        .collect();
    ignored_columns.sort();

    let mut entities = Vec::new();
    let mut times = Vec::new();
    let mut columns: BTreeMap<String, Vec<Option<f64>>> = Variable::ALL
        .into_iter()
        .map(|v| (v.column().to_string(), Vec::new()))
        .collect();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line numbers are 1-based and the header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    entity: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        // Trailing extra cells are tolerated; a short record would read as missing values.
        if record.len() < headers.len() {
            row_errors.push(RowError {
                line,
                entity: record.get(entity_col).map(str::to_string).filter(|s| !s.is_empty()),
                message: format!("Expected {} fields, found {}.", headers.len(), record.len()),
            });
            continue;
        }

        match parse_row(&record, &header_map, entity_col, time_col) {
            Ok((entity, time, values)) => {
                entities.push(entity);
                times.push(time);
                for (variable, value) in Variable::ALL.into_iter().zip(values) {
                    if let Some(column) = columns.get_mut(variable.column()) {
                        column.push(value);
                    }
                }
            }
            Err((entity, message)) => row_errors.push(RowError { line, entity, message }),
        }
    }

    for e in &row_errors {
        warn!(line = e.line, entity = ?e.entity, "skipped row: {}", e.message);
    }

    let rows_used = entities.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid rows remain after parsing the panel CSV."));
    }

    let table = PanelTable::new(
        ENTITY_HEADERS[0],
        TIME_HEADERS[0],
        entities,
        times,
        columns,
    )?;
    for entity in complete_entities {
        table.require_complete(entity, Variable::Unemployment.column())?;
    }

    Ok(IngestedPanel {
        table,
        row_errors,
        rows_read,
        rows_used,
        ignored_columns,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}').trim();
    name.to_ascii_lowercase().replace([' ', '-'], "_")
}

fn find_column(header_map: &HashMap<String, usize>, candidates: &[&str], what: &str) -> Result<usize, AppError> {
    candidates
        .iter()
        .find_map(|name| header_map.get(*name).copied())
        .ok_or_else(|| {
            AppError::new(
                2,
                format!("Missing {what} column: expected one of {}", candidates.join(", ")),
            )
        })
}

type ParsedRow = (String, i32, Vec<Option<f64>>);

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    entity_col: usize,
    time_col: usize,
) -> Result<ParsedRow, (Option<String>, String)> {
    let entity = record
        .get(entity_col)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or((None, "Missing entity value.".to_string()))?
        .to_string();

    let time_raw = record.get(time_col).map(str::trim).unwrap_or_default();
    let time = parse_year(time_raw).ok_or_else(|| (Some(entity.clone()), format!("Invalid year `{time_raw}`.")))?;

    let mut values = Vec::with_capacity(Variable::ALL.len());
    for variable in Variable::ALL {
        let raw = header_map
            .get(variable.column())
            .and_then(|idx| record.get(*idx))
            .unwrap_or_default();
        let value = parse_value(raw).map_err(|message| {
            (
                Some(entity.clone()),
                format!("Column `{}`: {message}", variable.column()),
            )
        })?;
        values.push(value);
    }
    Ok((entity, time, values))
}

/// Years may be written as integers or as `2010.0`.
fn parse_year(s: &str) -> Option<i32> {
    if let Ok(y) = s.parse::<i32>() {
        return Some(y);
    }
    let f = s.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f.abs() < 1e6).then_some(f as i32)
}

fn parse_value(s: &str) -> Result<Option<f64>, String> {
    let s = s.trim();
    if MISSING_MARKERS.contains(&s.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    let v = s.parse::<f64>().map_err(|_| format!("invalid number `{s}`"))?;
    if v.is_finite() { Ok(Some(v)) } else { Ok(None) }
}
