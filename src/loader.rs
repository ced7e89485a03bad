use crate::error::{ReportError, Result};
use crate::types::{Column, Record};
use crate::util::{clean_text, parse_date_safe, parse_f64_safe};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub undated_rows: usize,
    pub missing_optional: Vec<Column>,
}

/// The cleaned export plus what was learned while reading it. Immutable once
/// loaded; every report run filters it afresh.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub report: LoadReport,
    columns: HashMap<Column, usize>,
}

impl Dataset {
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains_key(&column)
    }

    /// Fail with `MissingColumn` for the first of `columns` the file lacks.
    pub fn require(&self, columns: &[Column]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(**c)) {
            Some(c) => Err(ReportError::MissingColumn(c.header().to_string())),
            None => Ok(()),
        }
    }
}

fn normalize_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Resolve every known column by header name. Required columns must be
/// present; optional ones may be absent.
fn resolve_columns(headers: &StringRecord) -> Result<HashMap<Column, usize>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (idx, h) in headers.iter().enumerate() {
        positions.entry(normalize_header(h)).or_insert(idx);
    }
    let mut columns = HashMap::new();
    for column in Column::ALL {
        match positions.get(&column.header().to_lowercase()) {
            Some(idx) => {
                columns.insert(column, *idx);
            }
            None if column.is_required() => {
                return Err(ReportError::MissingColumn(column.header().to_string()));
            }
            None => {}
        }
    }
    Ok(columns)
}

pub fn load_and_clean(path: &Path, delimiter: u8) -> Result<Dataset> {
    info!(path = %path.display(), "loading instructions export");
    let file = File::open(path)?;
    load_from_reader(file, delimiter)
}

pub fn load_from_reader<R: Read>(input: R, delimiter: u8) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(input);
    let columns = resolve_columns(rdr.headers()?)?;
    let missing_optional: Vec<Column> = Column::ALL
        .into_iter()
        .filter(|c| !columns.contains_key(c))
        .collect();
    for c in &missing_optional {
        warn!(column = c.header(), "optional column absent");
    }

    let field = |row: &StringRecord, column: Column| -> Option<String> {
        columns.get(&column).and_then(|idx| clean_text(row.get(*idx)))
    };

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut undated_rows = 0usize;
    let mut records: Vec<Record> = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(line = line + 2, error = %e, "unreadable row skipped");
                parse_errors += 1;
                continue;
            }
        };

        let Some(reason_code) = field(&row, Column::ReasonCode) else {
            debug!(line = line + 2, "row without reason code skipped");
            parse_errors += 1;
            continue;
        };

        let raw_date = field(&row, Column::CreationDate);
        let creation_date = parse_date_safe(raw_date.as_deref());
        if creation_date.is_none() {
            debug!(line = line + 2, value = raw_date.as_deref().unwrap_or(""), "unparseable date");
            undated_rows += 1;
        }

        records.push(Record {
            reason_code: reason_code.to_uppercase(),
            branch: field(&row, Column::Branch).unwrap_or_default(),
            creation_date,
            days: parse_f64_safe(field(&row, Column::Days).as_deref()),
            discount: parse_f64_safe(field(&row, Column::Discount).as_deref()),
            cancel_amount: parse_f64_safe(field(&row, Column::CancelAmount).as_deref()),
            level1: field(&row, Column::Level1).unwrap_or_default(),
            level2: field(&row, Column::Level2).unwrap_or_default(),
            user: field(&row, Column::User),
            status: field(&row, Column::Status),
            situation: field(&row, Column::Situation),
        });
    }

    if records.is_empty() {
        return Err(ReportError::EmptyInput);
    }
    if undated_rows > 0 {
        warn!(undated_rows, "rows without a valid creation date are left out of monthly views");
    }

    let report = LoadReport {
        total_rows,
        loaded_rows: records.len(),
        parse_errors,
        undated_rows,
        missing_optional,
    };
    info!(
        total = report.total_rows,
        loaded = report.loaded_rows,
        skipped = report.parse_errors,
        "export loaded"
    );
    Ok(Dataset {
        records,
        report,
        columns,
    })
}
