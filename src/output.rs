use crate::error::Result;
use crate::types::PivotTable;
use crate::util::format_number;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Delete a report file an earlier generation may have left behind. A file
/// that is already gone is fine.
pub fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Pivot tables have data-dependent columns, so they are written record by
/// record instead of through serde.
pub fn write_pivot_csv(path: &Path, pivot: &PivotTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(pivot_header(pivot))?;
    for row in &pivot.rows {
        let mut record = vec![row.key.clone()];
        record.extend(row.values.iter().map(|v| v.to_string()));
        record.push(row.total.to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn pivot_header(pivot: &PivotTable) -> Vec<String> {
    let mut header = vec![pivot.row_label.clone()];
    header.extend(pivot.columns.iter().cloned());
    header.push("Total".to_string());
    header
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(sem linhas)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn preview_pivot(title: &str, pivot: &PivotTable, max_rows: usize) {
    println!("\n{}\n", title);
    if pivot.rows.is_empty() {
        println!("(sem linhas)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(pivot_header(pivot));
    for row in pivot.rows.iter().take(max_rows) {
        let mut record = vec![row.key.clone()];
        record.extend(row.values.iter().map(|v| format_number(*v, 0)));
        record.push(format_number(row.total, 0));
        builder.push_record(record);
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    println!("{}\n", table);
}
