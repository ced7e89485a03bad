use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use tabled::Tabled;

use crate::reasons::derive_grouped_reason;

/// Named columns of the instructions export.
///
/// Lookup is always by header name; the position of a column in the file
/// carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ReasonCode,
    Branch,
    CreationDate,
    Discount,
    Days,
    CancelAmount,
    Level1,
    Level2,
    User,
    Status,
    Situation,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::ReasonCode,
        Column::Branch,
        Column::CreationDate,
        Column::Discount,
        Column::Days,
        Column::CancelAmount,
        Column::Level1,
        Column::Level2,
        Column::User,
        Column::Status,
        Column::Situation,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::ReasonCode => "Cód.Motivo",
            Column::Branch => "Divisão",
            Column::CreationDate => "Data Criação",
            Column::Discount => "Desconto",
            Column::Days => "Dias",
            Column::CancelAmount => "Montante",
            Column::Level1 => "Nível 1 Descrição",
            Column::Level2 => "Nível 2 Descrição",
            Column::User => "Usuário",
            Column::Status => "Status",
            Column::Situation => "Situação",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            Column::ReasonCode
                | Column::Branch
                | Column::CreationDate
                | Column::Discount
                | Column::Level1
                | Column::Level2
        )
    }
}

/// Business category a reason code rolls up to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReasonGroup {
    /// PRL, ALT
    Extension,
    /// DEC
    Discount,
    /// CAN, REF
    Cancellation,
    /// BXS
    WriteOff,
    /// XXX, CEN, DEV, YYY: dropped from every grouped view.
    Excluded,
    /// Unlisted codes are their own group, labelled with the code.
    Other(String),
}

impl ReasonGroup {
    pub fn label(&self) -> &str {
        match self {
            ReasonGroup::Extension => "Prorrogação",
            ReasonGroup::Discount => "Desconto/Abat.",
            ReasonGroup::Cancellation => "Cancelamento",
            ReasonGroup::WriteOff => "Baixa de Saldo",
            ReasonGroup::Excluded => "none",
            ReasonGroup::Other(code) => code,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, ReasonGroup::Excluded)
    }
}

impl fmt::Display for ReasonGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numeric column an aggregation runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueField {
    Days,
    Discount,
    CancelAmount,
}

impl ValueField {
    pub fn label(self) -> &'static str {
        self.column().header()
    }

    pub fn column(self) -> Column {
        match self {
            ValueField::Days => Column::Days,
            ValueField::Discount => Column::Discount,
            ValueField::CancelAmount => Column::CancelAmount,
        }
    }

    pub fn is_currency(self) -> bool {
        !matches!(self, ValueField::Days)
    }
}

/// Dimension a table can be grouped or ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupKey {
    Branch,
    Level1,
    Level2,
    User,
    Status,
    Situation,
    ReasonCode,
    GroupedReason,
    Year,
    Month,
}

impl GroupKey {
    pub fn label(self) -> &'static str {
        match self {
            GroupKey::GroupedReason => "Motivo Agrupado",
            GroupKey::Year => "Ano",
            GroupKey::Month => "Mês",
            other => other.column().map(Column::header).unwrap_or(""),
        }
    }

    /// Source column backing this key; derived keys come from `Data Criação`
    /// or `Cód.Motivo`.
    pub fn column(self) -> Option<Column> {
        match self {
            GroupKey::Branch => Some(Column::Branch),
            GroupKey::Level1 => Some(Column::Level1),
            GroupKey::Level2 => Some(Column::Level2),
            GroupKey::User => Some(Column::User),
            GroupKey::Status => Some(Column::Status),
            GroupKey::Situation => Some(Column::Situation),
            GroupKey::ReasonCode | GroupKey::GroupedReason => Some(Column::ReasonCode),
            GroupKey::Year | GroupKey::Month => Some(Column::CreationDate),
        }
    }
}

/// One row of the instructions export after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub reason_code: String,
    pub branch: String,
    pub creation_date: Option<NaiveDate>,
    pub days: Option<f64>,
    pub discount: Option<f64>,
    pub cancel_amount: Option<f64>,
    pub level1: String,
    pub level2: String,
    pub user: Option<String>,
    pub status: Option<String>,
    pub situation: Option<String>,
}

impl Record {
    pub fn year(&self) -> Option<i32> {
        self.creation_date.map(|d| d.year())
    }

    pub fn month(&self) -> Option<u32> {
        self.creation_date.map(|d| d.month())
    }

    pub fn period(&self) -> Option<(i32, u32)> {
        self.creation_date.map(|d| (d.year(), d.month()))
    }

    pub fn grouped_reason(&self) -> ReasonGroup {
        derive_grouped_reason(&self.reason_code)
    }

    pub fn value(&self, field: ValueField) -> Option<f64> {
        match field {
            ValueField::Days => self.days,
            ValueField::Discount => self.discount,
            ValueField::CancelAmount => self.cancel_amount,
        }
    }

    /// Label of this record under `key`, or `None` when the record has no
    /// value for it (empty cell, undated row, excluded reason).
    pub fn key(&self, key: GroupKey) -> Option<String> {
        match key {
            GroupKey::Branch => non_empty(&self.branch),
            GroupKey::Level1 => non_empty(&self.level1),
            GroupKey::Level2 => non_empty(&self.level2),
            GroupKey::User => self.user.as_deref().and_then(non_empty),
            GroupKey::Status => self.status.as_deref().and_then(non_empty),
            GroupKey::Situation => self.situation.as_deref().and_then(non_empty),
            GroupKey::ReasonCode => non_empty(self.reason_code.trim()).map(|c| c.to_uppercase()),
            GroupKey::GroupedReason => {
                let group = self.grouped_reason();
                (!group.is_excluded()).then(|| group.label().to_string())
            }
            GroupKey::Year => self.year().map(|y| y.to_string()),
            GroupKey::Month => self.month().map(|m| format!("{:02}", m)),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Count, sum and mean of a value field over a subset of records.
///
/// `sum` is `None` only for an empty subset; missing values count as zero.
/// `mean` is `None` when no record in the subset carries a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpiSummary {
    pub count: usize,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub keys: Vec<String>,
    pub count: usize,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    pub count: usize,
    pub sum: Option<f64>,
    pub moving_avg: Option<f64>,
}

impl MonthlyPoint {
    /// The series' plotted value: the sum, or the count for count-only series.
    pub fn value(&self) -> f64 {
        self.sum.unwrap_or(self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub rank: usize,
    pub key: String,
    pub count: usize,
    pub sum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub key: String,
    pub values: Vec<f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub row_label: String,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[serde(rename = "Indicador")]
    #[tabled(rename = "Indicador")]
    pub label: String,
    #[serde(rename = "Valor")]
    #[tabled(rename = "Valor")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupRow {
    #[serde(rename = "Grupo")]
    #[tabled(rename = "Grupo")]
    pub group: String,
    #[serde(rename = "Solicitações")]
    #[tabled(rename = "Solicitações")]
    pub count: usize,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
    #[serde(rename = "Média")]
    #[tabled(rename = "Média")]
    pub mean: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyRow {
    #[serde(rename = "Mês/Ano")]
    #[tabled(rename = "Mês/Ano")]
    pub period: String,
    #[serde(rename = "Solicitações")]
    #[tabled(rename = "Solicitações")]
    pub count: usize,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
    #[serde(rename = "MediaMovel3")]
    #[tabled(rename = "Média Móvel 3 meses")]
    pub moving_avg: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Grupo")]
    #[tabled(rename = "Grupo")]
    pub key: String,
    #[serde(rename = "Solicitações")]
    #[tabled(rename = "Solicitações")]
    pub count: usize,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub view: String,
    pub alt_policy: String,
    pub filters: Vec<String>,
    pub total_records: usize,
    pub filtered_records: usize,
    pub undated_records: usize,
    pub excluded_records: usize,
    pub kpis: Vec<Kpi>,
}

/// A KPI card: numeric value for the JSON summary plus its display text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub name: String,
    pub value: Option<f64>,
    pub display: String,
}
