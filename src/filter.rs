use crate::error::{ReportError, Result};
use crate::types::{Column, Record};

/// Narrowing criteria. Every non-empty list must match (AND across lists,
/// OR within a list); empty lists impose no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub branches: Vec<String>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub statuses: Vec<String>,
    /// Raw reason codes, case-insensitive.
    pub reasons: Vec<String>,
    /// Grouped-reason labels (e.g. `Cancelamento`), case-insensitive.
    pub groups: Vec<String>,
    pub situations: Vec<String>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
            && self.years.is_empty()
            && self.months.is_empty()
            && self.statuses.is_empty()
            && self.reasons.is_empty()
            && self.groups.is_empty()
            && self.situations.is_empty()
    }

    pub fn matches(&self, r: &Record) -> bool {
        if !self.branches.is_empty() && !self.branches.iter().any(|b| *b == r.branch) {
            return false;
        }
        // Undated rows cannot satisfy a date criterion.
        if !self.years.is_empty() && !r.year().is_some_and(|y| self.years.contains(&y)) {
            return false;
        }
        if !self.months.is_empty() && !r.month().is_some_and(|m| self.months.contains(&m)) {
            return false;
        }
        if !self.statuses.is_empty() && !contains_opt(&self.statuses, r.status.as_deref()) {
            return false;
        }
        if !self.situations.is_empty() && !contains_opt(&self.situations, r.situation.as_deref())
        {
            return false;
        }
        if !self.reasons.is_empty()
            && !self
                .reasons
                .iter()
                .any(|c| c.eq_ignore_ascii_case(r.reason_code.trim()))
        {
            return false;
        }
        if !self.groups.is_empty() {
            let group = r.grouped_reason();
            if group.is_excluded()
                || !self
                    .groups
                    .iter()
                    .any(|g| g.to_lowercase() == group.label().to_lowercase())
            {
                return false;
            }
        }
        true
    }

    /// Columns that must exist in the dataset for this filter to be
    /// meaningful.
    pub fn required_columns(&self) -> Vec<Column> {
        let mut cols = Vec::new();
        if !self.statuses.is_empty() {
            cols.push(Column::Status);
        }
        if !self.situations.is_empty() {
            cols.push(Column::Situation);
        }
        cols
    }

    /// Parse `key=v1,v2; key=v3` assignments as typed in the interactive
    /// session. Unknown keys and malformed numbers are errors.
    pub fn parse_assignments(input: &str) -> Result<Filter> {
        let mut filter = Filter::default();
        for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, values) = part
                .split_once('=')
                .ok_or_else(|| ReportError::InvalidFilter(format!("expected key=value, got `{part}`")))?;
            let values: Vec<String> = values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            match key.trim().to_lowercase().as_str() {
                "branch" | "divisao" | "filial" => filter.branches.extend(values),
                "year" | "ano" => {
                    for v in values {
                        filter.years.push(parse_year(&v)?);
                    }
                }
                "month" | "mes" => {
                    for v in values {
                        filter.months.push(parse_month(&v)?);
                    }
                }
                "status" => filter.statuses.extend(values),
                "reason" | "motivo" => filter.reasons.extend(values),
                "group" | "grupo" => filter.groups.extend(values),
                "situation" | "situacao" => filter.situations.extend(values),
                other => {
                    return Err(ReportError::InvalidFilter(format!("unknown filter key `{other}`")))
                }
            }
        }
        Ok(filter)
    }

    /// Human-readable list of active criteria, for report headers.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut push = |name: &str, values: Vec<String>| {
            if !values.is_empty() {
                out.push(format!("{}={}", name, values.join(",")));
            }
        };
        push("branch", self.branches.clone());
        push("year", self.years.iter().map(|y| y.to_string()).collect());
        push("month", self.months.iter().map(|m| m.to_string()).collect());
        push("status", self.statuses.clone());
        push("reason", self.reasons.clone());
        push("group", self.groups.clone());
        push("situation", self.situations.clone());
        out
    }
}

fn contains_opt(wanted: &[String], value: Option<&str>) -> bool {
    value.is_some_and(|v| wanted.iter().any(|w| w == v.trim()))
}

pub fn parse_year(v: &str) -> Result<i32> {
    v.trim()
        .parse::<i32>()
        .map_err(|_| ReportError::InvalidFilter(format!("invalid year `{v}`")))
}

pub fn parse_month(v: &str) -> Result<u32> {
    match v.trim().parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err(ReportError::InvalidFilter(format!("invalid month `{v}`"))),
    }
}

/// Apply `criteria` to `records`, returning a new collection in source order.
pub fn filter(records: &[Record], criteria: &Filter) -> Vec<Record> {
    if criteria.is_empty() {
        return records.to_vec();
    }
    records.iter().filter(|r| criteria.matches(r)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(code: &str, branch: &str, date: Option<(i32, u32, u32)>, status: Option<&str>) -> Record {
        Record {
            reason_code: code.to_string(),
            branch: branch.to_string(),
            creation_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            days: None,
            discount: Some(10.0),
            cancel_amount: None,
            level1: "Comercial".to_string(),
            level2: "Preço".to_string(),
            user: None,
            status: status.map(str::to_string),
            situation: None,
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            rec("DEC", "BranchA", Some((2024, 1, 10)), Some("Aprovado")),
            rec("can", "BranchB", Some((2024, 2, 3)), Some("Pendente")),
            rec("PRL", "BranchA", None, None),
            rec("XXX", "BranchC", Some((2023, 12, 1)), Some("Aprovado")),
            rec("ZZZ", "BranchB", Some((2024, 1, 20)), None),
        ]
    }

    #[test]
    fn empty_criteria_return_input_unchanged() {
        let data = sample();
        assert_eq!(filter(&data, &Filter::default()), data);
    }

    #[test]
    fn filtering_is_idempotent() {
        let data = sample();
        let criteria = Filter {
            branches: vec!["BranchA".into(), "BranchB".into()],
            years: vec![2024],
            ..Default::default()
        };
        let once = filter(&data, &criteria);
        let twice = filter(&once, &criteria);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn criteria_combine_conjunctively() {
        let data = sample();
        let criteria = Filter {
            branches: vec!["BranchB".into()],
            months: vec![1],
            ..Default::default()
        };
        let out = filter(&data, &criteria);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason_code, "ZZZ");
    }

    #[test]
    fn undated_rows_fail_date_criteria() {
        let data = sample();
        let criteria = Filter { years: vec![2024, 2023], ..Default::default() };
        assert!(filter(&data, &criteria).iter().all(|r| r.creation_date.is_some()));
    }

    #[test]
    fn reason_and_group_match_case_insensitively() {
        let data = sample();
        let by_code = Filter { reasons: vec!["CAN".into()], ..Default::default() };
        assert_eq!(filter(&data, &by_code).len(), 1);

        let by_group = Filter { groups: vec!["cancelamento".into(), "zzz".into()], ..Default::default() };
        let out = filter(&data, &by_group);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn group_filter_never_matches_excluded_reasons() {
        let data = sample();
        let criteria = Filter { groups: vec!["none".into()], ..Default::default() };
        assert!(filter(&data, &criteria).is_empty());
    }

    #[test]
    fn status_filter_skips_rows_without_status() {
        let data = sample();
        let criteria = Filter { statuses: vec!["Aprovado".into()], ..Default::default() };
        let out = filter(&data, &criteria);
        assert_eq!(out.len(), 2);
        assert_eq!(criteria.required_columns(), vec![Column::Status]);
    }

    #[test]
    fn parses_interactive_assignments() {
        let f = Filter::parse_assignments("branch=A, B; ano=2024; mes=1,2; grupo=Baixa de Saldo").unwrap();
        assert_eq!(f.branches, vec!["A", "B"]);
        assert_eq!(f.years, vec![2024]);
        assert_eq!(f.months, vec![1, 2]);
        assert_eq!(f.groups, vec!["Baixa de Saldo"]);
        assert_eq!(f.describe()[0], "branch=A,B");
    }

    #[test]
    fn rejects_bad_assignments() {
        assert!(Filter::parse_assignments("month=13").is_err());
        assert!(Filter::parse_assignments("colour=red").is_err());
        assert!(Filter::parse_assignments("branch").is_err());
        assert!(Filter::parse_assignments("  ").unwrap().is_empty());
    }
}
