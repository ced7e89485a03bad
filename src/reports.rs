use crate::filter::Filter;
use crate::reasons::{AltPolicy, ReasonSet};
use crate::types::{
    Column, GroupKey, GroupRow, GroupSummary, Kpi, KpiRow, KpiSummary, MonthlyPoint, MonthlyRow,
    PivotRow, PivotTable, RankEntry, RankRow, ReasonGroup, Record, SummaryStats, ValueField,
};
use crate::util::{format_brl, format_int, format_number, format_opt, mean, MISSING};
use clap::ValueEnum;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Trailing window of the monthly moving average.
pub const MOVING_AVG_WINDOW: usize = 3;

#[derive(Default)]
struct Acc {
    count: usize,
    sum: f64,
    valued: usize,
}

impl Acc {
    fn push(&mut self, r: &Record, field: Option<ValueField>) {
        self.count += 1;
        if let Some(v) = field.and_then(|f| r.value(f)) {
            self.sum += v;
            self.valued += 1;
        }
    }

    fn sum(&self, field: Option<ValueField>) -> Option<f64> {
        field.and((self.count > 0).then_some(self.sum))
    }

    fn mean(&self, field: Option<ValueField>) -> Option<f64> {
        field.and(mean(self.sum, self.valued))
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Count always; sum and mean of `field` when one is given.
///
/// Missing values add nothing to the sum and are left out of the mean. Over
/// an empty subset both sum and mean are `None`.
pub fn kpi_summary(records: &[Record], reasons: &ReasonSet, field: Option<ValueField>) -> KpiSummary {
    let mut acc = Acc::default();
    for r in records.iter().filter(|r| reasons.contains(r)) {
        acc.push(r, field);
    }
    KpiSummary {
        count: acc.count,
        sum: acc.sum(field),
        mean: acc.mean(field),
    }
}

/// Group by the key tuple and aggregate `field` per group.
///
/// Records missing any key are left out. Rows come back sorted descending by
/// sum (by count when `field` is `None`); ties keep first-seen order.
pub fn group_summary(records: &[Record], keys: &[GroupKey], field: Option<ValueField>) -> Vec<GroupSummary> {
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<String>, Acc)> = Vec::new();
    for r in records {
        let Some(key) = keys.iter().map(|k| r.key(*k)).collect::<Option<Vec<String>>>() else {
            continue;
        };
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Acc::default()));
            groups.len() - 1
        });
        groups[idx].1.push(r, field);
    }

    let mut rows: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(keys, acc)| GroupSummary {
            keys,
            count: acc.count,
            sum: acc.sum(field),
            mean: acc.mean(field),
        })
        .collect();
    match field {
        Some(_) => rows.sort_by(|a, b| desc(a.sum.unwrap_or(0.0), b.sum.unwrap_or(0.0))),
        None => rows.sort_by(|a, b| b.count.cmp(&a.count)),
    }
    rows
}

/// Trailing moving average; positions before the first full window are `None`.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                let slice = &values[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

/// One point per (year, month) present in the data, oldest first, with the
/// 3-month moving average of the point values. Undated records are skipped.
pub fn monthly_series(records: &[Record], field: Option<ValueField>) -> Vec<MonthlyPoint> {
    let mut by_month: BTreeMap<(i32, u32), Acc> = BTreeMap::new();
    for r in records {
        if let Some(period) = r.period() {
            by_month.entry(period).or_default().push(r, field);
        }
    }
    let mut points: Vec<MonthlyPoint> = by_month
        .into_iter()
        .map(|((year, month), acc)| MonthlyPoint {
            year,
            month,
            count: acc.count,
            sum: acc.sum(field),
            moving_avg: None,
        })
        .collect();
    let values: Vec<f64> = points.iter().map(MonthlyPoint::value).collect();
    for (p, avg) in points.iter_mut().zip(moving_average(&values, MOVING_AVG_WINDOW)) {
        p.moving_avg = avg;
    }
    points
}

/// Ranking by a single key, descending, numbered from 1.
pub fn rank(records: &[Record], by: GroupKey, field: Option<ValueField>) -> Vec<RankEntry> {
    group_summary(records, &[by], field)
        .into_iter()
        .enumerate()
        .map(|(i, g)| RankEntry {
            rank: i + 1,
            key: g.keys.into_iter().next().unwrap_or_default(),
            count: g.count,
            sum: g.sum,
        })
        .collect()
}

/// Cross table of `row_key` × `col_key`. Cells hold the sum of `field`, or the
/// record count when `field` is `None`. Columns are sorted by label; rows by
/// total, descending.
pub fn pivot_summary(
    records: &[Record],
    row_key: GroupKey,
    col_key: GroupKey,
    field: Option<ValueField>,
) -> PivotTable {
    let cells = group_summary(records, &[row_key, col_key], field);
    let columns: Vec<String> = cells
        .iter()
        .map(|g| g.keys[1].clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let col_index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    // Row order before sorting follows first appearance in the data.
    let mut row_order: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for r in records {
        if let Some(k) = r.key(row_key) {
            if seen.insert(k.clone()) {
                row_order.push(k);
            }
        }
    }
    let mut rows: Vec<PivotRow> = row_order
        .into_iter()
        .map(|key| PivotRow {
            key,
            values: vec![0.0; columns.len()],
            total: 0.0,
        })
        .collect();
    let row_index: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key.clone(), i))
        .collect();

    let mut populated = vec![false; rows.len()];
    for cell in &cells {
        let value = match field {
            Some(_) => cell.sum.unwrap_or(0.0),
            None => cell.count as f64,
        };
        if let (Some(&ri), Some(&ci)) = (row_index.get(&cell.keys[0]), col_index.get(cell.keys[1].as_str())) {
            rows[ri].values[ci] += value;
            rows[ri].total += value;
            populated[ri] = true;
        }
    }
    // Rows whose records all lack a column key (e.g. excluded reasons) go.
    let mut populated = populated.into_iter();
    rows.retain(|_| populated.next().unwrap_or(false));
    rows.sort_by(|a, b| desc(a.total, b.total));

    PivotTable {
        row_label: row_key.label().to_string(),
        columns,
        rows,
    }
}

pub fn distinct_count(records: &[Record], key: GroupKey) -> usize {
    records
        .iter()
        .filter_map(|r| r.key(key))
        .collect::<HashSet<_>>()
        .len()
}

/// One report variant: which reasons it covers and which value it sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportView {
    #[default]
    Discount,
    Extension,
    Cancellation,
    WriteOff,
    Overview,
}

impl ReportView {
    pub fn title(self) -> &'static str {
        match self {
            ReportView::Discount => "Descontos Motivo DEC",
            ReportView::Extension => "Prorrogações (PRL/ALT)",
            ReportView::Cancellation => "Cancelamentos (CAN/REF)",
            ReportView::WriteOff => "Baixas de Saldo (BXS)",
            ReportView::Overview => "Visão Geral por Motivo Agrupado",
        }
    }

    /// Records the view covers. The discount view is DEC only, whatever the
    /// ALT policy.
    pub fn scope(self) -> ReasonSet {
        match self {
            ReportView::Discount => ReasonSet::new().with_group(ReasonGroup::Discount),
            ReportView::Extension => ReasonSet::new().with_group(ReasonGroup::Extension),
            ReportView::Cancellation => ReasonSet::new().with_group(ReasonGroup::Cancellation),
            ReportView::WriteOff => ReasonSet::new().with_group(ReasonGroup::WriteOff),
            ReportView::Overview => ReasonSet::any_grouped(),
        }
    }

    /// `None` means the view's tables count requests instead of summing.
    pub fn value_field(self) -> Option<ValueField> {
        match self {
            ReportView::Discount | ReportView::WriteOff => Some(ValueField::Discount),
            ReportView::Extension => Some(ValueField::Days),
            ReportView::Cancellation => Some(ValueField::CancelAmount),
            ReportView::Overview => None,
        }
    }
}

impl ReportView {
    /// Optional columns the view's cards and tables read from. The overview
    /// reads both `Dias` and `Montante` for its group cards.
    pub fn required_columns(self) -> Vec<Column> {
        match self {
            ReportView::Overview => vec![Column::Days, Column::CancelAmount],
            view => view.value_field().map(ValueField::column).into_iter().collect(),
        }
    }
}

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(v) => f.write_str(v.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// All aggregates one report generation produces.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub view: ReportView,
    pub field: Option<ValueField>,
    pub records_in_scope: usize,
    pub kpis: Vec<Kpi>,
    pub by_branch: Vec<GroupSummary>,
    pub monthly: Vec<MonthlyPoint>,
    pub by_level1: Vec<GroupSummary>,
    pub by_levels: Vec<GroupSummary>,
    pub ranking: Option<(GroupKey, Vec<RankEntry>)>,
    pub pivot: Option<PivotTable>,
}

fn format_value(v: Option<f64>, field: ValueField) -> String {
    if field.is_currency() {
        format_brl(v)
    } else {
        format_opt(v)
    }
}

fn count_kpi(name: &str, n: usize) -> Kpi {
    Kpi {
        name: name.to_string(),
        value: Some(n as f64),
        display: format_int(n),
    }
}

fn value_kpi(name: &str, v: Option<f64>, field: ValueField) -> Kpi {
    Kpi {
        name: name.to_string(),
        value: v,
        display: format_value(v, field),
    }
}

fn build_kpis(records: &[Record], view: ReportView, policy: AltPolicy) -> Vec<Kpi> {
    let scope = view.scope();
    match view {
        ReportView::Discount | ReportView::WriteOff | ReportView::Cancellation => {
            let field = view.value_field().unwrap_or(ValueField::Discount);
            let s = kpi_summary(records, &scope, Some(field));
            let in_scope: Vec<Record> = records.iter().filter(|r| scope.contains(r)).cloned().collect();
            let total_label = match view {
                ReportView::Cancellation => "Montante Cancelado",
                ReportView::WriteOff => "Baixa Total",
                _ => "Desconto Total",
            };
            vec![
                value_kpi(total_label, s.sum, field),
                count_kpi("Solicitações", s.count),
                count_kpi("Filiais Envolvidas", distinct_count(&in_scope, GroupKey::Branch)),
            ]
        }
        ReportView::Extension => {
            let s = kpi_summary(records, &scope, Some(ValueField::Days));
            vec![
                count_kpi("Solicitações", s.count),
                value_kpi("Dias Totais", s.sum, ValueField::Days),
                value_kpi("Média de Dias", s.mean, ValueField::Days),
            ]
        }
        ReportView::Overview => {
            let ext = kpi_summary(
                records,
                &ReasonSet::new().with_group(ReasonGroup::Extension),
                Some(ValueField::Days),
            );
            let discount = kpi_summary(records, &ReasonSet::discount(policy), Some(ValueField::Discount));
            let cancel = kpi_summary(
                records,
                &ReasonSet::new().with_group(ReasonGroup::Cancellation),
                Some(ValueField::CancelAmount),
            );
            let write_off = kpi_summary(
                records,
                &ReasonSet::new().with_group(ReasonGroup::WriteOff),
                Some(ValueField::Discount),
            );
            let total = kpi_summary(records, &scope, None);
            let mut kpis = vec![
                count_kpi("Prorrogação (solicitações)", ext.count),
                value_kpi("Prorrogação (média de dias)", ext.mean, ValueField::Days),
                value_kpi("Desconto/Abat.", discount.sum, ValueField::Discount),
                value_kpi("Cancelamento", cancel.sum, ValueField::CancelAmount),
                value_kpi("Baixa de Saldo", write_off.sum, ValueField::Discount),
            ];
            // Pass-through codes get a request count each, first-seen order.
            let mut others: Vec<(String, usize)> = Vec::new();
            for r in records {
                if let ReasonGroup::Other(code) = r.grouped_reason() {
                    match others.iter_mut().find(|(c, _)| *c == code) {
                        Some((_, n)) => *n += 1,
                        None => others.push((code, 1)),
                    }
                }
            }
            kpis.extend(others.iter().map(|(code, n)| count_kpi(code, *n)));
            kpis.push(count_kpi("Solicitações", total.count));
            kpis
        }
    }
}

/// Compute every table of `view` over `records` (already filtered). The
/// ranking is skipped when `rank_by` is `None`.
pub fn build_dashboard(
    records: &[Record],
    view: ReportView,
    policy: AltPolicy,
    rank_by: Option<GroupKey>,
) -> Dashboard {
    let scope = view.scope();
    let scoped: Vec<Record> = records.iter().filter(|r| scope.contains(r)).cloned().collect();
    let field = view.value_field();

    Dashboard {
        view,
        field,
        records_in_scope: scoped.len(),
        kpis: build_kpis(records, view, policy),
        by_branch: group_summary(&scoped, &[GroupKey::Branch], field),
        monthly: monthly_series(&scoped, field),
        by_level1: group_summary(&scoped, &[GroupKey::Level1], field),
        by_levels: group_summary(&scoped, &[GroupKey::Level1, GroupKey::Level2], field),
        ranking: rank_by.map(|key| (key, rank(&scoped, key, field))),
        pivot: (view == ReportView::Overview)
            .then(|| pivot_summary(&scoped, GroupKey::Branch, GroupKey::GroupedReason, None)),
    }
}

fn render_total(sum: Option<f64>, count: usize, field: Option<ValueField>) -> String {
    match field {
        Some(f) => format_value(sum, f),
        None => format_int(count),
    }
}

pub fn kpi_rows(kpis: &[Kpi]) -> Vec<KpiRow> {
    kpis.iter()
        .map(|k| KpiRow {
            label: k.name.clone(),
            value: k.display.clone(),
        })
        .collect()
}

pub fn group_rows(rows: &[GroupSummary], field: Option<ValueField>) -> Vec<GroupRow> {
    rows.iter()
        .map(|g| GroupRow {
            group: g.keys.join(" / "),
            count: g.count,
            total: render_total(g.sum, g.count, field),
            mean: match field {
                Some(f) => format_value(g.mean, f),
                None => MISSING.to_string(),
            },
        })
        .collect()
}

pub fn monthly_rows(points: &[MonthlyPoint], field: Option<ValueField>) -> Vec<MonthlyRow> {
    points
        .iter()
        .map(|p| MonthlyRow {
            period: format!("{}-{:02}", p.year, p.month),
            count: p.count,
            total: render_total(p.sum, p.count, field),
            moving_avg: match field {
                Some(f) => format_value(p.moving_avg, f),
                None => p
                    .moving_avg
                    .map(|v| format_number(v, 2))
                    .unwrap_or_else(|| MISSING.to_string()),
            },
        })
        .collect()
}

pub fn rank_rows(entries: &[RankEntry], field: Option<ValueField>) -> Vec<RankRow> {
    entries
        .iter()
        .map(|e| RankRow {
            rank: e.rank,
            key: e.key.clone(),
            count: e.count,
            total: render_total(e.sum, e.count, field),
        })
        .collect()
}

pub fn generate_summary(
    all: &[Record],
    filtered: &[Record],
    filter: &Filter,
    policy: AltPolicy,
    dashboard: &Dashboard,
) -> SummaryStats {
    SummaryStats {
        view: dashboard.view.to_string(),
        alt_policy: policy.to_string(),
        filters: filter.describe(),
        total_records: all.len(),
        filtered_records: filtered.len(),
        undated_records: filtered.iter().filter(|r| r.creation_date.is_none()).count(),
        excluded_records: filtered.iter().filter(|r| r.grouped_reason().is_excluded()).count(),
        kpis: dashboard.kpis.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter;
    use chrono::NaiveDate;

    fn rec(code: &str, branch: &str, ym: Option<(i32, u32)>, discount: Option<f64>) -> Record {
        Record {
            reason_code: code.to_string(),
            branch: branch.to_string(),
            creation_date: ym.and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 15)),
            days: None,
            discount,
            cancel_amount: None,
            level1: "Comercial".to_string(),
            level2: "Preço".to_string(),
            user: None,
            status: None,
            situation: None,
        }
    }

    fn scenario() -> Vec<Record> {
        vec![
            rec("DEC", "BranchA", Some((2024, 1)), Some(100.0)),
            rec("DEC", "BranchA", Some((2024, 2)), Some(50.0)),
            rec("DEC", "BranchB", Some((2024, 1)), Some(30.0)),
        ]
    }

    fn dec() -> ReasonSet {
        ReasonSet::new().with_codes(["DEC"])
    }

    #[test]
    fn scenario_totals_branches_and_months() {
        let data = scenario();
        let kpi = kpi_summary(&data, &dec(), Some(ValueField::Discount));
        assert_eq!(kpi.count, 3);
        assert_eq!(kpi.sum, Some(180.0));
        assert_eq!(kpi.mean, Some(60.0));

        let branches = group_summary(&data, &[GroupKey::Branch], Some(ValueField::Discount));
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].keys, vec!["BranchA"]);
        assert_eq!(branches[0].sum, Some(150.0));
        assert_eq!(branches[1].keys, vec!["BranchB"]);
        assert_eq!(branches[1].sum, Some(30.0));

        let months = monthly_series(&data, Some(ValueField::Discount));
        let sums: Vec<_> = months.iter().map(|p| (p.year, p.month, p.sum)).collect();
        assert_eq!(sums, vec![(2024, 1, Some(130.0)), (2024, 2, Some(50.0))]);
    }

    #[test]
    fn scenario_branch_filter() {
        let data = scenario();
        let criteria = Filter {
            branches: vec!["BranchA".to_string()],
            ..Default::default()
        };
        let out = filter(&data, &criteria);
        assert_eq!(out.len(), 2);
        assert_eq!(kpi_summary(&out, &dec(), Some(ValueField::Discount)).sum, Some(150.0));
    }

    #[test]
    fn empty_subset_yields_sentinels() {
        let kpi = kpi_summary(&scenario(), &ReasonSet::new().with_codes(["CAN"]), Some(ValueField::CancelAmount));
        assert_eq!(kpi.count, 0);
        assert_eq!(kpi.sum, None);
        assert_eq!(kpi.mean, None);
        assert_eq!(format_brl(kpi.mean), MISSING);
    }

    #[test]
    fn missing_values_count_as_zero_for_sum_but_not_mean() {
        let mut data = scenario();
        data.push(rec("DEC", "BranchB", Some((2024, 3)), None));
        let kpi = kpi_summary(&data, &dec(), Some(ValueField::Discount));
        assert_eq!(kpi.count, 4);
        assert_eq!(kpi.sum, Some(180.0));
        assert_eq!(kpi.mean, Some(60.0));
    }

    #[test]
    fn count_only_summary_has_no_sum() {
        let kpi = kpi_summary(&scenario(), &dec(), None);
        assert_eq!(kpi.count, 3);
        assert_eq!(kpi.sum, None);
    }

    #[test]
    fn group_sums_add_up_to_total() {
        let mut data = scenario();
        data.push(rec("DEC", "BranchC", Some((2023, 11)), Some(12.5)));
        data.push(rec("DEC", "BranchB", None, Some(7.5)));
        let rows = group_summary(&data, &[GroupKey::Branch, GroupKey::Level1], Some(ValueField::Discount));
        let per_group: f64 = rows.iter().filter_map(|g| g.sum).sum();
        let total = kpi_summary(&data, &dec(), Some(ValueField::Discount)).sum.unwrap();
        assert_eq!(per_group, total);
        let sums: Vec<f64> = rows.iter().map(|g| g.sum.unwrap()).collect();
        assert!(sums.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let data = vec![
            rec("DEC", "Zeta", None, Some(10.0)),
            rec("DEC", "Alfa", None, Some(10.0)),
            rec("DEC", "Mid", None, Some(10.0)),
        ];
        let ranking = rank(&data, GroupKey::Branch, Some(ValueField::Discount));
        let keys: Vec<&str> = ranking.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["Zeta", "Alfa", "Mid"]);
        assert_eq!(ranking[2].rank, 3);
    }

    #[test]
    fn undated_records_stay_in_code_aggregates_only() {
        let mut data = scenario();
        data.push(rec("DEC", "BranchA", None, Some(20.0)));
        assert_eq!(kpi_summary(&data, &dec(), Some(ValueField::Discount)).sum, Some(200.0));
        let monthly_total: f64 = monthly_series(&data, Some(ValueField::Discount))
            .iter()
            .filter_map(|p| p.sum)
            .sum();
        assert_eq!(monthly_total, 180.0);
    }

    #[test]
    fn moving_average_needs_full_window() {
        let avg = moving_average(&[3.0, 6.0, 9.0, 12.0], 3);
        assert_eq!(avg, vec![None, None, Some(6.0), Some(9.0)]);
        assert!(moving_average(&[1.0, 2.0], 3).iter().all(Option::is_none));
    }

    #[test]
    fn monthly_series_is_chronological_with_moving_average() {
        let data = vec![
            rec("DEC", "A", Some((2024, 3)), Some(30.0)),
            rec("DEC", "A", Some((2023, 12)), Some(60.0)),
            rec("DEC", "A", Some((2024, 1)), Some(0.0)),
        ];
        let points = monthly_series(&data, Some(ValueField::Discount));
        let periods: Vec<_> = points.iter().map(|p| (p.year, p.month)).collect();
        assert_eq!(periods, vec![(2023, 12), (2024, 1), (2024, 3)]);
        assert_eq!(points[0].moving_avg, None);
        assert_eq!(points[1].moving_avg, None);
        assert_eq!(points[2].moving_avg, Some(30.0));
    }

    #[test]
    fn unlisted_code_appears_under_its_own_label() {
        let data = vec![
            rec("ZZZ", "A", None, Some(5.0)),
            rec("XXX", "A", None, Some(5.0)),
            rec("DEC", "A", None, Some(5.0)),
        ];
        let rows = group_summary(&data, &[GroupKey::GroupedReason], None);
        let labels: Vec<&str> = rows.iter().map(|g| g.keys[0].as_str()).collect();
        assert_eq!(labels, vec!["ZZZ", "Desconto/Abat."]);
    }

    #[test]
    fn pivot_counts_branch_by_group() {
        let data = vec![
            rec("DEC", "A", None, None),
            rec("CAN", "B", None, None),
            rec("REF", "B", None, None),
            rec("DEC", "B", None, None),
            rec("DEV", "C", None, None),
        ];
        let pivot = pivot_summary(&data, GroupKey::Branch, GroupKey::GroupedReason, None);
        assert_eq!(pivot.columns, vec!["Cancelamento", "Desconto/Abat."]);
        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.rows[0].key, "B");
        assert_eq!(pivot.rows[0].values, vec![2.0, 1.0]);
        assert_eq!(pivot.rows[0].total, 3.0);
        assert_eq!(pivot.rows[1].key, "A");
    }

    #[test]
    fn alt_dual_count_feeds_discount_kpi() {
        let mut alt = rec("ALT", "A", Some((2024, 1)), Some(40.0));
        alt.days = Some(10.0);
        let data = vec![alt, rec("DEC", "A", Some((2024, 1)), Some(60.0))];

        let dual = build_dashboard(&data, ReportView::Overview, AltPolicy::DualCount, None);
        let single = build_dashboard(&data, ReportView::Overview, AltPolicy::ExtensionOnly, None);
        let discount = |d: &Dashboard| d.kpis.iter().find(|k| k.name == "Desconto/Abat.").and_then(|k| k.value);
        assert_eq!(discount(&dual), Some(100.0));
        assert_eq!(discount(&single), Some(60.0));

        let ext_mean = dual.kpis.iter().find(|k| k.name == "Prorrogação (média de dias)").unwrap();
        assert_eq!(ext_mean.value, Some(10.0));
    }

    #[test]
    fn overview_has_a_card_per_pass_through_code() {
        let data = vec![
            rec("ZZZ", "A", None, None),
            rec("DEC", "A", None, Some(5.0)),
            rec("QQQ", "B", None, None),
            rec("zzz", "B", None, None),
            rec("CEN", "B", None, None),
        ];
        let d = build_dashboard(&data, ReportView::Overview, AltPolicy::DualCount, None);
        let names: Vec<&str> = d.kpis.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(&names[5..], &["ZZZ", "QQQ", "Solicitações"]);
        assert_eq!(d.kpis[5].value, Some(2.0));
        assert_eq!(d.kpis[6].value, Some(1.0));
        assert_eq!(d.kpis[7].value, Some(4.0));
    }

    #[test]
    fn views_name_the_value_columns_they_read() {
        assert_eq!(ReportView::Discount.required_columns(), vec![Column::Discount]);
        assert_eq!(ReportView::Extension.required_columns(), vec![Column::Days]);
        assert_eq!(ReportView::Cancellation.required_columns(), vec![Column::CancelAmount]);
        assert_eq!(
            ReportView::Overview.required_columns(),
            vec![Column::Days, Column::CancelAmount]
        );
    }

    #[test]
    fn discount_dashboard_matches_scenario() {
        let d = build_dashboard(&scenario(), ReportView::Discount, AltPolicy::DualCount, None);
        assert_eq!(d.records_in_scope, 3);
        assert_eq!(d.kpis[0].display, "R$ 180,00");
        assert_eq!(d.kpis[1].value, Some(3.0));
        assert_eq!(d.kpis[2].value, Some(2.0));
        assert!(d.ranking.is_none());
        assert!(d.pivot.is_none());
        assert_eq!(d.by_levels[0].keys, vec!["Comercial", "Preço"]);
    }

    #[test]
    fn empty_input_renders_empty_tables() {
        let d = build_dashboard(&[], ReportView::Extension, AltPolicy::DualCount, Some(GroupKey::User));
        assert_eq!(d.kpis[0].value, Some(0.0));
        assert_eq!(d.kpis[2].display, MISSING);
        assert!(d.by_branch.is_empty() && d.monthly.is_empty());
        let (key, entries) = d.ranking.unwrap();
        assert_eq!(key, GroupKey::User);
        assert!(entries.is_empty());
    }

    #[test]
    fn same_input_yields_identical_tables() {
        let mut data = scenario();
        data.push(rec("ZZZ", "BranchC", Some((2024, 2)), Some(1.0)));
        let a = build_dashboard(&data, ReportView::Overview, AltPolicy::DualCount, Some(GroupKey::User));
        let b = build_dashboard(&data, ReportView::Overview, AltPolicy::DualCount, Some(GroupKey::User));
        assert_eq!(a.kpis, b.kpis);
        assert_eq!(a.by_branch, b.by_branch);
        assert_eq!(a.monthly, b.monthly);
        assert_eq!(a.pivot, b.pivot);
    }

    #[test]
    fn rendered_rows_use_brazilian_formatting() {
        let rows = group_rows(
            &group_summary(&scenario(), &[GroupKey::Branch], Some(ValueField::Discount)),
            Some(ValueField::Discount),
        );
        assert_eq!(rows[0].total, "R$ 150,00");
        assert_eq!(rows[0].mean, "R$ 75,00");
        let months = monthly_rows(&monthly_series(&scenario(), None), None);
        assert_eq!(months[0].period, "2024-01");
        assert_eq!(months[0].total, "2");
        assert_eq!(months[0].moving_avg, MISSING);
    }
}
