//! Per-partition KPIs and chart series.
//!
//! Everything here is a pure function of the partition's rows. Nothing is
//! cached: the dashboard rebuilds a [`DashboardView`] on every selection.

use crate::columns::{ColumnAliases, ColumnPlan, Field};
use crate::error::FetchError;
use crate::types::{
    ChartKind, ChartSeries, DashboardView, Kpis, PartitionKey, PriceCoverage, PricedRowSample,
    Record, WasteLevel,
};
use crate::util::{group_label, natural_cmp, round2, value_as_f64};
use std::collections::HashMap;
use tracing::warn;

pub const TOP_N: usize = 5;
pub const WASTE_ALERT_PCT: f64 = 5.0;
pub const UNKNOWN_LABEL: &str = "Unknown";
pub const OTHER_LINE_LABEL: &str = "Other";

/// What a ranking sums per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMetric {
    NetWeight,
    /// Net weight times unit price, multiplied per row before summing.
    WeightTimesPrice,
}

impl ValueMetric {
    fn row_value(self, record: &Record, plan: &ColumnPlan) -> f64 {
        let weight = value_as_f64(plan.value(record, Field::NetWeight));
        match self {
            ValueMetric::NetWeight => weight,
            ValueMetric::WeightTimesPrice => weight * value_as_f64(plan.value(record, Field::UnitPrice)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub aliases: ColumnAliases,
    pub top_n: usize,
    pub waste_alert_pct: f64,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            aliases: ColumnAliases::default(),
            top_n: TOP_N,
            waste_alert_pct: WASTE_ALERT_PCT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub net_weight: f64,
    pub waste: f64,
}

pub fn totals(records: &[Record], plan: &ColumnPlan) -> Totals {
    records.iter().fold(Totals::default(), |acc, r| Totals {
        net_weight: acc.net_weight + value_as_f64(plan.value(r, Field::NetWeight)),
        waste: acc.waste + value_as_f64(plan.value(r, Field::Waste)),
    })
}

/// waste / (waste + net) * 100, or 0 when the gross total is not positive.
pub fn waste_percentage(net_weight: f64, waste: f64) -> f64 {
    let gross = net_weight + waste;
    if gross > 0.0 {
        (waste / gross) * 100.0
    } else {
        0.0
    }
}

pub fn waste_level(row_count: usize, waste_pct: f64, alert_pct: f64) -> WasteLevel {
    if row_count == 0 {
        WasteLevel::Empty
    } else if waste_pct > alert_pct {
        WasteLevel::High
    } else {
        WasteLevel::Normal
    }
}

pub fn compute_kpis(records: &[Record], plan: &ColumnPlan, alert_pct: f64) -> Kpis {
    if records.is_empty() {
        return Kpis::empty();
    }
    let t = totals(records, plan);
    let waste_pct = waste_percentage(t.net_weight, t.waste);
    Kpis {
        row_count: records.len(),
        total_net_weight: plan.is_present(Field::NetWeight).then_some(t.net_weight),
        total_waste: t.waste,
        waste_pct,
        waste_level: waste_level(records.len(), waste_pct, alert_pct),
    }
}

/// Unrounded sums per group label, in first-seen order.
pub fn grouped_sums(
    records: &[Record],
    plan: &ColumnPlan,
    dimension: Field,
    metric: ValueMetric,
    fallback: &str,
) -> Vec<(String, f64)> {
    let mut sums: Vec<(String, f64)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for r in records {
        let label = group_label(plan.value(r, dimension), fallback);
        let value = metric.row_value(r, plan);
        match slots.get(&label) {
            Some(&i) => sums[i].1 += value,
            None => {
                slots.insert(label.clone(), sums.len());
                sums.push((label, value));
            }
        }
    }
    sums
}

/// The `n` largest groups by summed value, descending, rounded to 2
/// decimals. Ties keep first-seen order.
pub fn top_ranking(
    records: &[Record],
    plan: &ColumnPlan,
    dimension: Field,
    metric: ValueMetric,
    n: usize,
) -> Vec<(String, f64)> {
    let mut sums = grouped_sums(records, plan, dimension, metric, UNKNOWN_LABEL);
    // stable sort keeps ties in insertion order
    sums.sort_by(|a, b| b.1.total_cmp(&a.1));
    sums.truncate(n);
    sums.into_iter().map(|(k, v)| (k, round2(v))).collect()
}

/// Net weight per production line, ordered by line name (numeric-aware),
/// not by value.
pub fn line_series(records: &[Record], plan: &ColumnPlan) -> Vec<(String, f64)> {
    let mut sums = grouped_sums(records, plan, Field::Line, ValueMetric::NetWeight, OTHER_LINE_LABEL);
    sums.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    sums.into_iter().map(|(k, v)| (k, round2(v))).collect()
}

fn series(id: &str, title: &str, kind: ChartKind, pairs: Vec<(String, f64)>) -> ChartSeries {
    let (labels, values) = pairs.into_iter().unzip();
    ChartSeries {
        id: id.to_string(),
        title: title.to_string(),
        kind,
        labels,
        values,
    }
}

/// Build the complete view for one partition. Empty input gives the empty
/// view (zero KPIs, no charts).
pub fn build_view(period: Option<PartitionKey>, records: &[Record], opts: &AggregateOptions) -> DashboardView {
    let Some(first) = records.first() else {
        return DashboardView::empty(period, None);
    };
    let plan = opts.aliases.resolve_record(first);
    let n = opts.top_n;

    let charts = vec![
        series("lines", "Net weight by line (kg)", ChartKind::Bar, line_series(records, &plan)),
        series(
            "products",
            "Top products",
            ChartKind::Doughnut,
            top_ranking(records, &plan, Field::Product, ValueMetric::NetWeight, n),
        ),
        series(
            "clients",
            "Top clients",
            ChartKind::Doughnut,
            top_ranking(records, &plan, Field::Client, ValueMetric::NetWeight, n),
        ),
        series(
            "business_units",
            "Business units",
            ChartKind::Doughnut,
            top_ranking(records, &plan, Field::BusinessUnit, ValueMetric::NetWeight, n),
        ),
        series(
            "business_units_value",
            "Business units (€)",
            ChartKind::Doughnut,
            top_ranking(records, &plan, Field::BusinessUnit, ValueMetric::WeightTimesPrice, n),
        ),
    ];

    DashboardView {
        period,
        kpis: compute_kpis(records, &plan, opts.waste_alert_pct),
        charts,
        error: None,
    }
}

/// View for the outcome of fetching `key`: the aggregated rows, or the
/// empty view carrying the fetch error.
pub fn view_or_empty(
    key: PartitionKey,
    fetched: Result<Vec<Record>, FetchError>,
    opts: &AggregateOptions,
) -> DashboardView {
    match fetched {
        Ok(records) => build_view(Some(key), &records, opts),
        Err(e) => {
            warn!(partition = %key, error = %e, "failed to load partition");
            DashboardView::empty(Some(key), Some(e.to_string()))
        }
    }
}

/// How many rows carry a positive unit price, with the first `samples`
/// priced rows for inspection.
pub fn price_coverage(records: &[Record], aliases: &ColumnAliases, samples: usize) -> PriceCoverage {
    let mut coverage = PriceCoverage {
        total_rows: records.len(),
        priced_rows: 0,
        unpriced_rows: 0,
        samples: Vec::new(),
    };
    let Some(first) = records.first() else {
        return coverage;
    };
    let plan = aliases.resolve_record(first);
    for (index, r) in records.iter().enumerate() {
        let price = value_as_f64(plan.value(r, Field::UnitPrice));
        if price > 0.0 {
            coverage.priced_rows += 1;
            if coverage.samples.len() < samples {
                coverage.samples.push(PricedRowSample {
                    index,
                    price,
                    net_weight: value_as_f64(plan.value(r, Field::NetWeight)),
                });
            }
        } else {
            coverage.unpriced_rows += 1;
        }
    }
    coverage
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(v: serde_json::Value) -> Vec<Record> {
        v.as_array()
            .map(|a| a.iter().filter_map(|r| r.as_object().cloned()).collect())
            .unwrap_or_default()
    }

    fn plan_for(records: &[Record]) -> ColumnPlan {
        let aliases = ColumnAliases::default();
        records
            .first()
            .map(|r| aliases.resolve_record(r))
            .unwrap_or_else(|| aliases.resolve([]))
    }

    #[test]
    fn waste_percentage_matches_worked_example() {
        let data = rows(json!([
            {"Ano": 2026, "Mes": 2, "CDU_PesoLiquido": 100, "CDU_DesperdicioReal": 5},
            {"Ano": 2026, "Mes": 2, "CDU_PesoLiquido": 50, "CDU_DesperdicioReal": 0}
        ]));
        let kpis = compute_kpis(&data, &plan_for(&data), WASTE_ALERT_PCT);
        assert_eq!(kpis.row_count, 2);
        assert_eq!(kpis.total_net_weight, Some(150.0));
        assert_eq!(round2(kpis.waste_pct), 3.23);
        assert_eq!(kpis.waste_level, WasteLevel::Normal);
    }

    #[test]
    fn waste_percentage_bounds() {
        assert_eq!(waste_percentage(0.0, 0.0), 0.0);
        assert_eq!(waste_percentage(0.0, 10.0), 100.0);
        assert_eq!(waste_percentage(10.0, 0.0), 0.0);
        for (net, waste) in [(1.0, 1.0), (1e9, 3.0), (0.01, 400.0)] {
            let pct = waste_percentage(net, waste);
            assert!((0.0..=100.0).contains(&pct), "{pct}");
        }
    }

    #[test]
    fn high_waste_is_flagged_above_threshold() {
        assert_eq!(waste_level(3, 5.01, 5.0), WasteLevel::High);
        assert_eq!(waste_level(3, 5.0, 5.0), WasteLevel::Normal);
        assert_eq!(waste_level(0, 50.0, 5.0), WasteLevel::Empty);
    }

    #[test]
    fn empty_partition_gives_zeroed_view() {
        let view = build_view(Some(PartitionKey::new(2026, 2)), &[], &AggregateOptions::default());
        assert_eq!(view.kpis, Kpis::empty());
        assert!(view.charts.is_empty());
        assert!(view.error.is_none());
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let data = rows(json!([
            {"CDU_UnidadeNegocioDescricao": "A", "CDU_PesoLiquido": 30},
            {"CDU_UnidadeNegocioDescricao": "C", "CDU_PesoLiquido": 10},
            {"CDU_UnidadeNegocioDescricao": "B", "CDU_PesoLiquido": 30}
        ]));
        let ranking = top_ranking(&data, &plan_for(&data), Field::BusinessUnit, ValueMetric::NetWeight, TOP_N);
        let labels: Vec<&str> = ranking.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
    }

    #[test]
    fn ranking_keeps_top_five_and_never_exceeds_total() {
        let data = rows(json!([
            {"CDU_Artigo": "p1", "CDU_PesoLiquido": 10.25},
            {"CDU_Artigo": "p2", "CDU_PesoLiquido": 20.5},
            {"CDU_Artigo": "p3", "CDU_PesoLiquido": 5},
            {"CDU_Artigo": "p4", "CDU_PesoLiquido": 40},
            {"CDU_Artigo": "p5", "CDU_PesoLiquido": 1},
            {"CDU_Artigo": "p6", "CDU_PesoLiquido": 2},
            {"CDU_Artigo": "p1", "CDU_PesoLiquido": 0.75}
        ]));
        let plan = plan_for(&data);
        let ranking = top_ranking(&data, &plan, Field::Product, ValueMetric::NetWeight, TOP_N);
        let labels: Vec<&str> = ranking.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["p4", "p2", "p1", "p3", "p6"]);
        assert_eq!(ranking[2].1, 11.0);
        let shown: f64 = ranking.iter().map(|(_, v)| v).sum();
        assert!(shown < totals(&data, &plan).net_weight);
    }

    #[test]
    fn missing_dimension_goes_to_unknown() {
        let data = rows(json!([
            {"CDU_NomeCliente": null, "CDU_PesoLiquido": 3},
            {"CDU_PesoLiquido": 4},
            {"CDU_NomeCliente": "ACME", "CDU_PesoLiquido": "2.5"}
        ]));
        let ranking = top_ranking(&data, &plan_for(&data), Field::Client, ValueMetric::NetWeight, TOP_N);
        assert_eq!(ranking, vec![("Unknown".to_string(), 7.0), ("ACME".to_string(), 2.5)]);
    }

    #[test]
    fn value_ranking_multiplies_per_row_before_summing() {
        let data = rows(json!([
            {"CDU_UnidadeNegocioDescricao": "Film", "CDU_PesoLiquido": 10, "CDU_PrecoVenda": 2},
            {"CDU_UnidadeNegocioDescricao": "Film", "CDU_PesoLiquido": 1, "CDU_PrecoVenda": 100},
            {"CDU_UnidadeNegocioDescricao": "Bags", "CDU_PesoLiquido": 50, "CDU_PrecoVenda": null}
        ]));
        let plan = plan_for(&data);
        let by_value = top_ranking(&data, &plan, Field::BusinessUnit, ValueMetric::WeightTimesPrice, TOP_N);
        assert_eq!(by_value, vec![("Film".to_string(), 120.0), ("Bags".to_string(), 0.0)]);
        let by_weight = top_ranking(&data, &plan, Field::BusinessUnit, ValueMetric::NetWeight, TOP_N);
        assert_eq!(by_weight, vec![("Bags".to_string(), 50.0), ("Film".to_string(), 11.0)]);
    }

    #[test]
    fn line_series_is_sorted_by_name_not_value() {
        let data = rows(json!([
            {"CDU_LinhaProducao": "Line 10", "CDU_PesoLiquido": 100},
            {"CDU_LinhaProducao": "Line 2", "CDU_PesoLiquido": 1},
            {"CDU_LinhaProducao": null, "CDU_PesoLiquido": 7},
            {"CDU_LinhaProducao": "Line 1", "CDU_PesoLiquido": 0.333}
        ]));
        let series = line_series(&data, &plan_for(&data));
        assert_eq!(
            series,
            vec![
                ("Line 1".to_string(), 0.33),
                ("Line 2".to_string(), 1.0),
                ("Line 10".to_string(), 100.0),
                ("Other".to_string(), 7.0),
            ]
        );
    }

    #[test]
    fn missing_weight_column_reports_unavailable_total() {
        let data = rows(json!([{"Ano": 2026, "Mes": 1, "Qty": 4}]));
        let kpis = compute_kpis(&data, &plan_for(&data), WASTE_ALERT_PCT);
        assert_eq!(kpis.row_count, 1);
        assert_eq!(kpis.total_net_weight, None);
    }

    #[test]
    fn view_contains_every_chart() {
        let data = rows(json!([
            {"CDU_Artigo": "X", "CDU_NomeCliente": "C", "CDU_UnidadeNegocioDescricao": "U",
             "CDU_LinhaProducao": "L1", "CDU_PesoLiquido": 10, "CDU_DesperdicioReal": 1, "CDU_PrecoVenda": 1.5}
        ]));
        let view = build_view(None, &data, &AggregateOptions::default());
        let ids: Vec<&str> = view.charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["lines", "products", "clients", "business_units", "business_units_value"]);
        assert_eq!(view.chart("business_units_value").map(|c| c.values.clone()), Some(vec![15.0]));
        assert_eq!(view.chart("lines").map(|c| c.kind), Some(ChartKind::Bar));
    }

    #[test]
    fn fetch_outcome_becomes_view_or_empty_view() {
        let key = PartitionKey::new(2026, 2);
        let data = rows(json!([{"CDU_PesoLiquido": 12.5}]));
        let view = view_or_empty(key, Ok(data), &AggregateOptions::default());
        assert_eq!(view.period, Some(key));
        assert_eq!(view.kpis.total_net_weight, Some(12.5));
        assert!(view.error.is_none());

        let failed = view_or_empty(key, Err(FetchError::NotFound("2026_2.json".into())), &AggregateOptions::default());
        assert_eq!(failed.period, Some(key));
        assert_eq!(failed.kpis, Kpis::empty());
        assert!(failed.charts.is_empty());
        assert!(failed.error.as_deref().unwrap_or_default().contains("2026_2.json"));
    }

    #[test]
    fn price_coverage_counts_priced_rows() {
        let data = rows(json!([
            {"CDU_PrecoVenda": 0, "CDU_PesoLiquido": 1},
            {"CDU_PrecoVenda": 2.5, "CDU_PesoLiquido": 4},
            {"CDU_PrecoVenda": null, "CDU_PesoLiquido": 1},
            {"CDU_PrecoVenda": "3", "CDU_PesoLiquido": 8}
        ]));
        let cov = price_coverage(&data, &ColumnAliases::default(), 1);
        assert_eq!(cov.total_rows, 4);
        assert_eq!(cov.priced_rows, 2);
        assert_eq!(cov.unpriced_rows, 2);
        assert_eq!(cov.samples, vec![PricedRowSample { index: 1, price: 2.5, net_weight: 4.0 }]);
    }
}
