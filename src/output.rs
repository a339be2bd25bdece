use crate::error::PartitionError;
use crate::types::{DashboardView, KpiRow, PriceCoverage, RankingRow, WasteLevel};
use crate::util::{format_int, format_number, month_name};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Pretty-printed (2-space) JSON, no trailing newline.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PartitionError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|source| PartitionError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn table_string<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)\n".to_string();
    }
    let mut s = Table::new(slice).with(Style::markdown()).to_string();
    s.push('\n');
    s
}

pub fn kpi_rows(view: &DashboardView) -> Vec<KpiRow> {
    let k = &view.kpis;
    let weight = match k.total_net_weight {
        Some(w) => format!("{} kg", format_number(w, 2)),
        None => "N/A".to_string(),
    };
    let flag = match k.waste_level {
        WasteLevel::High => " (high)",
        WasteLevel::Normal | WasteLevel::Empty => "",
    };
    vec![
        KpiRow {
            metric: "Rows".to_string(),
            value: format_int(k.row_count),
        },
        KpiRow {
            metric: "Net weight".to_string(),
            value: weight,
        },
        KpiRow {
            metric: "Waste".to_string(),
            value: format!("{}%{} of {} kg", format_number(k.waste_pct, 2), flag, format_number(k.total_waste, 2)),
        },
    ]
}

/// Render one dashboard view as text. Pure: the same view always renders
/// the same string.
pub fn render_dashboard(view: &DashboardView) -> String {
    let mut out = String::new();
    let heading = match view.period {
        Some(p) => format!("{} {}", month_name(p.month), p.year),
        None => "No period selected".to_string(),
    };
    let _ = writeln!(out, "== {} ==", heading);
    if let Some(err) = &view.error {
        let _ = writeln!(out, "(data unavailable: {})", err);
    }
    out.push('\n');
    out.push_str(&table_string(&kpi_rows(view), usize::MAX));

    for chart in &view.charts {
        let _ = writeln!(out, "\n{}", chart.title);
        let rows: Vec<RankingRow> = chart
            .labels
            .iter()
            .zip(&chart.values)
            .enumerate()
            .map(|(i, (label, value))| RankingRow {
                rank: i + 1,
                label: label.clone(),
                value: format_number(*value, 2),
            })
            .collect();
        out.push_str(&table_string(&rows, usize::MAX));
    }
    out
}

pub fn render_price_coverage(file: &str, coverage: &PriceCoverage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Checking {} for unit prices...", file);
    out.push_str(&table_string(&coverage.samples, coverage.samples.len()));
    let _ = writeln!(out, "Total rows: {}", format_int(coverage.total_rows));
    let _ = writeln!(out, "Priced rows: {}", format_int(coverage.priced_rows));
    let _ = writeln!(out, "Unpriced rows: {}", format_int(coverage.unpriced_rows));
    out
}
