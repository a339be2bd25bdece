use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tabled::Tabled;

/// One production row: field name to scalar value, in source column order.
pub type Record = Map<String, Value>;

/// (year, month) pair identifying one partition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.year, self.month)
    }
}

/// Entry of `metadata.json`. Field names are part of the published format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub ano: i32,
    pub mes: u32,
    pub key: String,
}

impl IndexEntry {
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.ano, self.mes)
    }
}

impl From<PartitionKey> for IndexEntry {
    fn from(key: PartitionKey) -> Self {
        Self {
            ano: key.year,
            mes: key.month,
            key: key.to_string(),
        }
    }
}

/// Presentation hint derived from the waste percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteLevel {
    Empty,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub row_count: usize,
    /// `None` when the partition has rows but no net-weight column.
    pub total_net_weight: Option<f64>,
    pub total_waste: f64,
    pub waste_pct: f64,
    pub waste_level: WasteLevel,
}

impl Kpis {
    pub fn empty() -> Self {
        Self {
            row_count: 0,
            total_net_weight: Some(0.0),
            total_waste: 0.0,
            waste_pct: 0.0,
            waste_level: WasteLevel::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Doughnut,
}

/// Chart-agnostic series handed to whatever draws the charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Everything the dashboard shows for one selection. Rebuilt on every
/// selection change and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub period: Option<PartitionKey>,
    pub kpis: Kpis,
    pub charts: Vec<ChartSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DashboardView {
    pub fn empty(period: Option<PartitionKey>, error: Option<String>) -> Self {
        Self {
            period,
            kpis: Kpis::empty(),
            charts: Vec::new(),
            error,
        }
    }

    pub fn chart(&self, id: &str) -> Option<&ChartSeries> {
        self.charts.iter().find(|c| c.id == id)
    }
}

/// Unit-price coverage of one partition, used by the `check` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceCoverage {
    pub total_rows: usize,
    pub priced_rows: usize,
    pub unpriced_rows: usize,
    pub samples: Vec<PricedRowSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct PricedRowSample {
    #[tabled(rename = "Row")]
    pub index: usize,
    #[tabled(rename = "UnitPrice")]
    pub price: f64,
    #[tabled(rename = "NetWeight")]
    pub net_weight: f64,
}

#[derive(Debug, Clone, Tabled)]
pub struct KpiRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Tabled)]
pub struct RankingRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "Group")]
    pub label: String,
    #[tabled(rename = "Value")]
    pub value: String,
}
