//! Monthly production dashboard.
//!
//! The partitioner ([`partition`]) splits the production workbook (or a CSV
//! export of it) into one JSON fragment per (year, month) plus a `metadata.json`
//! index. The dashboard side ([`session`], [`server`]) fetches one fragment
//! per selection and turns it into KPIs and chart series ([`aggregate`]).

pub mod aggregate;
pub mod columns;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod partition;
pub mod periods;
pub mod server;
pub mod session;
pub mod source;
pub mod types;
pub mod util;

pub use error::{FetchError, PartitionError};
pub use types::{ChartSeries, DashboardView, IndexEntry, Kpis, PartitionKey, Record};
