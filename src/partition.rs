//! Split the production sheet into one JSON fragment per (year, month).

use crate::columns::{ColumnAliases, ColumnPlan, Field};
use crate::error::PartitionError;
use crate::loader::{self, ReadOptions};
use crate::output;
use crate::types::{IndexEntry, PartitionKey, Record};
use crate::util::value_as_i64;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Default)]
pub struct Partitioned {
    /// Groups in first-seen order; rows keep their source order.
    pub groups: Vec<(PartitionKey, Vec<Record>)>,
    /// Rows dropped for lacking a usable year or month.
    pub errors: usize,
}

impl Partitioned {
    /// Index entries sorted by year then month, newest first.
    pub fn index(&self) -> Vec<IndexEntry> {
        let mut keys: Vec<PartitionKey> = self.groups.iter().map(|(k, _)| *k).collect();
        keys.sort_by_key(|k| (Reverse(k.year), Reverse(k.month)));
        keys.into_iter().map(IndexEntry::from).collect()
    }
}

/// Partition key of one record. Missing, blank, zero, negative and
/// non-integer year/month values all count as missing.
pub fn partition_key(record: &Record, plan: &ColumnPlan) -> Option<PartitionKey> {
    let year = value_as_i64(plan.value(record, Field::Year)).filter(|y| *y > 0)?;
    let month = value_as_i64(plan.value(record, Field::Month)).filter(|m| *m > 0)?;
    Some(PartitionKey::new(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
    ))
}

pub fn partition_records(records: Vec<Record>, plan: &ColumnPlan) -> Partitioned {
    let mut out = Partitioned::default();
    let mut slots: HashMap<PartitionKey, usize> = HashMap::new();
    for record in records {
        let Some(key) = partition_key(&record, plan) else {
            out.errors += 1;
            continue;
        };
        let slot = *slots.entry(key).or_insert_with(|| {
            out.groups.push((key, Vec::new()));
            out.groups.len() - 1
        });
        out.groups[slot].1.push(record);
    }
    out
}

#[derive(Debug, Clone)]
pub struct WriteReport {
    pub out_dir: PathBuf,
    pub files_written: usize,
}

/// Write `{year}_{month}.json` for every group plus `metadata.json`.
/// Files from earlier runs that no longer have a group are left alone.
pub fn write_partitions(out_dir: &Path, partitioned: &Partitioned) -> Result<WriteReport, PartitionError> {
    fs::create_dir_all(out_dir).map_err(|source| PartitionError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut files_written = 0usize;
    for (key, rows) in &partitioned.groups {
        let path = out_dir.join(key.file_name());
        output::write_json(&path, rows)?;
        debug!(partition = %key, rows = rows.len(), "wrote partition");
        files_written += 1;
    }
    output::write_json(&out_dir.join(METADATA_FILE), &partitioned.index())?;

    Ok(WriteReport {
        out_dir: out_dir.to_path_buf(),
        files_written,
    })
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub load: loader::LoadReport,
    pub year_column: String,
    pub month_column: String,
    pub rows_loaded: usize,
    pub skipped_rows: usize,
    pub partitions: Vec<IndexEntry>,
    pub write: WriteReport,
}

/// Full partition run: load, resolve columns, group, write.
pub fn run(
    source: &Path,
    out_dir: &Path,
    aliases: &ColumnAliases,
    read: &ReadOptions,
) -> Result<RunReport, PartitionError> {
    info!(source = %source.display(), "reading source");
    let (records, load) = loader::load_records(source, read)?;
    if records.is_empty() {
        return Err(PartitionError::EmptyDataset(source.to_path_buf()));
    }
    let rows_loaded = records.len();
    info!(rows = rows_loaded, "rows loaded");

    let plan = aliases.resolve(load.headers.iter().map(String::as_str));
    let year_column = plan.column(Field::Year).to_string();
    let month_column = plan.column(Field::Month).to_string();
    info!(year = %year_column, month = %month_column, "using period columns");

    let partitioned = partition_records(records, &plan);
    if partitioned.errors > 0 {
        warn!(
            skipped = partitioned.errors,
            "rows ignored for missing year/month"
        );
    }
    let write = write_partitions(out_dir, &partitioned)?;

    Ok(RunReport {
        load,
        year_column,
        month_column,
        rows_loaded,
        skipped_rows: partitioned.errors,
        partitions: partitioned.index(),
        write,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    fn plan() -> ColumnPlan {
        ColumnAliases::default().resolve(["Ano", "Mes", "CDU_PesoLiquido"])
    }

    #[test]
    fn groups_rows_by_period_in_first_seen_order() {
        let rows = vec![
            rec(json!({"Ano": 2025, "Mes": 12, "CDU_PesoLiquido": 1})),
            rec(json!({"Ano": 2026, "Mes": 2, "CDU_PesoLiquido": 2})),
            rec(json!({"Ano": 2025, "Mes": 12, "CDU_PesoLiquido": 3})),
        ];
        let parts = partition_records(rows, &plan());
        let keys: Vec<String> = parts.groups.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["2025_12", "2026_2"]);
        let dec = &parts.groups[0].1;
        assert_eq!(dec.len(), 2);
        assert_eq!(dec[1]["CDU_PesoLiquido"], json!(3));
        assert_eq!(parts.errors, 0);
    }

    #[test]
    fn rows_without_year_or_month_are_counted_not_kept() {
        let rows = vec![
            rec(json!({"Ano": 2026, "Mes": null})),
            rec(json!({"Ano": "", "Mes": 3})),
            rec(json!({"Ano": 0, "Mes": 3})),
            rec(json!({"Mes": 3})),
            rec(json!({"Ano": "2026", "Mes": "3"})),
        ];
        let parts = partition_records(rows, &plan());
        assert_eq!(parts.errors, 4);
        assert_eq!(parts.groups.len(), 1);
        assert_eq!(parts.groups[0].0, PartitionKey::new(2026, 3));
    }

    #[test]
    fn index_is_sorted_newest_first() {
        let rows = vec![
            rec(json!({"Ano": 2025, "Mes": 3})),
            rec(json!({"Ano": 2026, "Mes": 1})),
            rec(json!({"Ano": 2025, "Mes": 11})),
            rec(json!({"Ano": 2026, "Mes": 2})),
        ];
        let index = partition_records(rows, &plan()).index();
        let keys: Vec<&str> = index.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["2026_2", "2026_1", "2025_11", "2025_3"]);
        assert_eq!(index[0], IndexEntry { ano: 2026, mes: 2, key: "2026_2".into() });
    }
}
