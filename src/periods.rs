//! Year/month choices offered by the dashboard, derived from `metadata.json`.

use crate::types::{IndexEntry, PartitionKey};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodIndex {
    entries: Vec<IndexEntry>,
}

impl PeriodIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct years, in index order (newest first for a sorted index).
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = Vec::new();
        for e in &self.entries {
            if !years.contains(&e.ano) {
                years.push(e.ano);
            }
        }
        years
    }

    pub fn months(&self, year: i32) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|e| e.ano == year)
            .map(|e| e.mes)
            .collect()
    }

    pub fn contains(&self, key: PartitionKey) -> bool {
        self.entries.iter().any(|e| e.partition_key() == key)
    }

    /// First index entry, which is the newest period.
    pub fn default_selection(&self) -> Option<PartitionKey> {
        self.entries.first().map(IndexEntry::partition_key)
    }

    /// Selection after switching to `year`: keeps `month` when that year has
    /// it, otherwise takes the year's first listed month.
    pub fn switch_year(&self, year: i32, month: Option<u32>) -> Option<PartitionKey> {
        let months = self.months(year);
        let chosen = month
            .filter(|m| months.contains(m))
            .or_else(|| months.first().copied())?;
        Some(PartitionKey::new(year, chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PeriodIndex {
        PeriodIndex::new(
            [(2026, 2), (2026, 1), (2025, 12), (2025, 3)]
                .into_iter()
                .map(|(y, m)| IndexEntry::from(PartitionKey::new(y, m)))
                .collect(),
        )
    }

    #[test]
    fn years_and_months_follow_index_order() {
        let idx = index();
        assert_eq!(idx.years(), vec![2026, 2025]);
        assert_eq!(idx.months(2025), vec![12, 3]);
        assert!(idx.months(2024).is_empty());
        assert_eq!(idx.default_selection(), Some(PartitionKey::new(2026, 2)));
        assert!(idx.contains(PartitionKey::new(2025, 3)));
        assert!(!idx.contains(PartitionKey::new(2025, 4)));
    }

    #[test]
    fn switching_year_keeps_month_when_available() {
        let idx = index();
        assert_eq!(idx.switch_year(2025, Some(3)), Some(PartitionKey::new(2025, 3)));
        assert_eq!(idx.switch_year(2025, Some(2)), Some(PartitionKey::new(2025, 12)));
        assert_eq!(idx.switch_year(2024, Some(2)), None);
    }

    #[test]
    fn empty_index_has_no_default() {
        assert_eq!(PeriodIndex::default().default_selection(), None);
    }
}
