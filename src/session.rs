//! Interactive dashboard state.
//!
//! A session owns the current [`DashboardView`] and replaces it wholesale on
//! every selection. Each selection takes a generation number; only the
//! result of the latest selection is ever installed, so a slow response for
//! an old selection cannot overwrite a newer one.

use crate::aggregate::{view_or_empty, AggregateOptions};
use crate::error::FetchError;
use crate::periods::PeriodIndex;
use crate::source::PartitionSource;
use crate::types::{DashboardView, PartitionKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    Applied(Arc<DashboardView>),
    /// A newer selection was made while this one was in flight.
    Superseded,
}

pub struct DashboardSession<S> {
    source: S,
    options: AggregateOptions,
    periods: PeriodIndex,
    generation: AtomicU64,
    view: watch::Sender<Arc<DashboardView>>,
}

impl<S: PartitionSource> DashboardSession<S> {
    /// Load the period index. Failure here is fatal: without metadata there
    /// is nothing to select.
    pub async fn open(source: S, options: AggregateOptions) -> Result<Self, FetchError> {
        let entries = source.fetch_metadata().await?;
        info!(periods = entries.len(), "metadata loaded");
        let (view, _) = watch::channel(Arc::new(DashboardView::empty(None, None)));
        Ok(Self {
            source,
            options,
            periods: PeriodIndex::new(entries),
            generation: AtomicU64::new(0),
            view,
        })
    }

    pub fn periods(&self) -> &PeriodIndex {
        &self.periods
    }

    pub fn current(&self) -> Arc<DashboardView> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardView>> {
        self.view.subscribe()
    }

    /// Fetch and aggregate `key`. A failed fetch installs the empty view
    /// carrying the error message.
    pub async fn select(&self, key: PartitionKey) -> SelectOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(partition = %key, generation, "selection changed");

        let fetched = self.source.fetch_partition(key).await;
        let view = Arc::new(view_or_empty(key, fetched, &self.options));

        // check-and-install runs under the channel's lock
        let applied = self.view.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = view.clone();
            true
        });
        if applied {
            SelectOutcome::Applied(view)
        } else {
            debug!(partition = %key, generation, "stale selection dropped");
            SelectOutcome::Superseded
        }
    }

    /// Select the newest period, if any.
    pub async fn select_default(&self) -> Option<SelectOutcome> {
        let key = self.periods.default_selection()?;
        Some(self.select(key).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndexEntry, Record};
    use serde_json::json;
    use std::collections::HashMap;
    use std::future::Future;
    use std::time::Duration;

    /// In-memory source with an optional per-partition delay.
    struct StubSource {
        partitions: HashMap<PartitionKey, Vec<Record>>,
        delays: HashMap<PartitionKey, Duration>,
    }

    impl PartitionSource for StubSource {
        fn fetch_metadata(&self) -> impl Future<Output = Result<Vec<IndexEntry>, FetchError>> + Send {
            let entries: Vec<IndexEntry> = self.partitions.keys().copied().map(IndexEntry::from).collect();
            async move { Ok(entries) }
        }

        fn fetch_partition(
            &self,
            key: PartitionKey,
        ) -> impl Future<Output = Result<Vec<Record>, FetchError>> + Send {
            let delay = self.delays.get(&key).copied();
            let rows = self.partitions.get(&key).cloned();
            async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                rows.ok_or_else(|| FetchError::NotFound(key.file_name()))
            }
        }
    }

    fn rows(weight: f64) -> Vec<Record> {
        vec![json!({"CDU_PesoLiquido": weight})
            .as_object()
            .cloned()
            .unwrap_or_default()]
    }

    fn stub() -> StubSource {
        let jan = PartitionKey::new(2026, 1);
        let feb = PartitionKey::new(2026, 2);
        StubSource {
            partitions: HashMap::from([(jan, rows(10.0)), (feb, rows(20.0))]),
            delays: HashMap::from([(jan, Duration::from_millis(200))]),
        }
    }

    #[tokio::test]
    async fn missing_partition_clears_previous_view() {
        let session = DashboardSession::open(stub(), AggregateOptions::default()).await.unwrap();
        session.select(PartitionKey::new(2026, 2)).await;
        assert_eq!(session.current().kpis.total_net_weight, Some(20.0));

        let outcome = session.select(PartitionKey::new(2030, 1)).await;
        let SelectOutcome::Applied(view) = outcome else {
            panic!("expected applied outcome");
        };
        assert_eq!(view.kpis.row_count, 0);
        assert!(view.charts.is_empty());
        assert!(view.error.as_deref().unwrap_or_default().contains("2030_1.json"));
        assert_eq!(session.current().period, Some(PartitionKey::new(2030, 1)));
    }

    #[tokio::test]
    async fn slow_stale_response_never_overwrites_newer_selection() {
        let session = Arc::new(DashboardSession::open(stub(), AggregateOptions::default()).await.unwrap());

        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.select(PartitionKey::new(2026, 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fast = session.select(PartitionKey::new(2026, 2)).await;

        assert!(matches!(fast, SelectOutcome::Applied(_)));
        assert_eq!(slow.await.unwrap(), SelectOutcome::Superseded);
        let current = session.current();
        assert_eq!(current.period, Some(PartitionKey::new(2026, 2)));
        assert_eq!(current.kpis.total_net_weight, Some(20.0));
    }

    #[tokio::test]
    async fn subscribers_see_each_applied_view() {
        let session = DashboardSession::open(stub(), AggregateOptions::default()).await.unwrap();
        let mut rx = session.subscribe();
        session.select(PartitionKey::new(2026, 2)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().period, Some(PartitionKey::new(2026, 2)));
    }
}
