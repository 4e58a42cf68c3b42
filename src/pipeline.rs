use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::extract;
use crate::fetch::{HttpFetcher, ListingFetcher};
use crate::report::{self, ChartArtifact};
use crate::types::{MetricsEntry, SourceConfig};

/// Ties the store, a fetcher and the loaded settings together and exposes
/// the trigger and query operations.
pub struct Pipeline<'a, F> {
    store: &'a Store,
    fetcher: F,
    sources: Vec<SourceConfig>,
    request_delay: Duration,
}

impl<'a> Pipeline<'a, HttpFetcher> {
    pub fn from_settings(store: &'a Store, settings: &Settings) -> Result<Self> {
        let fetcher = HttpFetcher::new(&settings.base_url, settings.request_timeout)?;
        Ok(Pipeline::new(
            store,
            fetcher,
            settings.sources.clone(),
            settings.request_delay,
        ))
    }
}

impl<'a, F: ListingFetcher> Pipeline<'a, F> {
    pub fn new(
        store: &'a Store,
        fetcher: F,
        sources: Vec<SourceConfig>,
        request_delay: Duration,
    ) -> Self {
        Pipeline {
            store,
            fetcher,
            sources,
            request_delay,
        }
    }

    /// Run over the configured sources.
    pub async fn trigger_ingestion_run(&self) -> Result<MetricsEntry, StoreError> {
        self.run(&self.sources).await
    }

    /// Re-render the chart from stored history without fetching.
    pub fn trigger_report_refresh(&self) -> Result<Option<ChartArtifact>, StoreError> {
        let history = self.store.query_metrics()?;
        Ok(report::render(&history))
    }

    pub fn list_identifiers(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        self.store.query_records_in_range(start, end)
    }

    pub fn record_count(&self) -> Result<u64, StoreError> {
        self.store.count_records()
    }

    /// One run over `sources`, in order. Fetch failures contribute nothing;
    /// store failures abort the run. Inserted records are never rolled back.
    pub async fn run(&self, sources: &[SourceConfig]) -> Result<MetricsEntry, StoreError> {
        // Stored timestamps carry microseconds; keep the returned entry identical.
        let run_time = Utc::now().trunc_subsecs(6);
        let t0 = Instant::now();

        let mut union: BTreeSet<String> = BTreeSet::new();
        for source in sources {
            tokio::time::sleep(self.request_delay).await;

            let outcome = self.fetcher.fetch(source).await;
            if !outcome.ok {
                debug!(source = %source.name, "skipping source for this run");
                continue;
            }
            let ids = extract::extract(&outcome.body, &source.categories);
            debug!(source = %source.name, extracted = ids.len(), "extracted identifiers");
            union.extend(ids);
        }

        let found = union.len() as u64;
        let mut added = 0u64;
        for id in &union {
            if self.store.insert_if_absent(id, &run_time)? {
                added += 1;
            }
        }

        let entry = MetricsEntry {
            run_time,
            found,
            added,
        };
        if !self.store.record_metrics(&entry)? {
            warn!(run_time = %run_time, "metrics already recorded for this run time");
        }

        info!(
            found,
            added,
            sources = sources.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "ingestion run complete"
        );
        Ok(entry)
    }
}

// ── Tests ──
