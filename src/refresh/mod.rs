//! Refresh cycle: fetch → merge → upsert → regenerate summary
//!
//! A refresh is not transactional. Upstream data is fetched in full before
//! the store is touched, so a fetch failure leaves the store unchanged, but
//! a store failure part-way through keeps the rows already written.

pub mod merge;

use crate::countries::{CountryStore, UpsertOutcome};
use crate::error::Result;
use crate::summary::SummaryGenerator;
use crate::upstream::{fetch_all, UpstreamSource};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Result of one completed refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub inserted: usize,
    pub updated: usize,
}

impl RefreshOutcome {
    /// Records written in this cycle
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Drives refresh cycles against the store
pub struct Refresher {
    store: Arc<CountryStore>,
    upstream: Arc<dyn UpstreamSource>,
    summary: Arc<SummaryGenerator>,
}

impl Refresher {
    pub fn new(
        store: Arc<CountryStore>,
        upstream: Arc<dyn UpstreamSource>,
        summary: Arc<SummaryGenerator>,
    ) -> Self {
        Self {
            store,
            upstream,
            summary,
        }
    }

    /// Run one full refresh cycle
    pub async fn refresh_countries(&self) -> Result<RefreshOutcome> {
        tracing::info!("Refreshing countries");

        let data = fetch_all(self.upstream.as_ref()).await.map_err(|e| {
            tracing::warn!(error = %e, "Upstream fetch failed, refresh aborted");
            e
        })?;

        // Drawn up front: ThreadRng is not Send and must not live across an await
        let refreshed_at = Utc::now();
        let records: Vec<_> = {
            let mut rng = rand::thread_rng();
            data.countries
                .iter()
                .map(|raw| merge::merge_country(raw, &data.rates, refreshed_at, &mut rng))
                .collect()
        };

        let mut outcome = RefreshOutcome::default();
        for record in &records {
            match self.store.upsert(record).await? {
                UpsertOutcome::Inserted => outcome.inserted += 1,
                UpsertOutcome::Updated => outcome.updated += 1,
            }
        }

        self.summary.regenerate().await?;

        tracing::info!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            "Refresh complete"
        );
        Ok(outcome)
    }

    /// Spawn a background loop refreshing every `interval`. When
    /// `run_immediately` is false the first cycle starts after one interval.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration, run_immediately: bool) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            if !run_immediately {
                // The first tick of an interval completes immediately
                ticker.tick().await;
            }

            tracing::info!(interval_secs = interval.as_secs(), "Periodic refresh started");
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh_countries().await {
                    tracing::warn!(error = %e, "Scheduled refresh failed");
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::countries::store::tests::make_store;
    use crate::error::Error;
    use crate::summary::{MemorySummaryCache, SummaryCache};
    use crate::upstream::{RateTable, RawCountry, RawCurrency, UpstreamProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted upstream whose failures can be switched on per provider
    #[derive(Default)]
    pub(crate) struct ScriptedUpstream {
        pub countries: std::sync::Mutex<Vec<RawCountry>>,
        pub rates: std::sync::Mutex<RateTable>,
        pub fail_countries: AtomicBool,
        pub fail_rates: AtomicBool,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl UpstreamSource for ScriptedUpstream {
        async fn fetch_countries(&self) -> crate::Result<Vec<RawCountry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_countries.load(Ordering::SeqCst) {
                return Err(Error::upstream(UpstreamProvider::Countries, "down"));
            }
            Ok(self.countries.lock().unwrap().clone())
        }

        async fn fetch_rates(&self) -> crate::Result<RateTable> {
            if self.fail_rates.load(Ordering::SeqCst) {
                return Err(Error::upstream(UpstreamProvider::ExchangeRates, "down"));
            }
            Ok(self.rates.lock().unwrap().clone())
        }
    }

    pub(crate) fn raw(name: &str, region: &str, currency: Option<&str>, population: u64) -> RawCountry {
        RawCountry {
            name: name.to_string(),
            capital: None,
            region: Some(region.to_string()),
            population,
            flag: None,
            currencies: currency.map(|code| {
                vec![RawCurrency {
                    code: Some(code.to_string()),
                    name: None,
                    symbol: None,
                }]
            }),
        }
    }

    pub(crate) fn sample_upstream() -> ScriptedUpstream {
        let upstream = ScriptedUpstream::default();
        *upstream.countries.lock().unwrap() = vec![
            raw("Nigeria", "Africa", Some("NGN"), 206_139_589),
            raw("Ghana", "Africa", Some("GHS"), 31_072_940),
            raw("Antarctica", "Polar", None, 1000),
            raw("Zimbabwe", "Africa", Some("ZWL"), 14_862_924),
        ];
        *upstream.rates.lock().unwrap() = RateTable::from([
            ("NGN".to_string(), 1600.0),
            ("GHS".to_string(), 15.0),
        ]);
        upstream
    }

    async fn make_refresher(
        upstream: Arc<ScriptedUpstream>,
    ) -> (Refresher, Arc<CountryStore>, Arc<MemorySummaryCache>, tempfile::TempDir) {
        let (store, dir) = make_store().await;
        let store = Arc::new(store);
        let cache = Arc::new(MemorySummaryCache::new());
        let summary = Arc::new(SummaryGenerator::new(store.clone(), cache.clone()));
        let refresher = Refresher::new(store.clone(), upstream, summary);
        (refresher, store, cache, dir)
    }

    #[tokio::test]
    async fn test_refresh_applies_estimate_policy() {
        let upstream = Arc::new(sample_upstream());
        let (refresher, store, cache, _dir) = make_refresher(upstream).await;

        let outcome = refresher.refresh_countries().await.unwrap();
        assert_eq!(outcome, RefreshOutcome { inserted: 4, updated: 0 });

        let nigeria = store.get("Nigeria").await.unwrap();
        let multiplier = nigeria.estimated_gdp.unwrap() * 1600.0 / 206_139_589.0;
        assert!((999.999..=2000.001).contains(&multiplier));

        let antarctica = store.get("Antarctica").await.unwrap();
        assert_eq!(antarctica.estimated_gdp, Some(0.0));

        let zimbabwe = store.get("Zimbabwe").await.unwrap();
        assert_eq!(zimbabwe.currency_code.as_deref(), Some("ZWL"));
        assert!(zimbabwe.estimated_gdp.is_none());

        assert!(cache.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_second_refresh_overwrites() {
        let upstream = Arc::new(sample_upstream());
        let (refresher, store, _cache, _dir) = make_refresher(upstream.clone()).await;

        refresher.refresh_countries().await.unwrap();
        let first = store.get("Ghana").await.unwrap();

        upstream.countries.lock().unwrap()[1].population = 40_000_000;
        let outcome = refresher.refresh_countries().await.unwrap();
        assert_eq!(outcome, RefreshOutcome { inserted: 0, updated: 4 });

        let second = store.get("Ghana").await.unwrap();
        assert_eq!(second.population, 40_000_000);
        assert!(second.last_refreshed_at >= first.last_refreshed_at);
        assert_eq!(store.status().await.unwrap().total_countries, 4);
    }

    #[tokio::test]
    async fn test_records_share_refresh_timestamp() {
        let upstream = Arc::new(sample_upstream());
        let (refresher, store, _cache, _dir) = make_refresher(upstream).await;
        refresher.refresh_countries().await.unwrap();

        let all = store.list(&Default::default()).await.unwrap();
        let first = all[0].last_refreshed_at;
        assert!(all.iter().all(|c| c.last_refreshed_at == first));
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_store_untouched() {
        let upstream = Arc::new(sample_upstream());
        let (refresher, store, cache, _dir) = make_refresher(upstream.clone()).await;

        upstream.fail_rates.store(true, Ordering::SeqCst);
        let err = refresher.refresh_countries().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamUnavailable {
                provider: UpstreamProvider::ExchangeRates,
                ..
            }
        ));
        assert_eq!(store.status().await.unwrap().total_countries, 0);
        assert!(!cache.exists().await.unwrap());

        upstream.fail_rates.store(false, Ordering::SeqCst);
        refresher.refresh_countries().await.unwrap();
        let before = store.get("Nigeria").await.unwrap();

        upstream.fail_countries.store(true, Ordering::SeqCst);
        let err = refresher.refresh_countries().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamUnavailable {
                provider: UpstreamProvider::Countries,
                ..
            }
        ));
        assert_eq!(store.get("Nigeria").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_failure_mid_cycle_keeps_earlier_rows() {
        let upstream = Arc::new(sample_upstream());
        // Third entry cannot be stored: population does not fit the column
        upstream
            .countries
            .lock()
            .unwrap()
            .insert(2, raw("Overflow", "Nowhere", Some("NGN"), u64::MAX));
        let (refresher, store, cache, _dir) = make_refresher(upstream).await;

        let err = refresher.refresh_countries().await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        assert!(store.get("Nigeria").await.is_ok());
        assert!(store.get("Ghana").await.is_ok());
        assert!(matches!(store.get("Overflow").await, Err(Error::NotFound(_))));
        assert!(matches!(store.get("Antarctica").await, Err(Error::NotFound(_))));
        assert_eq!(store.status().await.unwrap().total_countries, 2);
        assert!(!cache.exists().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_refreshes_both_succeed() {
        for _ in 0..10 {
            let upstream = Arc::new(sample_upstream());
            let (refresher, store, _cache, _dir) = make_refresher(upstream).await;

            let (a, b) = tokio::join!(refresher.refresh_countries(), refresher.refresh_countries());
            let (a, b) = (a.unwrap(), b.unwrap());

            assert_eq!(a.total(), 4);
            assert_eq!(b.total(), 4);
            assert_eq!(a.inserted + b.inserted, 4);
            assert_eq!(store.status().await.unwrap().total_countries, 4);
        }
    }

    #[tokio::test]
    async fn test_periodic_refresh_runs() {
        let upstream = Arc::new(sample_upstream());
        let (refresher, store, _cache, _dir) = make_refresher(upstream.clone()).await;
        let refresher = Arc::new(refresher);

        let handle = refresher.spawn_periodic(Duration::from_millis(20), true);
        let mut waited = 0;
        while upstream.calls.load(Ordering::SeqCst) < 2 && waited < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        handle.abort();

        assert!(upstream.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(store.status().await.unwrap().total_countries, 4);
    }
}
