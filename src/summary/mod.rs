//! Summary image of the record store
//!
//! After every refresh the store is condensed into a few lines of text
//! (total count, top five by estimated GDP, latest refresh time) and rendered
//! into a 600×300 PNG held in a [`SummaryCache`] slot.

mod cache;
mod render;

pub use cache::{FsSummaryCache, MemorySummaryCache, SummaryCache};
pub use render::{render_lines, IMAGE_HEIGHT, IMAGE_WIDTH};

use crate::countries::CountryStore;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

/// Number of countries listed in the summary
pub const TOP_N: u32 = 5;

/// One line of the top-N ranking
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCountry {
    pub name: String,
    /// Estimated GDP with null counted as zero
    pub estimated_gdp: f64,
}

/// Aggregate statistics encoded in the summary image
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub total_countries: i64,
    pub top: Vec<RankedCountry>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl SummaryStats {
    /// Text lines in render order
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.top.len() + 3);
        lines.push(format!("Total Countries: {}", self.total_countries));
        lines.push(format!("Top {} by GDP:", TOP_N));
        for (i, country) in self.top.iter().enumerate() {
            lines.push(format!(
                "{}. {}: {:.2}",
                i + 1,
                country.name,
                country.estimated_gdp
            ));
        }
        let last = self
            .last_refreshed_at
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "never".to_string());
        lines.push(format!("Last Refresh: {}", last));
        lines
    }
}

/// Computes summary statistics and writes the rendered image to the cache
pub struct SummaryGenerator {
    store: Arc<CountryStore>,
    cache: Arc<dyn SummaryCache>,
}

impl SummaryGenerator {
    pub fn new(store: Arc<CountryStore>, cache: Arc<dyn SummaryCache>) -> Self {
        Self { store, cache }
    }

    /// Read the current statistics from the store
    pub async fn stats(&self) -> Result<SummaryStats> {
        let status = self.store.status().await?;
        let top = self
            .store
            .top_by_gdp(TOP_N)
            .await?
            .into_iter()
            .map(|c| RankedCountry {
                name: c.name,
                estimated_gdp: c.estimated_gdp.unwrap_or(0.0),
            })
            .collect();

        Ok(SummaryStats {
            total_countries: status.total_countries,
            top,
            last_refreshed_at: status.last_refreshed_at,
        })
    }

    /// Recompute, render and replace the cached summary image
    pub async fn regenerate(&self) -> Result<SummaryStats> {
        let stats = self.stats().await?;
        let png = render_lines(&stats.lines())?;
        self.cache.put(png).await?;

        tracing::info!(
            total_countries = stats.total_countries,
            "Summary image generated"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countries::store::tests::{make_store, record};
    use chrono::TimeZone;

    #[test]
    fn test_lines_layout() {
        let stats = SummaryStats {
            total_countries: 2,
            top: vec![
                RankedCountry {
                    name: "China".to_string(),
                    estimated_gdp: 12_345.678,
                },
                RankedCountry {
                    name: "Chad".to_string(),
                    estimated_gdp: 0.0,
                },
            ],
            last_refreshed_at: Some(Utc.with_ymd_and_hms(2025, 10, 22, 18, 5, 9).unwrap()),
        };

        assert_eq!(
            stats.lines(),
            vec![
                "Total Countries: 2",
                "Top 5 by GDP:",
                "1. China: 12345.68",
                "2. Chad: 0.00",
                "Last Refresh: 2025-10-22T18:05:09Z",
            ]
        );
    }

    #[test]
    fn test_lines_before_any_refresh() {
        let stats = SummaryStats {
            total_countries: 0,
            top: vec![],
            last_refreshed_at: None,
        };
        assert_eq!(
            stats.lines(),
            vec!["Total Countries: 0", "Top 5 by GDP:", "Last Refresh: never"]
        );
    }

    #[tokio::test]
    async fn test_regenerate_writes_image_with_top_five() {
        let (store, _dir) = make_store().await;
        let store = Arc::new(store);
        for (i, name) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
            let gdp = if *name == "G" { None } else { Some(i as f64 * 10.0) };
            store
                .upsert(&record(name, "X", Some("CUR"), gdp))
                .await
                .unwrap();
        }

        let cache = Arc::new(MemorySummaryCache::new());
        let generator = SummaryGenerator::new(store, cache.clone());
        let stats = generator.regenerate().await.unwrap();

        assert_eq!(stats.total_countries, 7);
        let names: Vec<_> = stats.top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["F", "E", "D", "C", "B"]);
        assert!(stats.last_refreshed_at.is_some());

        let png = cache.get().await.unwrap().unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), IMAGE_WIDTH);
        assert_eq!(img.height(), IMAGE_HEIGHT);
    }
}
