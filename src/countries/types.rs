//! Country record and query types
//!
//! Wire types use snake_case JSON field names, matching the table columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A merged country record as stored and served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: u64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Ordering applied to a country listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Highest estimated GDP first, nulls last
    GdpDesc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gdp_desc" => Ok(Self::GdpDesc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Filters for listing countries; all present filters must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryFilter {
    /// Exact region match
    pub region: Option<String>,
    /// Exact currency code match
    pub currency: Option<String>,
    /// Ordering; `None` keeps storage order
    pub sort: Option<SortOrder>,
}

/// Count and freshness of the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub total_countries: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Body of a successful refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub count: usize,
}
