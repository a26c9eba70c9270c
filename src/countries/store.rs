//! Country record store backed by a relational table
//!
//! Uses the sqlx `Any` driver so the same queries run against MySQL in
//! production and SQLite for local use and tests. Timestamps are stored as
//! fixed-width RFC 3339 UTC strings so that `MAX()` over the column is the
//! latest refresh.

use crate::config::DatabaseConfig;
use crate::countries::types::{CountryFilter, CountryRecord, SortOrder, StoreStatus};
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::time::Duration;

// Text comparisons follow the backend collation: MySQL's default utf8mb4
// collation makes the `name` key and the region/currency filters case- and
// accent-insensitive, SQLite compares bytes exactly.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS countries (
    name              VARCHAR(255) NOT NULL PRIMARY KEY,
    capital           VARCHAR(255) NULL,
    region            VARCHAR(255) NULL,
    population        BIGINT       NOT NULL,
    currency_code     VARCHAR(16)  NULL,
    exchange_rate     DOUBLE       NULL,
    estimated_gdp     DOUBLE       NULL,
    flag_url          VARCHAR(512) NULL,
    last_refreshed_at VARCHAR(64)  NOT NULL
)
"#;

const SELECT_COLUMNS: &str = "SELECT
    name,
    capital,
    region,
    population,
    currency_code,
    exchange_rate,
    estimated_gdp,
    flag_url,
    last_refreshed_at
FROM countries";

/// Whether an upsert created or overwrote a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Persistent table of country records, keyed by name
#[derive(Debug, Clone)]
pub struct CountryStore {
    pool: AnyPool,
}

impl CountryStore {
    /// Connect using the configured connection parameters, retrying while
    /// the database comes up.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.connection_url()?;
        let attempts = config.connect_retries.max(1);
        let delay = Duration::from_millis(config.retry_delay_ms);

        let mut attempt = 1;
        loop {
            match Self::connect_url(&url, config.max_connections).await {
                Ok(store) => return Ok(store),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Database connection failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Connect to a database URL (`mysql://…` or `sqlite://…`)
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Create the `countries` table if it does not exist
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert the record, or overwrite every field of the row with the same name
    pub async fn upsert(&self, record: &CountryRecord) -> Result<UpsertOutcome> {
        let population = i64::try_from(record.population).map_err(|_| {
            Error::Internal(format!("population out of range for {}", record.name))
        })?;
        let refreshed_at = encode_timestamp(&record.last_refreshed_at);

        let existing = sqlx::query("SELECT name FROM countries WHERE name = ?")
            .bind(record.name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            self.update_row(record, population, &refreshed_at).await?;
            return Ok(UpsertOutcome::Updated);
        }

        match self.insert_row(record, population, &refreshed_at).await {
            Ok(()) => Ok(UpsertOutcome::Inserted),
            // Another refresh inserted the same name between the SELECT and the INSERT
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(name = %record.name, "Row inserted concurrently, updating instead");
                self.update_row(record, population, &refreshed_at).await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_row(
        &self,
        record: &CountryRecord,
        population: i64,
        refreshed_at: &str,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE countries
             SET
                capital = ?,
                region = ?,
                population = ?,
                currency_code = ?,
                exchange_rate = ?,
                estimated_gdp = ?,
                flag_url = ?,
                last_refreshed_at = ?
             WHERE name = ?",
        )
        .bind(record.capital.clone())
        .bind(record.region.clone())
        .bind(population)
        .bind(record.currency_code.clone())
        .bind(record.exchange_rate)
        .bind(record.estimated_gdp)
        .bind(record.flag_url.clone())
        .bind(refreshed_at)
        .bind(record.name.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_row(
        &self,
        record: &CountryRecord,
        population: i64,
        refreshed_at: &str,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO countries (
                name,
                capital,
                region,
                population,
                currency_code,
                exchange_rate,
                estimated_gdp,
                flag_url,
                last_refreshed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.name.as_str())
        .bind(record.capital.clone())
        .bind(record.region.clone())
        .bind(population)
        .bind(record.currency_code.clone())
        .bind(record.exchange_rate)
        .bind(record.estimated_gdp)
        .bind(record.flag_url.clone())
        .bind(refreshed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List records matching every present filter
    pub async fn list(&self, filter: &CountryFilter) -> Result<Vec<CountryRecord>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1 = 1");
        if filter.region.is_some() {
            sql.push_str(" AND region = ?");
        }
        if filter.currency.is_some() {
            sql.push_str(" AND currency_code = ?");
        }
        match filter.sort {
            // NULL sorts lowest on both MySQL and SQLite, so nulls land last
            Some(SortOrder::GdpDesc) => sql.push_str(" ORDER BY estimated_gdp DESC"),
            None => {}
        }

        let mut query = sqlx::query(&sql);
        if let Some(region) = &filter.region {
            query = query.bind(region.as_str());
        }
        if let Some(currency) = &filter.currency {
            query = query.bind(currency.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Get a record by exact name
    pub async fn get(&self, name: &str) -> Result<CountryRecord> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Delete a record by exact name
    pub async fn delete(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM countries WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// Highest estimated GDP first, null counted as zero, ties by name
    pub async fn top_by_gdp(&self, limit: u32) -> Result<Vec<CountryRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY COALESCE(estimated_gdp, 0) DESC, name ASC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Record count and latest refresh time
    pub async fn status(&self) -> Result<StoreStatus> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, MAX(last_refreshed_at) AS last FROM countries",
        )
        .fetch_one(&self.pool)
        .await?;

        let total_countries: i64 = row.try_get("total")?;
        let last: Option<String> = row.try_get("last")?;
        let last_refreshed_at = last.as_deref().map(decode_timestamp).transpose()?;

        Ok(StoreStatus {
            total_countries,
            last_refreshed_at,
        })
    }
}

fn record_from_row(row: &AnyRow) -> Result<CountryRecord> {
    let name: String = row.try_get("name")?;
    let population: i64 = row.try_get("population")?;
    let population = u64::try_from(population).map_err(|_| {
        Error::Internal(format!("negative population stored for {}", name))
    })?;
    let refreshed_at: String = row.try_get("last_refreshed_at")?;

    Ok(CountryRecord {
        capital: row.try_get("capital")?,
        region: row.try_get("region")?,
        population,
        currency_code: row.try_get("currency_code")?,
        exchange_rate: row.try_get("exchange_rate")?,
        estimated_gdp: row.try_get("estimated_gdp")?,
        flag_url: row.try_get("flag_url")?,
        last_refreshed_at: decode_timestamp(&refreshed_at)?,
        name,
    })
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid stored timestamp {:?}: {}", raw, e)))
}
