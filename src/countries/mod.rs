//! Countries module: merged country records and their query API
//!
//! Records live in a relational `countries` table keyed by name and are
//! served through REST endpoints under `/countries`, plus `/status`.

pub mod handler;
pub mod store;
pub mod types;

pub use handler::{countries_router, CountriesState};
pub use store::{CountryStore, UpsertOutcome};
pub use types::{CountryFilter, CountryRecord, RefreshResponse, SortOrder, StoreStatus};
