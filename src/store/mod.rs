//! Time-series data model and the in-memory store.

pub mod series;
pub mod types;

pub use series::{CampusSnapshot, TimeSeriesStore};
pub use types::{CampusId, ConsumptionRecord, Resource, ResourceTriple, SeriesPoint};
