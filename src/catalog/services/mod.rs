//! Catalog publication service.

mod aggregator;

pub use aggregator::{CatalogAggregator, CatalogError, CatalogResult};
