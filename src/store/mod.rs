pub mod catalog;

pub use catalog::{Catalog, CatalogSummary, SegmentStats};
