//! netcover - mobile network coverage lookup for Nigeria
//!
//! This library loads buffered tower-coverage polygons and administrative
//! boundaries into an in-memory spatial index and answers which network
//! generations (2G/3G/4G) cover a coordinate. It is shared by the ingest and
//! query binaries.

pub mod config;
pub mod crs;
pub mod error;
pub mod models;
pub mod resolver;
pub mod sites;
pub mod store;

pub use error::{CoverageError, Dataset};
pub use models::{AdminBoundary, Coordinate, CoverageRegion, CoverageResult, NetworkGeneration};
pub use resolver::{resolve, CoverageResolver};
pub use store::GeoDataStore;
