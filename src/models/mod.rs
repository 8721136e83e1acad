//! Core data models for coverage lookups.

pub mod coverage;
pub mod density;
pub mod generation;

pub use coverage::{
    AdminBoundary, BoundaryHit, Coordinate, CoverageRegion, CoverageResult, Footprint, NearbySite,
    RegionHit,
};
pub use density::{BoundaryDensity, GenerationCounts, GridCell};
pub use generation::{NetworkGeneration, UnknownGeneration};
