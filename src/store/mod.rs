//! In-memory geometry store for coverage and administrative boundaries.
//!
//! Both datasets are read once, reprojected to WGS84 and indexed in
//! R-trees. After construction the store is read-only and can be shared
//! across threads without locking.

mod index;
mod loader;

pub use index::{IndexedGeometry, PolygonIndex};
pub use loader::{read_admin_boundaries, read_coverage_regions, read_geojson};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use geo::{Centroid, Distance, Haversine, Point};
use geojson::GeoJson;
use hashbrown::HashMap;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::{debug, info};

use crate::config::Schema;
use crate::error::{CoverageError, Dataset, Result};
use crate::models::{
    AdminBoundary, BoundaryDensity, BoundaryHit, CoverageRegion, GenerationCounts, GridCell,
    NearbySite, NetworkGeneration, RegionHit,
};

/// Smallest accepted grid cell, roughly 1 km at the equator
pub const MIN_GRID_CELL_DEG: f64 = 0.01;

/// Site position of a coverage region, keyed by its position in the index
type SitePoint = GeomWithData<[f64; 2], usize>;

/// Loaded, WGS84-normalized coverage and boundary datasets
pub struct GeoDataStore {
    regions: PolygonIndex<CoverageRegion>,
    boundaries: PolygonIndex<AdminBoundary>,
    sites: RTree<SitePoint>,
}

impl GeoDataStore {
    /// Load both datasets with the default attribute schema
    pub fn load(coverage: impl AsRef<Path>, boundaries: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_schema(coverage, boundaries, &Schema::default())
    }

    pub fn load_with_schema(
        coverage: impl AsRef<Path>,
        boundaries: impl AsRef<Path>,
        schema: &Schema,
    ) -> Result<Self> {
        let coverage = coverage.as_ref();
        let boundaries = boundaries.as_ref();

        info!("Loading coverage dataset from {}", coverage.display());
        let coverage_doc = read_geojson(coverage, Dataset::Coverage)?;
        let regions = read_coverage_regions(coverage_doc, &coverage.display().to_string(), schema)?;

        info!("Loading boundary dataset from {}", boundaries.display());
        let boundary_doc = read_geojson(boundaries, Dataset::Boundaries)?;
        let admin =
            read_admin_boundaries(boundary_doc, &boundaries.display().to_string(), schema)?;

        Ok(Self::build(regions, admin))
    }

    /// Build from already parsed GeoJSON documents
    pub fn from_geojson(coverage: GeoJson, boundaries: GeoJson, schema: &Schema) -> Result<Self> {
        let regions = read_coverage_regions(coverage, "<coverage>", schema)?;
        let admin = read_admin_boundaries(boundaries, "<boundaries>", schema)?;
        Ok(Self::build(regions, admin))
    }

    /// Index records that are already in WGS84
    pub fn build(regions: Vec<CoverageRegion>, boundaries: Vec<AdminBoundary>) -> Self {
        info!(
            "Building spatial index for {} coverage regions and {} boundaries...",
            regions.len(),
            boundaries.len()
        );

        let regions = PolygonIndex::build(regions);
        let boundaries = PolygonIndex::build(boundaries);

        let sites = RTree::bulk_load(
            regions
                .iter()
                .enumerate()
                .filter_map(|(ordinal, region)| {
                    region
                        .geometry
                        .centroid()
                        .map(|c| SitePoint::new([c.x(), c.y()], ordinal))
                })
                .collect(),
        );

        let mut per_generation: HashMap<NetworkGeneration, usize> = HashMap::new();
        for region in regions.iter() {
            *per_generation.entry(region.generation).or_default() += 1;
        }

        info!(
            "Spatial index built with {} regions, {} boundaries",
            regions.len(),
            boundaries.len()
        );
        for generation in NetworkGeneration::all() {
            info!(
                "  {}: {} regions",
                generation,
                per_generation.get(generation).copied().unwrap_or(0)
            );
        }

        Self {
            regions,
            boundaries,
            sites,
        }
    }

    /// Every coverage region containing the WGS84 point, in dataset order.
    /// Points on a polygon edge count as contained.
    pub fn regions_containing(&self, lat: f64, lon: f64) -> Vec<Arc<CoverageRegion>> {
        let regions = self.regions.lookup(lon, lat);
        debug!(
            "Coverage lookup at ({}, {}): {} regions",
            lat,
            lon,
            regions.len()
        );
        regions
    }

    /// The first boundary in dataset order containing the WGS84 point
    pub fn boundary_containing(&self, lat: f64, lon: f64) -> Option<Arc<AdminBoundary>> {
        self.boundaries.first(lon, lat)
    }

    /// The `k` coverage sites nearest to the WGS84 point by great-circle
    /// distance, nearest first. Site position is the region centroid.
    pub fn nearest_sites(&self, lat: f64, lon: f64, k: usize) -> Vec<NearbySite> {
        if k == 0 {
            return Vec::new();
        }

        let origin = Point::new(lon, lat);

        // The tree ranks in planar degrees; over-fetch and re-rank on the sphere
        let mut candidates: Vec<(f64, usize, [f64; 2])> = self
            .sites
            .nearest_neighbor_iter(&[lon, lat])
            .take(k.saturating_mul(4).saturating_add(8))
            .map(|site| {
                let [x, y] = *site.geom();
                let meters = Haversine.distance(origin, Point::new(x, y));
                (meters, site.data, [x, y])
            })
            .collect();

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(k);

        candidates
            .into_iter()
            .filter_map(|(meters, position, [x, y])| {
                let region = self.regions.get(position)?;
                Some(NearbySite {
                    region: RegionHit::from(&**region),
                    lat: y,
                    lon: x,
                    distance_km: meters / 1000.0,
                })
            })
            .collect()
    }

    /// Site counts per administrative boundary, in boundary dataset order.
    /// Each site is counted once, in the first boundary containing its
    /// position. Boundaries without sites are listed with zero counts.
    pub fn density_by_boundary(&self) -> Vec<BoundaryDensity> {
        let mut density: Vec<BoundaryDensity> = self
            .boundaries
            .iter()
            .map(|boundary| BoundaryDensity {
                boundary: BoundaryHit::from(&**boundary),
                counts: GenerationCounts::default(),
            })
            .collect();

        let mut outside = 0usize;
        for (position, [lon, lat]) in self.site_positions() {
            let Some(region) = self.regions.get(position) else {
                continue;
            };
            match self.boundaries.first_position(lon, lat) {
                Some(b) => density[b].counts.add(region.generation),
                None => outside += 1,
            }
        }

        debug!(
            "Density over {} boundaries ({} sites outside every boundary)",
            density.len(),
            outside
        );
        density
    }

    /// Site counts per square cell of `cell_deg` degrees, for cells holding
    /// at least one site. Cells come back south to north, then west to east.
    pub fn density_grid(&self, cell_deg: f64) -> Result<Vec<GridCell>> {
        if !(cell_deg.is_finite() && cell_deg >= MIN_GRID_CELL_DEG) {
            return Err(CoverageError::invalid_parameter(
                "grid cell size",
                cell_deg,
                format!("must be at least {MIN_GRID_CELL_DEG} degrees"),
            ));
        }

        let mut cells: BTreeMap<(i64, i64), GenerationCounts> = BTreeMap::new();
        for (position, [lon, lat]) in self.site_positions() {
            let Some(region) = self.regions.get(position) else {
                continue;
            };
            let key = ((lat / cell_deg).floor() as i64, (lon / cell_deg).floor() as i64);
            cells.entry(key).or_default().add(region.generation);
        }

        Ok(cells
            .into_iter()
            .map(|((row, col), counts)| GridCell {
                min_lat: row as f64 * cell_deg,
                min_lon: col as f64 * cell_deg,
                size_deg: cell_deg,
                counts,
            })
            .collect())
    }

    /// Region position and [lon, lat] of every indexed site
    fn site_positions(&self) -> impl Iterator<Item = (usize, [f64; 2])> + '_ {
        self.sites.iter().map(|site| (site.data, *site.geom()))
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Arc<CoverageRegion>> {
        self.regions.iter()
    }

    pub fn boundaries(&self) -> impl Iterator<Item = &Arc<AdminBoundary>> {
        self.boundaries.iter()
    }
}
