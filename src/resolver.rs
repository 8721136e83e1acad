//! Coverage lookups for a single coordinate.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::crs::coord_to_wgs84;
use crate::error::{CoverageError, Result};
use crate::models::{BoundaryHit, Coordinate, CoverageResult, NearbySite, RegionHit};
use crate::store::GeoDataStore;

/// Bring a query coordinate into WGS84 and check it is a real position
pub fn normalize(coord: Coordinate) -> Result<Coordinate> {
    let wgs84 = if coord.crs.is_canonical() {
        coord
    } else {
        let c = coord_to_wgs84(coord.to_coord(), coord.crs)
            .map_err(|e| CoverageError::invalid_coordinate(coord.lat, coord.lon, e))?;
        Coordinate::new(c.y, c.x)
    };

    if !wgs84.lat.is_finite() || !wgs84.lon.is_finite() {
        return Err(CoverageError::invalid_coordinate(
            coord.lat,
            coord.lon,
            "coordinate is not a finite number",
        ));
    }
    if !(-90.0..=90.0).contains(&wgs84.lat) {
        return Err(CoverageError::invalid_coordinate(
            coord.lat,
            coord.lon,
            "latitude must be within [-90, 90]",
        ));
    }
    if !(-180.0..=180.0).contains(&wgs84.lon) {
        return Err(CoverageError::invalid_coordinate(
            coord.lat,
            coord.lon,
            "longitude must be within [-180, 180]",
        ));
    }

    Ok(wgs84)
}

/// Which generations cover `coord`, and which administrative unit it is in
pub fn resolve(store: &GeoDataStore, coord: Coordinate) -> Result<CoverageResult> {
    let coordinate = normalize(coord)?;

    let regions: Vec<RegionHit> = store
        .regions_containing(coordinate.lat, coordinate.lon)
        .iter()
        .map(|r| RegionHit::from(&**r))
        .collect();
    let generations: BTreeSet<_> = regions.iter().map(|r| r.generation).collect();
    let boundary = store
        .boundary_containing(coordinate.lat, coordinate.lon)
        .map(|b| BoundaryHit::from(&*b));

    debug!(
        "Resolved ({}, {}): {:?} in {:?}",
        coordinate.lat,
        coordinate.lon,
        generations,
        boundary.as_ref().map(|b| b.name.as_str())
    );

    Ok(CoverageResult {
        coordinate,
        generations,
        regions,
        boundary,
    })
}

/// Shared, read-only lookup service over a loaded store
#[derive(Clone)]
pub struct CoverageResolver {
    store: Arc<GeoDataStore>,
}

impl CoverageResolver {
    pub fn new(store: Arc<GeoDataStore>) -> Self {
        Self { store }
    }

    pub fn resolve(&self, coord: Coordinate) -> Result<CoverageResult> {
        resolve(&self.store, coord)
    }

    /// The `k` nearest coverage sites to `coord`
    pub fn nearby(&self, coord: Coordinate, k: usize) -> Result<Vec<NearbySite>> {
        let coordinate = normalize(coord)?;
        Ok(self.store.nearest_sites(coordinate.lat, coordinate.lon, k))
    }

    /// The underlying store (for stats)
    pub fn store(&self) -> &GeoDataStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{wgs84_to_mercator, Crs};
    use crate::models::{AdminBoundary, CoverageRegion, NetworkGeneration};
    use crate::sites::{buffer_site, TowerSite};
    use geo::{polygon, Coord, MultiPolygon};

    const LAGOS: (f64, f64) = (6.5244, 3.3792);

    fn lagos_state() -> AdminBoundary {
        AdminBoundary {
            geometry: MultiPolygon::new(vec![polygon![
                (x: 2.70, y: 6.37),
                (x: 4.35, y: 6.37),
                (x: 4.35, y: 6.70),
                (x: 2.70, y: 6.70),
            ]]),
            name: "Lagos".to_string(),
            code: Some("NG-LA".to_string()),
        }
    }

    fn lagos_store() -> GeoDataStore {
        let site = TowerSite {
            lat: LAGOS.0,
            lon: LAGOS.1,
            operator: "MTN".to_string(),
            generation: NetworkGeneration::FourG,
            site_id: Some("LAG-001".to_string()),
        };
        let region = CoverageRegion {
            geometry: MultiPolygon::new(vec![buffer_site(&site, 5.0, 64).unwrap()]),
            generation: site.generation,
            site_id: site.site_id.clone(),
            operator: Some(site.operator.clone()),
        };
        GeoDataStore::build(vec![region], vec![lagos_state()])
    }

    #[test]
    fn test_lagos_has_4g() {
        let store = lagos_store();
        let result = resolve(&store, Coordinate::new(LAGOS.0, LAGOS.1)).unwrap();

        assert!(result.has(NetworkGeneration::FourG));
        assert_eq!(result.best_generation(), Some(NetworkGeneration::FourG));
        assert_eq!(result.regions[0].site_id.as_deref(), Some("LAG-001"));
        assert_eq!(result.boundary.as_ref().unwrap().name, "Lagos");
    }

    #[test]
    fn test_gulf_of_guinea_has_nothing() {
        let store = lagos_store();
        let result = resolve(&store, Coordinate::new(0.0, 0.0)).unwrap();

        assert!(result.generations.is_empty());
        assert!(result.regions.is_empty());
        assert!(result.boundary.is_none());
        assert!(!result.is_covered());
    }

    #[test]
    fn test_outside_buffer_but_inside_state() {
        let store = lagos_store();
        // Epe, roughly 60 km east of the site
        let result = resolve(&store, Coordinate::new(6.58, 3.98)).unwrap();
        assert!(!result.is_covered());
        assert_eq!(result.boundary.unwrap().code.as_deref(), Some("NG-LA"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let store = lagos_store();
        let coord = Coordinate::new(6.53, 3.38);
        let first = resolve(&store, coord).unwrap();
        for _ in 0..5 {
            assert_eq!(resolve(&store, coord).unwrap(), first);
        }
    }

    #[test]
    fn test_out_of_range_leaves_store_usable() {
        let store = lagos_store();

        for (lat, lon) in [(90.5, 3.0), (-91.0, 3.0), (6.5, 180.1), (6.5, -200.0)] {
            let err = resolve(&store, Coordinate::new(lat, lon)).unwrap_err();
            assert!(matches!(err, CoverageError::InvalidCoordinate { .. }));
        }
        let err = resolve(&store, Coordinate::new(f64::NAN, 3.0)).unwrap_err();
        assert!(err.is_query_error());

        assert_eq!(store.region_count(), 1);
        assert_eq!(store.boundary_count(), 1);
        assert!(resolve(&store, Coordinate::new(LAGOS.0, LAGOS.1))
            .unwrap()
            .is_covered());
    }

    #[test]
    fn test_range_edges_are_valid() {
        let store = lagos_store();
        assert!(resolve(&store, Coordinate::new(90.0, 180.0)).is_ok());
        assert!(resolve(&store, Coordinate::new(-90.0, -180.0)).is_ok());
    }

    #[test]
    fn test_projected_query_is_reprojected() {
        let store = lagos_store();
        let metres = wgs84_to_mercator(Coord {
            x: LAGOS.1,
            y: LAGOS.0,
        });
        let coord = Coordinate::with_crs(metres.y, metres.x, Crs::WebMercator);

        let result = resolve(&store, coord).unwrap();
        assert!(result.has(NetworkGeneration::FourG));
        assert!((result.coordinate.lat - LAGOS.0).abs() < 1e-9);
        assert_eq!(result.coordinate.crs, Crs::Wgs84);
    }

    #[test]
    fn test_mercator_boundaries_answer_like_wgs84() {
        use crate::config::Schema;
        use geojson::GeoJson;
        use serde_json::{json, Value};

        // Ogun overlaps Lagos along its northern strip
        let states = [
            ("Ogun", [(2.70, 6.60), (4.60, 6.60), (4.60, 7.95), (2.70, 7.95)]),
            ("Lagos", [(2.70, 6.37), (4.35, 6.37), (4.35, 6.70), (2.70, 6.70)]),
        ];

        let boundaries = |project: fn(Coord<f64>) -> Coord<f64>, crs: Option<&str>| {
            let features: Vec<Value> = states
                .iter()
                .map(|(name, corners)| {
                    let mut ring: Vec<[f64; 2]> = corners
                        .iter()
                        .map(|&(x, y)| {
                            let c = project(Coord { x, y });
                            [c.x, c.y]
                        })
                        .collect();
                    ring.push(ring[0]);
                    json!({
                        "type": "Feature",
                        "properties": { "name": name },
                        "geometry": { "type": "Polygon", "coordinates": [ring] }
                    })
                })
                .collect();

            let mut collection = json!({ "type": "FeatureCollection", "features": features });
            if let Some(name) = crs {
                collection["crs"] = json!({ "type": "name", "properties": { "name": name } });
            }
            GeoJson::from_json_value(collection).unwrap()
        };
        let coverage = || {
            GeoJson::from_json_value(json!({
                "type": "Feature",
                "properties": { "generation": "3G" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[3.3, 6.4], [3.5, 6.4], [3.5, 6.6], [3.3, 6.6], [3.3, 6.4]]]
                }
            }))
            .unwrap()
        };

        let wgs84 = GeoDataStore::from_geojson(
            coverage(),
            boundaries(|c| c, None),
            &Schema::default(),
        )
        .unwrap();
        let mercator = GeoDataStore::from_geojson(
            coverage(),
            boundaries(wgs84_to_mercator, Some("EPSG:3857")),
            &Schema::default(),
        )
        .unwrap();

        // Lagos only, the overlap, Ogun only, the sea
        let points = [(6.45, 3.40), (6.65, 3.40), (7.20, 3.35), (4.00, 3.40)];
        for (lat, lon) in points {
            let expected = resolve(&wgs84, Coordinate::new(lat, lon)).unwrap();
            let actual = resolve(&mercator, Coordinate::new(lat, lon)).unwrap();
            assert_eq!(actual.boundary, expected.boundary, "at ({lat}, {lon})");
        }

        let overlap = resolve(&mercator, Coordinate::new(6.65, 3.40)).unwrap();
        assert_eq!(overlap.boundary.unwrap().name, "Ogun");
    }

    #[test]
    fn test_resolver_handle() {
        let resolver = CoverageResolver::new(Arc::new(lagos_store()));
        let nearby = resolver.nearby(Coordinate::new(6.6, 3.4), 5).unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].region.generation, NetworkGeneration::FourG);
        assert!(resolver.nearby(Coordinate::new(100.0, 3.4), 5).is_err());
        assert!(resolver.resolve(Coordinate::new(LAGOS.0, LAGOS.1)).is_ok());
    }
}
