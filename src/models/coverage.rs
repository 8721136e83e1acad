//! Stored regions and per-query result types.

use std::collections::BTreeSet;

use geo::{BoundingRect, Coord, MultiPolygon};
use serde::{Deserialize, Serialize};

use super::NetworkGeneration;
use crate::crs::Crs;

/// Buffered service area of one generation at one site
#[derive(Debug, Clone)]
pub struct CoverageRegion {
    /// Always WGS84 once loaded
    pub geometry: MultiPolygon<f64>,
    pub generation: NetworkGeneration,
    pub site_id: Option<String>,
    pub operator: Option<String>,
}

/// A named administrative unit (state)
#[derive(Debug, Clone)]
pub struct AdminBoundary {
    /// Always WGS84 once loaded
    pub geometry: MultiPolygon<f64>,
    pub name: String,
    pub code: Option<String>,
}

/// Shared access to the geometry of indexed records
pub trait Footprint {
    fn geometry(&self) -> &MultiPolygon<f64>;

    /// Bounding box as (min_x, min_y, max_x, max_y)
    fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry()
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

impl Footprint for CoverageRegion {
    fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }
}

impl Footprint for AdminBoundary {
    fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }
}

/// A query position. For projected CRSs `lat` holds the northing and `lon`
/// the easting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip, default)]
    pub crs: Crs,
}

impl Coordinate {
    /// WGS84 latitude/longitude, as a GPS reports it
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            crs: Crs::Wgs84,
        }
    }

    pub fn with_crs(lat: f64, lon: f64, crs: Crs) -> Self {
        Self { lat, lon, crs }
    }

    /// x/y in lon/lat order, as geo expects
    pub fn to_coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// One coverage region that contains the query point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionHit {
    pub generation: NetworkGeneration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl From<&CoverageRegion> for RegionHit {
    fn from(region: &CoverageRegion) -> Self {
        Self {
            generation: region.generation,
            site_id: region.site_id.clone(),
            operator: region.operator.clone(),
        }
    }
}

/// The administrative unit that contains the query point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryHit {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<&AdminBoundary> for BoundaryHit {
    fn from(boundary: &AdminBoundary) -> Self {
        Self {
            name: boundary.name.clone(),
            code: boundary.code.clone(),
        }
    }
}

/// Answer to a single coverage query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageResult {
    /// The query point, normalized to WGS84
    pub coordinate: Coordinate,
    pub generations: BTreeSet<NetworkGeneration>,
    /// Matching regions in dataset order
    pub regions: Vec<RegionHit>,
    pub boundary: Option<BoundaryHit>,
}

impl CoverageResult {
    pub fn is_covered(&self) -> bool {
        !self.generations.is_empty()
    }

    pub fn best_generation(&self) -> Option<NetworkGeneration> {
        self.generations.iter().next_back().copied()
    }

    pub fn has(&self, generation: NetworkGeneration) -> bool {
        self.generations.contains(&generation)
    }
}

/// A coverage site ranked by distance from a query point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbySite {
    #[serde(flatten)]
    pub region: RegionHit,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_best_generation() {
        let mut result = CoverageResult {
            coordinate: Coordinate::new(6.5, 3.4),
            generations: BTreeSet::new(),
            regions: vec![],
            boundary: None,
        };
        assert!(!result.is_covered());
        assert_eq!(result.best_generation(), None);

        result.generations.insert(NetworkGeneration::ThreeG);
        result.generations.insert(NetworkGeneration::TwoG);
        assert!(result.is_covered());
        assert_eq!(result.best_generation(), Some(NetworkGeneration::ThreeG));
        assert!(!result.has(NetworkGeneration::FourG));
    }

    #[test]
    fn test_footprint_bbox() {
        let boundary = AdminBoundary {
            geometry: MultiPolygon::new(vec![polygon![
                (x: 2.7, y: 6.37),
                (x: 4.35, y: 6.37),
                (x: 4.35, y: 6.7),
                (x: 2.7, y: 6.7),
            ]]),
            name: "Lagos".to_string(),
            code: Some("NG-LA".to_string()),
        };
        assert_eq!(boundary.bbox(), Some((2.7, 6.37, 4.35, 6.7)));
    }

    #[test]
    fn test_result_serializes_labels() {
        let result = CoverageResult {
            coordinate: Coordinate::new(6.5244, 3.3792),
            generations: [NetworkGeneration::FourG].into_iter().collect(),
            regions: vec![RegionHit {
                generation: NetworkGeneration::FourG,
                site_id: Some("LAG-001".to_string()),
                operator: None,
            }],
            boundary: Some(BoundaryHit {
                name: "Lagos".to_string(),
                code: None,
            }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["generations"], serde_json::json!(["4G"]));
        assert_eq!(json["regions"][0]["site_id"], "LAG-001");
        assert_eq!(json["boundary"]["name"], "Lagos");
        assert!(json["regions"][0].get("operator").is_none());
    }
}
