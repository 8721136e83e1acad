//! Coordinate reference system detection and reprojection to WGS84.
//!
//! Datasets may declare a CRS through the legacy GeoJSON `crs` member.
//! Everything is brought into WGS84 (EPSG:4326, lon/lat order) before it is
//! indexed. Web Mercator is inverted analytically; other EPSG codes need the
//! `proj` feature.

use std::f64::consts::FRAC_PI_4;
use std::fmt;

use geo::{Coord, MapCoords, MultiPolygon};
use geojson::JsonObject;
use thiserror::Error;

/// Semi-major axis used by spherical (Web) Mercator
pub const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Crs {
    /// EPSG:4326 / OGC CRS84, the canonical system
    #[default]
    Wgs84,
    /// EPSG:3857 and its historical aliases
    WebMercator,
    /// Any other EPSG code
    Epsg(u32),
}

#[derive(Debug, Error)]
pub enum CrsError {
    #[error("malformed CRS definition: {0}")]
    Malformed(String),

    #[error("unsupported CRS {0}")]
    Unsupported(Crs),

    #[error("reprojection from {crs} failed: {reason}")]
    Transform { crs: Crs, reason: String },
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg_code())
    }
}

impl Crs {
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 => Crs::Wgs84,
            3857 | 900913 | 3785 | 102100 | 102113 => Crs::WebMercator,
            other => Crs::Epsg(other),
        }
    }

    pub fn epsg_code(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Epsg(code) => *code,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    /// Parse a CRS name such as `EPSG:3857`, `urn:ogc:def:crs:EPSG::3857`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` or a bare EPSG code.
    pub fn parse(name: &str) -> Result<Self, CrsError> {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Crs::Wgs84);
        }

        let code = if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            // Optional version between the colons: EPSG::3857 or EPSG:6.6:3857
            rest.rsplit(':').next().unwrap_or(rest)
        } else if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else {
            upper.as_str()
        };

        code.trim()
            .parse::<u32>()
            .map(Crs::from_epsg)
            .map_err(|_| CrsError::Malformed(trimmed.to_string()))
    }

    /// Read the legacy `crs` member of a GeoJSON object.
    ///
    /// A missing or null member means WGS84, as RFC 7946 mandates.
    pub fn from_geojson_member(members: Option<&JsonObject>) -> Result<Self, CrsError> {
        let crs = match members.and_then(|m| m.get("crs")) {
            Some(crs) if !crs.is_null() => crs,
            _ => return Ok(Crs::Wgs84),
        };

        let kind = crs
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| CrsError::Malformed(crs.to_string()))?;
        let properties = crs
            .get("properties")
            .ok_or_else(|| CrsError::Malformed(crs.to_string()))?;

        match kind.to_ascii_lowercase().as_str() {
            "name" => {
                let name = properties
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| CrsError::Malformed(crs.to_string()))?;
                Crs::parse(name)
            }
            "epsg" => properties
                .get("code")
                .and_then(|c| c.as_u64())
                .and_then(|c| u32::try_from(c).ok())
                .map(Crs::from_epsg)
                .ok_or_else(|| CrsError::Malformed(crs.to_string())),
            other => Err(CrsError::Malformed(format!("unknown crs type `{other}`"))),
        }
    }
}

/// Converts coordinates from one source CRS into WGS84
pub struct Reprojector {
    from: Crs,
    #[cfg(feature = "proj")]
    proj: Option<proj::Proj>,
}

impl Reprojector {
    pub fn new(from: Crs) -> Result<Self, CrsError> {
        match from {
            Crs::Wgs84 | Crs::WebMercator => Ok(Self {
                from,
                #[cfg(feature = "proj")]
                proj: None,
            }),
            #[cfg(feature = "proj")]
            Crs::Epsg(code) => {
                let proj = proj::Proj::new_known_crs(&format!("EPSG:{code}"), "EPSG:4326", None)
                    .map_err(|e| CrsError::Transform {
                        crs: from,
                        reason: e.to_string(),
                    })?;
                Ok(Self {
                    from,
                    proj: Some(proj),
                })
            }
            #[cfg(not(feature = "proj"))]
            Crs::Epsg(_) => Err(CrsError::Unsupported(from)),
        }
    }

    pub fn source(&self) -> Crs {
        self.from
    }

    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, CrsError> {
        let out = match self.from {
            Crs::Wgs84 => return Ok(coord),
            Crs::WebMercator => mercator_to_wgs84(coord),
            Crs::Epsg(_) => self.convert_external(coord)?,
        };

        if out.x.is_finite() && out.y.is_finite() {
            Ok(out)
        } else {
            Err(CrsError::Transform {
                crs: self.from,
                reason: format!("({}, {}) has no WGS84 position", coord.x, coord.y),
            })
        }
    }

    /// Reproject a whole geometry. WGS84 input is returned untouched.
    pub fn multi_polygon(&self, geometry: MultiPolygon<f64>) -> Result<MultiPolygon<f64>, CrsError> {
        if self.from.is_canonical() {
            return Ok(geometry);
        }
        geometry.try_map_coords(|c| self.coord(c))
    }

    #[cfg(feature = "proj")]
    fn convert_external(&self, coord: Coord<f64>) -> Result<Coord<f64>, CrsError> {
        let proj = self.proj.as_ref().ok_or(CrsError::Unsupported(self.from))?;
        proj.convert((coord.x, coord.y))
            .map(|(x, y)| Coord { x, y })
            .map_err(|e| CrsError::Transform {
                crs: self.from,
                reason: e.to_string(),
            })
    }

    #[cfg(not(feature = "proj"))]
    fn convert_external(&self, _coord: Coord<f64>) -> Result<Coord<f64>, CrsError> {
        Err(CrsError::Unsupported(self.from))
    }
}

/// Reproject a single coordinate into WGS84
pub fn coord_to_wgs84(coord: Coord<f64>, from: Crs) -> Result<Coord<f64>, CrsError> {
    Reprojector::new(from)?.coord(coord)
}

/// Reproject a geometry into WGS84
pub fn to_wgs84(geometry: MultiPolygon<f64>, from: Crs) -> Result<MultiPolygon<f64>, CrsError> {
    Reprojector::new(from)?.multi_polygon(geometry)
}

/// Inverse spherical Mercator: metres to lon/lat degrees
pub fn mercator_to_wgs84(coord: Coord<f64>) -> Coord<f64> {
    let lon = (coord.x / MERCATOR_RADIUS_M).to_degrees();
    let lat = (2.0 * (coord.y / MERCATOR_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
    Coord { x: lon, y: lat }
}

/// Forward spherical Mercator: lon/lat degrees to metres
pub fn wgs84_to_mercator(coord: Coord<f64>) -> Coord<f64> {
    let x = MERCATOR_RADIUS_M * coord.x.to_radians();
    let y = MERCATOR_RADIUS_M * (FRAC_PI_4 + coord.y.to_radians() / 2.0).tan().ln();
    Coord { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use serde_json::json;

    fn members(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::Wgs84);
        assert_eq!(Crs::parse("epsg:3857").unwrap(), Crs::WebMercator);
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:EPSG::3857").unwrap(),
            Crs::WebMercator
        );
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            Crs::Wgs84
        );
        assert_eq!(Crs::parse("32631").unwrap(), Crs::Epsg(32631));
        assert!(matches!(
            Crs::parse("not a crs"),
            Err(CrsError::Malformed(_))
        ));
    }

    #[test]
    fn test_member_defaults_to_wgs84() {
        assert_eq!(Crs::from_geojson_member(None).unwrap(), Crs::Wgs84);

        let m = members(json!({ "crs": null }));
        assert_eq!(Crs::from_geojson_member(Some(&m)).unwrap(), Crs::Wgs84);
    }

    #[test]
    fn test_member_named_and_linked_epsg() {
        let named = members(json!({
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3857" } }
        }));
        assert_eq!(
            Crs::from_geojson_member(Some(&named)).unwrap(),
            Crs::WebMercator
        );

        let epsg = members(json!({
            "crs": { "type": "EPSG", "properties": { "code": 26331 } }
        }));
        assert_eq!(
            Crs::from_geojson_member(Some(&epsg)).unwrap(),
            Crs::Epsg(26331)
        );
    }

    #[test]
    fn test_member_malformed() {
        let m = members(json!({ "crs": { "type": "name" } }));
        assert!(Crs::from_geojson_member(Some(&m)).is_err());

        let m = members(json!({ "crs": { "type": "link", "properties": { "href": "x" } } }));
        assert!(Crs::from_geojson_member(Some(&m)).is_err());
    }

    #[test]
    fn test_wgs84_is_a_no_op() {
        let geometry = MultiPolygon::new(vec![polygon![
            (x: 3.30, y: 6.45),
            (x: 3.45, y: 6.45),
            (x: 3.45, y: 6.60),
            (x: 3.30, y: 6.60),
        ]]);

        let out = to_wgs84(geometry.clone(), Crs::Wgs84).unwrap();
        assert_eq!(out, geometry);
    }

    #[test]
    fn test_mercator_inverse_matches_lagos() {
        let lagos = Coord { x: 3.3792, y: 6.5244 };
        let metres = wgs84_to_mercator(lagos);
        // Known EPSG:3857 position of Lagos
        assert!((metres.x - 376_172.0).abs() < 5.0);
        assert!((metres.y - 727_867.0).abs() < 50.0);

        let back = coord_to_wgs84(metres, Crs::WebMercator).unwrap();
        assert!((back.x - lagos.x).abs() < 1e-9);
        assert!((back.y - lagos.y).abs() < 1e-9);
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn test_other_epsg_unsupported_without_proj() {
        let err = Reprojector::new(Crs::Epsg(26331)).err().unwrap();
        assert!(matches!(err, CrsError::Unsupported(Crs::Epsg(26331))));
    }
}
