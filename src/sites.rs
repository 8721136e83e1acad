//! Tower site CSV input and buffered coverage polygons.
//!
//! Operator exports list one row per site and technology. Each row becomes a
//! circular coverage region of a fixed radius around the site, which is what
//! the coverage dataset loaded by the store is made of.

use csv::{ReaderBuilder, Trim};
use geo::{Destination, Haversine, LineString, Point, Polygon};
use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::config::normalize_field_name;
use crate::error::{CoverageError, Dataset, Result};
use crate::models::NetworkGeneration;

/// Columns every site export must carry (after name normalization)
pub const REQUIRED_COLUMNS: [&str; 4] = ["latitude", "longitude", "network_provider", "technology"];

/// Default coverage radius around a site
pub const DEFAULT_BUFFER_KM: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TowerSite {
    pub lat: f64,
    pub lon: f64,
    pub operator: String,
    pub generation: NetworkGeneration,
    pub site_id: Option<String>,
}

/// Read a site export from a file
pub fn read_sites_path(path: &Path) -> Result<Vec<TowerSite>> {
    let source_name = path.display().to_string();
    let file =
        File::open(path).map_err(|e| CoverageError::data_load(Dataset::Sites, &source_name, e))?;
    read_sites(BufReader::new(file), &source_name)
}

/// Read a site export. Rows with an unusable coordinate or technology are
/// skipped with a warning.
pub fn read_sites<R: Read>(reader: R, source_name: &str) -> Result<Vec<TowerSite>> {
    let load_error = |e: csv::Error| CoverageError::data_load(Dataset::Sites, source_name, e);

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(load_error)?
        .iter()
        .map(normalize_field_name)
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CoverageError::schema(Dataset::Sites, name, 0))
    };
    let lat_idx = column(REQUIRED_COLUMNS[0])?;
    let lon_idx = column(REQUIRED_COLUMNS[1])?;
    let operator_idx = column(REQUIRED_COLUMNS[2])?;
    let tech_idx = column(REQUIRED_COLUMNS[3])?;
    let site_idx = headers.iter().position(|h| h == "site_id");

    let mut sites = Vec::new();
    let mut skipped = 0usize;

    for (i, result) in csv_reader.records().enumerate() {
        let record = result.map_err(load_error)?;
        let row = i + 1;

        let number = |idx: usize| record.get(idx).and_then(|v| v.parse::<f64>().ok());
        let (lat, lon) = match (number(lat_idx), number(lon_idx)) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                (lat, lon)
            }
            _ => {
                warn!("Skipping site row {}: invalid coordinate", row);
                skipped += 1;
                continue;
            }
        };

        let generation = match record.get(tech_idx).map(|v| v.parse::<NetworkGeneration>()) {
            Some(Ok(generation)) => generation,
            Some(Err(e)) => {
                warn!("Skipping site row {}: {}", row, e);
                skipped += 1;
                continue;
            }
            None => {
                warn!("Skipping site row {}: no technology", row);
                skipped += 1;
                continue;
            }
        };

        sites.push(TowerSite {
            lat,
            lon,
            operator: record.get(operator_idx).unwrap_or_default().to_string(),
            generation,
            site_id: site_idx
                .and_then(|idx| record.get(idx))
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        });
    }

    if sites.is_empty() {
        return Err(CoverageError::data_load(
            Dataset::Sites,
            source_name,
            "contains no usable site rows",
        ));
    }

    info!(
        "Read {} sites from {} ({} rows skipped)",
        sites.len(),
        source_name,
        skipped
    );
    Ok(sites)
}

/// Reject a radius that cannot produce a ring
fn check_radius(radius_km: f64) -> Result<()> {
    if radius_km.is_finite() && radius_km > 0.0 {
        Ok(())
    } else {
        Err(CoverageError::invalid_parameter(
            "buffer radius",
            radius_km,
            "must be a positive number of kilometres",
        ))
    }
}

/// Circle of `radius_km` around the site on the sphere, as a polygon with
/// `segments` vertices (at least 8).
pub fn buffer_site(site: &TowerSite, radius_km: f64, segments: usize) -> Result<Polygon<f64>> {
    check_radius(radius_km)?;

    let segments = segments.max(8);
    let center = Point::new(site.lon, site.lat);
    let radius_m = radius_km * 1000.0;

    let ring: Vec<Point<f64>> = (0..segments)
        .map(|i| {
            let bearing = 360.0 * i as f64 / segments as f64;
            Haversine.destination(center, bearing, radius_m)
        })
        .collect();

    Ok(Polygon::new(LineString::from(ring), vec![]))
}

/// Coverage feature for one site, with the attributes the store reads back
pub fn site_feature(site: &TowerSite, radius_km: f64, segments: usize) -> Result<Feature> {
    let polygon = buffer_site(site, radius_km, segments)?;

    let mut properties = JsonObject::new();
    properties.insert("generation".to_string(), json!(site.generation.label()));
    properties.insert("operator".to_string(), json!(site.operator));
    if let Some(site_id) = &site.site_id {
        properties.insert("site_id".to_string(), json!(site_id));
    }

    Ok(Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&polygon))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Coverage dataset for a set of sites (WGS84, so no `crs` member)
pub fn coverage_collection<'a, I>(
    sites: I,
    radius_km: f64,
    segments: usize,
) -> Result<FeatureCollection>
where
    I: IntoIterator<Item = &'a TowerSite>,
{
    check_radius(radius_km)?;

    let features = sites
        .into_iter()
        .map(|site| site_feature(site, radius_km, segments))
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
