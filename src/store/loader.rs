//! GeoJSON dataset reading, attribute extraction and CRS normalization.

use geo::{BoundingRect, MultiPolygon, Polygon};
use geojson::{Feature, GeoJson, JsonObject};
use hashbrown::HashMap;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{normalize_field_name, Schema};
use crate::crs::{Crs, Reprojector};
use crate::error::{CoverageError, Dataset, Result};
use crate::models::{AdminBoundary, CoverageRegion, NetworkGeneration};

/// Read and parse a GeoJSON file
pub fn read_geojson(path: &Path, dataset: Dataset) -> Result<GeoJson> {
    let source_name = path.display().to_string();
    let text = fs::read_to_string(path)
        .map_err(|e| CoverageError::data_load(dataset, &source_name, e))?;

    text.parse::<GeoJson>().map_err(|e| {
        CoverageError::data_load(dataset, &source_name, format!("invalid GeoJSON: {e}"))
    })
}

/// Feature properties keyed by normalized name
struct Properties(HashMap<String, Value>);

impl Properties {
    fn of(feature: &Feature) -> Self {
        let map = feature
            .properties
            .iter()
            .flat_map(|props| props.iter())
            .map(|(k, v)| (normalize_field_name(k), v.clone()))
            .collect();
        Self(map)
    }

    /// First non-empty textual value among the candidate names
    fn text(&self, candidates: &[String]) -> Option<String> {
        candidates.iter().find_map(|name| {
            match self.0.get(&normalize_field_name(name))? {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        })
    }
}

fn into_features(geojson: GeoJson) -> (Vec<Feature>, Option<JsonObject>) {
    match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => {
            let members = f.foreign_members.clone();
            (vec![f], members)
        }
        GeoJson::Geometry(g) => (vec![Feature::from(g)], None),
    }
}

/// Polygon or MultiPolygon geometry of a feature; None for anything else
fn polygonal(feature: &mut Feature) -> Option<std::result::Result<MultiPolygon<f64>, geojson::Error>> {
    let value = feature.geometry.take()?.value;
    match value {
        geojson::Value::Polygon(_) => {
            Some(Polygon::<f64>::try_from(value).map(|p| MultiPolygon::new(vec![p])))
        }
        geojson::Value::MultiPolygon(_) => Some(MultiPolygon::<f64>::try_from(value)),
        _ => None,
    }
}

/// Walk the polygon features of a dataset, reprojected to WGS84, handing
/// each to `build` with its record number and properties.
fn read_polygon_features<T, F>(
    geojson: GeoJson,
    dataset: Dataset,
    source_name: &str,
    mut build: F,
) -> Result<Vec<T>>
where
    F: FnMut(usize, MultiPolygon<f64>, &Properties) -> Result<T>,
{
    let (features, members) = into_features(geojson);

    let crs = Crs::from_geojson_member(members.as_ref())
        .map_err(|e| CoverageError::from_crs(dataset, source_name, e))?;
    let reprojector =
        Reprojector::new(crs).map_err(|e| CoverageError::from_crs(dataset, source_name, e))?;
    if !crs.is_canonical() {
        info!("Reprojecting {} dataset from {} to WGS84", dataset, crs);
    }

    let mut records = Vec::with_capacity(features.len());

    for (record, mut feature) in features.into_iter().enumerate() {
        let geometry = match polygonal(&mut feature) {
            Some(Ok(geometry)) => geometry,
            Some(Err(e)) => {
                return Err(CoverageError::data_load(
                    dataset,
                    source_name,
                    format!("record {record}: {e}"),
                ))
            }
            None => {
                debug!("Skipping non-polygon {} record {}", dataset, record);
                continue;
            }
        };

        let geometry = reprojector
            .multi_polygon(geometry)
            .map_err(|e| CoverageError::from_crs(dataset, source_name, e))?;
        if geometry.bounding_rect().is_none() {
            debug!("Skipping empty {} record {}", dataset, record);
            continue;
        }

        let properties = Properties::of(&feature);
        records.push(build(record, geometry, &properties)?);
    }

    if records.is_empty() {
        return Err(CoverageError::data_load(
            dataset,
            source_name,
            "contains no polygon geometries",
        ));
    }

    Ok(records)
}

fn primary(fields: &[String], fallback: &str) -> String {
    fields
        .first()
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// Build coverage regions from a parsed dataset
pub fn read_coverage_regions(
    geojson: GeoJson,
    source_name: &str,
    schema: &Schema,
) -> Result<Vec<CoverageRegion>> {
    let regions = read_polygon_features(
        geojson,
        Dataset::Coverage,
        source_name,
        |record, geometry, props| {
            let attribute = || primary(&schema.generation_fields, "generation");

            let label = props
                .text(&schema.generation_fields)
                .ok_or_else(|| CoverageError::schema(Dataset::Coverage, attribute(), record))?;
            let generation = label
                .parse::<NetworkGeneration>()
                .map_err(|_| CoverageError::schema(Dataset::Coverage, attribute(), record))?;

            Ok(CoverageRegion {
                geometry,
                generation,
                site_id: props.text(&schema.site_id_fields),
                operator: props.text(&schema.operator_fields),
            })
        },
    )?;

    info!("Loaded {} coverage regions from {}", regions.len(), source_name);
    Ok(regions)
}

/// Build administrative boundaries from a parsed dataset
pub fn read_admin_boundaries(
    geojson: GeoJson,
    source_name: &str,
    schema: &Schema,
) -> Result<Vec<AdminBoundary>> {
    let boundaries = read_polygon_features(
        geojson,
        Dataset::Boundaries,
        source_name,
        |record, geometry, props| {
            let name = props.text(&schema.boundary_name_fields).ok_or_else(|| {
                CoverageError::schema(
                    Dataset::Boundaries,
                    primary(&schema.boundary_name_fields, "name"),
                    record,
                )
            })?;

            Ok(AdminBoundary {
                geometry,
                name,
                code: props.text(&schema.boundary_code_fields),
            })
        },
    )?;

    info!(
        "Loaded {} admin boundaries from {}",
        boundaries.len(),
        source_name
    );
    Ok(boundaries)
}
