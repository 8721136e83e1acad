//! Query server for coverage lookups.
//!
//! Loads the coverage and boundary datasets once at startup and answers
//! point lookups over HTTP for the map front-end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netcover::config::Config;
use netcover::crs::Crs;
use netcover::models::{BoundaryDensity, Coordinate, CoverageResult, GridCell, NearbySite};
use netcover::{CoverageError, CoverageResolver, GeoDataStore};

/// Upper bound on `k` for nearby-site queries
const MAX_NEARBY: usize = 25;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Coverage lookup server")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Coverage GeoJSON (overrides config)
    #[arg(long)]
    coverage: Option<PathBuf>,

    /// Administrative boundary GeoJSON (overrides config)
    #[arg(long)]
    boundaries: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(coverage) = args.coverage {
        config.data.coverage = coverage;
    }
    if let Some(boundaries) = args.boundaries {
        config.data.boundaries = boundaries;
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    info!("netcover query server");

    let store = GeoDataStore::load_with_schema(
        &config.data.coverage,
        &config.data.boundaries,
        &config.schema,
    )
    .context("Failed to load datasets")?;

    let resolver = CoverageResolver::new(Arc::new(store));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/coverage", get(coverage_handler))
        .route("/v1/nearby", get(nearby_handler))
        .route("/v1/density", get(density_handler))
        .route("/v1/grid", get(grid_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(resolver);

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_handler(State(resolver): State<CoverageResolver>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        regions: resolver.store().region_count(),
        boundaries: resolver.store().boundary_count(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    regions: usize,
    boundaries: usize,
}

/// Coverage at a point
async fn coverage_handler(
    State(resolver): State<CoverageResolver>,
    Query(params): Query<PointQueryParams>,
) -> Result<Json<CoverageResult>, (StatusCode, String)> {
    let coord = params.coordinate()?;
    resolver.resolve(coord).map(Json).map_err(error_response)
}

/// Nearest coverage sites to a point
async fn nearby_handler(
    State(resolver): State<CoverageResolver>,
    Query(params): Query<PointQueryParams>,
) -> Result<Json<NearbyResponse>, (StatusCode, String)> {
    let coord = params.coordinate()?;
    let k = params.k.unwrap_or(5).min(MAX_NEARBY);

    let sites = resolver.nearby(coord, k).map_err(error_response)?;
    Ok(Json(NearbyResponse { sites }))
}

#[derive(Serialize)]
struct NearbyResponse {
    sites: Vec<NearbySite>,
}

/// Site counts per state
async fn density_handler(State(resolver): State<CoverageResolver>) -> Json<DensityResponse> {
    Json(DensityResponse {
        boundaries: resolver.store().density_by_boundary(),
    })
}

#[derive(Serialize)]
struct DensityResponse {
    boundaries: Vec<BoundaryDensity>,
}

/// Site counts per grid cell
async fn grid_handler(
    State(resolver): State<CoverageResolver>,
    Query(params): Query<GridQueryParams>,
) -> Result<Json<GridResponse>, (StatusCode, String)> {
    let cell_deg = params.cell_deg.unwrap_or(0.5);
    let cells = resolver
        .store()
        .density_grid(cell_deg)
        .map_err(error_response)?;
    Ok(Json(GridResponse { cell_deg, cells }))
}

#[derive(Deserialize)]
struct GridQueryParams {
    /// Cell size in degrees
    cell_deg: Option<f64>,
}

#[derive(Serialize)]
struct GridResponse {
    cell_deg: f64,
    cells: Vec<GridCell>,
}

#[derive(Deserialize)]
struct PointQueryParams {
    /// Latitude (or northing for projected CRSs)
    lat: f64,
    /// Longitude (or easting for projected CRSs)
    lon: f64,
    /// CRS of the point, e.g. "EPSG:3857" (defaults to WGS84)
    crs: Option<String>,
    /// Number of nearby sites
    k: Option<usize>,
}

impl PointQueryParams {
    fn coordinate(&self) -> Result<Coordinate, (StatusCode, String)> {
        let crs = match &self.crs {
            Some(name) => {
                Crs::parse(name).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
            }
            None => Crs::Wgs84,
        };
        Ok(Coordinate::with_crs(self.lat, self.lon, crs))
    }
}

fn error_response(err: CoverageError) -> (StatusCode, String) {
    if err.is_query_error() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else {
        tracing::error!("Coverage lookup failed: {}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}
