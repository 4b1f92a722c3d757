//! HTTP server for parcel maps.
//!
//! Accepts map uploads and multi-file layer loads, answers adjacency
//! queries for a selected parcel and lists parcel attributes of the
//! loaded map.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use parcelmap::config::Config;
use parcelmap::models::{AdjacencySelection, AttributeTable, LayerSet};
use parcelmap::{find_adjacent, AdjacencyMethod, LoadError, MapLoader, MapSession};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Upload names accepted by the server
const ACCEPTED_SUFFIXES: [&str; 2] = [".qpkg", ".gpkg"];

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Parcel map adjacency server")]
struct Args {
    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Application state shared across handlers
struct AppState {
    session: RwLock<MapSession>,
    /// Directory that requested layer files are resolved against
    layers_root: PathBuf,
}

type ApiError = (StatusCode, String);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    let listen = args.listen.unwrap_or(config.server.listen.clone());

    info!("Parcelmap Server");

    let state = Arc::new(AppState {
        session: RwLock::new(MapSession::new(MapLoader::new(config.loader.clone()))),
        layers_root: config.server.layers_root.clone(),
    });

    let app = router(state, config.server.max_upload_bytes);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/upload-qpkg/", post(upload_handler))
        .route("/load-cadastral-files/", post(load_layers_handler))
        .route("/get-adjacent-polygons/", post(adjacent_handler))
        .route("/get-attributes/", get(attributes_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let session = state.session.read().await;
    let features = session.current().map(|c| c.len());

    Json(HealthResponse {
        status: "ok",
        loaded: features.is_some(),
        features: features.unwrap_or(0),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    loaded: bool,
    features: usize,
}

/// Multipart upload; the map is the `file` field
async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        (StatusCode::BAD_REQUEST, e.to_string())
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let body = field.bytes().await.map_err(bad_form)?;
        return store_upload(state, filename, body).await;
    }

    Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()))
}

/// Store the uploaded map and make it the current one
async fn store_upload(
    state: Arc<AppState>,
    filename: String,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(suffix) = ACCEPTED_SUFFIXES
        .iter()
        .find(|s| filename.ends_with(**s))
        .copied()
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "File must be a QPKG or GPKG file".to_string(),
        ));
    };

    info!("Received {} ({} bytes)", filename, body.len());

    tokio::task::spawn_blocking(move || {
        let mut file = tempfile::Builder::new()
            .prefix("parcelmap-upload-")
            .suffix(suffix)
            .tempfile()
            .map_err(internal)?;
        file.write_all(&body).map_err(internal)?;

        let mut session = state.session.blocking_write();
        if let Err(e) = session.try_load(file.path()) {
            warn!("Upload {} could not be loaded: {}", filename, e);
            return Err((
                StatusCode::BAD_REQUEST,
                "No geospatial data found in package".to_string(),
            ));
        }

        let collection = session
            .current_mut()
            .ok_or_else(|| internal("session lost the uploaded map"))?;
        collection.ensure_feature_ids();
        let geojson = serde_json::to_value(collection.to_geojson()).map_err(internal)?;

        Ok(Json(json!({ "geojson": geojson })))
    })
    .await
    .map_err(internal)?
}

#[derive(Debug, Deserialize)]
struct CadastralFileRequest {
    files: Vec<String>,
}

/// Load several files as layers of one map
async fn load_layers_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CadastralFileRequest>,
) -> Result<Json<LayerSet>, ApiError> {
    if request.files.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No files specified".to_string()));
    }

    tokio::task::spawn_blocking(move || {
        let files: Vec<&Path> = request
            .files
            .iter()
            .map(Path::new)
            .filter(|file| {
                let inside = is_inside_root(file);
                if !inside {
                    warn!("Refusing layer outside the layers root: {}", file.display());
                }
                inside
            })
            .collect();

        let mut session = state.session.blocking_write();
        match session.load_layers(&state.layers_root, &files) {
            Ok(layers) => Ok(Json(layers)),
            Err(LoadError::NoLayers) => Err((
                StatusCode::BAD_REQUEST,
                "No valid geospatial files could be loaded".to_string(),
            )),
            Err(e) => Err(internal(e)),
        }
    })
    .await
    .map_err(internal)?
}

/// Relative path without `..` components
fn is_inside_root(file: &Path) -> bool {
    file.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[derive(Debug, Deserialize)]
struct PolygonSelection {
    feature_id: i64,
    #[serde(default = "default_touch_method")]
    touch_method: String,
}

fn default_touch_method() -> String {
    AdjacencyMethod::default().as_str().to_string()
}

/// Selected parcel and its adjacent parcels
async fn adjacent_handler(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<PolygonSelection>,
) -> Result<Json<AdjacencySelection>, ApiError> {
    tokio::task::spawn_blocking(move || {
        let session = state.session.blocking_read();
        let collection = session.current().ok_or_else(no_data)?;

        let method = AdjacencyMethod::from_name(&selection.touch_method);
        info!(
            "Finding parcels adjacent to {} using {}",
            selection.feature_id, method
        );

        let out_of_range = || {
            (
                StatusCode::BAD_REQUEST,
                format!("Feature {} is out of range", selection.feature_id),
            )
        };
        let selected = usize::try_from(selection.feature_id).map_err(|_| out_of_range())?;

        let adjacent = find_adjacent(collection, selected, method);
        let view = collection
            .selection(selected, &adjacent)
            .ok_or_else(out_of_range)?;

        info!("Found {} adjacent parcels: {:?}", adjacent.len(), adjacent);
        Ok(Json(view))
    })
    .await
    .map_err(internal)?
}

/// Attribute table of the loaded map
async fn attributes_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AttributeTable>, ApiError> {
    let session = state.session.read().await;
    let collection = session.current().ok_or_else(no_data)?;
    Ok(Json(collection.attributes()))
}

fn no_data() -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        "No data loaded. Please upload a QPKG or GPKG file first.".to_string(),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> ApiError {
    error!("Request failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
