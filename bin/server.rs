// Lease Catalog Engine - Web Server
// JSON API over the quoting and catalog-maintenance operations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use lease_catalog::{
    audit_catalog, get_vehicle, import_from, list_brands, list_master_colors,
    list_master_options, list_vehicles_for_brand, merge_masters, quote_vehicle, setup_catalog,
    CatalogError, ImportRequest, MasterKind, MergeRequest, QuoteRequest, SimilarityCandidate,
    SimilarityDetector,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// Map an engine error onto an HTTP status. Unavailable rate lookups never
/// reach this: they come back 200 inside the breakdown.
fn error_response(err: CatalogError) -> Response {
    let status = match &err {
        CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
        CatalogError::IneligibleSelection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CatalogError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CatalogError::MergeConflict(_) | CatalogError::ReferentialIntegrity(_) => {
            StatusCode::CONFLICT
        }
        CatalogError::Storage(_) | CatalogError::Serialization(_) | CatalogError::Sheet(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        eprintln!("Internal error: {}", err);
    }
    (status, Json(ApiResponse::err(err.to_string()))).into_response()
}

fn json_ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/brands - All brands
async fn get_brands(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    match list_brands(&conn) {
        Ok(brands) => json_ok(brands),
        Err(err) => error_response(err),
    }
}

/// GET /api/brands/:id/vehicles - A brand's vehicles, rate cells flattened
async fn get_brand_vehicles(
    State(state): State<AppState>,
    Path(brand_id): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();
    match list_vehicles_for_brand(&conn, &brand_id) {
        Ok(vehicles) => json_ok(vehicles),
        Err(err) => error_response(err),
    }
}

/// GET /api/vehicles/:id - One vehicle document with rentPrice{P}_{D} cells
async fn get_vehicle_detail(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();
    match get_vehicle(&conn, &vehicle_id) {
        Ok(vehicle) => json_ok(vehicle),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct RatesQuery {
    period: Option<u32>,
}

#[derive(Serialize)]
struct RateAvailability {
    vehicle_id: String,
    usable_periods: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_deposit_ratios: Option<Vec<u32>>,
}

/// GET /api/vehicles/:id/rates[?period=60] - Which terms actually price.
/// The quote page uses this to disable unavailable choices.
async fn get_rate_availability(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    Query(query): Query<RatesQuery>,
) -> Response {
    let conn = state.db.lock().unwrap();
    match get_vehicle(&conn, &vehicle_id) {
        Ok(vehicle) => json_ok(RateAvailability {
            vehicle_id: vehicle.id.clone(),
            usable_periods: vehicle.rates.usable_periods(),
            period: query.period,
            available_deposit_ratios: query
                .period
                .map(|p| vehicle.rates.available_deposit_ratios(p)),
        }),
        Err(err) => error_response(err),
    }
}

/// POST /api/quote - Price a configuration
async fn post_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Response {
    let conn = state.db.lock().unwrap();
    match quote_vehicle(&conn, &request) {
        Ok(breakdown) => json_ok(breakdown),
        Err(err) => error_response(err),
    }
}

/// GET /api/brands/:id/duplicates/:kind - Suggested master merge pairs
async fn get_duplicate_suggestions(
    State(state): State<AppState>,
    Path((brand_id, kind)): Path<(String, String)>,
) -> Response {
    let Some(kind) = MasterKind::parse(&kind) else {
        return error_response(CatalogError::InvalidRequest(format!(
            "unknown master kind '{}': expected color or option",
            kind
        )));
    };

    let conn = state.db.lock().unwrap();
    let candidates = match kind {
        MasterKind::Color => list_master_colors(&conn, &brand_id).map(|masters| {
            masters
                .into_iter()
                .map(|m| SimilarityCandidate {
                    id: m.id,
                    name: m.name,
                })
                .collect::<Vec<_>>()
        }),
        MasterKind::Option => list_master_options(&conn, &brand_id).map(|masters| {
            masters
                .into_iter()
                .map(|m| SimilarityCandidate {
                    id: m.id,
                    name: m.name,
                })
                .collect::<Vec<_>>()
        }),
    };

    match candidates {
        Ok(candidates) => json_ok(SimilarityDetector::new().find_similar_pairs(&candidates)),
        Err(err) => error_response(err),
    }
}

/// POST /api/masters/merge - Consolidate duplicate masters
async fn post_merge(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    match merge_masters(&mut conn, &request) {
        Ok(outcome) => json_ok(outcome),
        Err(err) => error_response(err),
    }
}

/// POST /api/vehicles/import - Copy colors/options/trims between vehicles
async fn post_import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    match import_from(&mut conn, &request) {
        Ok(report) => json_ok(report),
        Err(err) => error_response(err),
    }
}

/// GET /api/audit - Referential integrity report
async fn get_audit(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    match audit_catalog(&conn) {
        Ok(report) => json_ok(report),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Lease Catalog Engine - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "catalog.db".to_string());
    let conn = Connection::open(&db_path).expect("Failed to open database");
    setup_catalog(&conn).expect("Failed to set up catalog schema");
    println!("✓ Database opened: {}", db_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/brands", get(get_brands))
        .route("/brands/:id/vehicles", get(get_brand_vehicles))
        .route(
            "/brands/:id/duplicates/:kind",
            get(get_duplicate_suggestions),
        )
        .route("/vehicles/:id", get(get_vehicle_detail))
        .route("/vehicles/:id/rates", get(get_rate_availability))
        .route("/vehicles/import", post(post_import))
        .route("/masters/merge", post(post_merge))
        .route("/quote", post(post_quote))
        .route("/audit", get(get_audit))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   Quote: POST http://localhost:3000/api/quote");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
