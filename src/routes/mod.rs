pub mod alerts;
pub mod health;
pub mod readings;
pub mod reports;
pub mod sensors;
pub mod tanks;
pub mod ws;

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    routing::{get, post, put},
    Router,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::config::Config;
use crate::entity::{sensors as sensor_entity, tanks as tank_entity};
use crate::error::{AppError, AppResult};
use crate::services::rate_limit::client_limiter;

/// Generic confirmation body for deletes
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Load a tank or fail with 404
pub async fn find_tank(db: &DatabaseConnection, tank_id: i32) -> AppResult<tank_entity::Model> {
    tank_entity::Entity::find_by_id(tank_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Tank not found".to_string()))
}

/// Load a sensor or fail with 404
pub async fn find_sensor(
    db: &DatabaseConnection,
    sensor_id: i32,
) -> AppResult<sensor_entity::Model> {
    sensor_entity::Entity::find_by_id(sensor_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sensor not found".to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        tanks::list_tanks,
        tanks::get_tank,
        tanks::create_tank,
        tanks::update_tank,
        tanks::delete_tank,
        tanks::get_tank_stats,
        sensors::list_sensors,
        sensors::get_sensor,
        sensors::create_sensor,
        sensors::update_sensor,
        sensors::delete_sensor,
        readings::ingest_reading,
        readings::list_readings,
        readings::aggregate_readings,
        alerts::list_alerts,
        alerts::get_alert,
        alerts::resolve_alert,
        alerts::list_thresholds,
        alerts::upsert_threshold,
        alerts::delete_threshold,
        reports::sensor_data_report,
        reports::alerts_report,
    ),
    components(
        schemas(
            MessageResponse,
            tanks::TankResponse,
            tanks::CreateTankRequest,
            tanks::UpdateTankRequest,
            tanks::TankStatsResponse,
            tanks::SensorSnapshot,
            sensors::SensorResponse,
            sensors::CreateSensorRequest,
            sensors::UpdateSensorRequest,
            readings::CreateReadingRequest,
            readings::ReadingResponse,
            readings::IngestResponse,
            readings::AggregateBucket,
            alerts::AlertResponse,
            alerts::ResolveAlertRequest,
            alerts::ThresholdResponse,
            alerts::UpsertThresholdRequest,
            reports::SensorDataReportRequest,
            reports::AlertsReportRequest,
            reports::ReportInfo,
            reports::SensorDataRow,
            reports::SensorDataReport,
            reports::AlertReportRow,
            reports::AlertsReport,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tanks", description = "Tanks and their live status"),
        (name = "sensors", description = "Sensors attached to tanks"),
        (name = "readings", description = "Reading ingestion and history"),
        (name = "alerts", description = "Threshold alerts and threshold configuration"),
        (name = "reports", description = "On-demand sensor data and alert reports"),
    ),
    info(
        title = "Fishery Monitor API",
        description = "Tank, sensor and alert monitoring for fishery and aquaculture farms",
        version = "0.1.0"
    )
)]
struct ApiDoc;

/// Apply a per-client rate limiter to every route of `router`.
fn rate_limited(
    router: Router<AppState>,
    name: &'static str,
    per_second: u64,
    burst: u32,
) -> Router<AppState> {
    match client_limiter(per_second, burst) {
        Some(config) => router.layer(GovernorLayer {
            config: Arc::new(config),
        }),
        None => {
            tracing::warn!(
                limiter = name,
                per_second,
                burst,
                "Invalid rate limit settings, limiter disabled"
            );
            router
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match config.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => base.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Invalid FRONTEND_URL, allowing any origin");
            base.allow_origin(Any)
        }
        None => base.allow_origin(Any),
    }
}

pub fn build_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
    } else {
        tracing::info!(
            api_rate = %format!("{}/s burst {}", config.rate_limit_api_per_second, config.rate_limit_api_burst),
            ingest_rate = %format!("{}/s burst {}", config.rate_limit_ingest_per_second, config.rate_limit_ingest_burst),
            "Rate limiting configured"
        );
    }

    // Dashboard-facing CRUD
    let api_routes_base = Router::new()
        .route("/tanks", get(tanks::list_tanks).post(tanks::create_tank))
        .route(
            "/tanks/{tank_id}",
            get(tanks::get_tank)
                .put(tanks::update_tank)
                .delete(tanks::delete_tank),
        )
        .route("/tanks/{tank_id}/stats", get(tanks::get_tank_stats))
        .route("/sensors", get(sensors::list_sensors).post(sensors::create_sensor))
        .route(
            "/sensors/{sensor_id}",
            get(sensors::get_sensor)
                .put(sensors::update_sensor)
                .delete(sensors::delete_sensor),
        )
        .route("/sensors/{sensor_id}/readings", get(readings::list_readings))
        .route(
            "/sensors/{sensor_id}/readings/aggregate",
            get(readings::aggregate_readings),
        )
        .route("/alerts", get(alerts::list_alerts))
        .route(
            "/alerts/thresholds",
            get(alerts::list_thresholds).post(alerts::upsert_threshold),
        )
        .route(
            "/alerts/thresholds/{threshold_id}",
            axum::routing::delete(alerts::delete_threshold),
        )
        .route("/alerts/{alert_id}", get(alerts::get_alert))
        .route("/alerts/{alert_id}/resolve", put(alerts::resolve_alert))
        .route("/reports/sensor-data", post(reports::sensor_data_report))
        .route("/reports/alerts", post(reports::alerts_report));

    // Field devices posting readings get their own, larger bucket
    let ingest_routes_base =
        Router::new().route("/sensors/{sensor_id}/readings", post(readings::ingest_reading));

    let api_routes = if config.disable_rate_limiting {
        api_routes_base.merge(ingest_routes_base)
    } else {
        rate_limited(
            api_routes_base,
            "api",
            config.rate_limit_api_per_second,
            config.rate_limit_api_burst,
        )
        .merge(rate_limited(
            ingest_routes_base,
            "ingest",
            config.rate_limit_ingest_per_second,
            config.rate_limit_ingest_burst,
        ))
    }
    .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB body limit

    // Health check and websocket routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));
    let ws_routes = Router::new().route("/ws", get(ws::ws_handler));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let request_id_header = HeaderName::from_static("x-request-id");

    // Outermost first: the request id exists before the trace span opens
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id_header.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(cors_layer(&config))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(ws_routes)
        .merge(docs_routes)
        .layer(middleware)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_created_statuses() {
        let doc = ApiDoc::openapi();
        let created = |path: &str| {
            doc.paths
                .paths
                .get(path)
                .and_then(|item| item.post.as_ref())
                .is_some_and(|op| op.responses.responses.contains_key("201"))
        };

        assert!(created("/api/alerts/thresholds"));
        assert!(created("/api/sensors/{sensor_id}/readings"));
        assert!(created("/api/sensors"));
    }

    #[test]
    fn openapi_lists_report_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/reports/sensor-data"));
        assert!(doc.paths.paths.contains_key("/api/reports/alerts"));
    }
}
