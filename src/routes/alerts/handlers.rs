use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::common::AppState;
use crate::entity::{alert_thresholds, alerts, sensors, tanks};
use crate::error::{AppError, AppResult};
use crate::notify::{Channel, Notifier, EVENT_ALERT_RESOLVED};
use crate::routes::readings::validate_range;
use crate::routes::{find_tank, MessageResponse};

use super::types::{
    AlertResponse, AlertsQuery, ResolveAlertRequest, ThresholdResponse, ThresholdsQuery,
    UpsertThresholdRequest,
};

const MAX_ALERTS: u64 = 100;

async fn load_alert(state: &AppState, alert_id: i32) -> AppResult<AlertResponse> {
    let (alert, sensor) = alerts::Entity::find_by_id(alert_id)
        .find_also_related(sensors::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert not found".to_string()))?;

    Ok(AlertResponse::from_parts(alert, sensor))
}

/// List alerts, newest first
#[utoipa::path(
    get,
    path = "/api/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Alerts retrieved successfully", body = Vec<AlertResponse>),
        (status = 400, description = "Invalid query parameters"),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> AppResult<Json<Vec<AlertResponse>>> {
    validate_range(query.start, query.end)?;
    let mut db_query = alerts::Entity::find().find_also_related(sensors::Entity);

    if let Some(tank_id) = query.tank_id {
        db_query = db_query.filter(alerts::Column::TankId.eq(tank_id));
    }
    if let Some(is_resolved) = query.is_resolved {
        db_query = db_query.filter(alerts::Column::IsResolved.eq(is_resolved));
    }
    if let Some(ref severity) = query.severity {
        db_query = db_query.filter(alerts::Column::Severity.eq(severity));
    }
    if let Some(start) = query.start {
        db_query = db_query.filter(alerts::Column::CreatedAt.gte(start));
    }
    if let Some(end) = query.end {
        db_query = db_query.filter(alerts::Column::CreatedAt.lte(end));
    }

    let alerts_list = db_query
        .order_by_desc(alerts::Column::CreatedAt)
        .order_by_desc(alerts::Column::Id)
        .limit(MAX_ALERTS)
        .all(&state.db)
        .await?;

    Ok(Json(
        alerts_list
            .into_iter()
            .map(|(alert, sensor)| AlertResponse::from_parts(alert, sensor))
            .collect(),
    ))
}

/// Get a specific alert
#[utoipa::path(
    get,
    path = "/api/alerts/{alert_id}",
    params(
        ("alert_id" = i32, Path, description = "Alert ID"),
    ),
    responses(
        (status = 200, description = "Alert retrieved successfully", body = AlertResponse),
        (status = 404, description = "Alert not found"),
    ),
    tag = "alerts"
)]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<i32>,
) -> AppResult<Json<AlertResponse>> {
    Ok(Json(load_alert(&state, alert_id).await?))
}

/// Resolve an alert
///
/// Resolving frees the sensor for a new alert on its next breaching reading.
/// An alert that is already resolved is returned unchanged.
#[utoipa::path(
    put,
    path = "/api/alerts/{alert_id}/resolve",
    params(
        ("alert_id" = i32, Path, description = "Alert ID"),
    ),
    request_body(content = ResolveAlertRequest, description = "Optional resolver name"),
    responses(
        (status = 200, description = "Alert resolved", body = AlertResponse),
        (status = 404, description = "Alert not found"),
    ),
    tag = "alerts"
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<i32>,
    body: Option<Json<ResolveAlertRequest>>,
) -> AppResult<Json<AlertResponse>> {
    let Json(body) = body.unwrap_or_default();

    // Conditional update so concurrent resolves emit a single event
    let updated = alerts::Entity::update_many()
        .col_expr(alerts::Column::IsResolved, Expr::value(true))
        .col_expr(alerts::Column::ResolvedAt, Expr::value(Utc::now()))
        .col_expr(alerts::Column::ResolvedBy, Expr::value(body.resolved_by))
        .filter(alerts::Column::Id.eq(alert_id))
        .filter(alerts::Column::IsResolved.eq(false))
        .exec(&state.db)
        .await?;

    let alert = load_alert(&state, alert_id).await?;

    if updated.rows_affected > 0 {
        tracing::info!(
            alert_id,
            sensor_id = alert.sensor_id,
            tank_id = alert.tank_id,
            "Alert resolved"
        );
        let payload =
            serde_json::to_value(&alert).map_err(|e| AppError::Internal(e.to_string()))?;
        state
            .hub
            .publish(Channel::Global, EVENT_ALERT_RESOLVED, payload);
    }

    Ok(Json(alert))
}

/// List alert thresholds
#[utoipa::path(
    get,
    path = "/api/alerts/thresholds",
    params(ThresholdsQuery),
    responses(
        (status = 200, description = "Thresholds retrieved successfully", body = Vec<ThresholdResponse>),
    ),
    tag = "alerts"
)]
pub async fn list_thresholds(
    State(state): State<AppState>,
    Query(query): Query<ThresholdsQuery>,
) -> AppResult<Json<Vec<ThresholdResponse>>> {
    let mut db_query = alert_thresholds::Entity::find().find_also_related(tanks::Entity);

    if let Some(tank_id) = query.tank_id {
        db_query = db_query.filter(alert_thresholds::Column::TankId.eq(tank_id));
    }

    let thresholds = db_query
        .order_by_asc(alert_thresholds::Column::TankId)
        .order_by_asc(alert_thresholds::Column::SensorType)
        .all(&state.db)
        .await?;

    Ok(Json(
        thresholds
            .into_iter()
            .map(|(threshold, tank)| ThresholdResponse::from_parts(threshold, tank))
            .collect(),
    ))
}

fn validate_threshold(body: &UpsertThresholdRequest) -> AppResult<()> {
    if body.sensor_type.trim().is_empty() {
        return Err(AppError::BadRequest("sensor_type must not be empty".to_string()));
    }
    if body.min_value.is_some_and(|v| !v.is_finite())
        || body.max_value.is_some_and(|v| !v.is_finite())
    {
        return Err(AppError::BadRequest("bounds must be finite numbers".to_string()));
    }
    if let (Some(min), Some(max)) = (body.min_value, body.max_value)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_value must not exceed max_value".to_string(),
        ));
    }
    Ok(())
}

/// Create or replace the threshold of a tank for one sensor type
#[utoipa::path(
    post,
    path = "/api/alerts/thresholds",
    request_body = UpsertThresholdRequest,
    responses(
        (status = 201, description = "Threshold stored", body = ThresholdResponse),
        (status = 400, description = "Invalid bounds"),
        (status = 404, description = "Tank not found"),
    ),
    tag = "alerts"
)]
pub async fn upsert_threshold(
    State(state): State<AppState>,
    Json(body): Json<UpsertThresholdRequest>,
) -> AppResult<(StatusCode, Json<ThresholdResponse>)> {
    validate_threshold(&body)?;
    let tank = find_tank(&state.db, body.tank_id).await?;
    let sensor_type = body.sensor_type.trim().to_string();

    let now = Utc::now();
    let threshold = alert_thresholds::Entity::insert(alert_thresholds::ActiveModel {
        tank_id: Set(tank.id),
        sensor_type: Set(sensor_type.clone()),
        min_value: Set(body.min_value),
        max_value: Set(body.max_value),
        is_active: Set(body.is_active.unwrap_or(true)),
        created_at: Set(Some(now.into())),
        updated_at: Set(Some(now.into())),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            alert_thresholds::Column::TankId,
            alert_thresholds::Column::SensorType,
        ])
        .update_columns([
            alert_thresholds::Column::MinValue,
            alert_thresholds::Column::MaxValue,
            alert_thresholds::Column::IsActive,
            alert_thresholds::Column::UpdatedAt,
        ])
        .to_owned(),
    )
    .exec_with_returning(&state.db)
    .await?;

    state.store.invalidate_threshold(tank.id, &sensor_type).await;

    tracing::info!(
        tank_id = tank.id,
        sensor_type = %sensor_type,
        min = ?threshold.min_value,
        max = ?threshold.max_value,
        "Threshold stored"
    );
    Ok((
        StatusCode::CREATED,
        Json(ThresholdResponse::from_parts(threshold, Some(tank))),
    ))
}

/// Delete a threshold
#[utoipa::path(
    delete,
    path = "/api/alerts/thresholds/{threshold_id}",
    params(
        ("threshold_id" = i32, Path, description = "Threshold ID"),
    ),
    responses(
        (status = 200, description = "Threshold deleted", body = MessageResponse),
        (status = 404, description = "Threshold not found"),
    ),
    tag = "alerts"
)]
pub async fn delete_threshold(
    State(state): State<AppState>,
    Path(threshold_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let threshold = alert_thresholds::Entity::find_by_id(threshold_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Threshold not found".to_string()))?;

    let (tank_id, sensor_type) = (threshold.tank_id, threshold.sensor_type.clone());
    threshold.delete(&state.db).await?;
    state.store.invalidate_threshold(tank_id, &sensor_type).await;

    tracing::info!(threshold_id, tank_id, sensor_type = %sensor_type, "Threshold deleted");
    Ok(Json(MessageResponse::new("Threshold deleted successfully")))
}
