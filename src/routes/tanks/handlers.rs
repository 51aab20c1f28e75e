use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::common::AppState;
use crate::entity::{alerts, sensors, tanks};
use crate::error::{AppError, AppResult};
use crate::routes::{find_tank, MessageResponse};

use super::types::{
    CreateTankRequest, SensorSnapshot, TankResponse, TankStatsResponse, UpdateTankRequest,
};

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    Ok(())
}

/// List all tanks
#[utoipa::path(
    get,
    path = "/api/tanks",
    responses(
        (status = 200, description = "Tanks retrieved successfully", body = Vec<TankResponse>),
    ),
    tag = "tanks"
)]
pub async fn list_tanks(State(state): State<AppState>) -> AppResult<Json<Vec<TankResponse>>> {
    let tanks_list = tanks::Entity::find()
        .order_by_asc(tanks::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(tanks_list.into_iter().map(TankResponse::from).collect()))
}

/// Get a specific tank
#[utoipa::path(
    get,
    path = "/api/tanks/{tank_id}",
    params(
        ("tank_id" = i32, Path, description = "Tank ID"),
    ),
    responses(
        (status = 200, description = "Tank retrieved successfully", body = TankResponse),
        (status = 404, description = "Tank not found"),
    ),
    tag = "tanks"
)]
pub async fn get_tank(
    State(state): State<AppState>,
    Path(tank_id): Path<i32>,
) -> AppResult<Json<TankResponse>> {
    let tank = find_tank(&state.db, tank_id).await?;
    Ok(Json(tank.into()))
}

/// Create a tank
#[utoipa::path(
    post,
    path = "/api/tanks",
    request_body = CreateTankRequest,
    responses(
        (status = 201, description = "Tank created", body = TankResponse),
        (status = 400, description = "Invalid tank"),
    ),
    tag = "tanks"
)]
pub async fn create_tank(
    State(state): State<AppState>,
    Json(body): Json<CreateTankRequest>,
) -> AppResult<(StatusCode, Json<TankResponse>)> {
    validate_name(&body.name)?;

    let now = Utc::now();
    let tank = tanks::ActiveModel {
        name: Set(body.name.trim().to_string()),
        description: Set(body.description),
        capacity: Set(body.capacity),
        location: Set(body.location),
        is_active: Set(true),
        created_at: Set(Some(now.into())),
        updated_at: Set(Some(now.into())),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(tank_id = tank.id, name = %tank.name, "Tank created");
    Ok((StatusCode::CREATED, Json(tank.into())))
}

/// Update a tank
#[utoipa::path(
    put,
    path = "/api/tanks/{tank_id}",
    params(
        ("tank_id" = i32, Path, description = "Tank ID"),
    ),
    request_body = UpdateTankRequest,
    responses(
        (status = 200, description = "Tank updated", body = TankResponse),
        (status = 404, description = "Tank not found"),
    ),
    tag = "tanks"
)]
pub async fn update_tank(
    State(state): State<AppState>,
    Path(tank_id): Path<i32>,
    Json(body): Json<UpdateTankRequest>,
) -> AppResult<Json<TankResponse>> {
    let mut tank: tanks::ActiveModel = find_tank(&state.db, tank_id).await?.into();

    if let Some(name) = body.name {
        validate_name(&name)?;
        tank.name = Set(name.trim().to_string());
    }
    if let Some(description) = body.description {
        tank.description = Set(Some(description));
    }
    if let Some(capacity) = body.capacity {
        tank.capacity = Set(Some(capacity));
    }
    if let Some(location) = body.location {
        tank.location = Set(Some(location));
    }
    if let Some(is_active) = body.is_active {
        tank.is_active = Set(is_active);
    }
    tank.updated_at = Set(Some(Utc::now().into()));

    let tank = tank.update(&state.db).await?;
    Ok(Json(tank.into()))
}

/// Delete a tank together with its sensors, readings, thresholds and alerts
#[utoipa::path(
    delete,
    path = "/api/tanks/{tank_id}",
    params(
        ("tank_id" = i32, Path, description = "Tank ID"),
    ),
    responses(
        (status = 200, description = "Tank deleted", body = MessageResponse),
        (status = 404, description = "Tank not found"),
    ),
    tag = "tanks"
)]
pub async fn delete_tank(
    State(state): State<AppState>,
    Path(tank_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let tank = find_tank(&state.db, tank_id).await?;
    tank.delete(&state.db).await?;

    tracing::info!(tank_id, "Tank deleted");
    Ok(Json(MessageResponse::new("Tank deleted successfully")))
}

/// Live status of a tank: active sensors with their last reading and the
/// number of unresolved alerts
#[utoipa::path(
    get,
    path = "/api/tanks/{tank_id}/stats",
    params(
        ("tank_id" = i32, Path, description = "Tank ID"),
    ),
    responses(
        (status = 200, description = "Tank statistics retrieved", body = TankStatsResponse),
        (status = 404, description = "Tank not found"),
    ),
    tag = "tanks"
)]
pub async fn get_tank_stats(
    State(state): State<AppState>,
    Path(tank_id): Path<i32>,
) -> AppResult<Json<TankStatsResponse>> {
    let tank = find_tank(&state.db, tank_id).await?;

    let sensors_list = sensors::Entity::find()
        .filter(sensors::Column::TankId.eq(tank.id))
        .filter(sensors::Column::IsActive.eq(true))
        .order_by_asc(sensors::Column::SensorType)
        .all(&state.db)
        .await?;

    let active_alerts = alerts::Entity::find()
        .filter(alerts::Column::TankId.eq(tank.id))
        .filter(alerts::Column::IsResolved.eq(false))
        .count(&state.db)
        .await?;

    Ok(Json(TankStatsResponse {
        sensors: sensors_list.into_iter().map(SensorSnapshot::from).collect(),
        active_alerts,
    }))
}
