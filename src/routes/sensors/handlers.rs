use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};

use crate::common::AppState;
use crate::entity::{sensors, tanks};
use crate::error::{AppError, AppResult};
use crate::routes::{find_sensor, find_tank, MessageResponse};

use super::types::{CreateSensorRequest, SensorResponse, SensorsQuery, UpdateSensorRequest};

fn validate_sensor_type(sensor_type: &str) -> AppResult<()> {
    if sensor_type.trim().is_empty() {
        return Err(AppError::BadRequest("sensor_type must not be empty".to_string()));
    }
    Ok(())
}

/// List sensors
#[utoipa::path(
    get,
    path = "/api/sensors",
    params(SensorsQuery),
    responses(
        (status = 200, description = "Sensors retrieved successfully", body = Vec<SensorResponse>),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(
    State(state): State<AppState>,
    Query(query): Query<SensorsQuery>,
) -> AppResult<Json<Vec<SensorResponse>>> {
    let mut db_query = sensors::Entity::find().find_also_related(tanks::Entity);

    if let Some(tank_id) = query.tank_id {
        db_query = db_query.filter(sensors::Column::TankId.eq(tank_id));
    }

    if let Some(ref sensor_type) = query.sensor_type {
        db_query = db_query.filter(sensors::Column::SensorType.eq(sensor_type));
    }

    let sensors_list = db_query
        .order_by_asc(sensors::Column::Id)
        .all(&state.db)
        .await?;

    let response: Vec<SensorResponse> = sensors_list
        .into_iter()
        .map(|(sensor, tank)| SensorResponse::from_parts(sensor, tank))
        .collect();

    Ok(Json(response))
}

/// Get a specific sensor
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}",
    params(
        ("sensor_id" = i32, Path, description = "Sensor ID"),
    ),
    responses(
        (status = 200, description = "Sensor retrieved successfully", body = SensorResponse),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "sensors"
)]
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<i32>,
) -> AppResult<Json<SensorResponse>> {
    let (sensor, tank) = sensors::Entity::find_by_id(sensor_id)
        .find_also_related(tanks::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sensor not found".to_string()))?;

    Ok(Json(SensorResponse::from_parts(sensor, tank)))
}

/// Register a sensor on a tank
#[utoipa::path(
    post,
    path = "/api/sensors",
    request_body = CreateSensorRequest,
    responses(
        (status = 201, description = "Sensor created", body = SensorResponse),
        (status = 400, description = "Invalid sensor"),
        (status = 404, description = "Tank not found"),
    ),
    tag = "sensors"
)]
pub async fn create_sensor(
    State(state): State<AppState>,
    Json(body): Json<CreateSensorRequest>,
) -> AppResult<(StatusCode, Json<SensorResponse>)> {
    validate_sensor_type(&body.sensor_type)?;
    let tank = find_tank(&state.db, body.tank_id).await?;

    let now = Utc::now();
    let sensor = sensors::ActiveModel {
        tank_id: Set(tank.id),
        sensor_type: Set(body.sensor_type.trim().to_string()),
        device_id: Set(body.device_id),
        unit: Set(body.unit),
        is_active: Set(true),
        last_reading: Set(None),
        last_reading_time: Set(None),
        calibration_date: Set(None),
        created_at: Set(Some(now.into())),
        updated_at: Set(Some(now.into())),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(
        sensor_id = sensor.id,
        tank_id = tank.id,
        sensor_type = %sensor.sensor_type,
        "Sensor created"
    );
    Ok((
        StatusCode::CREATED,
        Json(SensorResponse::from_parts(sensor, Some(tank))),
    ))
}

/// Update a sensor
#[utoipa::path(
    put,
    path = "/api/sensors/{sensor_id}",
    params(
        ("sensor_id" = i32, Path, description = "Sensor ID"),
    ),
    request_body = UpdateSensorRequest,
    responses(
        (status = 200, description = "Sensor updated", body = SensorResponse),
        (status = 404, description = "Sensor or tank not found"),
    ),
    tag = "sensors"
)]
pub async fn update_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<i32>,
    Json(body): Json<UpdateSensorRequest>,
) -> AppResult<Json<SensorResponse>> {
    let current = find_sensor(&state.db, sensor_id).await?;
    let tank = find_tank(&state.db, body.tank_id.unwrap_or(current.tank_id)).await?;

    let mut sensor: sensors::ActiveModel = current.into();
    sensor.tank_id = Set(tank.id);
    if let Some(sensor_type) = body.sensor_type {
        validate_sensor_type(&sensor_type)?;
        sensor.sensor_type = Set(sensor_type.trim().to_string());
    }
    if let Some(device_id) = body.device_id {
        sensor.device_id = Set(Some(device_id));
    }
    if let Some(unit) = body.unit {
        sensor.unit = Set(unit);
    }
    if let Some(is_active) = body.is_active {
        sensor.is_active = Set(is_active);
    }
    if let Some(calibration_date) = body.calibration_date {
        sensor.calibration_date = Set(Some(calibration_date));
    }
    sensor.updated_at = Set(Some(Utc::now().into()));

    let sensor = sensor.update(&state.db).await?;
    Ok(Json(SensorResponse::from_parts(sensor, Some(tank))))
}

/// Delete a sensor together with its readings and alerts
#[utoipa::path(
    delete,
    path = "/api/sensors/{sensor_id}",
    params(
        ("sensor_id" = i32, Path, description = "Sensor ID"),
    ),
    responses(
        (status = 200, description = "Sensor deleted", body = MessageResponse),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "sensors"
)]
pub async fn delete_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let sensor = find_sensor(&state.db, sensor_id).await?;
    sensor.delete(&state.db).await?;

    tracing::info!(sensor_id, "Sensor deleted");
    Ok(Json(MessageResponse::new("Sensor deleted successfully")))
}
