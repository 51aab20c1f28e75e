use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::{sensors, tanks};

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorResponse {
    pub id: i32,
    pub tank_id: i32,
    pub tank_name: Option<String>,
    pub sensor_type: String,
    pub device_id: Option<String>,
    pub unit: String,
    pub is_active: bool,
    pub last_reading: Option<f64>,
    pub last_reading_time: Option<DateTime<Utc>>,
    pub calibration_date: Option<NaiveDate>,
}

impl SensorResponse {
    pub fn from_parts(s: sensors::Model, tank: Option<tanks::Model>) -> Self {
        Self {
            id: s.id,
            tank_id: s.tank_id,
            tank_name: tank.map(|t| t.name),
            sensor_type: s.sensor_type,
            device_id: s.device_id,
            unit: s.unit,
            is_active: s.is_active,
            last_reading: s.last_reading,
            last_reading_time: s.last_reading_time.map(|ts| ts.with_timezone(&Utc)),
            calibration_date: s.calibration_date,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SensorsQuery {
    /// Filter by tank ID
    pub tank_id: Option<i32>,
    /// Filter by sensor type
    pub sensor_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSensorRequest {
    pub tank_id: i32,
    /// e.g. temperature, oxygen, pH
    pub sensor_type: String,
    pub device_id: Option<String>,
    #[serde(default)]
    pub unit: String,
}

/// Partial update; omitted fields keep their current value
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSensorRequest {
    pub tank_id: Option<i32>,
    pub sensor_type: Option<String>,
    pub device_id: Option<String>,
    pub unit: Option<String>,
    pub is_active: Option<bool>,
    pub calibration_date: Option<NaiveDate>,
}
