use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::{sensors, tanks};

#[derive(Debug, Serialize, ToSchema)]
pub struct TankResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Volume in litres
    pub capacity: Option<f64>,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<tanks::Model> for TankResponse {
    fn from(t: tanks::Model) -> Self {
        Self {
            id: t.id,
            name: t.name,
            description: t.description,
            capacity: t.capacity,
            location: t.location,
            is_active: t.is_active,
            created_at: t.created_at.map(|ts| ts.with_timezone(&Utc)),
            updated_at: t.updated_at.map(|ts| ts.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTankRequest {
    pub name: String,
    pub description: Option<String>,
    pub capacity: Option<f64>,
    pub location: Option<String>,
}

/// Partial update; omitted fields keep their current value
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTankRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<f64>,
    pub location: Option<String>,
    pub is_active: Option<bool>,
}

/// Latest value of one active sensor
#[derive(Debug, Serialize, ToSchema)]
pub struct SensorSnapshot {
    pub id: i32,
    pub sensor_type: String,
    pub unit: String,
    pub last_reading: Option<f64>,
    pub last_reading_time: Option<DateTime<Utc>>,
}

impl From<sensors::Model> for SensorSnapshot {
    fn from(s: sensors::Model) -> Self {
        Self {
            id: s.id,
            sensor_type: s.sensor_type,
            unit: s.unit,
            last_reading: s.last_reading,
            last_reading_time: s.last_reading_time.map(|ts| ts.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TankStatsResponse {
    pub sensors: Vec<SensorSnapshot>,
    /// Number of unresolved alerts for the tank
    pub active_alerts: u64,
}
