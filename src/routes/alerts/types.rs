use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::{alert_thresholds, alerts, sensors, tanks};

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertResponse {
    pub id: i32,
    pub tank_id: i32,
    pub sensor_id: i32,
    pub sensor_type: Option<String>,
    pub unit: Option<String>,
    /// `low` or `high`
    pub alert_type: String,
    pub message: String,
    pub severity: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AlertResponse {
    pub fn from_parts(a: alerts::Model, sensor: Option<sensors::Model>) -> Self {
        let (sensor_type, unit) = match sensor {
            Some(s) => (Some(s.sensor_type), Some(s.unit)),
            None => (None, None),
        };
        Self {
            id: a.id,
            tank_id: a.tank_id,
            sensor_id: a.sensor_id,
            sensor_type,
            unit,
            alert_type: a.alert_type,
            message: a.message,
            severity: a.severity,
            is_resolved: a.is_resolved,
            resolved_at: a.resolved_at.map(|ts| ts.with_timezone(&Utc)),
            resolved_by: a.resolved_by,
            created_at: a.created_at.with_timezone(&Utc),
        }
    }
}

impl From<alerts::Model> for AlertResponse {
    fn from(a: alerts::Model) -> Self {
        Self::from_parts(a, None)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertsQuery {
    /// Filter by tank ID
    pub tank_id: Option<i32>,
    /// Filter by resolution state
    pub is_resolved: Option<bool>,
    pub severity: Option<String>,
    /// Created at or after (optional, ISO 8601)
    pub start: Option<DateTime<Utc>>,
    /// Created at or before (optional, ISO 8601)
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResolveAlertRequest {
    /// Operator who resolved the alert
    pub resolved_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThresholdResponse {
    pub id: i32,
    pub tank_id: i32,
    pub tank_name: Option<String>,
    pub sensor_type: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ThresholdResponse {
    pub fn from_parts(t: alert_thresholds::Model, tank: Option<tanks::Model>) -> Self {
        Self {
            id: t.id,
            tank_id: t.tank_id,
            tank_name: tank.map(|tank| tank.name),
            sensor_type: t.sensor_type,
            min_value: t.min_value,
            max_value: t.max_value,
            is_active: t.is_active,
            updated_at: t.updated_at.map(|ts| ts.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ThresholdsQuery {
    /// Filter by tank ID
    pub tank_id: Option<i32>,
}

/// Creates the threshold for `(tank_id, sensor_type)` or replaces it
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertThresholdRequest {
    pub tank_id: i32,
    pub sensor_type: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Defaults to true
    pub is_active: Option<bool>,
}
