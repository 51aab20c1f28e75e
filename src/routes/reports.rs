use axum::{extract::State, Json};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ConnectionTrait, DatabaseBackend, DbErr, FromQueryResult, Statement};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::routes::readings::validate_range;

const MAX_REPORT_READINGS: i64 = 10_000;
const MAX_REPORT_ALERTS: i64 = 1_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SensorDataReportRequest {
    pub tank_id: Option<i32>,
    pub sensor_type: Option<String>,
    /// Readings taken at or after (ISO 8601)
    pub start_date: Option<DateTime<Utc>>,
    /// Readings taken at or before (ISO 8601)
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AlertsReportRequest {
    pub tank_id: Option<i32>,
    pub severity: Option<String>,
    /// Alerts created at or after (ISO 8601)
    pub start_date: Option<DateTime<Utc>>,
    /// Alerts created at or before (ISO 8601)
    pub end_date: Option<DateTime<Utc>>,
}

/// Header of a generated report. Reports are computed on request and not stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportInfo {
    pub report_type: String,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    /// Filters the report was generated with
    #[schema(value_type = Object)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorDataRow {
    pub id: i64,
    pub sensor_id: i32,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub sensor_type: String,
    pub unit: String,
    pub tank_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorDataReport {
    pub report: ReportInfo,
    pub data: Vec<SensorDataRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertReportRow {
    pub id: i32,
    pub tank_id: i32,
    pub sensor_id: i32,
    pub alert_type: String,
    pub message: String,
    pub severity: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tank_name: Option<String>,
    pub sensor_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertsReport {
    pub report: ReportInfo,
    pub alerts: Vec<AlertReportRow>,
}

#[derive(Debug, FromQueryResult)]
struct ReadingRow {
    id: i64,
    sensor_id: i32,
    value: f64,
    timestamp: DateTime<FixedOffset>,
    sensor_type: String,
    unit: String,
    tank_name: String,
}

impl From<ReadingRow> for SensorDataRow {
    fn from(row: ReadingRow) -> Self {
        Self {
            id: row.id,
            sensor_id: row.sensor_id,
            value: row.value,
            timestamp: row.timestamp.with_timezone(&Utc),
            sensor_type: row.sensor_type,
            unit: row.unit,
            tank_name: row.tank_name,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct AlertRow {
    id: i32,
    tank_id: i32,
    sensor_id: i32,
    alert_type: String,
    message: String,
    severity: String,
    is_resolved: bool,
    resolved_at: Option<DateTime<FixedOffset>>,
    resolved_by: Option<String>,
    created_at: DateTime<FixedOffset>,
    tank_name: Option<String>,
    sensor_type: Option<String>,
}

impl From<AlertRow> for AlertReportRow {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id,
            tank_id: row.tank_id,
            sensor_id: row.sensor_id,
            alert_type: row.alert_type,
            message: row.message,
            severity: row.severity,
            is_resolved: row.is_resolved,
            resolved_at: row.resolved_at.map(|ts| ts.with_timezone(&Utc)),
            resolved_by: row.resolved_by,
            created_at: row.created_at.with_timezone(&Utc),
            tank_name: row.tank_name,
            sensor_type: row.sensor_type,
        }
    }
}

/// Report titles carry the generation date in day/month/year form.
fn report_title(prefix: &str, generated_at: DateTime<Utc>) -> String {
    format!("{prefix} - {}", generated_at.format("%d/%m/%Y"))
}

fn report_info<P: Serialize>(report_type: &str, prefix: &str, parameters: &P) -> AppResult<ReportInfo> {
    let generated_at = Utc::now();
    Ok(ReportInfo {
        report_type: report_type.to_string(),
        title: report_title(prefix, generated_at),
        generated_at,
        parameters: serde_json::to_value(parameters).map_err(|e| AppError::Internal(e.to_string()))?,
    })
}

/// Blank filters match everything.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Sensor data report
///
/// Readings joined with their sensor and tank, newest first, at most 10 000 rows.
#[utoipa::path(
    post,
    path = "/api/reports/sensor-data",
    request_body = SensorDataReportRequest,
    responses(
        (status = 200, description = "Report generated", body = SensorDataReport),
        (status = 400, description = "Invalid date range"),
    ),
    tag = "reports"
)]
pub async fn sensor_data_report(
    State(state): State<AppState>,
    Json(mut body): Json<SensorDataReportRequest>,
) -> AppResult<Json<SensorDataReport>> {
    validate_range(body.start_date, body.end_date)?;
    body.sensor_type = non_blank(body.sensor_type);

    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"SELECT sr.id, sr.sensor_id, sr.value, sr."timestamp",
                  s.sensor_type, s.unit, t.name AS tank_name
           FROM sensor_readings sr
           JOIN sensors s ON sr.sensor_id = s.id
           JOIN tanks t ON s.tank_id = t.id
           WHERE ($1::int IS NULL OR t.id = $1)
             AND ($2::text IS NULL OR s.sensor_type = $2)
             AND ($3::timestamptz IS NULL OR sr."timestamp" >= $3)
             AND ($4::timestamptz IS NULL OR sr."timestamp" <= $4)
           ORDER BY sr."timestamp" DESC, sr.id DESC
           LIMIT $5"#,
        [
            body.tank_id.into(),
            body.sensor_type.clone().into(),
            body.start_date.into(),
            body.end_date.into(),
            MAX_REPORT_READINGS.into(),
        ],
    );

    let data = state
        .db
        .query_all(stmt)
        .await?
        .iter()
        .map(|row| ReadingRow::from_query_result(row, "").map(SensorDataRow::from))
        .collect::<Result<Vec<_>, DbErr>>()?;

    tracing::info!(rows = data.len(), tank_id = ?body.tank_id, "Sensor data report generated");
    Ok(Json(SensorDataReport {
        report: report_info("sensor_data", "Reporte de Datos de Sensores", &body)?,
        data,
    }))
}

/// Alerts report
///
/// Alerts with their tank name and sensor type, newest first, at most 1 000 rows.
#[utoipa::path(
    post,
    path = "/api/reports/alerts",
    request_body = AlertsReportRequest,
    responses(
        (status = 200, description = "Report generated", body = AlertsReport),
        (status = 400, description = "Invalid date range"),
    ),
    tag = "reports"
)]
pub async fn alerts_report(
    State(state): State<AppState>,
    Json(mut body): Json<AlertsReportRequest>,
) -> AppResult<Json<AlertsReport>> {
    validate_range(body.start_date, body.end_date)?;
    body.severity = non_blank(body.severity);

    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"SELECT a.id, a.tank_id, a.sensor_id, a.alert_type, a.message, a.severity,
                  a.is_resolved, a.resolved_at, a.resolved_by, a.created_at,
                  t.name AS tank_name, s.sensor_type
           FROM alerts a
           LEFT JOIN tanks t ON a.tank_id = t.id
           LEFT JOIN sensors s ON a.sensor_id = s.id
           WHERE ($1::int IS NULL OR a.tank_id = $1)
             AND ($2::text IS NULL OR a.severity = $2)
             AND ($3::timestamptz IS NULL OR a.created_at >= $3)
             AND ($4::timestamptz IS NULL OR a.created_at <= $4)
           ORDER BY a.created_at DESC, a.id DESC
           LIMIT $5"#,
        [
            body.tank_id.into(),
            body.severity.clone().into(),
            body.start_date.into(),
            body.end_date.into(),
            MAX_REPORT_ALERTS.into(),
        ],
    );

    let alerts = state
        .db
        .query_all(stmt)
        .await?
        .iter()
        .map(|row| AlertRow::from_query_result(row, "").map(AlertReportRow::from))
        .collect::<Result<Vec<_>, DbErr>>()?;

    tracing::info!(rows = alerts.len(), tank_id = ?body.tank_id, "Alerts report generated");
    Ok(Json(AlertsReport {
        report: report_info("alerts", "Reporte de Alertas", &body)?,
        alerts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn title_carries_generation_date() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 22, 15, 0).unwrap();
        assert_eq!(
            report_title("Reporte de Alertas", at),
            "Reporte de Alertas - 07/03/2026"
        );
    }

    #[test]
    fn blank_filters_are_dropped() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" high ".to_string())), Some("high".to_string()));
    }

    #[test]
    fn report_echoes_its_parameters() {
        let params = SensorDataReportRequest {
            tank_id: Some(4),
            sensor_type: Some("oxygen".to_string()),
            ..Default::default()
        };
        let info = report_info("sensor_data", "Reporte de Datos de Sensores", &params).unwrap();
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["report_type"], "sensor_data");
        assert_eq!(json["parameters"]["tank_id"], 4);
        assert_eq!(json["parameters"]["sensor_type"], "oxygen");
        assert!(json["parameters"]["start_date"].is_null());
        assert!(
            json["title"]
                .as_str()
                .unwrap()
                .starts_with("Reporte de Datos de Sensores - ")
        );
    }
}
