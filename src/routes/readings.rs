use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DbErr, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, Statement,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::common::AppState;
use crate::entity::sensor_readings;
use crate::error::{AppError, AppResult};
use crate::routes::alerts::AlertResponse;
use crate::routes::find_sensor;

const MAX_PAGE_SIZE: u64 = 1000;
const MAX_BUCKETS: i64 = 1000;

/// `date_trunc` units accepted for aggregation
const INTERVALS: &[&str] = &["minute", "hour", "day", "week", "month"];

fn default_limit() -> u64 {
    100
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReadingRequest {
    pub value: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingResponse {
    pub id: i64,
    pub sensor_id: i32,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<sensor_readings::Model> for ReadingResponse {
    fn from(r: sensor_readings::Model) -> Self {
        Self {
            id: r.id,
            sensor_id: r.sensor_id,
            value: r.value,
            timestamp: r.timestamp.with_timezone(&Utc),
        }
    }
}

/// Stored reading plus the alert it opened, if any
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    #[serde(flatten)]
    pub reading: ReadingResponse,
    pub alert: Option<AlertResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReadingsQuery {
    /// Start time (optional, ISO 8601)
    pub start: Option<DateTime<Utc>>,
    /// End time (optional, ISO 8601)
    pub end: Option<DateTime<Utc>>,
    /// Page size, 1 to 1000 (default 100)
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AggregateQuery {
    /// Bucket width: minute, hour (default), day, week or month
    pub interval: Option<String>,
    /// Start time (optional, ISO 8601)
    pub start: Option<DateTime<Utc>>,
    /// End time (optional, ISO 8601)
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AggregateBucket {
    pub time_bucket: DateTime<Utc>,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub count: i64,
}

#[derive(Debug, FromQueryResult)]
struct BucketRow {
    time_bucket: DateTime<FixedOffset>,
    avg_value: f64,
    min_value: f64,
    max_value: f64,
    count: i64,
}

impl From<BucketRow> for AggregateBucket {
    fn from(row: BucketRow) -> Self {
        Self {
            time_bucket: row.time_bucket.with_timezone(&Utc),
            avg_value: row.avg_value,
            min_value: row.min_value,
            max_value: row.max_value,
            count: row.count,
        }
    }
}

/// Any row that fails to decode fails the whole aggregation.
fn collect_buckets<I>(rows: I) -> Result<Vec<AggregateBucket>, DbErr>
where
    I: IntoIterator<Item = Result<BucketRow, DbErr>>,
{
    rows.into_iter()
        .map(|row| row.map(AggregateBucket::from))
        .collect()
}

/// Reject a time range whose end is not after its start.
pub(crate) fn validate_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end)
        && end <= start
    {
        return Err(AppError::BadRequest(
            "end time must be after start time".to_string(),
        ));
    }
    Ok(())
}

/// Unknown intervals fall back to hourly buckets.
fn bucket_interval(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|wanted| INTERVALS.iter().find(|i| i.eq_ignore_ascii_case(wanted)))
        .copied()
        .unwrap_or("hour")
}

/// Ingest a reading
///
/// Stores the value, refreshes the sensor's last reading, checks the tank
/// threshold for the sensor type and opens an alert when it is breached and no
/// alert is already open for the sensor.
#[utoipa::path(
    post,
    path = "/api/sensors/{sensor_id}/readings",
    params(
        ("sensor_id" = i32, Path, description = "Sensor ID"),
    ),
    request_body = CreateReadingRequest,
    responses(
        (status = 201, description = "Reading stored", body = IngestResponse),
        (status = 404, description = "Sensor not found"),
        (status = 429, description = "Rate limit exceeded"),
    ),
    tag = "readings"
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    Path(sensor_id): Path<i32>,
    Json(body): Json<CreateReadingRequest>,
) -> AppResult<(StatusCode, Json<IngestResponse>)> {
    if !body.value.is_finite() {
        return Err(AppError::BadRequest("value must be a finite number".to_string()));
    }

    let outcome = state.ingestor.ingest_reading(sensor_id, body.value).await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            reading: outcome.reading.into(),
            alert: outcome.alert.map(AlertResponse::from),
        }),
    ))
}

/// List readings of a sensor, newest first
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/readings",
    params(
        ("sensor_id" = i32, Path, description = "Sensor ID"),
        ReadingsQuery
    ),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = Vec<ReadingResponse>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    Path(sensor_id): Path<i32>,
    Query(query): Query<ReadingsQuery>,
) -> AppResult<Json<Vec<ReadingResponse>>> {
    validate_range(query.start, query.end)?;
    let sensor = find_sensor(&state.db, sensor_id).await?;

    let mut db_query =
        sensor_readings::Entity::find().filter(sensor_readings::Column::SensorId.eq(sensor.id));

    if let Some(start) = query.start {
        db_query = db_query.filter(sensor_readings::Column::Timestamp.gte(start));
    }
    if let Some(end) = query.end {
        db_query = db_query.filter(sensor_readings::Column::Timestamp.lte(end));
    }

    let readings = db_query
        .order_by_desc(sensor_readings::Column::Timestamp)
        .order_by_desc(sensor_readings::Column::Id)
        .limit(query.limit.clamp(1, MAX_PAGE_SIZE))
        .offset(query.offset)
        .all(&state.db)
        .await?;

    Ok(Json(readings.into_iter().map(ReadingResponse::from).collect()))
}

/// Aggregate readings of a sensor into time buckets
///
/// Returns average, minimum, maximum and count per bucket, newest bucket first.
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/readings/aggregate",
    params(
        ("sensor_id" = i32, Path, description = "Sensor ID"),
        AggregateQuery
    ),
    responses(
        (status = 200, description = "Aggregates computed", body = Vec<AggregateBucket>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "readings"
)]
pub async fn aggregate_readings(
    State(state): State<AppState>,
    Path(sensor_id): Path<i32>,
    Query(query): Query<AggregateQuery>,
) -> AppResult<Json<Vec<AggregateBucket>>> {
    validate_range(query.start, query.end)?;
    let sensor = find_sensor(&state.db, sensor_id).await?;
    let interval = bucket_interval(query.interval.as_deref());

    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"SELECT date_trunc($1, "timestamp") AS time_bucket,
                  AVG(value) AS avg_value,
                  MIN(value) AS min_value,
                  MAX(value) AS max_value,
                  COUNT(*) AS count
           FROM sensor_readings
           WHERE sensor_id = $2
             AND ($3::timestamptz IS NULL OR "timestamp" >= $3)
             AND ($4::timestamptz IS NULL OR "timestamp" <= $4)
           GROUP BY 1
           ORDER BY 1 DESC
           LIMIT $5"#,
        [
            interval.into(),
            sensor.id.into(),
            query.start.into(),
            query.end.into(),
            MAX_BUCKETS.into(),
        ],
    );

    let rows = state.db.query_all(stmt).await?;
    let buckets =
        collect_buckets(rows.iter().map(|row| BucketRow::from_query_result(row, "")))?;

    tracing::debug!(sensor_id, interval, buckets = buckets.len(), "Readings aggregated");
    Ok(Json(buckets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_intervals_are_kept() {
        assert_eq!(bucket_interval(Some("day")), "day");
        assert_eq!(bucket_interval(Some("MINUTE")), "minute");
    }

    #[test]
    fn unknown_interval_falls_back_to_hour() {
        assert_eq!(bucket_interval(None), "hour");
        assert_eq!(bucket_interval(Some("fortnight")), "hour");
        assert_eq!(bucket_interval(Some("hour; DROP TABLE tanks")), "hour");
    }

    fn bucket(count: i64) -> BucketRow {
        BucketRow {
            time_bucket: Utc::now().fixed_offset(),
            avg_value: 21.5,
            min_value: 20.0,
            max_value: 23.0,
            count,
        }
    }

    #[test]
    fn buckets_keep_every_decoded_row() {
        let buckets = collect_buckets([Ok(bucket(4)), Ok(bucket(2))]).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].count, 4);
    }

    #[test]
    fn undecodable_row_fails_the_aggregation() {
        let rows = [
            Ok(bucket(4)),
            Err(DbErr::Type("avg_value: expected f64, found NUMERIC".to_string())),
            Ok(bucket(2)),
        ];
        assert!(collect_buckets(rows).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(1);
        assert!(validate_range(Some(now), Some(earlier)).is_err());
        assert!(validate_range(Some(earlier), Some(now)).is_ok());
        assert!(validate_range(None, Some(now)).is_ok());
    }
}
