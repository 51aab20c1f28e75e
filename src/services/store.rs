//! PostgreSQL-backed storage for the ingestion core.
//!
//! Threshold lookups run on every ingested reading, so active bounds are kept
//! in a short-lived cache keyed by `(tank_id, sensor_type)`. Negative results
//! are cached too. The threshold routes invalidate entries they touch; the TTL
//! bounds staleness for anything else.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use sea_orm::{
    prelude::DateTimeWithTimeZone, sea_query::Expr, ActiveModelTrait, ColumnTrait,
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};

use crate::alerting::{
    AlertLedger, NewAlert, ReadingSink, SensorDirectory, ThresholdBounds, ThresholdStore,
};
use crate::entity::{alert_thresholds, alerts, sensor_readings, sensors};
use crate::error::IngestError;

pub type ThresholdKey = (i32, String);

/// Active threshold per `(tank_id, sensor_type)`; `None` means "not configured".
///
/// Every invalidation bumps a generation counter. A load only stays cached if
/// no invalidation happened between its snapshot of the counter and its insert,
/// so a lookup that read the row before an upsert committed cannot outlive the
/// upsert's invalidation.
#[derive(Clone)]
pub struct ThresholdCache {
    entries: Cache<ThresholdKey, Option<ThresholdBounds>>,
    generation: Arc<AtomicU64>,
}

impl ThresholdCache {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn invalidate(&self, key: &ThresholdKey) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate(key).await;
    }

    /// Cached bounds for `key`, or the result of `load`.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: ThresholdKey,
        load: F,
    ) -> Result<Option<ThresholdBounds>, DbErr>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<ThresholdBounds>, DbErr>>,
    {
        if let Some(cached) = self.entries.get(&key).await {
            return Ok(cached);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let bounds = load().await?;

        if self.generation.load(Ordering::SeqCst) == generation {
            self.entries.insert(key.clone(), bounds).await;
            // An invalidation can land between the check and the insert
            if self.generation.load(Ordering::SeqCst) != generation {
                self.entries.invalidate(&key).await;
            }
        }
        Ok(bounds)
    }
}

#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
    thresholds: ThresholdCache,
}

impl PgStore {
    pub fn new(db: DatabaseConnection, threshold_ttl: Duration) -> Self {
        Self {
            db,
            thresholds: ThresholdCache::new(threshold_ttl),
        }
    }

    /// Drop the cached bounds for a pair after its threshold row changed.
    pub async fn invalidate_threshold(&self, tank_id: i32, sensor_type: &str) {
        self.thresholds
            .invalidate(&(tank_id, sensor_type.to_string()))
            .await;
    }
}

async fn insert_reading_on<C: ConnectionTrait>(
    conn: &C,
    sensor_id: i32,
    value: f64,
) -> Result<sensor_readings::Model, DbErr> {
    sensor_readings::ActiveModel {
        sensor_id: Set(sensor_id),
        value: Set(value),
        timestamp: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(conn)
    .await
}

async fn update_last_reading_on<C: ConnectionTrait>(
    conn: &C,
    sensor_id: i32,
    value: f64,
    timestamp: DateTimeWithTimeZone,
) -> Result<(), DbErr> {
    let result = sensors::Entity::update_many()
        .col_expr(sensors::Column::LastReading, Expr::value(value))
        .col_expr(sensors::Column::LastReadingTime, Expr::value(timestamp))
        .filter(sensors::Column::Id.eq(sensor_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(DbErr::RecordNotUpdated);
    }
    Ok(())
}

/// Map a failed alert insert; a unique violation can only come from
/// `alerts_one_open_per_sensor`.
fn alert_insert_error(sensor_id: i32, sql_err: Option<SqlErr>, err: DbErr) -> IngestError {
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(_)) => IngestError::InvariantViolation(sensor_id),
        _ => IngestError::Persistence(err),
    }
}

#[async_trait]
impl SensorDirectory for PgStore {
    async fn find_sensor(&self, sensor_id: i32) -> Result<Option<sensors::Model>, DbErr> {
        sensors::Entity::find_by_id(sensor_id).one(&self.db).await
    }
}

#[async_trait]
impl ReadingSink for PgStore {
    async fn insert_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr> {
        insert_reading_on(&self.db, sensor_id, value).await
    }

    async fn update_sensor_last_reading(
        &self,
        sensor_id: i32,
        value: f64,
        timestamp: DateTimeWithTimeZone,
    ) -> Result<(), DbErr> {
        update_last_reading_on(&self.db, sensor_id, value, timestamp).await
    }

    async fn record_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr> {
        // Dropping the transaction without commit rolls the insert back
        let txn = self.db.begin().await?;
        let reading = insert_reading_on(&txn, sensor_id, value).await?;
        update_last_reading_on(&txn, sensor_id, value, reading.timestamp).await?;
        txn.commit().await?;
        Ok(reading)
    }
}

#[async_trait]
impl ThresholdStore for PgStore {
    async fn active_threshold(
        &self,
        tank_id: i32,
        sensor_type: &str,
    ) -> Result<Option<ThresholdBounds>, DbErr> {
        self.thresholds
            .get_or_load((tank_id, sensor_type.to_string()), || async {
                let row = alert_thresholds::Entity::find()
                    .filter(alert_thresholds::Column::TankId.eq(tank_id))
                    .filter(alert_thresholds::Column::SensorType.eq(sensor_type))
                    .filter(alert_thresholds::Column::IsActive.eq(true))
                    .one(&self.db)
                    .await?;
                Ok::<_, DbErr>(row.map(|row| ThresholdBounds::from(&row)))
            })
            .await
    }
}

#[async_trait]
impl AlertLedger for PgStore {
    async fn unresolved_alert(&self, sensor_id: i32) -> Result<Option<i32>, DbErr> {
        let alert = alerts::Entity::find()
            .filter(alerts::Column::SensorId.eq(sensor_id))
            .filter(alerts::Column::IsResolved.eq(false))
            .order_by_desc(alerts::Column::CreatedAt)
            .one(&self.db)
            .await?;

        Ok(alert.map(|a| a.id))
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<alerts::Model, IngestError> {
        let sensor_id = alert.sensor_id;
        let row = alerts::ActiveModel {
            tank_id: Set(alert.tank_id),
            sensor_id: Set(sensor_id),
            alert_type: Set(alert.kind.as_str().to_string()),
            message: Set(alert.message),
            severity: Set(alert.severity),
            is_resolved: Set(false),
            resolved_at: Set(None),
            resolved_by: Set(None),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        row.insert(&self.db)
            .await
            .map_err(|e| alert_insert_error(sensor_id, e.sql_err(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ThresholdKey {
        (1, "temperature".to_string())
    }

    #[tokio::test]
    async fn loaded_bounds_are_cached() {
        let cache = ThresholdCache::new(Duration::from_secs(60));
        let bounds = Some(ThresholdBounds::new(Some(15.0), Some(20.0)));

        let first = cache.get_or_load(key(), || async { Ok(bounds) }).await.unwrap();
        let second = cache
            .get_or_load(key(), || async { Err(DbErr::Custom("not cached".into())) })
            .await
            .unwrap();

        assert_eq!(first, bounds);
        assert_eq!(second, bounds);
    }

    #[tokio::test]
    async fn invalidation_during_load_discards_the_stale_result() {
        let cache = ThresholdCache::new(Duration::from_secs(60));
        let stale = Some(ThresholdBounds::new(Some(15.0), Some(20.0)));
        let fresh = Some(ThresholdBounds::new(Some(18.0), Some(22.0)));

        // The threshold is upserted while the first lookup is reading the old row
        let loaded = cache
            .get_or_load(key(), || async {
                cache.invalidate(&key()).await;
                Ok(stale)
            })
            .await
            .unwrap();
        assert_eq!(loaded, stale);

        let reloaded = cache.get_or_load(key(), || async { Ok(fresh) }).await.unwrap();
        assert_eq!(reloaded, fresh);
    }

    #[tokio::test]
    async fn failed_loads_are_not_cached() {
        let cache = ThresholdCache::new(Duration::from_secs(60));

        let failed = cache
            .get_or_load(key(), || async { Err(DbErr::Custom("connection reset".into())) })
            .await;
        assert!(failed.is_err());

        let loaded = cache.get_or_load(key(), || async { Ok(None) }).await.unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn unique_violation_means_alert_already_open() {
        let err = alert_insert_error(
            7,
            Some(SqlErr::UniqueConstraintViolation(
                "duplicate key value violates unique constraint \"alerts_one_open_per_sensor\"".into(),
            )),
            DbErr::Custom("duplicate key".into()),
        );
        assert!(matches!(err, IngestError::InvariantViolation(7)));
    }

    #[test]
    fn other_insert_failures_are_persistence_errors() {
        let fk = alert_insert_error(
            7,
            Some(SqlErr::ForeignKeyConstraintViolation("alerts_sensor_id_fkey".into())),
            DbErr::Custom("foreign key".into()),
        );
        assert!(matches!(fk, IngestError::Persistence(_)));

        let other = alert_insert_error(7, None, DbErr::Custom("connection reset".into()));
        assert!(matches!(other, IngestError::Persistence(_)));
    }
}
