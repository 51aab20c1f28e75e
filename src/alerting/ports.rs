//! Storage collaborators consumed by the ingestion core.
//!
//! `services::store::PgStore` is the production implementation; tests plug in
//! an in-memory store.

use async_trait::async_trait;
use sea_orm::{prelude::DateTimeWithTimeZone, DbErr};

use super::evaluator::{AlertKind, ThresholdBounds};
use crate::entity::{alerts, sensor_readings, sensors};
use crate::error::IngestError;

/// Alert row about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub tank_id: i32,
    pub sensor_id: i32,
    pub kind: AlertKind,
    pub message: String,
    pub severity: String,
}

#[async_trait]
pub trait SensorDirectory: Send + Sync {
    async fn find_sensor(&self, sensor_id: i32) -> Result<Option<sensors::Model>, DbErr>;
}

#[async_trait]
pub trait ReadingSink: Send + Sync {
    /// Append a reading; the timestamp is assigned by the sink.
    async fn insert_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr>;

    async fn update_sensor_last_reading(
        &self,
        sensor_id: i32,
        value: f64,
        timestamp: DateTimeWithTimeZone,
    ) -> Result<(), DbErr>;

    /// Append a reading, then refresh the sensor's last reading with its value
    /// and timestamp.
    ///
    /// The provided version runs the two steps in sequence. Transactional
    /// stores override it so a failed refresh leaves no reading behind.
    async fn record_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr> {
        let reading = self.insert_reading(sensor_id, value).await?;
        self.update_sensor_last_reading(sensor_id, value, reading.timestamp)
            .await?;
        Ok(reading)
    }
}

#[async_trait]
pub trait ThresholdStore: Send + Sync {
    /// Bounds of the active threshold for the pair, if one is configured.
    async fn active_threshold(
        &self,
        tank_id: i32,
        sensor_type: &str,
    ) -> Result<Option<ThresholdBounds>, DbErr>;
}

#[async_trait]
pub trait AlertLedger: Send + Sync {
    /// Id of the most recent unresolved alert for the sensor.
    async fn unresolved_alert(&self, sensor_id: i32) -> Result<Option<i32>, DbErr>;

    /// Insert an unresolved alert.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::InvariantViolation` if the sensor already has an
    /// unresolved alert, `IngestError::Persistence` for any other storage failure.
    async fn create_alert(&self, alert: NewAlert) -> Result<alerts::Model, IngestError>;
}

/// Everything the ingestion path needs from storage.
pub trait MonitoringStore: SensorDirectory + ReadingSink + ThresholdStore + AlertLedger {}

impl<T> MonitoringStore for T where T: SensorDirectory + ReadingSink + ThresholdStore + AlertLedger {}
