use std::sync::Arc;

use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use serde_json::json;

use super::dedup::AlertDeduplicator;
use super::evaluator::{breach_message, evaluate};
use super::ports::MonitoringStore;
use crate::entity::{alerts, sensor_readings, sensors};
use crate::error::IngestError;
use crate::notify::{Channel, Notifier, EVENT_NEW_ALERT, EVENT_SENSOR_READING};

/// Result of ingesting one reading.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub reading: sensor_readings::Model,
    /// Alert opened by this reading, if any
    pub alert: Option<alerts::Model>,
}

/// Payload of the `sensor_reading` event.
#[derive(Debug, Serialize)]
struct ReadingEvent<'a> {
    sensor_id: i32,
    sensor_type: &'a str,
    value: f64,
    unit: &'a str,
    timestamp: DateTimeWithTimeZone,
}

/// Runs the reading ingestion pipeline: persist, evaluate, deduplicate, notify.
pub struct Ingestor {
    store: Arc<dyn MonitoringStore>,
    notifier: Arc<dyn Notifier>,
    dedup: AlertDeduplicator,
}

impl Ingestor {
    pub fn new(store: Arc<dyn MonitoringStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            dedup: AlertDeduplicator::new(),
        }
    }

    /// Store a reading for a sensor and raise an alert if it breaches the
    /// tank's threshold for that sensor type.
    ///
    /// Events are published only after the corresponding rows are stored.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::NotFound` if the sensor does not exist and
    /// `IngestError::Persistence` if any storage step fails. Nothing after the
    /// failing step runs.
    pub async fn ingest_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<IngestOutcome, IngestError> {
        let sensor = self
            .store
            .find_sensor(sensor_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("Sensor {sensor_id} not found")))?;

        let reading = self.store.record_reading(sensor.id, value).await?;

        tracing::debug!(
            sensor_id = sensor.id,
            tank_id = sensor.tank_id,
            value,
            "Reading stored"
        );

        let alert = self.check_threshold(&sensor, value).await?;

        let event = ReadingEvent {
            sensor_id: sensor.id,
            sensor_type: &sensor.sensor_type,
            value,
            unit: &sensor.unit,
            timestamp: reading.timestamp,
        };
        self.notifier
            .publish(Channel::Tank(sensor.tank_id), EVENT_SENSOR_READING, json!(event));

        if let Some(alert) = &alert {
            let payload = json!(alert);
            self.notifier
                .publish(Channel::Tank(sensor.tank_id), EVENT_NEW_ALERT, payload.clone());
            self.notifier.publish(Channel::Global, EVENT_NEW_ALERT, payload);
        }

        Ok(IngestOutcome { reading, alert })
    }

    async fn check_threshold(
        &self,
        sensor: &sensors::Model,
        value: f64,
    ) -> Result<Option<alerts::Model>, IngestError> {
        let Some(bounds) = self
            .store
            .active_threshold(sensor.tank_id, &sensor.sensor_type)
            .await?
        else {
            return Ok(None);
        };

        let breach = evaluate(value, &bounds);
        let Some(message) = breach_message(&sensor.sensor_type, &sensor.unit, value, &breach)
        else {
            return Ok(None);
        };

        self.dedup
            .maybe_open_alert(
                self.store.as_ref(),
                sensor.id,
                sensor.tank_id,
                &breach,
                message,
            )
            .await
    }
}
