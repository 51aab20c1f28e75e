//! In-memory collaborators for exercising the ingestion pipeline without a database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{prelude::DateTimeWithTimeZone, DbErr};

use fishery_monitor::alerting::{
    AlertLedger, Ingestor, NewAlert, ReadingSink, SensorDirectory, ThresholdBounds, ThresholdStore,
};
use fishery_monitor::entity::{alerts, sensor_readings, sensors};
use fishery_monitor::error::IngestError;
use fishery_monitor::notify::{Channel, Notifier};

/// Store that enforces one unresolved alert per sensor like the database index does.
#[derive(Default)]
pub struct MemoryStore {
    sensors: Mutex<HashMap<i32, sensors::Model>>,
    readings: Mutex<Vec<sensor_readings::Model>>,
    thresholds: Mutex<HashMap<(i32, String), ThresholdBounds>>,
    alerts: Mutex<Vec<alerts::Model>>,
    next_reading_id: AtomicI64,
    next_alert_id: AtomicI32,
    /// Make reading inserts fail
    pub fail_reading_insert: AtomicBool,
    /// Make the last-reading refresh fail after the reading was written
    pub fail_last_reading_update: AtomicBool,
    /// Make `unresolved_alert` always report nothing, so only the insert guard remains
    pub hide_open_alerts: AtomicBool,
    /// Accept every alert insert, so only the in-process lock remains
    pub unguarded_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sensor(&self, id: i32, tank_id: i32, sensor_type: &str, unit: &str) {
        let now = Utc::now().fixed_offset();
        self.sensors.lock().unwrap().insert(
            id,
            sensors::Model {
                id,
                tank_id,
                sensor_type: sensor_type.to_string(),
                device_id: None,
                unit: unit.to_string(),
                is_active: true,
                last_reading: None,
                last_reading_time: None,
                calibration_date: None,
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
    }

    pub fn set_threshold(&self, tank_id: i32, sensor_type: &str, min: Option<f64>, max: Option<f64>) {
        self.thresholds
            .lock()
            .unwrap()
            .insert((tank_id, sensor_type.to_string()), ThresholdBounds::new(min, max));
    }

    pub fn sensor(&self, id: i32) -> Option<sensors::Model> {
        self.sensors.lock().unwrap().get(&id).cloned()
    }

    fn next_reading(&self, sensor_id: i32, value: f64) -> Result<sensor_readings::Model, DbErr> {
        if self.fail_reading_insert.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("connection reset".to_string()));
        }
        Ok(sensor_readings::Model {
            id: self.next_reading_id.fetch_add(1, Ordering::SeqCst) + 1,
            sensor_id,
            value,
            timestamp: Utc::now().fixed_offset(),
        })
    }

    pub fn readings(&self) -> Vec<sensor_readings::Model> {
        self.readings.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<alerts::Model> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn open_alerts(&self, sensor_id: i32) -> Vec<alerts::Model> {
        self.alerts()
            .into_iter()
            .filter(|a| a.sensor_id == sensor_id && !a.is_resolved)
            .collect()
    }

    /// Mark an alert resolved, as the resolve endpoint does.
    pub fn resolve(&self, alert_id: i32) {
        let mut alerts = self.alerts.lock().unwrap();
        if let Some(alert) = alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.is_resolved = true;
            alert.resolved_at = Some(Utc::now().fixed_offset());
            alert.resolved_by = Some("operator".to_string());
        }
    }
}

#[async_trait]
impl SensorDirectory for MemoryStore {
    async fn find_sensor(&self, sensor_id: i32) -> Result<Option<sensors::Model>, DbErr> {
        Ok(self.sensor(sensor_id))
    }
}

#[async_trait]
impl ReadingSink for MemoryStore {
    async fn insert_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr> {
        let reading = self.next_reading(sensor_id, value)?;
        self.readings.lock().unwrap().push(reading.clone());
        Ok(reading)
    }

    async fn update_sensor_last_reading(
        &self,
        sensor_id: i32,
        value: f64,
        timestamp: DateTimeWithTimeZone,
    ) -> Result<(), DbErr> {
        let mut sensors = self.sensors.lock().unwrap();
        let sensor = sensors
            .get_mut(&sensor_id)
            .ok_or(DbErr::RecordNotUpdated)?;
        sensor.last_reading = Some(value);
        sensor.last_reading_time = Some(timestamp);
        Ok(())
    }

    /// Both writes happen under the sensors lock, or neither does.
    async fn record_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr> {
        let reading = self.next_reading(sensor_id, value)?;
        let mut sensors = self.sensors.lock().unwrap();
        if self.fail_last_reading_update.load(Ordering::SeqCst) {
            return Err(DbErr::RecordNotUpdated);
        }
        let sensor = sensors
            .get_mut(&sensor_id)
            .ok_or(DbErr::RecordNotUpdated)?;
        sensor.last_reading = Some(value);
        sensor.last_reading_time = Some(reading.timestamp);
        self.readings.lock().unwrap().push(reading.clone());
        Ok(reading)
    }
}

#[async_trait]
impl ThresholdStore for MemoryStore {
    async fn active_threshold(
        &self,
        tank_id: i32,
        sensor_type: &str,
    ) -> Result<Option<ThresholdBounds>, DbErr> {
        Ok(self
            .thresholds
            .lock()
            .unwrap()
            .get(&(tank_id, sensor_type.to_string()))
            .copied())
    }
}

#[async_trait]
impl AlertLedger for MemoryStore {
    async fn unresolved_alert(&self, sensor_id: i32) -> Result<Option<i32>, DbErr> {
        // Give concurrent ingests a chance to interleave between check and insert
        tokio::task::yield_now().await;
        if self.hide_open_alerts.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.sensor_id == sensor_id && !a.is_resolved)
            .map(|a| a.id)
            .max())
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<alerts::Model, IngestError> {
        tokio::task::yield_now().await;
        let mut alerts = self.alerts.lock().unwrap();
        if !self.unguarded_inserts.load(Ordering::SeqCst)
            && alerts
                .iter()
                .any(|a| a.sensor_id == alert.sensor_id && !a.is_resolved)
        {
            return Err(IngestError::InvariantViolation(alert.sensor_id));
        }
        let model = alerts::Model {
            id: self.next_alert_id.fetch_add(1, Ordering::SeqCst) + 1,
            tank_id: alert.tank_id,
            sensor_id: alert.sensor_id,
            alert_type: alert.kind.as_str().to_string(),
            message: alert.message,
            severity: alert.severity,
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            created_at: Utc::now().fixed_offset(),
        };
        alerts.push(model.clone());
        Ok(model)
    }
}

/// Notifier that remembers every publish call.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Channel, &'static str, serde_json::Value)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Channel, &'static str, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|(_, e, _)| *e == event).count()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, channel: Channel, event: &'static str, payload: serde_json::Value) {
        self.events.lock().unwrap().push((channel, event, payload));
    }
}

/// Tank 1 with a temperature sensor (id 10, °C) and an oxygen sensor (id 11, mg/L).
pub fn fixture() -> (Arc<MemoryStore>, Arc<RecordingNotifier>, Ingestor) {
    let store = Arc::new(MemoryStore::new());
    store.add_sensor(10, 1, "temperature", "°C");
    store.add_sensor(11, 1, "oxygen", "mg/L");
    let notifier = Arc::new(RecordingNotifier::default());
    let ingestor = Ingestor::new(store.clone(), notifier.clone());
    (store, notifier, ingestor)
}
