//! Reading ingestion: persistence order, alert deduplication and events.
//!
//! Run with: cargo test --test ingest_test

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{prelude::DateTimeWithTimeZone, DbErr};

use fishery_monitor::alerting::{
    AlertDeduplicator, Breach, Ingestor, ReadingSink, ALERT_SEVERITY,
};
use fishery_monitor::entity::sensor_readings;
use fishery_monitor::error::IngestError;
use fishery_monitor::notify::{Channel, EVENT_NEW_ALERT, EVENT_SENSOR_READING};

use common::{fixture, MemoryStore, RecordingNotifier};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn reading_below_min_opens_low_alert() {
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));

    let outcome = ingestor.ingest_reading(10, 15.0).await.unwrap();

    let alert = outcome.alert.expect("alert should be opened");
    assert_eq!(alert.alert_type, "low");
    assert_eq!(alert.severity, ALERT_SEVERITY);
    assert_eq!(alert.tank_id, 1);
    assert_eq!(alert.sensor_id, 10);
    assert!(!alert.is_resolved);
    assert!(alert.message.contains("15"));
    assert!(alert.message.contains("20"));

    assert_eq!(store.readings().len(), 1);
    assert_eq!(store.open_alerts(10).len(), 1);

    let events = notifier.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].0, Channel::Tank(1));
    assert_eq!(events[0].1, EVENT_SENSOR_READING);
    assert_eq!(events[1].0, Channel::Tank(1));
    assert_eq!(events[1].1, EVENT_NEW_ALERT);
    assert_eq!(events[2].0, Channel::Global);
    assert_eq!(events[2].1, EVENT_NEW_ALERT);
    assert_eq!(events[1].2, events[2].2);
    assert_eq!(events[2].2["alert_type"], "low");
}

#[tokio::test]
async fn reading_in_range_is_stored_without_alert() {
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));

    let outcome = assert_ok!(ingestor.ingest_reading(10, 25.0).await);

    assert!(outcome.alert.is_none());
    assert_eq!(outcome.reading.value, 25.0);
    assert_eq!(store.readings().len(), 1);
    assert!(store.alerts().is_empty());

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Channel::Tank(1));
    assert_eq!(events[0].1, EVENT_SENSOR_READING);
    assert_eq!(events[0].2["sensor_id"], 10);
    assert_eq!(events[0].2["value"], 25.0);
    assert_eq!(events[0].2["unit"], "°C");
    assert_eq!(events[0].2["sensor_type"], "temperature");
}

#[tokio::test]
async fn open_alert_suppresses_further_alerts() {
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));

    let first = ingestor.ingest_reading(10, 35.0).await.unwrap();
    assert_eq!(first.alert.unwrap().alert_type, "high");

    for value in [35.0, 40.0, 10.0] {
        let outcome = ingestor.ingest_reading(10, value).await.unwrap();
        assert!(outcome.alert.is_none());
    }

    assert_eq!(store.readings().len(), 4);
    assert_eq!(store.alerts().len(), 1);
    assert_eq!(notifier.count(EVENT_SENSOR_READING), 4);
    assert_eq!(notifier.count(EVENT_NEW_ALERT), 2);
}

#[tokio::test]
async fn no_threshold_means_no_alert() {
    let (store, notifier, ingestor) = fixture();
    store.add_sensor(20, 2, "pH", "");

    for value in [-1.0, 0.0, 7.0, 14.0, 1e9] {
        let outcome = ingestor.ingest_reading(20, value).await.unwrap();
        assert!(outcome.alert.is_none());
    }

    assert_eq!(store.readings().len(), 5);
    assert!(store.alerts().is_empty());
    assert_eq!(notifier.count(EVENT_SENSOR_READING), 5);
    assert_eq!(notifier.count(EVENT_NEW_ALERT), 0);
}

#[tokio::test]
async fn threshold_is_scoped_to_tank_and_sensor_type() {
    let (store, _notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    store.add_sensor(30, 2, "temperature", "°C");

    // Oxygen on the same tank and temperature on another tank are unaffected
    assert!(ingestor.ingest_reading(11, 1.0).await.unwrap().alert.is_none());
    assert!(ingestor.ingest_reading(30, 1.0).await.unwrap().alert.is_none());
}

#[tokio::test]
async fn resolving_allows_a_new_alert() {
    let (store, _notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));

    let first = ingestor.ingest_reading(10, 15.0).await.unwrap().alert.unwrap();
    assert!(ingestor.ingest_reading(10, 14.0).await.unwrap().alert.is_none());

    store.resolve(first.id);

    let second = ingestor.ingest_reading(10, 36.0).await.unwrap().alert.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.alert_type, "high");
    assert_eq!(store.alerts().len(), 2);
    assert_eq!(store.open_alerts(10).len(), 1);
}

#[tokio::test]
async fn sensors_alert_independently() {
    let (store, _notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    store.set_threshold(1, "oxygen", Some(5.0), None);

    assert!(ingestor.ingest_reading(10, 15.0).await.unwrap().alert.is_some());
    assert!(ingestor.ingest_reading(11, 3.0).await.unwrap().alert.is_some());
    assert_eq!(store.alerts().len(), 2);
}

#[tokio::test]
async fn last_reading_tracks_latest_value() {
    let (store, _notifier, ingestor) = fixture();

    ingestor.ingest_reading(10, 21.0).await.unwrap();
    let outcome = ingestor.ingest_reading(10, 22.5).await.unwrap();

    let sensor = store.sensor(10).unwrap();
    assert_eq!(sensor.last_reading, Some(22.5));
    assert_eq!(sensor.last_reading_time, Some(outcome.reading.timestamp));
}

#[tokio::test]
async fn unknown_sensor_is_not_found_and_mutates_nothing() {
    let (store, notifier, ingestor) = fixture();

    let err = assert_err!(ingestor.ingest_reading(999, 15.0).await);

    assert!(matches!(err, IngestError::NotFound(_)));
    assert!(store.readings().is_empty());
    assert!(notifier.events().is_empty());
}

#[tokio::test]
async fn failed_reading_insert_stops_the_pipeline() {
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    store.fail_reading_insert.store(true, Ordering::SeqCst);

    let err = assert_err!(ingestor.ingest_reading(10, 15.0).await);

    assert!(matches!(err, IngestError::Persistence(_)));
    let sensor = store.sensor(10).unwrap();
    assert_eq!(sensor.last_reading, None);
    assert_eq!(sensor.last_reading_time, None);
    assert!(store.alerts().is_empty());
    assert!(notifier.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_breaches_open_exactly_one_alert() {
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    let ingestor = Arc::new(ingestor);

    let handles: Vec<_> = (0..32_i32)
        .map(|i| {
            let ingestor = Arc::clone(&ingestor);
            tokio::spawn(async move { ingestor.ingest_reading(10, 40.0 + f64::from(i)).await })
        })
        .collect();

    let mut opened = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().alert.is_some() {
            opened += 1;
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(store.alerts().len(), 1);
    assert_eq!(store.readings().len(), 32);
    assert_eq!(notifier.count(EVENT_SENSOR_READING), 32);
    assert_eq!(notifier.count(EVENT_NEW_ALERT), 2);
}

#[tokio::test]
async fn failed_last_reading_update_keeps_no_reading() {
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    store.fail_last_reading_update.store(true, Ordering::SeqCst);

    let err = assert_err!(ingestor.ingest_reading(10, 15.0).await);

    assert!(matches!(err, IngestError::Persistence(_)));
    assert!(store.readings().is_empty());
    assert_eq!(store.sensor(10).unwrap().last_reading, None);
    assert!(store.alerts().is_empty());
    assert!(notifier.events().is_empty());
}

/// Sink that only knows the two single-step writes.
struct StepwiseSink(Arc<MemoryStore>);

#[async_trait]
impl ReadingSink for StepwiseSink {
    async fn insert_reading(
        &self,
        sensor_id: i32,
        value: f64,
    ) -> Result<sensor_readings::Model, DbErr> {
        self.0.insert_reading(sensor_id, value).await
    }

    async fn update_sensor_last_reading(
        &self,
        sensor_id: i32,
        value: f64,
        timestamp: DateTimeWithTimeZone,
    ) -> Result<(), DbErr> {
        self.0
            .update_sensor_last_reading(sensor_id, value, timestamp)
            .await
    }
}

#[tokio::test]
async fn stepwise_record_writes_reading_then_last_reading() {
    let (store, _, _) = fixture();
    let sink = StepwiseSink(store.clone());

    let reading = assert_ok!(sink.record_reading(11, 7.5).await);

    assert_eq!(store.readings(), vec![reading.clone()]);
    let sensor = store.sensor(11).unwrap();
    assert_eq!(sensor.last_reading, Some(7.5));
    assert_eq!(sensor.last_reading_time, Some(reading.timestamp));

    // Unknown sensor: the reading was already written before the refresh failed
    assert_err!(sink.record_reading(999, 1.0).await);
    assert_eq!(store.readings().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn per_sensor_lock_alone_prevents_duplicates() {
    // Storage accepts duplicates, so only the deduplicator's lock stands between
    // the check and the insert
    let (store, notifier, ingestor) = fixture();
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    store.unguarded_inserts.store(true, Ordering::SeqCst);
    let ingestor = Arc::new(ingestor);

    let handles: Vec<_> = (0..32_i32)
        .map(|i| {
            let ingestor = Arc::clone(&ingestor);
            tokio::spawn(async move { ingestor.ingest_reading(10, 40.0 + f64::from(i)).await })
        })
        .collect();

    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(store.open_alerts(10).len(), 1);
    assert_eq!(notifier.count(EVENT_NEW_ALERT), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_ingestors_are_held_by_the_storage_guard() {
    // Two processes share one database: only the insert guard serializes them
    let store = Arc::new(MemoryStore::new());
    store.add_sensor(10, 1, "temperature", "°C");
    store.set_threshold(1, "temperature", Some(20.0), Some(30.0));
    store.hide_open_alerts.store(true, Ordering::SeqCst);
    let notifier = Arc::new(RecordingNotifier::default());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ingestor = Ingestor::new(store.clone(), notifier.clone());
            tokio::spawn(async move { ingestor.ingest_reading(10, 50.0).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.alerts().len(), 1);
    assert_eq!(notifier.count(EVENT_NEW_ALERT), 2);
}

#[tokio::test]
async fn duplicate_insert_is_a_no_op() {
    let store = MemoryStore::new();
    store.add_sensor(10, 1, "temperature", "°C");
    store.hide_open_alerts.store(true, Ordering::SeqCst);
    let dedup = AlertDeduplicator::new();
    let breach = Breach::Low { bound: 20.0 };

    let first = dedup
        .maybe_open_alert(&store, 10, 1, &breach, "first".to_string())
        .await
        .unwrap();
    let second = dedup
        .maybe_open_alert(&store, 10, 1, &breach, "second".to_string())
        .await
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(store.alerts().len(), 1);
    assert_eq!(store.alerts()[0].message, "first");
}

#[tokio::test]
async fn no_breach_never_touches_the_ledger() {
    let store = MemoryStore::new();
    let dedup = AlertDeduplicator::new();

    let opened = dedup
        .maybe_open_alert(&store, 10, 1, &Breach::None, String::new())
        .await
        .unwrap();

    assert!(opened.is_none());
    assert!(store.alerts().is_empty());
}
