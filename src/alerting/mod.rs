//! Threshold alerting on the reading ingestion path.
//!
//! - [`evaluator`]: pure min/max breach detection and alert message text
//! - [`dedup`]: at most one unresolved alert per sensor
//! - [`ingest`]: the ordered persist → evaluate → alert → notify pipeline
//! - [`ports`]: storage collaborators the pipeline runs against

pub mod dedup;
pub mod evaluator;
pub mod ingest;
pub mod ports;

pub use dedup::{AlertDeduplicator, ALERT_SEVERITY};
pub use evaluator::{breach_message, evaluate, AlertKind, Breach, ThresholdBounds};
pub use ingest::{IngestOutcome, Ingestor};
pub use ports::{AlertLedger, MonitoringStore, NewAlert, ReadingSink, SensorDirectory, ThresholdStore};
