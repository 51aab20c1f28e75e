//! At-most-one-open-alert enforcement.
//!
//! The check for an unresolved alert and the insert of a new one run under a
//! per-sensor async lock, so concurrent breaches on one sensor inside this
//! process are serialized while different sensors never wait on each other.
//! The partial unique index `alerts_one_open_per_sensor` backs this up at the
//! storage layer; a violation of it is reported by the ledger as
//! `IngestError::InvariantViolation` and treated here as "already open".

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::evaluator::Breach;
use super::ports::{AlertLedger, NewAlert};
use crate::entity::alerts;
use crate::error::IngestError;

/// Severity assigned to every threshold alert, whatever the breach kind.
pub const ALERT_SEVERITY: &str = "high";

#[derive(Default)]
pub struct AlertDeduplicator {
    locks: SensorLocks,
}

impl AlertDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an alert for the sensor unless one is already unresolved.
    ///
    /// Returns the created alert, or `None` when the breach is `Breach::None`
    /// or an unresolved alert already exists.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Persistence` if the ledger lookup or insert fails.
    pub async fn maybe_open_alert<L>(
        &self,
        ledger: &L,
        sensor_id: i32,
        tank_id: i32,
        breach: &Breach,
        message: String,
    ) -> Result<Option<alerts::Model>, IngestError>
    where
        L: AlertLedger + ?Sized,
    {
        let Some(kind) = breach.kind() else {
            return Ok(None);
        };

        let _guard = self.locks.acquire(sensor_id).await;

        if let Some(existing) = ledger.unresolved_alert(sensor_id).await? {
            tracing::debug!(
                sensor_id,
                alert_id = existing,
                "Unresolved alert already open, not creating another"
            );
            return Ok(None);
        }

        let new_alert = NewAlert {
            tank_id,
            sensor_id,
            kind,
            message,
            severity: ALERT_SEVERITY.to_string(),
        };

        match ledger.create_alert(new_alert).await {
            Ok(alert) => {
                tracing::info!(
                    sensor_id,
                    tank_id,
                    alert_id = alert.id,
                    alert_type = %kind,
                    "Alert opened"
                );
                Ok(Some(alert))
            }
            Err(IngestError::InvariantViolation(_)) => {
                tracing::warn!(
                    sensor_id,
                    "Concurrent alert insert rejected by storage, keeping the existing one"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Lazily created async mutexes keyed by sensor id.
///
/// Entries are dropped once nobody holds or waits on them.
#[derive(Default)]
struct SensorLocks {
    inner: Mutex<HashMap<i32, Arc<AsyncMutex<()>>>>,
}

impl SensorLocks {
    async fn acquire(&self, sensor_id: i32) -> SensorGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(sensor_id).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;

        SensorGuard {
            locks: self,
            sensor_id,
            lock,
            guard: Some(guard),
        }
    }
}

struct SensorGuard<'a> {
    locks: &'a SensorLocks,
    sensor_id: i32,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SensorGuard<'_> {
    fn drop(&mut self) {
        // Release before pruning so the count below only sees the map and us
        drop(self.guard.take());

        let mut map = self
            .locks
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.sensor_id);
        }
    }
}
