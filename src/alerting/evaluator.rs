//! Threshold evaluation for freshly ingested readings.
//!
//! Pure functions only: no storage, no clocks, no notifications.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::alert_thresholds;

/// Active bounds configured for a (tank, sensor type) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ThresholdBounds {
    #[must_use]
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

impl From<&alert_thresholds::Model> for ThresholdBounds {
    fn from(row: &alert_thresholds::Model) -> Self {
        Self::new(row.min_value, row.max_value)
    }
}

/// Kind of alert raised for a breach. Stored in `alerts.alert_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Low,
    High,
}

impl AlertKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one value against its bounds.
///
/// A breach carries the bound it crossed so the alert message can quote it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Breach {
    None,
    Low { bound: f64 },
    High { bound: f64 },
}

impl Breach {
    #[must_use]
    pub fn kind(&self) -> Option<AlertKind> {
        match self {
            Self::None => None,
            Self::Low { .. } => Some(AlertKind::Low),
            Self::High { .. } => Some(AlertKind::High),
        }
    }

    #[must_use]
    pub fn is_breach(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Check a value against its bounds.
///
/// Comparisons are strict: a value equal to `min` or `max` is in range.
/// The low check runs first, so it wins if both bounds are crossed.
#[must_use]
pub fn evaluate(value: f64, bounds: &ThresholdBounds) -> Breach {
    if let Some(min) = bounds.min
        && value < min
    {
        return Breach::Low { bound: min };
    }

    if let Some(max) = bounds.max
        && value > max
    {
        return Breach::High { bound: max };
    }

    Breach::None
}

/// Render the operator-facing alert message for a breach.
///
/// The text is consumed verbatim by existing dashboards, so the wording is fixed.
/// Returns `None` when there is no breach.
#[must_use]
pub fn breach_message(sensor_type: &str, unit: &str, value: f64, breach: &Breach) -> Option<String> {
    match *breach {
        Breach::None => None,
        Breach::Low { bound } => Some(format!(
            "{sensor_type} está por debajo del umbral mínimo ({value} {unit} < {bound} {unit})"
        )),
        Breach::High { bound } => Some(format!(
            "{sensor_type} está por encima del umbral máximo ({value} {unit} > {bound} {unit})"
        )),
    }
}
