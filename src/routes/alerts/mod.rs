mod handlers;
mod types;

pub use handlers::{
    delete_threshold, get_alert, list_alerts, list_thresholds, resolve_alert, upsert_threshold,
};
pub use types::{
    AlertResponse, AlertsQuery, ResolveAlertRequest, ThresholdResponse, ThresholdsQuery,
    UpsertThresholdRequest,
};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{
    __path_delete_threshold, __path_get_alert, __path_list_alerts, __path_list_thresholds,
    __path_resolve_alert, __path_upsert_threshold,
};
