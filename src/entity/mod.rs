pub mod alert_thresholds;
pub mod alerts;
pub mod sensor_readings;
pub mod sensors;
pub mod tanks;
