//! Fishery Monitor - tank, sensor and alert monitoring API
//!
//! This library exposes the core modules for testing and reuse.

pub mod alerting;
pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod notify;
pub mod routes;
pub mod services;
