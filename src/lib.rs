//! Explainability job orchestration
//!
//! This library provides the core of the explain-jobs system: submitting
//! importance-map analyses for medical images, running them out-of-band in a
//! worker process, and reconciling their outcome from the artifact store into
//! durable job records.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
