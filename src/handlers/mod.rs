//! HTTP handlers exposed by the collector

pub mod health;
pub mod ingest;
