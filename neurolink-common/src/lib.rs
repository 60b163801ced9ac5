//! # NeuroLink Common Library
//!
//! Shared code for the NeuroLink services including:
//! - KPI derivation from emotion classifications
//! - Face region smoothing
//! - Wire message types (client control messages, metrics updates)
//! - Session/measurement persistence
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod kpi;
pub mod smoothing;

pub use error::{Error, Result};
pub use kpi::{KpiEngine, KpiPolicy, KpiSnapshot};
pub use smoothing::{CoordinateSmoother, FaceRegion};
