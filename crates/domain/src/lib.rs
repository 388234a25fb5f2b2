//! Domain layer for the fleet tracker.
//!
//! This crate contains:
//! - Domain models (TrackedEntity, Geofence, map layers, map messages)
//! - Status evaluation and render payload construction

pub mod models;
pub mod services;
