//! Shared utilities and common types for the fleet tracker.
//!
//! This crate provides functionality used across the other crates:
//! - Coordinate and radius validation
//! - Lenient serde helpers for loosely typed backend payloads

pub mod serde;
pub mod validation;
