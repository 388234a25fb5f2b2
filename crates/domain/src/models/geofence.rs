//! Geofence domain model.

use serde::{Deserialize, Serialize};

use super::entity::LatLng;

/// Radius used when a single-point geofence carries no radius of its own.
pub const DEFAULT_CIRCLE_RADIUS_METERS: f64 = 100.0;

/// A geofence as assigned to a tracked entity by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    #[serde(alias = "id", deserialize_with = "shared::serde::i64_lenient")]
    pub geofence_id: i64,

    #[serde(default, alias = "name")]
    pub geofence_name: String,

    /// Ordered vertices. One point is a circle center.
    #[serde(default, alias = "coordinates", alias = "geofence_points")]
    pub boundary: Vec<LatLng>,

    /// Circle radius in meters, only meaningful for single-point boundaries.
    #[serde(default, deserialize_with = "shared::serde::f64_lenient_option")]
    pub radius: Option<f64>,

    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,

    #[serde(default = "default_active", deserialize_with = "shared::serde::bool_lenient")]
    pub is_active: bool,

    /// Computed by the backend from the entity's last position.
    #[serde(default, deserialize_with = "shared::serde::bool_lenient")]
    pub is_violating: bool,
}

fn default_active() -> bool {
    true
}

/// Drawable geometry of a geofence.
#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceShape {
    Circle { center: LatLng, radius_meters: f64 },
    Polygon(Vec<LatLng>),
}

impl Geofence {
    /// Returns the drawable shape, or `None` when the boundary is empty.
    ///
    /// Vertices with out-of-range coordinates are dropped first.
    pub fn shape(&self) -> Option<GeofenceShape> {
        let points: Vec<LatLng> = self.boundary.iter().copied().filter(LatLng::is_valid).collect();

        match points.len() {
            0 => None,
            1 => {
                let radius_meters = self
                    .radius
                    .filter(|r| shared::validation::validate_radius(*r).is_ok())
                    .unwrap_or(DEFAULT_CIRCLE_RADIUS_METERS);
                Some(GeofenceShape::Circle {
                    center: points[0],
                    radius_meters,
                })
            }
            _ => Some(GeofenceShape::Polygon(points)),
        }
    }
}

/// Display status of a geofence. Always derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLabel {
    Active,
    Upcoming,
    Expired,
    Inactive,
    Violating,
    Safe,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Upcoming => "upcoming",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
            Self::Violating => "violating",
            Self::Safe => "safe",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
