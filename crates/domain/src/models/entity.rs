//! Tracked entity domain model.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::Validate;

/// Identifier of a tracked employee or vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        shared::serde::i64_lenient(deserializer).map(EntityId)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct LatLng {
    #[serde(alias = "lat", deserialize_with = "shared::serde::f64_lenient")]
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[serde(
        alias = "lng",
        alias = "lon",
        deserialize_with = "shared::serde::f64_lenient"
    )]
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Converts to a `geo` point (x = longitude, y = latitude).
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }

    pub fn is_valid(&self) -> bool {
        shared::validation::is_valid_coordinate(self.latitude, self.longitude)
    }
}

/// Latest known position of an employee or vehicle, as returned by the
/// location endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TrackedEntity {
    #[serde(alias = "id")]
    pub employee_id: EntityId,

    #[serde(deserialize_with = "shared::serde::f64_lenient")]
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[serde(deserialize_with = "shared::serde::f64_lenient")]
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[serde(default, alias = "employee_name")]
    pub name: Option<String>,

    #[serde(default, alias = "employee_image", alias = "image_url")]
    pub image: Option<String>,

    /// Backend timestamp of the fix, passed through untouched.
    #[serde(default, alias = "timestamp", alias = "created_at")]
    pub recorded_at: Option<String>,
}

impl TrackedEntity {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Label shown on the marker popup.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("Employee {}", self.employee_id),
        }
    }
}
