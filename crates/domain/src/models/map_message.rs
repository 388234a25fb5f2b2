//! Message protocol between the host and the embedded map surface.
//!
//! Outbound messages ([`HostMessage`]) are serialized to JSON and delivered to
//! the surface as a string value, never spliced into script source. Inbound
//! events ([`SurfaceEvent`]) arrive as JSON objects tagged by `type`.

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, LatLng};
use super::geofence::StatusLabel;
use super::layer::{LineCategory, ThreatSeverity};

/// Version of the render payload layout understood by the surface script.
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the host to the map surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Replace every host-drawn layer with this payload.
    Render(RenderPayload),
    /// Center the view on a coordinate.
    Focus {
        latitude: f64,
        longitude: f64,
        zoom: u8,
    },
    /// Remove every host-drawn layer.
    Clear,
}

impl HostMessage {
    /// Encodes the message as compact JSON.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wraps the encoded message in a script that dispatches it as a
    /// `message` event inside the webview.
    ///
    /// The JSON document is embedded as a JS string literal, so payload
    /// content can never become executable code.
    pub fn to_injection_script(&self) -> Result<String, serde_json::Error> {
        let json = self.encode()?;
        // JSON string literals allow U+2028/U+2029, older JS engines do not.
        let literal = serde_json::to_string(&json)?
            .replace('\u{2028}', "\\u2028")
            .replace('\u{2029}', "\\u2029");
        Ok(format!(
            "window.dispatchEvent(new MessageEvent('message', {{ data: {} }}));true;",
            literal
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Render(_) => "render",
            Self::Focus { .. } => "focus",
            Self::Clear => "clear",
        }
    }
}

/// Full description of what the surface should draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub version: u32,
    pub markers: Vec<MarkerFeature>,
    pub geofences: Vec<GeofenceFeature>,
    pub threats: Vec<ThreatFeature>,
    pub lines: Vec<LineFeature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl RenderPayload {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
            && self.geofences.is_empty()
            && self.threats.is_empty()
            && self.lines.is_empty()
    }
}

/// Stroke and fill settings for a shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeStyle {
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
    pub weight: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

/// Point marker for a tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerFeature {
    pub employee_id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub position: LatLng,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

/// Geometry of a drawn area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureShape {
    Circle { center: LatLng, radius: f64 },
    Polygon { points: Vec<LatLng> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceFeature {
    pub geofence_id: i64,
    pub geofence_name: String,
    pub shape: FeatureShape,
    pub status: StatusLabel,
    pub violation: StatusLabel,
    /// Label that decided the color.
    pub display: StatusLabel,
    pub style: ShapeStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatFeature {
    pub threat_id: i64,
    pub name: String,
    pub severity: ThreatSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub points: Vec<LatLng>,
    pub style: ShapeStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFeature {
    pub line_id: i64,
    pub name: String,
    pub category: LineCategory,
    pub points: Vec<LatLng>,
    pub style: ShapeStyle,
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

// ============================================================================
// Inbound events
// ============================================================================

/// Events posted by the map surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// A tracked-entity marker was tapped.
    Location {
        #[serde(alias = "employee", alias = "data")]
        location: LocationClick,
    },
    Threat {
        threat: ThreatClick,
    },
    Line {
        line: LineClick,
    },
    GeofenceClick {
        geofence: GeofenceClick,
    },
    /// The surface finished loading and accepts render messages.
    MapReady,
    /// A boundary drawn by the user (geofence editor).
    Boundary {
        #[serde(default, alias = "coordinates")]
        points: Vec<LatLng>,
    },
    StartSelected {
        #[serde(alias = "coordinates")]
        point: LatLng,
    },
    EndSelected {
        #[serde(alias = "coordinates")]
        point: LatLng,
    },
    DrawnRoute {
        #[serde(default, alias = "coordinates")]
        points: Vec<LatLng>,
    },
    PointAdded {
        #[serde(alias = "coordinates")]
        point: LatLng,
    },
    PointsCleared,
}

impl SurfaceEvent {
    /// Decodes one raw message posted by the surface.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The `type` tag of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Location { .. } => "location",
            Self::Threat { .. } => "threat",
            Self::Line { .. } => "line",
            Self::GeofenceClick { .. } => "geofence_click",
            Self::MapReady => "map_ready",
            Self::Boundary { .. } => "boundary",
            Self::StartSelected { .. } => "start_selected",
            Self::EndSelected { .. } => "end_selected",
            Self::DrawnRoute { .. } => "drawn_route",
            Self::PointAdded { .. } => "point_added",
            Self::PointsCleared => "points_cleared",
        }
    }

    /// Returns the tapped feature for click events.
    pub fn into_selection(self) -> Option<Selection> {
        match self {
            Self::Location { location } => Some(Selection::Location(location)),
            Self::Threat { threat } => Some(Selection::Threat(threat)),
            Self::Line { line } => Some(Selection::Line(line)),
            Self::GeofenceClick { geofence } => Some(Selection::Geofence(geofence)),
            _ => None,
        }
    }
}

/// Feature picked by the user, shown in a popup card.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Location(LocationClick),
    Threat(ThreatClick),
    Line(LineClick),
    Geofence(GeofenceClick),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationClick {
    #[serde(alias = "id")]
    pub employee_id: Option<EntityId>,
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(deserialize_with = "shared::serde::f64_lenient_option")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "shared::serde::f64_lenient_option")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeofenceClick {
    #[serde(alias = "id")]
    pub geofence_id: Option<i64>,
    #[serde(alias = "name")]
    pub geofence_name: String,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThreatClick {
    #[serde(alias = "id")]
    pub threat_id: Option<i64>,
    pub name: String,
    pub severity: Option<ThreatSeverity>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LineClick {
    #[serde(alias = "id")]
    pub line_id: Option<i64>,
    pub name: String,
    pub category: Option<LineCategory>,
}
