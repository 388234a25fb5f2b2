//! Domain models for the fleet tracker.

pub mod entity;
pub mod geofence;
pub mod layer;
pub mod map_message;

pub use entity::{EntityId, LatLng, TrackedEntity};
pub use geofence::{Geofence, GeofenceShape, StatusLabel, DEFAULT_CIRCLE_RADIUS_METERS};
pub use layer::{LineCategory, LineLayer, ThreatSeverity, ThreatZone};
pub use map_message::{
    Bounds, FeatureShape, GeofenceClick, GeofenceFeature, HostMessage, LineClick, LineFeature,
    LocationClick, MarkerFeature, RenderPayload, Selection, ShapeStyle, SurfaceEvent, ThreatClick,
    ThreatFeature, PROTOCOL_VERSION,
};
