//! Domain services for the fleet tracker.
//!
//! Services are pure functions over domain models: status evaluation,
//! styling and render payload construction.

pub mod geofence_status;
pub mod palette;
pub mod render;

pub use geofence_status::{
    assess, derive_status, derive_status_now, violation_status, GeofenceAssessment,
};
pub use palette::color_of;
pub use render::{build_render, render_message, RenderInput};
