//! Colors and stroke styles used on the map.

use crate::models::{EntityId, LineCategory, ShapeStyle, StatusLabel, ThreatSeverity};

/// Marker colors, indexed by entity id.
pub const ENTITY_PALETTE: [&str; 10] = [
    "#E6194B", "#3CB44B", "#4363D8", "#F58231", "#911EB4", "#42D4F4", "#F032E6", "#469990",
    "#9A6324", "#000075",
];

pub const SAFE_COLOR: &str = "#4CAF50";
pub const VIOLATING_COLOR: &str = "#F44336";
pub const NEUTRAL_COLOR: &str = "#9E9E9E";

pub const FILL_OPACITY: f64 = 0.3;
pub const STROKE_WEIGHT: u8 = 3;
pub const EXPIRED_STROKE_WEIGHT: u8 = 1;
pub const LINE_WEIGHT: u8 = 4;
pub const DASH_PATTERN: &str = "8, 8";

/// Stable marker color for an entity.
pub fn color_of(id: EntityId) -> &'static str {
    let idx = id.0.rem_euclid(ENTITY_PALETTE.len() as i64) as usize;
    ENTITY_PALETTE[idx]
}

/// Color for a geofence given its display label.
pub fn status_color(display: StatusLabel) -> &'static str {
    match display {
        StatusLabel::Violating => VIOLATING_COLOR,
        StatusLabel::Expired | StatusLabel::Inactive => NEUTRAL_COLOR,
        StatusLabel::Active | StatusLabel::Upcoming | StatusLabel::Safe => SAFE_COLOR,
    }
}

pub fn geofence_style(display: StatusLabel, expired: bool) -> ShapeStyle {
    let color = status_color(display);
    ShapeStyle {
        color: color.to_string(),
        fill_color: color.to_string(),
        fill_opacity: FILL_OPACITY,
        weight: if expired {
            EXPIRED_STROKE_WEIGHT
        } else {
            STROKE_WEIGHT
        },
        dash_array: None,
    }
}

pub fn threat_style(severity: ThreatSeverity) -> ShapeStyle {
    ShapeStyle {
        color: severity.color().to_string(),
        fill_color: severity.color().to_string(),
        fill_opacity: FILL_OPACITY,
        weight: STROKE_WEIGHT,
        dash_array: None,
    }
}

pub fn line_style(category: LineCategory) -> ShapeStyle {
    ShapeStyle {
        color: category.color().to_string(),
        fill_color: category.color().to_string(),
        fill_opacity: 0.0,
        weight: LINE_WEIGHT,
        dash_array: category.is_dashed().then(|| DASH_PATTERN.to_string()),
    }
}
