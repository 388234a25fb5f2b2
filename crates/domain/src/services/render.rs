//! Builds the render payload sent to the map surface.

use chrono::NaiveDateTime;
use geo::{BoundingRect, HaversineDestination, MultiPoint, Point};
use tracing::warn;

use crate::models::{
    Bounds, FeatureShape, Geofence, GeofenceFeature, GeofenceShape, HostMessage, LatLng,
    LineFeature, LineLayer, MarkerFeature, RenderPayload, ThreatFeature, ThreatZone,
    TrackedEntity, PROTOCOL_VERSION,
};

use super::geofence_status::{assess, within_optional_window};
use super::palette;

/// Collections drawn by one render call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderInput<'a> {
    pub entities: &'a [TrackedEntity],
    pub geofences: &'a [Geofence],
    pub threats: &'a [ThreatZone],
    pub lines: &'a [LineLayer],
}

/// Translates in-memory collections into a full render payload.
///
/// Output order follows input order, so identical inputs serialize to
/// identical bytes.
pub fn build_render(input: &RenderInput<'_>, now: NaiveDateTime) -> RenderPayload {
    let markers: Vec<MarkerFeature> = input
        .entities
        .iter()
        .filter(|e| e.position().is_valid())
        .map(marker_feature)
        .collect();

    let geofences: Vec<GeofenceFeature> = input
        .geofences
        .iter()
        .filter_map(|g| geofence_feature(g, now))
        .collect();

    let threats: Vec<ThreatFeature> = input
        .threats
        .iter()
        .filter_map(|t| threat_feature(t, now))
        .collect();

    let lines: Vec<LineFeature> = input.lines.iter().filter_map(line_feature).collect();

    let bounds = compute_bounds(&markers, &geofences, &threats, &lines);

    RenderPayload {
        version: PROTOCOL_VERSION,
        markers,
        geofences,
        threats,
        lines,
        bounds,
    }
}

/// Convenience wrapper returning the outbound message.
pub fn render_message(input: &RenderInput<'_>, now: NaiveDateTime) -> HostMessage {
    HostMessage::Render(build_render(input, now))
}

fn marker_feature(entity: &TrackedEntity) -> MarkerFeature {
    MarkerFeature {
        employee_id: entity.employee_id,
        name: entity.display_name(),
        image: entity.image.clone(),
        position: entity.position(),
        color: palette::color_of(entity.employee_id).to_string(),
        recorded_at: entity.recorded_at.clone(),
    }
}

fn geofence_feature(geofence: &Geofence, now: NaiveDateTime) -> Option<GeofenceFeature> {
    let Some(shape) = geofence.shape() else {
        warn!(
            geofence_id = geofence.geofence_id,
            name = %geofence.geofence_name,
            "Skipping geofence without a drawable boundary"
        );
        return None;
    };

    let assessment = assess(geofence, now);
    let display = assessment.display_label();

    Some(GeofenceFeature {
        geofence_id: geofence.geofence_id,
        geofence_name: geofence.geofence_name.clone(),
        shape: match shape {
            GeofenceShape::Circle {
                center,
                radius_meters,
            } => FeatureShape::Circle {
                center,
                radius: radius_meters,
            },
            GeofenceShape::Polygon(points) => FeatureShape::Polygon { points },
        },
        status: assessment.status,
        violation: assessment.violation,
        display,
        style: palette::geofence_style(display, assessment.is_expired()),
    })
}

fn threat_feature(threat: &ThreatZone, now: NaiveDateTime) -> Option<ThreatFeature> {
    let points: Vec<LatLng> = threat.boundary.iter().copied().filter(LatLng::is_valid).collect();
    if points.len() < 2 {
        warn!(threat_id = threat.threat_id, "Skipping threat zone with fewer than 2 points");
        return None;
    }

    Some(ThreatFeature {
        threat_id: threat.threat_id,
        name: threat.name.clone(),
        severity: threat.severity,
        description: threat.description.clone(),
        active: within_optional_window(
            threat.start_date.as_deref(),
            threat.end_date.as_deref(),
            now,
        ),
        points,
        style: palette::threat_style(threat.severity),
    })
}

fn line_feature(line: &LineLayer) -> Option<LineFeature> {
    let points: Vec<LatLng> = line.points.iter().copied().filter(LatLng::is_valid).collect();
    if points.len() < 2 {
        warn!(line_id = line.line_id, "Skipping line with fewer than 2 points");
        return None;
    }

    Some(LineFeature {
        line_id: line.line_id,
        name: line.name.clone(),
        category: line.category,
        points,
        style: palette::line_style(line.category),
    })
}

fn compute_bounds(
    markers: &[MarkerFeature],
    geofences: &[GeofenceFeature],
    threats: &[ThreatFeature],
    lines: &[LineFeature],
) -> Option<Bounds> {
    let mut points: Vec<Point<f64>> = markers.iter().map(|m| m.position.to_point()).collect();

    for g in geofences {
        match &g.shape {
            FeatureShape::Circle { center, radius } => {
                let c = center.to_point();
                // North, east, south, west extremes of the circle.
                for bearing in [0.0, 90.0, 180.0, 270.0] {
                    points.push(c.haversine_destination(bearing, *radius));
                }
            }
            FeatureShape::Polygon { points: vertices } => {
                points.extend(vertices.iter().map(|p| p.to_point()));
            }
        }
    }

    points.extend(threats.iter().flat_map(|t| t.points.iter().map(|p| p.to_point())));
    points.extend(lines.iter().flat_map(|l| l.points.iter().map(|p| p.to_point())));

    let rect = MultiPoint::from(points).bounding_rect()?;
    Some(Bounds {
        south: rect.min().y,
        west: rect.min().x,
        north: rect.max().y,
        east: rect.max().x,
    })
}
