//! Great-circle geometry for geofence containment checks.
//!
//! Distances use the Haversine formula over a spherical Earth. Containment
//! is boundary-inclusive and decided on the raw distance; the two-decimal
//! rounding below is for reporting only.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::zone::GeofenceZone;

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Radius applied when an administrator creates a zone without one.
pub const DEFAULT_ZONE_RADIUS_METERS: f64 = 100.0;

/// Upper bound accepted for a zone radius (10 km).
pub const MAX_ZONE_RADIUS_METERS: f64 = 10_000.0;

/// Outcome of checking one position against one zone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeofenceEvaluation {
    pub is_inside: bool,
    /// Distance from the position to the zone center, meters, rounded to
    /// two decimals.
    pub distance_meters: f64,
    pub allowed_radius_meters: f64,
    pub zone_id: String,
    pub zone_name: String,
}

/// Haversine great-circle distance between two points, in meters.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// True when both coordinates are finite and within WGS84 bounds.
pub fn coordinates_in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Checks a position against a single zone. A position exactly on the
/// perimeter counts as inside.
pub fn evaluate(latitude: f64, longitude: f64, zone: &GeofenceZone) -> GeofenceEvaluation {
    let distance = distance_meters(latitude, longitude, zone.latitude, zone.longitude);
    GeofenceEvaluation {
        is_inside: distance <= zone.radius,
        distance_meters: (distance * 100.0).round() / 100.0,
        allowed_radius_meters: zone.radius,
        zone_id: zone.id.clone(),
        zone_name: zone.name.clone(),
    }
}

/// Checks a position against the closest of `zones`. Ties keep the earliest
/// zone in the slice, so the result is deterministic for a fixed input
/// order. Returns `None` when there are no zones to check against.
pub fn evaluate_nearest(
    latitude: f64,
    longitude: f64,
    zones: &[GeofenceZone],
) -> Option<GeofenceEvaluation> {
    let mut nearest = zones.first()?;
    let mut shortest = distance_meters(latitude, longitude, nearest.latitude, nearest.longitude);

    for zone in &zones[1..] {
        let distance = distance_meters(latitude, longitude, zone.latitude, zone.longitude);
        if distance < shortest {
            shortest = distance;
            nearest = zone;
        }
    }

    Some(evaluate(latitude, longitude, nearest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn zone(name: &str, latitude: f64, longitude: f64, radius: f64) -> GeofenceZone {
        let now = Utc::now();
        GeofenceZone {
            id: format!("zone-{name}"),
            name: name.to_string(),
            address: "1 Test Way".to_string(),
            latitude,
            longitude,
            radius,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_meters(37.7749, -122.4194, 37.7749, -122.4194), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let forward = distance_meters(51.5074, -0.1278, 48.8566, 2.3522);
        let backward = distance_meters(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((forward - backward).abs() < 1e-6);
    }

    #[test]
    fn london_to_paris_is_roughly_344_km() {
        let distance = distance_meters(51.5074, -0.1278, 48.8566, 2.3522);
        assert!(
            (340_000.0..350_000.0).contains(&distance),
            "got {distance}"
        );
    }

    #[test]
    fn one_thousandth_degree_of_latitude_is_roughly_111_m() {
        let distance = distance_meters(37.7749, -122.4194, 37.7759, -122.4194);
        assert!((110.0..113.0).contains(&distance), "got {distance}");
    }

    #[test]
    fn coordinate_bounds_are_inclusive() {
        assert!(coordinates_in_range(90.0, 180.0));
        assert!(coordinates_in_range(-90.0, -180.0));
        assert!(coordinates_in_range(0.0, 0.0));
        assert!(!coordinates_in_range(90.1, 0.0));
        assert!(!coordinates_in_range(0.0, -180.5));
        assert!(!coordinates_in_range(f64::NAN, 0.0));
        assert!(!coordinates_in_range(0.0, f64::NAN));
    }

    #[test]
    fn position_on_the_perimeter_is_inside() {
        let center = (37.7749, -122.4194);
        let point = (37.7759, -122.4194);
        let distance = distance_meters(center.0, center.1, point.0, point.1);

        let result = evaluate(point.0, point.1, &zone("hq", center.0, center.1, distance));
        assert!(result.is_inside);
    }

    #[test]
    fn position_past_the_perimeter_is_outside() {
        let result = evaluate(37.7759, -122.4194, &zone("hq", 37.7749, -122.4194, 100.0));
        assert!(!result.is_inside);
        assert!((result.distance_meters - 111.19).abs() < 0.5);
        assert_eq!(result.allowed_radius_meters, 100.0);
        assert_eq!(result.zone_name, "hq");
    }

    #[test]
    fn reported_distance_is_rounded_to_two_decimals() {
        let result = evaluate(37.7759, -122.4194, &zone("hq", 37.7749, -122.4194, 100.0));
        let rescaled = result.distance_meters * 100.0;
        assert_eq!(rescaled, rescaled.round());
    }

    #[test]
    fn nearest_zone_wins() {
        let zones = vec![
            zone("far", 40.7128, -74.0060, 100.0),
            zone("near", 37.7749, -122.4194, 100.0),
        ];
        let result = evaluate_nearest(37.7749, -122.4194, &zones).unwrap();
        assert_eq!(result.zone_name, "near");
        assert!(result.is_inside);
    }

    #[test]
    fn tie_keeps_the_first_zone() {
        let zones = vec![
            zone("first", 37.7749, -122.4194, 50.0),
            zone("second", 37.7749, -122.4194, 500.0),
        ];
        let result = evaluate_nearest(37.7749, -122.4194, &zones).unwrap();
        assert_eq!(result.zone_name, "first");
    }

    #[test]
    fn no_zones_means_no_evaluation() {
        assert!(evaluate_nearest(37.7749, -122.4194, &[]).is_none());
    }
}
