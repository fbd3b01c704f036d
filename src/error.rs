//! Domain errors and their HTTP mapping.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;

use crate::store::StoreError;

#[derive(Debug, Clone, Display)]
pub enum AttendanceError {
    /// Latitude or longitude missing, half-supplied or out of range.
    #[display(fmt = "{}", _0)]
    InvalidCoordinates(String),

    #[display(fmt = "You are already checked in")]
    AlreadyCheckedIn,

    #[display(fmt = "No active check-in found")]
    NoActiveSession,

    #[display(fmt = "No active geofence configured. Please contact your administrator.")]
    NoGeofenceConfigured,

    #[display(
        fmt = "You are {}m from {}. Maximum allowed distance is {}m.",
        distance_meters,
        zone_name,
        allowed_radius_meters
    )]
    OutsideGeofence {
        distance_meters: f64,
        allowed_radius_meters: f64,
        zone_name: String,
    },

    /// Zone payload failed validation; the message names the field.
    #[display(fmt = "{}", _0)]
    InvalidZone(String),

    #[display(fmt = "Geofence zone not found")]
    ZoneNotFound,

    #[display(fmt = "Internal server error")]
    Storage(String),
}

impl std::error::Error for AttendanceError {}

impl AttendanceError {
    pub(crate) fn storage(err: StoreError) -> Self {
        AttendanceError::Storage(err.to_string())
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::InvalidCoordinates(_)
            | AttendanceError::AlreadyCheckedIn
            | AttendanceError::NoActiveSession
            | AttendanceError::NoGeofenceConfigured
            | AttendanceError::InvalidZone(_) => StatusCode::BAD_REQUEST,
            AttendanceError::OutsideGeofence { .. } => StatusCode::FORBIDDEN,
            AttendanceError::ZoneNotFound => StatusCode::NOT_FOUND,
            AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AttendanceError::OutsideGeofence {
                distance_meters,
                allowed_radius_meters,
                zone_name,
            } => serde_json::json!({
                "error": "Check-in location is outside allowed area",
                "message": self.to_string(),
                "geofence_validation": {
                    "is_inside": false,
                    "distance_meters": distance_meters,
                    "allowed_radius_meters": allowed_radius_meters,
                    "zone_name": zone_name,
                }
            }),
            AttendanceError::Storage(detail) => {
                // The body hides backend detail; the log keeps it.
                tracing::error!(error = %detail, "Storage failure");
                serde_json::json!({ "error": "Internal server error" })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
