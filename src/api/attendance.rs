use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::geofence::GeofenceEvaluation;
use crate::model::record::AttendanceRecord;
use crate::session::SessionManager;

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[schema(example = 37.7749)]
    pub latitude: f64,
    #[schema(example = -122.4194)]
    pub longitude: f64,
    #[schema(example = "Morning shift")]
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutRequest {
    /// Optional; when given, longitude must be given too.
    #[schema(example = 37.7749)]
    pub latitude: Option<f64>,
    #[schema(example = -122.4194)]
    pub longitude: Option<f64>,
    #[schema(example = "Left early for appointment")]
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    pub record: AttendanceRecord,
    pub geofence_validation: GeofenceEvaluation,
}

#[derive(Serialize, ToSchema)]
pub struct CheckOutResponse {
    pub record: AttendanceRecord,
    pub geofence_validation: Option<GeofenceEvaluation>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = true)]
    pub is_checked_in: bool,
    pub active_record: Option<AttendanceRecord>,
}

/// Envelope for record listings, shared with the admin listing.
#[derive(Serialize, ToSchema)]
pub struct RecordsResponse {
    pub records: Vec<AttendanceRecord>,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of records to return (default 50).
    pub limit: Option<usize>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body(
        content = CheckInRequest,
        description = "Current position, optionally with notes",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Session opened", body = CheckInResponse),
        (status = 400, description = "Invalid coordinates, already checked in, or no zone configured", body = Object, example = json!({
            "error": "You are already checked in"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Outside every active zone", body = Object, example = json!({
            "error": "Check-in location is outside allowed area",
            "message": "You are 111.19m from HQ. Maximum allowed distance is 100m.",
            "geofence_validation": {
                "is_inside": false,
                "distance_meters": 111.19,
                "allowed_radius_meters": 100.0,
                "zone_name": "HQ"
            }
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    manager: web::Data<SessionManager>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff_or_admin()?;
    let payload = payload.into_inner();

    let outcome = manager
        .check_in(&auth.user_id, payload.latitude, payload.longitude, payload.notes)
        .await?;

    Ok(HttpResponse::Created().json(CheckInResponse {
        record: outcome.record,
        geofence_validation: outcome.evaluation,
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body(
        content = CheckOutRequest,
        description = "Optional position and notes",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Session closed", body = CheckOutResponse),
        (status = 400, description = "No active check-in, or invalid coordinates", body = Object, example = json!({
            "error": "No active check-in found"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    manager: web::Data<SessionManager>,
    payload: web::Json<CheckOutRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff_or_admin()?;
    let payload = payload.into_inner();

    let outcome = manager
        .check_out(&auth.user_id, payload.latitude, payload.longitude, payload.notes)
        .await?;

    Ok(HttpResponse::Ok().json(CheckOutResponse {
        record: outcome.record,
        geofence_validation: outcome.evaluation,
    }))
}

/// Current session state for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/status",
    responses(
        (status = 200, description = "Whether the caller is checked in", body = StatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Attendance"
)]
pub async fn status(
    auth: AuthUser,
    manager: web::Data<SessionManager>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff_or_admin()?;

    let status = manager.status(&auth.user_id).await?;
    Ok(HttpResponse::Ok().json(StatusResponse {
        is_checked_in: status.is_checked_in,
        active_record: status.active_record,
    }))
}

/// The caller's attendance history, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Attendance records, newest check-in first", body = RecordsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    manager: web::Data<SessionManager>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff_or_admin()?;

    let limit = query.limit.unwrap_or(50);
    let records = manager.history(&auth.user_id, limit).await?;
    Ok(HttpResponse::Ok().json(RecordsResponse { records }))
}
