use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::error::AttendanceError;
use crate::model::zone::GeofenceZone;
use crate::registry::GeofenceRegistry;

/// Envelope for zone listings, shared with the admin listing.
#[derive(Serialize, ToSchema)]
pub struct ZonesResponse {
    pub zones: Vec<GeofenceZone>,
}

/// Active geofence zones, visible to any authenticated caller
#[utoipa::path(
    get,
    path = "/api/geofence",
    responses(
        (status = 200, description = "Active zones", body = ZonesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Geofence"
)]
pub async fn list_active(
    _auth: AuthUser,
    registry: web::Data<GeofenceRegistry>,
) -> actix_web::Result<impl Responder> {
    let zones = registry
        .active_zones()
        .await
        .map_err(AttendanceError::storage)?;
    Ok(HttpResponse::Ok().json(ZonesResponse { zones }))
}
