use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::attendance::RecordsResponse;
use crate::api::zones::ZonesResponse;
use crate::auth::AuthUser;
use crate::error::AttendanceError;
use crate::geofence::{DEFAULT_ZONE_RADIUS_METERS, MAX_ZONE_RADIUS_METERS};
use crate::model::record::AttendanceStatus;
use crate::model::zone::GeofenceZone;
use crate::registry::GeofenceRegistry;
use crate::session::SessionManager;
use crate::store::{NewZone, RecordFilter, Storage, StoreError, ZonePatch};

#[derive(Deserialize, IntoParams)]
pub struct AdminRecordsQuery {
    /// Maximum number of records to return (default 100).
    pub limit: Option<usize>,
    /// Restrict to a single user.
    pub user_id: Option<String>,
    /// Restrict to `checked_in` or `checked_out` records.
    pub status: Option<AttendanceStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateZoneRequest {
    #[schema(example = "Headquarters")]
    pub name: String,
    #[schema(example = "1 Market St, San Francisco")]
    pub address: String,
    #[schema(example = 37.7749)]
    pub latitude: f64,
    #[schema(example = -122.4194)]
    pub longitude: f64,
    /// Meters; defaults to 100.
    #[schema(example = 100.0)]
    pub radius: Option<f64>,
    /// Defaults to true.
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateZoneRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
    pub is_active: Option<bool>,
}

fn validate_zone_fields(
    name: Option<&str>,
    address: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius: Option<f64>,
) -> Result<(), AttendanceError> {
    if let Some(name) = name {
        if name.is_empty() {
            return Err(AttendanceError::InvalidZone(
                "name must not be empty".to_string(),
            ));
        }
    }
    if let Some(address) = address {
        if address.is_empty() {
            return Err(AttendanceError::InvalidZone(
                "address must not be empty".to_string(),
            ));
        }
    }
    if let Some(latitude) = latitude {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AttendanceError::InvalidZone(
                "latitude must be within [-90, 90]".to_string(),
            ));
        }
    }
    if let Some(longitude) = longitude {
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AttendanceError::InvalidZone(
                "longitude must be within [-180, 180]".to_string(),
            ));
        }
    }
    if let Some(radius) = radius {
        if !(radius > 0.0 && radius <= MAX_ZONE_RADIUS_METERS) {
            return Err(AttendanceError::InvalidZone(format!(
                "radius must be greater than 0 and at most {MAX_ZONE_RADIUS_METERS} meters"
            )));
        }
    }
    Ok(())
}

/// Attendance records across all users
#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    params(AdminRecordsQuery),
    responses(
        (status = 200, description = "Attendance records, newest check-in first", body = RecordsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Admin"
)]
pub async fn list_records(
    auth: AuthUser,
    manager: web::Data<SessionManager>,
    query: web::Query<AdminRecordsQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let query = query.into_inner();

    let limit = query.limit.unwrap_or(100);
    let records = manager
        .all_records(
            limit,
            RecordFilter {
                user_id: query.user_id,
                status: query.status,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(RecordsResponse { records }))
}

/// Every zone, active or not
#[utoipa::path(
    get,
    path = "/api/admin/geofence",
    responses(
        (status = 200, description = "All zones", body = ZonesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Admin"
)]
pub async fn list_zones(
    auth: AuthUser,
    store: web::Data<dyn Storage>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let zones = store.all_zones().await.map_err(AttendanceError::storage)?;
    Ok(HttpResponse::Ok().json(ZonesResponse { zones }))
}

/// Create a geofence zone
#[utoipa::path(
    post,
    path = "/api/admin/geofence",
    request_body(
        content = CreateZoneRequest,
        description = "Zone definition",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Zone created", body = GeofenceZone),
        (status = 400, description = "Invalid zone payload", body = Object, example = json!({
            "error": "radius must be greater than 0 and at most 10000 meters"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Admin"
)]
pub async fn create_zone(
    auth: AuthUser,
    store: web::Data<dyn Storage>,
    registry: web::Data<GeofenceRegistry>,
    payload: web::Json<CreateZoneRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let payload = payload.into_inner();

    let name = payload.name.trim().to_string();
    let address = payload.address.trim().to_string();
    validate_zone_fields(
        Some(&name),
        Some(&address),
        Some(payload.latitude),
        Some(payload.longitude),
        payload.radius,
    )?;

    let zone = store
        .create_zone(NewZone {
            name,
            address,
            latitude: payload.latitude,
            longitude: payload.longitude,
            radius: payload.radius.unwrap_or(DEFAULT_ZONE_RADIUS_METERS),
            is_active: payload.is_active.unwrap_or(true),
        })
        .await
        .map_err(AttendanceError::storage)?;

    registry.invalidate().await;
    tracing::info!(zone_id = %zone.id, name = %zone.name, "Geofence zone created");
    Ok(HttpResponse::Created().json(zone))
}

/// Update a geofence zone
#[utoipa::path(
    put,
    path = "/api/admin/geofence/{zone_id}",
    params(
        ("zone_id" = String, Path, description = "ID of the zone to update")
    ),
    request_body(
        content = UpdateZoneRequest,
        description = "Fields to change; omitted fields keep their value",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Zone updated", body = GeofenceZone),
        (status = 400, description = "Invalid zone payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Zone not found", body = Object, example = json!({
            "error": "Geofence zone not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("user_id_header" = []),
        ("user_role_header" = [])
    ),
    tag = "Admin"
)]
pub async fn update_zone(
    auth: AuthUser,
    store: web::Data<dyn Storage>,
    registry: web::Data<GeofenceRegistry>,
    path: web::Path<String>,
    payload: web::Json<UpdateZoneRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let zone_id = path.into_inner();
    let payload = payload.into_inner();

    let name = payload.name.map(|n| n.trim().to_string());
    let address = payload.address.map(|a| a.trim().to_string());
    validate_zone_fields(
        name.as_deref(),
        address.as_deref(),
        payload.latitude,
        payload.longitude,
        payload.radius,
    )?;

    let result = store
        .update_zone(
            &zone_id,
            ZonePatch {
                name,
                address,
                latitude: payload.latitude,
                longitude: payload.longitude,
                radius: payload.radius,
                is_active: payload.is_active,
            },
        )
        .await;
    let zone = match result {
        Ok(zone) => zone,
        Err(StoreError::NotFound) => return Err(AttendanceError::ZoneNotFound.into()),
        Err(e) => return Err(AttendanceError::storage(e).into()),
    };

    registry.invalidate().await;
    tracing::info!(zone_id = %zone.id, "Geofence zone updated");
    Ok(HttpResponse::Ok().json(zone))
}
