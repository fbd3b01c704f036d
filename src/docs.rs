use crate::api::admin::{CreateZoneRequest, UpdateZoneRequest};
use crate::api::attendance::{
    CheckInRequest, CheckInResponse, CheckOutRequest, CheckOutResponse, RecordsResponse,
    StatusResponse,
};
use crate::api::zones::ZonesResponse;
use crate::geofence::GeofenceEvaluation;
use crate::model::record::{AttendanceRecord, AttendanceStatus};
use crate::model::zone::GeofenceZone;
use utoipa::Modify;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance & Geofence API",
        version = "1.0.0",
        description = r#"
## Location-verified attendance tracking

Staff check in and out of work sessions; every check-in is validated
against the geofence zones configured by administrators.

### Key Features
- **Attendance Sessions**
  - Check-in / check-out with a single open session per user
  - Session status and personal history
- **Geofence Validation**
  - Haversine distance to the nearest active zone
  - Strict on check-in, advisory on check-out
- **Zone Administration**
  - Create, update and deactivate zones without a restart

### Security
Identity is asserted by the gateway in front of this service via the
`X-User-Id` and `X-User-Role` headers. Admin endpoints require the
`admin` role.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::status,
        crate::api::attendance::history,

        crate::api::zones::list_active,

        crate::api::admin::list_records,
        crate::api::admin::list_zones,
        crate::api::admin::create_zone,
        crate::api::admin::update_zone
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceStatus,
            GeofenceZone,
            GeofenceEvaluation,
            CheckInRequest,
            CheckOutRequest,
            CheckInResponse,
            CheckOutResponse,
            StatusResponse,
            RecordsResponse,
            ZonesResponse,
            CreateZoneRequest,
            UpdateZoneRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Check-in / check-out APIs"),
        (name = "Geofence", description = "Zone visibility APIs"),
        (name = "Admin", description = "Record oversight and zone management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "user_id_header",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-User-Id"))),
        );
        components.add_security_scheme(
            "user_role_header",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-User-Role"))),
        );
    }
}
