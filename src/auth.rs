use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

use crate::model::role::Role;

/// Identity header set by the gateway in front of this service.
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Role header set by the gateway in front of this service.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Caller identity, as asserted by the trusted gateway. This service never
/// verifies credentials itself; requests that reach it without the identity
/// headers are rejected as unauthenticated.
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user_id = match req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
        {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => return ready(Err(ErrorUnauthorized("Missing user identity"))),
        };

        let role = match req
            .headers()
            .get(USER_ROLE_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(Role::from_name)
        {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser { user_id, role }))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    /// Attendance endpoints are open to staff and admins alike.
    pub fn require_staff_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Staff) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Staff/Admin only"))
        }
    }
}
