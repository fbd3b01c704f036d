use crate::{
    api::{admin, attendance, zones},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-scope limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let attendance_limiter = Arc::new(build_limiter(config.rate_attendance_per_min));
    let admin_limiter = Arc::new(build_limiter(config.rate_admin_per_min));
    let read_limiter = Arc::new(build_limiter(config.rate_read_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance")
                    .wrap(attendance_limiter)
                    // /attendance/check-in
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    // /attendance/check-out
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/status
                    .service(web::resource("/status").route(web::get().to(attendance::status)))
                    // /attendance/history
                    .service(web::resource("/history").route(web::get().to(attendance::history))),
            )
            .service(
                web::scope("/admin")
                    .wrap(admin_limiter)
                    // /admin/attendance
                    .service(
                        web::resource("/attendance").route(web::get().to(admin::list_records)),
                    )
                    // /admin/geofence
                    .service(
                        web::resource("/geofence")
                            .route(web::get().to(admin::list_zones))
                            .route(web::post().to(admin::create_zone)),
                    )
                    // /admin/geofence/{zone_id}
                    .service(
                        web::resource("/geofence/{zone_id}")
                            .route(web::put().to(admin::update_zone)),
                    ),
            )
            // /geofence (read-only, any authenticated caller)
            .service(
                web::resource("/geofence")
                    .wrap(read_limiter)
                    .route(web::get().to(zones::list_active)),
            ),
    );
}
