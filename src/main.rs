use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use dotenvy::dotenv;

use std::sync::Arc;
use std::time::Duration;

use geoattend::config::Config;
use geoattend::db::init_db;
use geoattend::docs::ApiDoc;
use geoattend::registry::GeofenceRegistry;
use geoattend::routes;
use geoattend::session::SessionManager;
use geoattend::store::Storage;
use geoattend::store::memory::MemoryStorage;
use geoattend::store::mysql::MySqlStorage;

use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "geoattend",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store: Arc<dyn Storage> = match config.database_url.as_deref() {
        Some(url) => {
            info!("Using MySQL storage");
            Arc::new(MySqlStorage::new(init_db(url).await))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    let registry = GeofenceRegistry::new(
        store.clone(),
        Duration::from_secs(config.geofence_cache_ttl_secs),
    );
    let manager = SessionManager::new(store.clone(), registry.clone());

    // Clone values for the closures (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();
    let registry_for_warmup = registry.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = registry_for_warmup.warmup().await {
            eprintln!("Failed to warmup geofence cache: {:?}", e);
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(manager.clone()))
            .app_data(Data::new(registry.clone()))
            .app_data(Data::from(store.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
