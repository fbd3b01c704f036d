use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    /// MySQL connection string; the in-memory backend is used when unset.
    pub database_url: Option<String>,
    pub geofence_cache_ttl_secs: u64,

    // Rate limiting
    pub rate_attendance_per_min: u32,
    pub rate_admin_per_min: u32,
    pub rate_read_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            geofence_cache_ttl_secs: env::var("GEOFENCE_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),

            rate_attendance_per_min: env::var("RATE_ATTENDANCE_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_admin_per_min: env::var("RATE_ADMIN_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),
            rate_read_per_min: env::var("RATE_READ_PER_MIN")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
        }
    }
}
