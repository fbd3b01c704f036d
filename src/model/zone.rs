use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Circular perimeter around a workplace. Positions are validated against
/// the set of zones with `is_active` set; inactive zones are kept for
/// history but never match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeofenceZone {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}
