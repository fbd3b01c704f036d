use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle of an attendance session. A record is created as `CheckedIn`
/// and moves to `CheckedOut` exactly once; there is no third state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub check_in_time: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    /// Session length in hours, rounded to two decimals. Set on check-out.
    pub total_hours: Option<f64>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.status == AttendanceStatus::CheckedIn
    }
}
