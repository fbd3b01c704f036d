//! Persistence port for attendance records and geofence zones.
//!
//! Two adapters exist: [`memory::MemoryStorage`] (default, also backs the
//! test suite) and [`mysql::MySqlStorage`] (selected when `DATABASE_URL`
//! is set). Everything above this module talks to `dyn Storage` only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::model::record::{AttendanceRecord, AttendanceStatus};
use crate::model::zone::GeofenceZone;

pub mod memory;
pub mod mysql;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StoreError {
    /// The user already has an open session.
    #[display(fmt = "an open session already exists")]
    Conflict,
    /// No row matched the operation's target.
    #[display(fmt = "no matching record")]
    NotFound,
    /// The backend could not be reached or rejected the operation.
    #[display(fmt = "storage unavailable: {}", _0)]
    Unavailable(String),
}

impl std::error::Error for StoreError {}

/// Fields for the record a check-in creates.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub user_id: String,
    pub check_in_time: DateTime<Utc>,
    pub check_in_latitude: f64,
    pub check_in_longitude: f64,
    pub notes: Option<String>,
}

/// Fields applied when an open record is closed.
#[derive(Debug, Clone)]
pub struct CloseRecord {
    pub check_out_time: DateTime<Utc>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub total_hours: f64,
    /// Replaces the record's notes when set; `None` keeps the check-in notes.
    pub notes: Option<String>,
}

/// Admin listing filters. Empty filter matches every record.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub user_id: Option<String>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone)]
pub struct NewZone {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub is_active: bool,
}

/// Partial update for a zone; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ZonePatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
    pub is_active: Option<bool>,
}

/// Storage contract shared by every backend.
///
/// `create_record_if_none_open` must be atomic: when two check-ins race for
/// the same user, exactly one may succeed and the other must observe
/// [`StoreError::Conflict`]. A separate lookup followed by an insert does
/// not satisfy this.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The user's open record, if any. At most one can exist.
    async fn open_record(&self, user_id: &str) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Creates an open record unless the user already has one.
    async fn create_record_if_none_open(
        &self,
        record: NewRecord,
    ) -> Result<AttendanceRecord, StoreError>;

    /// Closes the open record with the given id. Fails with
    /// [`StoreError::NotFound`] when the record is missing or already closed.
    async fn close_record(
        &self,
        record_id: &str,
        close: CloseRecord,
    ) -> Result<AttendanceRecord, StoreError>;

    /// The user's records, newest check-in first.
    async fn records_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// All records across users, newest check-in first.
    async fn all_records(
        &self,
        limit: usize,
        filter: RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Zones with `is_active` set, in a stable order.
    async fn active_zones(&self) -> Result<Vec<GeofenceZone>, StoreError>;

    /// Every zone, active or not.
    async fn all_zones(&self) -> Result<Vec<GeofenceZone>, StoreError>;

    async fn create_zone(&self, zone: NewZone) -> Result<GeofenceZone, StoreError>;

    async fn update_zone(
        &self,
        zone_id: &str,
        patch: ZonePatch,
    ) -> Result<GeofenceZone, StoreError>;
}
