//! MySQL storage adapter.
//!
//! Schema lives in `migrations/001_init.sql`. The single-open-session
//! invariant is enforced by the database itself: a stored generated column
//! `open_user` holds the user id while `status = 'checked_in'` and NULL
//! afterwards, and a unique index over it makes a second open insert fail
//! with a duplicate key. Racing check-ins therefore never both land.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::record::{AttendanceRecord, AttendanceStatus};
use crate::model::zone::GeofenceZone;
use crate::store::{
    CloseRecord, NewRecord, NewZone, RecordFilter, Storage, StoreError, ZonePatch,
};

const RECORD_COLUMNS: &str = "id, user_id, check_in_time, check_out_time, \
     check_in_latitude, check_in_longitude, check_out_latitude, check_out_longitude, \
     total_hours, status, notes, created_at, updated_at";

const ZONE_COLUMNS: &str =
    "id, name, address, latitude, longitude, radius, is_active, created_at, updated_at";

pub struct MySqlStorage {
    pool: MySqlPool,
}

impl MySqlStorage {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: String,
    user_id: String,
    check_in_time: DateTime<Utc>,
    check_out_time: Option<DateTime<Utc>>,
    check_in_latitude: Option<f64>,
    check_in_longitude: Option<f64>,
    check_out_latitude: Option<f64>,
    check_out_longitude: Option<f64>,
    total_hours: Option<f64>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Result<AttendanceRecord, StoreError> {
        let status = self
            .status
            .parse::<AttendanceStatus>()
            .map_err(|_| StoreError::Unavailable(format!("unexpected status '{}'", self.status)))?;
        Ok(AttendanceRecord {
            id: self.id,
            user_id: self.user_id,
            check_in_time: self.check_in_time,
            check_out_time: self.check_out_time,
            check_in_latitude: self.check_in_latitude,
            check_in_longitude: self.check_in_longitude,
            check_out_latitude: self.check_out_latitude,
            check_out_longitude: self.check_out_longitude,
            total_hours: self.total_hours,
            status,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ZoneRow {
    id: String,
    name: String,
    address: String,
    latitude: f64,
    longitude: f64,
    radius: f64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ZoneRow> for GeofenceZone {
    fn from(row: ZoneRow) -> Self {
        GeofenceZone {
            id: row.id,
            name: row.name,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            radius: row.radius,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Helper enum for typed SQLx binding in dynamically built statements.
enum SqlValue {
    Text(String),
    Double(f64),
    Flag(bool),
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl Storage for MySqlStorage {
    async fn open_record(&self, user_id: &str) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE user_id = ? AND status = 'checked_in' LIMIT 1"
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn create_record_if_none_open(
        &self,
        record: NewRecord,
    ) -> Result<AttendanceRecord, StoreError> {
        let now = Utc::now();
        let created = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            user_id: record.user_id,
            check_in_time: record.check_in_time,
            check_out_time: None,
            check_in_latitude: Some(record.check_in_latitude),
            check_in_longitude: Some(record.check_in_longitude),
            check_out_latitude: None,
            check_out_longitude: None,
            total_hours: None,
            status: AttendanceStatus::CheckedIn,
            notes: record.notes,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            "INSERT INTO attendance_records \
             (id, user_id, check_in_time, check_in_latitude, check_in_longitude, \
              status, notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&created.id)
        .bind(&created.user_id)
        .bind(created.check_in_time)
        .bind(created.check_in_latitude)
        .bind(created.check_in_longitude)
        .bind(created.status.to_string())
        .bind(created.notes.as_deref())
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(created),
            Err(e) => {
                // Duplicate key on the open_user unique index: the user
                // already has an open session.
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(StoreError::Conflict);
                    }
                }
                Err(unavailable(e))
            }
        }
    }

    async fn close_record(
        &self,
        record_id: &str,
        close: CloseRecord,
    ) -> Result<AttendanceRecord, StoreError> {
        let result = sqlx::query(
            "UPDATE attendance_records \
             SET check_out_time = ?, check_out_latitude = ?, check_out_longitude = ?, \
                 total_hours = ?, status = 'checked_out', \
                 notes = COALESCE(?, notes), updated_at = ? \
             WHERE id = ? AND status = 'checked_in'",
        )
        .bind(close.check_out_time)
        .bind(close.check_out_latitude)
        .bind(close.check_out_longitude)
        .bind(close.total_hours)
        .bind(close.notes.as_deref())
        .bind(close.check_out_time)
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ?");
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(record_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?
            .into_record()
    }

    async fn records_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE user_id = ? \
             ORDER BY check_in_time DESC, created_at DESC \
             LIMIT ?"
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn all_records(
        &self,
        limit: usize,
        filter: RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<String> = Vec::new();

        if let Some(user_id) = filter.user_id {
            where_sql.push_str(" AND user_id = ?");
            args.push(user_id);
        }
        if let Some(status) = filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(status.to_string());
        }

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records{where_sql} \
             ORDER BY check_in_time DESC, created_at DESC \
             LIMIT ?"
        );

        let mut query = sqlx::query_as::<_, RecordRow>(&sql);
        for arg in &args {
            query = query.bind(arg);
        }

        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn active_zones(&self) -> Result<Vec<GeofenceZone>, StoreError> {
        let sql = format!(
            "SELECT {ZONE_COLUMNS} FROM geofence_zones \
             WHERE is_active = TRUE ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, ZoneRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(GeofenceZone::from).collect())
    }

    async fn all_zones(&self) -> Result<Vec<GeofenceZone>, StoreError> {
        let sql = format!(
            "SELECT {ZONE_COLUMNS} FROM geofence_zones ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ZoneRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(GeofenceZone::from).collect())
    }

    async fn create_zone(&self, zone: NewZone) -> Result<GeofenceZone, StoreError> {
        let now = Utc::now();
        let created = GeofenceZone {
            id: Uuid::new_v4().to_string(),
            name: zone.name,
            address: zone.address,
            latitude: zone.latitude,
            longitude: zone.longitude,
            radius: zone.radius,
            is_active: zone.is_active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO geofence_zones \
             (id, name, address, latitude, longitude, radius, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&created.id)
        .bind(&created.name)
        .bind(&created.address)
        .bind(created.latitude)
        .bind(created.longitude)
        .bind(created.radius)
        .bind(created.is_active)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(created)
    }

    async fn update_zone(
        &self,
        zone_id: &str,
        patch: ZonePatch,
    ) -> Result<GeofenceZone, StoreError> {
        let mut set_sql = String::from("updated_at = ?");
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(name) = patch.name {
            set_sql.push_str(", name = ?");
            args.push(SqlValue::Text(name));
        }
        if let Some(address) = patch.address {
            set_sql.push_str(", address = ?");
            args.push(SqlValue::Text(address));
        }
        if let Some(latitude) = patch.latitude {
            set_sql.push_str(", latitude = ?");
            args.push(SqlValue::Double(latitude));
        }
        if let Some(longitude) = patch.longitude {
            set_sql.push_str(", longitude = ?");
            args.push(SqlValue::Double(longitude));
        }
        if let Some(radius) = patch.radius {
            set_sql.push_str(", radius = ?");
            args.push(SqlValue::Double(radius));
        }
        if let Some(is_active) = patch.is_active {
            set_sql.push_str(", is_active = ?");
            args.push(SqlValue::Flag(is_active));
        }

        let sql = format!("UPDATE geofence_zones SET {set_sql} WHERE id = ?");
        let mut query = sqlx::query(&sql).bind(Utc::now());
        for arg in args {
            query = match arg {
                SqlValue::Text(v) => query.bind(v),
                SqlValue::Double(v) => query.bind(v),
                SqlValue::Flag(v) => query.bind(v),
            };
        }

        let result = query
            .bind(zone_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let sql = format!("SELECT {ZONE_COLUMNS} FROM geofence_zones WHERE id = ?");
        let row = sqlx::query_as::<_, ZoneRow>(&sql)
            .bind(zone_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(row.into())
    }
}
