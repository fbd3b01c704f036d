//! In-memory storage adapter.
//!
//! Default backend when `DATABASE_URL` is unset; the test suite runs on it
//! as well. A single `RwLock` over the tables makes
//! `create_record_if_none_open` atomic: the write lock spans both the
//! open-session check and the insert.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::model::record::{AttendanceRecord, AttendanceStatus};
use crate::model::zone::GeofenceZone;
use crate::store::{
    CloseRecord, NewRecord, NewZone, RecordFilter, Storage, StoreError, ZonePatch,
};

#[derive(Default)]
struct Tables {
    /// Insertion order, oldest first.
    records: Vec<AttendanceRecord>,
    /// user_id -> record id of the user's open session.
    open_by_user: HashMap<String, String>,
    /// Insertion order, oldest first.
    zones: Vec<GeofenceZone>,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_newest_first(mut records: Vec<AttendanceRecord>, limit: usize) -> Vec<AttendanceRecord> {
    // Stable sort over a newest-insertion-first scan keeps ties deterministic.
    records.sort_by(|a, b| b.check_in_time.cmp(&a.check_in_time));
    records.truncate(limit);
    records
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn open_record(&self, user_id: &str) -> Result<Option<AttendanceRecord>, StoreError> {
        let tables = self.tables.read().expect("storage tables poisoned");
        let Some(record_id) = tables.open_by_user.get(user_id) else {
            return Ok(None);
        };
        Ok(tables.records.iter().find(|r| &r.id == record_id).cloned())
    }

    async fn create_record_if_none_open(
        &self,
        record: NewRecord,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut tables = self.tables.write().expect("storage tables poisoned");
        if tables.open_by_user.contains_key(&record.user_id) {
            return Err(StoreError::Conflict);
        }

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
        tables
            .open_by_user
            .insert(created.user_id.clone(), created.id.clone());
        tables.records.push(created.clone());
        Ok(created)
    }

    async fn close_record(
        &self,
        record_id: &str,
        close: CloseRecord,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut tables = self.tables.write().expect("storage tables poisoned");
        let closed = {
            let record = tables
                .records
                .iter_mut()
                .find(|r| r.id == record_id)
                .ok_or(StoreError::NotFound)?;
            if !record.is_open() {
                return Err(StoreError::NotFound);
            }

            record.check_out_time = Some(close.check_out_time);
            record.check_out_latitude = close.check_out_latitude;
            record.check_out_longitude = close.check_out_longitude;
            record.total_hours = Some(close.total_hours);
            record.status = AttendanceStatus::CheckedOut;
            if let Some(notes) = close.notes {
                record.notes = Some(notes);
            }
            record.updated_at = close.check_out_time;
            record.clone()
        };
        tables.open_by_user.remove(&closed.user_id);
        Ok(closed)
    }

    async fn records_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let tables = self.tables.read().expect("storage tables poisoned");
        let matched = tables
            .records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_newest_first(matched, limit))
    }

    async fn all_records(
        &self,
        limit: usize,
        filter: RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let tables = self.tables.read().expect("storage tables poisoned");
        let matched = tables
            .records
            .iter()
            .rev()
            .filter(|r| match &filter.user_id {
                Some(user_id) => &r.user_id == user_id,
                None => true,
            })
            .filter(|r| match filter.status {
                Some(status) => r.status == status,
                None => true,
            })
            .cloned()
            .collect();
        Ok(sorted_newest_first(matched, limit))
    }

    async fn active_zones(&self) -> Result<Vec<GeofenceZone>, StoreError> {
        let tables = self.tables.read().expect("storage tables poisoned");
        Ok(tables
            .zones
            .iter()
            .filter(|z| z.is_active)
            .cloned()
            .collect())
    }

    async fn all_zones(&self) -> Result<Vec<GeofenceZone>, StoreError> {
        let tables = self.tables.read().expect("storage tables poisoned");
        let mut zones: Vec<_> = tables.zones.iter().rev().cloned().collect();
        zones.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(zones)
    }

    async fn create_zone(&self, zone: NewZone) -> Result<GeofenceZone, StoreError> {
        let mut tables = self.tables.write().expect("storage tables poisoned");
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
        tables.zones.push(created.clone());
        Ok(created)
    }

    async fn update_zone(
        &self,
        zone_id: &str,
        patch: ZonePatch,
    ) -> Result<GeofenceZone, StoreError> {
        let mut tables = self.tables.write().expect("storage tables poisoned");
        let zone = tables
            .zones
            .iter_mut()
            .find(|z| z.id == zone_id)
            .ok_or(StoreError::NotFound)?;

        if let Some(name) = patch.name {
            zone.name = name;
        }
        if let Some(address) = patch.address {
            zone.address = address;
        }
        if let Some(latitude) = patch.latitude {
            zone.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            zone.longitude = longitude;
        }
        if let Some(radius) = patch.radius {
            zone.radius = radius;
        }
        if let Some(is_active) = patch.is_active {
            zone.is_active = is_active;
        }
        zone.updated_at = Utc::now();
        Ok(zone.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_record(user_id: &str) -> NewRecord {
        NewRecord {
            user_id: user_id.to_string(),
            check_in_time: Utc::now(),
            check_in_latitude: 37.7749,
            check_in_longitude: -122.4194,
            notes: None,
        }
    }

    fn close_now() -> CloseRecord {
        CloseRecord {
            check_out_time: Utc::now(),
            check_out_latitude: None,
            check_out_longitude: None,
            total_hours: 1.0,
            notes: None,
        }
    }

    #[tokio::test]
    async fn second_open_record_for_the_same_user_conflicts() {
        let store = MemoryStorage::new();
        store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();

        let err = store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict);

        // Different user is unaffected.
        store
            .create_record_if_none_open(new_record("u2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closing_frees_the_open_slot() {
        let store = MemoryStorage::new();
        let record = store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();

        let closed = store.close_record(&record.id, close_now()).await.unwrap();
        assert_eq!(closed.status, AttendanceStatus::CheckedOut);
        assert!(closed.check_out_time.is_some());
        assert!(store.open_record("u1").await.unwrap().is_none());

        // Slot is free again.
        store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closing_twice_fails() {
        let store = MemoryStorage::new();
        let record = store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();

        store.close_record(&record.id, close_now()).await.unwrap();
        let err = store.close_record(&record.id, close_now()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn close_keeps_notes_unless_replaced() {
        let store = MemoryStorage::new();
        let mut record = new_record("u1");
        record.notes = Some("morning shift".to_string());
        let record = store.create_record_if_none_open(record).await.unwrap();

        let closed = store.close_record(&record.id, close_now()).await.unwrap();
        assert_eq!(closed.notes.as_deref(), Some("morning shift"));

        let record = store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();
        let mut close = close_now();
        close.notes = Some("left early".to_string());
        let closed = store.close_record(&record.id, close).await.unwrap();
        assert_eq!(closed.notes.as_deref(), Some("left early"));
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let store = MemoryStorage::new();
        let base = Utc::now() - Duration::hours(10);
        for offset in 0..5 {
            let mut record = new_record("u1");
            record.check_in_time = base + Duration::hours(offset);
            let created = store.create_record_if_none_open(record).await.unwrap();
            store.close_record(&created.id, close_now()).await.unwrap();
        }

        let records = store.records_for_user("u1", 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].check_in_time > records[1].check_in_time);
        assert!(records[1].check_in_time > records[2].check_in_time);
    }

    #[tokio::test]
    async fn admin_listing_filters_by_user_and_status() {
        let store = MemoryStorage::new();
        let first = store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();
        store.close_record(&first.id, close_now()).await.unwrap();
        store
            .create_record_if_none_open(new_record("u1"))
            .await
            .unwrap();
        store
            .create_record_if_none_open(new_record("u2"))
            .await
            .unwrap();

        let all = store.all_records(100, RecordFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let only_u1 = store
            .all_records(
                100,
                RecordFilter {
                    user_id: Some("u1".to_string()),
                    status: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(only_u1.len(), 2);

        let open_u1 = store
            .all_records(
                100,
                RecordFilter {
                    user_id: Some("u1".to_string()),
                    status: Some(AttendanceStatus::CheckedIn),
                },
            )
            .await
            .unwrap();
        assert_eq!(open_u1.len(), 1);
        assert_eq!(open_u1[0].status, AttendanceStatus::CheckedIn);
    }

    #[tokio::test]
    async fn active_zones_excludes_deactivated() {
        let store = MemoryStorage::new();
        let zone = store
            .create_zone(NewZone {
                name: "HQ".to_string(),
                address: "1 Main St".to_string(),
                latitude: 37.7749,
                longitude: -122.4194,
                radius: 100.0,
                is_active: true,
            })
            .await
            .unwrap();

        assert_eq!(store.active_zones().await.unwrap().len(), 1);

        store
            .update_zone(
                &zone.id,
                ZonePatch {
                    is_active: Some(false),
                    ..ZonePatch::default()
                },
            )
            .await
            .unwrap();

        assert!(store.active_zones().await.unwrap().is_empty());
        assert_eq!(store.all_zones().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_zone_patches_only_given_fields() {
        let store = MemoryStorage::new();
        let zone = store
            .create_zone(NewZone {
                name: "HQ".to_string(),
                address: "1 Main St".to_string(),
                latitude: 37.7749,
                longitude: -122.4194,
                radius: 100.0,
                is_active: true,
            })
            .await
            .unwrap();

        let updated = store
            .update_zone(
                &zone.id,
                ZonePatch {
                    radius: Some(250.0),
                    ..ZonePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.radius, 250.0);
        assert_eq!(updated.name, "HQ");
        assert_eq!(updated.latitude, 37.7749);

        let err = store
            .update_zone("missing", ZonePatch::default())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }
}
