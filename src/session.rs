//! Attendance session state machine.
//!
//! A user is either checked in (exactly one open record) or checked out.
//! Check-in enforces the geofence strictly; check-out only reports a
//! violation and always closes the session, so nobody is trapped inside a
//! perimeter they already left.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AttendanceError;
use crate::geofence::{self, GeofenceEvaluation};
use crate::model::record::AttendanceRecord;
use crate::registry::GeofenceRegistry;
use crate::store::{CloseRecord, NewRecord, RecordFilter, Storage, StoreError};

#[derive(Debug)]
pub struct CheckInOutcome {
    pub record: AttendanceRecord,
    pub evaluation: GeofenceEvaluation,
}

#[derive(Debug)]
pub struct CheckOutOutcome {
    pub record: AttendanceRecord,
    /// Present when the client reported a position and a zone existed to
    /// measure against.
    pub evaluation: Option<GeofenceEvaluation>,
}

#[derive(Debug)]
pub struct SessionStatus {
    pub is_checked_in: bool,
    pub active_record: Option<AttendanceRecord>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Storage>,
    registry: GeofenceRegistry,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Storage>, registry: GeofenceRegistry) -> Self {
        Self { store, registry }
    }

    /// Opens a session. The position must lie inside the nearest active
    /// zone; the stored record and the zone measurement are both returned.
    pub async fn check_in(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        notes: Option<String>,
    ) -> Result<CheckInOutcome, AttendanceError> {
        ensure_in_range(latitude, longitude)?;

        let open = self
            .store
            .open_record(user_id)
            .await
            .map_err(AttendanceError::storage)?;
        if open.is_some() {
            return Err(AttendanceError::AlreadyCheckedIn);
        }

        let zones = self
            .registry
            .active_zones()
            .await
            .map_err(AttendanceError::storage)?;
        let Some(evaluation) = geofence::evaluate_nearest(latitude, longitude, &zones) else {
            return Err(AttendanceError::NoGeofenceConfigured);
        };
        if !evaluation.is_inside {
            return Err(AttendanceError::OutsideGeofence {
                distance_meters: evaluation.distance_meters,
                allowed_radius_meters: evaluation.allowed_radius_meters,
                zone_name: evaluation.zone_name,
            });
        }

        let result = self
            .store
            .create_record_if_none_open(NewRecord {
                user_id: user_id.to_string(),
                check_in_time: Utc::now(),
                check_in_latitude: latitude,
                check_in_longitude: longitude,
                notes,
            })
            .await;
        let record = match result {
            Ok(record) => record,
            // Lost the race against a concurrent check-in.
            Err(StoreError::Conflict) => return Err(AttendanceError::AlreadyCheckedIn),
            Err(e) => return Err(AttendanceError::storage(e)),
        };

        tracing::info!(
            user_id,
            record_id = %record.id,
            zone = %evaluation.zone_name,
            "Checked in"
        );
        Ok(CheckInOutcome { record, evaluation })
    }

    /// Closes the open session. A reported position is validated and
    /// measured, but an out-of-zone result never blocks the close.
    pub async fn check_out(
        &self,
        user_id: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        notes: Option<String>,
    ) -> Result<CheckOutOutcome, AttendanceError> {
        let open = self
            .store
            .open_record(user_id)
            .await
            .map_err(AttendanceError::storage)?
            .ok_or(AttendanceError::NoActiveSession)?;

        let position = match (latitude, longitude) {
            (Some(lat), Some(lon)) => {
                ensure_in_range(lat, lon)?;
                Some((lat, lon))
            }
            (None, None) => None,
            _ => {
                return Err(AttendanceError::InvalidCoordinates(
                    "latitude and longitude must be provided together".to_string(),
                ));
            }
        };

        let evaluation = match position {
            Some((lat, lon)) => {
                let zones = self
                    .registry
                    .active_zones()
                    .await
                    .map_err(AttendanceError::storage)?;
                geofence::evaluate_nearest(lat, lon, &zones)
            }
            None => None,
        };
        if let Some(eval) = &evaluation {
            if !eval.is_inside {
                tracing::warn!(
                    user_id,
                    distance_meters = eval.distance_meters,
                    allowed_radius_meters = eval.allowed_radius_meters,
                    zone = %eval.zone_name,
                    "Check-out location outside geofence"
                );
            }
        }

        let check_out_time = Utc::now();
        let elapsed_hours =
            (check_out_time - open.check_in_time).num_milliseconds() as f64 / 3_600_000.0;
        let total_hours = (elapsed_hours * 100.0).round() / 100.0;

        let result = self
            .store
            .close_record(
                &open.id,
                CloseRecord {
                    check_out_time,
                    check_out_latitude: position.map(|p| p.0),
                    check_out_longitude: position.map(|p| p.1),
                    total_hours,
                    notes,
                },
            )
            .await;
        let record = match result {
            Ok(record) => record,
            // The record closed between the lookup and the update.
            Err(StoreError::NotFound) => return Err(AttendanceError::NoActiveSession),
            Err(e) => return Err(AttendanceError::storage(e)),
        };

        tracing::info!(user_id, record_id = %record.id, total_hours, "Checked out");
        Ok(CheckOutOutcome { record, evaluation })
    }

    pub async fn status(&self, user_id: &str) -> Result<SessionStatus, AttendanceError> {
        let active_record = self
            .store
            .open_record(user_id)
            .await
            .map_err(AttendanceError::storage)?;
        Ok(SessionStatus {
            is_checked_in: active_record.is_some(),
            active_record,
        })
    }

    /// The user's records, newest check-in first.
    pub async fn history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.store
            .records_for_user(user_id, limit)
            .await
            .map_err(AttendanceError::storage)
    }

    /// Records across all users, for administrators.
    pub async fn all_records(
        &self,
        limit: usize,
        filter: RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.store
            .all_records(limit, filter)
            .await
            .map_err(AttendanceError::storage)
    }
}

fn ensure_in_range(latitude: f64, longitude: f64) -> Result<(), AttendanceError> {
    if geofence::coordinates_in_range(latitude, longitude) {
        Ok(())
    } else {
        Err(AttendanceError::InvalidCoordinates(format!(
            "latitude must be within [-90, 90] and longitude within [-180, 180], got ({latitude}, {longitude})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::AttendanceStatus;
    use crate::store::memory::MemoryStorage;
    use crate::store::NewZone;
    use chrono::Duration;

    const HQ_LAT: f64 = 37.7749;
    const HQ_LON: f64 = -122.4194;
    // Roughly 111 m north of the HQ center.
    const NORTH_LAT: f64 = 37.7759;

    fn setup() -> (Arc<dyn Storage>, SessionManager) {
        let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry =
            GeofenceRegistry::new(store.clone(), std::time::Duration::from_secs(3600));
        (store.clone(), SessionManager::new(store, registry))
    }

    async fn seed_zone(store: &Arc<dyn Storage>, radius: f64) {
        store
            .create_zone(NewZone {
                name: "HQ".to_string(),
                address: "1 Main St".to_string(),
                latitude: HQ_LAT,
                longitude: HQ_LON,
                radius,
                is_active: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn check_in_inside_zone_opens_a_session() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        let outcome = manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap();
        assert_eq!(outcome.record.status, AttendanceStatus::CheckedIn);
        assert_eq!(outcome.record.check_in_latitude, Some(HQ_LAT));
        assert!(outcome.evaluation.is_inside);
        assert_eq!(outcome.evaluation.distance_meters, 0.0);
        assert_eq!(outcome.evaluation.zone_name, "HQ");

        let status = manager.status("u1").await.unwrap();
        assert!(status.is_checked_in);
        assert_eq!(status.active_record.unwrap().id, outcome.record.id);
    }

    #[tokio::test]
    async fn check_in_outside_zone_is_rejected_with_measurements() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        let err = manager
            .check_in("u1", NORTH_LAT, HQ_LON, None)
            .await
            .unwrap_err();
        match err {
            AttendanceError::OutsideGeofence {
                distance_meters,
                allowed_radius_meters,
                zone_name,
            } => {
                assert!((distance_meters - 111.19).abs() < 0.5, "got {distance_meters}");
                assert_eq!(allowed_radius_meters, 100.0);
                assert_eq!(zone_name, "HQ");
            }
            other => panic!("expected OutsideGeofence, got {other:?}"),
        }

        assert!(!manager.status("u1").await.unwrap().is_checked_in);
    }

    #[tokio::test]
    async fn check_in_without_zones_is_rejected() {
        let (_store, manager) = setup();
        let err = manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoGeofenceConfigured));
    }

    #[tokio::test]
    async fn check_in_rejects_out_of_range_coordinates() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        let err = manager.check_in("u1", 90.5, HQ_LON, None).await.unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidCoordinates(_)));
        assert!(!manager.status("u1").await.unwrap().is_checked_in);
    }

    #[tokio::test]
    async fn second_check_in_is_rejected() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap();
        let err = manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyCheckedIn));
    }

    #[tokio::test]
    async fn check_out_without_session_fails_before_coordinate_checks() {
        let (_store, manager) = setup();
        // Invalid coordinates, but the missing session wins.
        let err = manager
            .check_out("u1", Some(200.0), Some(0.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NoActiveSession));
    }

    #[tokio::test]
    async fn check_out_computes_rounded_hours() {
        let (store, manager) = setup();
        // Session opened eight and a half hours ago.
        store
            .create_record_if_none_open(NewRecord {
                user_id: "u1".to_string(),
                check_in_time: Utc::now() - Duration::minutes(8 * 60 + 30),
                check_in_latitude: HQ_LAT,
                check_in_longitude: HQ_LON,
                notes: None,
            })
            .await
            .unwrap();

        let outcome = manager.check_out("u1", None, None, None).await.unwrap();
        assert_eq!(outcome.record.status, AttendanceStatus::CheckedOut);
        assert_eq!(outcome.record.total_hours, Some(8.5));
        assert!(outcome.evaluation.is_none());
        assert!(!manager.status("u1").await.unwrap().is_checked_in);
    }

    #[tokio::test]
    async fn check_out_outside_zone_still_closes() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap();
        let outcome = manager
            .check_out("u1", Some(NORTH_LAT), Some(HQ_LON), None)
            .await
            .unwrap();

        assert_eq!(outcome.record.status, AttendanceStatus::CheckedOut);
        assert_eq!(outcome.record.check_out_latitude, Some(NORTH_LAT));
        let eval = outcome.evaluation.unwrap();
        assert!(!eval.is_inside);
    }

    #[tokio::test]
    async fn check_out_with_position_but_no_zones_skips_evaluation() {
        let (store, manager) = setup();
        store
            .create_record_if_none_open(NewRecord {
                user_id: "u1".to_string(),
                check_in_time: Utc::now(),
                check_in_latitude: HQ_LAT,
                check_in_longitude: HQ_LON,
                notes: None,
            })
            .await
            .unwrap();

        let outcome = manager
            .check_out("u1", Some(HQ_LAT), Some(HQ_LON), None)
            .await
            .unwrap();
        assert!(outcome.evaluation.is_none());
        assert_eq!(outcome.record.status, AttendanceStatus::CheckedOut);
    }

    #[tokio::test]
    async fn check_out_rejects_half_a_position() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap();
        let err = manager
            .check_out("u1", Some(HQ_LAT), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidCoordinates(_)));

        // The session stayed open.
        assert!(manager.status("u1").await.unwrap().is_checked_in);
    }

    #[tokio::test]
    async fn notes_are_kept_unless_replaced_on_check_out() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        manager
            .check_in("u1", HQ_LAT, HQ_LON, Some("morning shift".to_string()))
            .await
            .unwrap();
        let outcome = manager.check_out("u1", None, None, None).await.unwrap();
        assert_eq!(outcome.record.notes.as_deref(), Some("morning shift"));

        manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap();
        let outcome = manager
            .check_out("u1", None, None, Some("left early".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.record.notes.as_deref(), Some("left early"));
    }

    #[tokio::test]
    async fn re_entry_lists_the_open_session_first() {
        let (store, manager) = setup();
        seed_zone(&store, 100.0).await;

        // First session opened an hour ago, closed now.
        store
            .create_record_if_none_open(NewRecord {
                user_id: "u1".to_string(),
                check_in_time: Utc::now() - Duration::hours(1),
                check_in_latitude: HQ_LAT,
                check_in_longitude: HQ_LON,
                notes: None,
            })
            .await
            .unwrap();
        manager.check_out("u1", None, None, None).await.unwrap();

        // Re-enter.
        manager.check_in("u1", HQ_LAT, HQ_LON, None).await.unwrap();

        let records = manager.history("u1", 50).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, AttendanceStatus::CheckedIn);
        assert_eq!(records[1].status, AttendanceStatus::CheckedOut);
        assert!(records[0].check_in_time > records[1].check_in_time);
    }
}
