// libs/appointment-cell/src/services/query.rs
use std::sync::Arc;

use tracing::debug;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentError, AppointmentFilter, AppointmentRangeQuery};
use crate::services::clock::{Clock, SystemClock};
use crate::services::validation::build_filter;
use crate::store::SchedulingStore;

/// Read-only access to appointments. Never creates clinicians or patients.
#[derive(Clone)]
pub struct AppointmentQueryService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
}

impl AppointmentQueryService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Appointments for one clinician. An unknown clinician yields an empty list.
    pub async fn list_appointments_for_clinician(
        &self,
        clinician_id: &str,
        range: &AppointmentRangeQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = build_filter(Some(clinician_id), range, self.clock.now())?;
        self.fetch(filter).await
    }

    /// Appointments across every clinician.
    pub async fn list_all_appointments(
        &self,
        range: &AppointmentRangeQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = build_filter(None, range, self.clock.now())?;
        self.fetch(filter).await
    }

    async fn fetch(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointments with {:?}", filter);

        let store = Arc::clone(&self.store);
        let appointments = tokio::task::spawn_blocking(move || store.list_appointments(&filter))
            .await
            .map_err(|e| DatabaseError::TaskFailed(e.to_string()))??;

        debug!("Found {} appointments", appointments.len());
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::models::NewAppointment;
    use crate::services::clock::FixedClock;
    use crate::store::{BookingTransaction, SqliteSchedulingStore};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 30, 9, 0, 0).unwrap()
    }

    fn seed(store: &SqliteSchedulingStore, clinician: &str, start: DateTime<Utc>, minutes: i64) -> Appointment {
        let appointment = NewAppointment {
            clinician_id: clinician.to_string(),
            patient_id: "p1".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
        };
        store
            .in_transaction(&mut |tx| {
                tx.ensure_clinician(&appointment.clinician_id, "Dr. seed")?;
                tx.ensure_patient(&appointment.patient_id, "Patient seed")?;
                let id = tx.insert_appointment(&appointment)?;
                tx.fetch_appointment(id)
            })
            .unwrap()
    }

    fn fixture() -> (SqliteSchedulingStore, AppointmentQueryService) {
        let store = SqliteSchedulingStore::in_memory().unwrap();
        let service = AppointmentQueryService::with_clock(Arc::new(store.clone()), Arc::new(FixedClock(now())));
        (store, service)
    }

    #[tokio::test]
    async fn test_default_is_upcoming_only() {
        let (store, service) = fixture();
        seed(&store, "C", now() - Duration::hours(2), 60);
        let upcoming = seed(&store, "C", now() + Duration::hours(2), 60);

        let result = service
            .list_appointments_for_clinician("C", &AppointmentRangeQuery::default())
            .await
            .unwrap();

        assert_eq!(result, vec![upcoming]);
    }

    #[tokio::test]
    async fn test_in_progress_appointment_excluded_by_default() {
        let (store, service) = fixture();
        seed(&store, "C", now() - Duration::minutes(30), 60);

        let result = service.list_all_appointments(&AppointmentRangeQuery::default()).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_to_only_still_hides_past() {
        let (store, service) = fixture();
        seed(&store, "C", now() - Duration::hours(2), 60);
        let soon = seed(&store, "C", now() + Duration::hours(1), 60);
        seed(&store, "C", now() + Duration::days(10), 60);

        let range = AppointmentRangeQuery {
            from: None,
            to: Some("2025-12-01T00:00:00Z".to_string()),
        };
        let result = service.list_appointments_for_clinician("C", &range).await.unwrap();

        assert_eq!(result, vec![soon]);
    }

    #[tokio::test]
    async fn test_from_includes_past_and_partial_overlaps() {
        let (store, service) = fixture();
        let straddles = seed(&store, "C", Utc.with_ymd_and_hms(2025, 11, 1, 23, 30, 0).unwrap(), 60);
        seed(&store, "C", Utc.with_ymd_and_hms(2025, 10, 1, 10, 0, 0).unwrap(), 60);

        let range = AppointmentRangeQuery {
            from: Some("2025-11-02T00:00:00Z".to_string()),
            to: None,
        };
        let result = service.list_appointments_for_clinician("C", &range).await.unwrap();

        assert_eq!(result, vec![straddles]);
    }

    #[tokio::test]
    async fn test_range_filter_selects_single_day() {
        let (store, service) = fixture();
        let day_one = seed(&store, "C", Utc.with_ymd_and_hms(2025, 12, 1, 10, 0, 0).unwrap(), 60);
        seed(&store, "C", Utc.with_ymd_and_hms(2025, 12, 2, 10, 0, 0).unwrap(), 60);

        let range = AppointmentRangeQuery::between("2025-12-01T00:00:00Z", "2025-12-01T23:59:59Z");
        let result = service.list_appointments_for_clinician("C", &range).await.unwrap();

        assert_eq!(result, vec![day_one]);
    }

    #[tokio::test]
    async fn test_results_sorted_by_start_and_scoped_to_clinician() {
        let (store, service) = fixture();
        let later = seed(&store, "C1", now() + Duration::hours(5), 30);
        let other = seed(&store, "C2", now() + Duration::hours(3), 30);
        let sooner = seed(&store, "C1", now() + Duration::hours(1), 30);

        let mine = service
            .list_appointments_for_clinician("C1", &AppointmentRangeQuery::default())
            .await
            .unwrap();
        assert_eq!(mine, vec![sooner.clone(), later.clone()]);

        let everyone = service.list_all_appointments(&AppointmentRangeQuery::default()).await.unwrap();
        assert_eq!(everyone, vec![sooner, other, later]);
    }

    #[tokio::test]
    async fn test_unknown_clinician_is_empty_and_not_created() {
        let (store, service) = fixture();

        let result = service
            .list_appointments_for_clinician("nobody", &AppointmentRangeQuery::default())
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(store.find_clinician("nobody").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_bound_is_rejected() {
        let (_store, service) = fixture();
        let range = AppointmentRangeQuery {
            from: None,
            to: Some("next week".to_string()),
        };

        assert_matches!(
            service.list_all_appointments(&range).await,
            Err(AppointmentError::InvalidDateFormat { field: "to" })
        );
    }
}
