// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentError, CreateAppointmentRequest, NewAppointment};
use crate::services::clock::{Clock, SystemClock};
use crate::services::validation::validate_booking;
use crate::store::{BookingTransaction, SchedulingStore};

pub fn clinician_placeholder_name(clinician_id: &str) -> String {
    format!("Dr. {}", clinician_id)
}

pub fn patient_placeholder_name(patient_id: &str) -> String {
    format!("Patient {}", patient_id)
}

#[derive(Clone)]
pub struct AppointmentBookingService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate and persist a new appointment.
    ///
    /// Validation runs before the store is touched. The overlap check, implicit
    /// clinician/patient creation, insert and read-back then run as one unit of
    /// work that either commits entirely or leaves no trace.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let booked = self.book(request).await;

        match &booked {
            Ok(appointment) => info!(
                "Appointment {} booked for clinician {}",
                appointment.id, appointment.clinician_id
            ),
            // Logged with the overlapping id by `book_within`.
            Err(AppointmentError::Conflict { .. }) => {}
            Err(e) if e.is_validation() => debug!("Booking request rejected: {}", e),
            Err(e) => error!("Failed to book appointment: {}", e),
        }

        booked
    }

    async fn book(&self, request: CreateAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let appointment = validate_booking(&request, self.clock.now())?;
        debug!(
            "Booking clinician {} for patient {} from {} to {}",
            appointment.clinician_id, appointment.patient_id, appointment.start_time, appointment.end_time
        );

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            store.in_transaction(&mut |tx| book_within(tx, &appointment))
        })
        .await
        .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
    }
}

/// The atomic section of a booking. Must run inside a store transaction.
pub fn book_within(
    tx: &dyn BookingTransaction,
    appointment: &NewAppointment,
) -> Result<Appointment, AppointmentError> {
    if let Some(existing_id) = tx.find_overlapping(
        &appointment.clinician_id,
        appointment.start_time,
        appointment.end_time,
    )? {
        warn!(
            "Conflict for clinician {}: requested {} - {} overlaps appointment {}",
            appointment.clinician_id, appointment.start_time, appointment.end_time, existing_id
        );
        return Err(AppointmentError::Conflict { existing_id });
    }

    if tx.ensure_clinician(
        &appointment.clinician_id,
        &clinician_placeholder_name(&appointment.clinician_id),
    )? {
        debug!("Created clinician {}", appointment.clinician_id);
    }

    if tx.ensure_patient(
        &appointment.patient_id,
        &patient_placeholder_name(&appointment.patient_id),
    )? {
        debug!("Created patient {}", appointment.patient_id);
    }

    let id = tx.insert_appointment(appointment)?;
    tx.fetch_appointment(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::models::AppointmentFilter;
    use crate::services::clock::FixedClock;
    use crate::store::BookingWork;

    #[derive(Clone, Default)]
    struct FakeState {
        clinicians: BTreeMap<String, String>,
        patients: BTreeMap<String, String>,
        appointments: Vec<Appointment>,
        next_id: i64,
    }

    /// Snapshot-per-transaction store: work runs on a copy that replaces the
    /// committed state only when the work succeeds.
    #[derive(Default)]
    struct FakeStore {
        committed: Mutex<FakeState>,
        fail_inserts: bool,
    }

    struct FakeTx {
        state: RefCell<FakeState>,
        fail_inserts: bool,
        created_at: DateTime<Utc>,
    }

    impl BookingTransaction for FakeTx {
        fn find_overlapping(
            &self,
            clinician_id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Option<i64>, AppointmentError> {
            Ok(self
                .state
                .borrow()
                .appointments
                .iter()
                .find(|a| a.clinician_id == clinician_id && a.overlaps(start, end))
                .map(|a| a.id))
        }

        fn ensure_clinician(&self, clinician_id: &str, name: &str) -> Result<bool, AppointmentError> {
            let mut state = self.state.borrow_mut();
            if state.clinicians.contains_key(clinician_id) {
                return Ok(false);
            }
            state.clinicians.insert(clinician_id.to_string(), name.to_string());
            Ok(true)
        }

        fn ensure_patient(&self, patient_id: &str, name: &str) -> Result<bool, AppointmentError> {
            let mut state = self.state.borrow_mut();
            if state.patients.contains_key(patient_id) {
                return Ok(false);
            }
            state.patients.insert(patient_id.to_string(), name.to_string());
            Ok(true)
        }

        fn insert_appointment(&self, appointment: &NewAppointment) -> Result<i64, AppointmentError> {
            if self.fail_inserts {
                return Err(AppointmentError::Store("disk full".to_string()));
            }
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = state.next_id;
            state.appointments.push(Appointment {
                id,
                clinician_id: appointment.clinician_id.clone(),
                patient_id: appointment.patient_id.clone(),
                start_time: appointment.start_time,
                end_time: appointment.end_time,
                created_at: self.created_at,
            });
            Ok(id)
        }

        fn fetch_appointment(&self, id: i64) -> Result<Appointment, AppointmentError> {
            self.state
                .borrow()
                .appointments
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or_else(|| AppointmentError::Store(format!("appointment {} vanished", id)))
        }
    }

    impl SchedulingStore for FakeStore {
        fn in_transaction(&self, work: BookingWork<'_>) -> Result<Appointment, AppointmentError> {
            let mut committed = self.committed.lock().unwrap();
            let tx = FakeTx {
                state: RefCell::new(committed.clone()),
                fail_inserts: self.fail_inserts,
                created_at: now(),
            };
            let result = work(&tx as &dyn BookingTransaction);
            if result.is_ok() {
                *committed = tx.state.into_inner();
            }
            result
        }

        fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
            let committed = self.committed.lock().unwrap();
            let mut rows: Vec<Appointment> = committed
                .appointments
                .iter()
                .filter(|a| filter.matches(a))
                .cloned()
                .collect();
            rows.sort_by_key(|a| (a.start_time, a.id));
            Ok(rows)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 30, 9, 0, 0).unwrap()
    }

    fn service(store: Arc<FakeStore>) -> AppointmentBookingService {
        AppointmentBookingService::with_clock(store, Arc::new(FixedClock(now())))
    }

    fn request(clinician: &str, start: &str, end: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest::new(clinician, "patient-1", start, end)
    }

    #[tokio::test]
    async fn test_books_valid_request() {
        let store = Arc::new(FakeStore::default());
        let booking = service(store.clone());

        let appointment = booking
            .create_appointment(request("C", "2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"))
            .await
            .unwrap();

        assert_eq!(appointment.id, 1);
        assert_eq!(appointment.clinician_id, "C");
        assert_eq!(appointment.patient_id, "patient-1");
        assert_eq!(appointment.start_time, Utc.with_ymd_and_hms(2025, 12, 1, 10, 0, 0).unwrap());
        assert_eq!(appointment.end_time, Utc.with_ymd_and_hms(2025, 12, 1, 11, 0, 0).unwrap());

        let state = store.committed.lock().unwrap();
        assert_eq!(state.clinicians.get("C").map(String::as_str), Some("Dr. C"));
        assert_eq!(state.patients.get("patient-1").map(String::as_str), Some("Patient patient-1"));
    }

    #[tokio::test]
    async fn test_partial_overlap_conflicts() {
        let store = Arc::new(FakeStore::default());
        let booking = service(store.clone());

        booking
            .create_appointment(request("C", "2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"))
            .await
            .unwrap();
        let second = booking
            .create_appointment(request("C", "2025-12-01T10:30:00Z", "2025-12-01T11:30:00Z"))
            .await;

        assert_matches!(second, Err(AppointmentError::Conflict { existing_id: 1 }));
        assert_eq!(store.committed.lock().unwrap().appointments.len(), 1);
    }

    #[tokio::test]
    async fn test_interval_pairs_follow_half_open_rule() {
        let first = ("2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z");
        let cases = [
            (("2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"), false),
            (("2025-12-01T09:30:00Z", "2025-12-01T10:30:00Z"), false),
            (("2025-12-01T10:30:00Z", "2025-12-01T11:30:00Z"), false),
            (("2025-12-01T09:00:00Z", "2025-12-01T12:00:00Z"), false),
            (("2025-12-01T10:15:00Z", "2025-12-01T10:45:00Z"), false),
            (("2025-12-01T11:00:00Z", "2025-12-01T12:00:00Z"), true),
            (("2025-12-01T09:00:00Z", "2025-12-01T10:00:00Z"), true),
            (("2025-12-01T13:00:00Z", "2025-12-01T14:00:00Z"), true),
        ];

        for ((start, end), should_book) in cases {
            let booking = service(Arc::new(FakeStore::default()));
            booking.create_appointment(request("C", first.0, first.1)).await.unwrap();

            let result = booking.create_appointment(request("C", start, end)).await;
            if should_book {
                assert!(result.is_ok(), "{} - {} should book", start, end);
            } else {
                assert_matches!(result, Err(AppointmentError::Conflict { .. }), "{} - {} should conflict", start, end);
            }
        }
    }

    #[tokio::test]
    async fn test_other_clinician_is_independent() {
        let booking = service(Arc::new(FakeStore::default()));

        booking
            .create_appointment(request("C1", "2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"))
            .await
            .unwrap();
        booking
            .create_appointment(request("C2", "2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_store() {
        let store = Arc::new(FakeStore::default());
        let booking = service(store.clone());

        let result = booking
            .create_appointment(request("C", "2025-11-29T10:00:00Z", "2025-11-29T11:00:00Z"))
            .await;

        assert_matches!(result, Err(AppointmentError::PastAppointment));
        let state = store.committed.lock().unwrap();
        assert!(state.clinicians.is_empty());
        assert!(state.patients.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back_implicit_entities() {
        let store = Arc::new(FakeStore {
            fail_inserts: true,
            ..FakeStore::default()
        });
        let booking = service(store.clone());

        let result = booking
            .create_appointment(request("C", "2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"))
            .await;

        assert_matches!(result, Err(AppointmentError::Store(_)));
        let state = store.committed.lock().unwrap();
        assert!(state.clinicians.is_empty());
        assert!(state.patients.is_empty());
        assert!(state.appointments.is_empty());
    }

    struct PanickingStore;

    impl SchedulingStore for PanickingStore {
        fn in_transaction(&self, _work: BookingWork<'_>) -> Result<Appointment, AppointmentError> {
            panic!("connection dropped mid-transaction");
        }

        fn list_appointments(&self, _filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
            panic!("connection dropped mid-query");
        }
    }

    #[tokio::test]
    async fn test_crashed_store_task_is_a_store_failure() {
        let booking = AppointmentBookingService::with_clock(Arc::new(PanickingStore), Arc::new(FixedClock(now())));

        let result = booking
            .create_appointment(request("C", "2025-12-01T10:00:00Z", "2025-12-01T11:00:00Z"))
            .await;

        assert_matches!(result, Err(AppointmentError::Store(msg)) if msg.contains("Blocking database task failed"));
    }

    #[test]
    fn test_placeholder_names() {
        assert_eq!(clinician_placeholder_name("42"), "Dr. 42");
        assert_eq!(patient_placeholder_name("42"), "Patient 42");
    }
}
