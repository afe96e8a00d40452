// libs/appointment-cell/src/store.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use shared_database::{Database, DatabaseError};

use crate::models::{
    utc_timestamp, Appointment, AppointmentError, AppointmentFilter, Clinician, NewAppointment,
    Patient,
};

// ==============================================================================
// STORE ABSTRACTION
// ==============================================================================

/// Operations available inside one booking unit of work.
pub trait BookingTransaction {
    /// Id of any appointment for the clinician with `start_time < end AND end_time > start`.
    fn find_overlapping(
        &self,
        clinician_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<i64>, AppointmentError>;

    /// Insert-if-absent. Returns `true` when a row was created.
    fn ensure_clinician(&self, clinician_id: &str, name: &str) -> Result<bool, AppointmentError>;

    /// Insert-if-absent. Returns `true` when a row was created.
    fn ensure_patient(&self, patient_id: &str, name: &str) -> Result<bool, AppointmentError>;

    /// Returns the store-assigned id.
    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<i64, AppointmentError>;

    fn fetch_appointment(&self, id: i64) -> Result<Appointment, AppointmentError>;
}

pub type BookingWork<'a> =
    &'a mut dyn FnMut(&dyn BookingTransaction) -> Result<Appointment, AppointmentError>;

pub trait SchedulingStore: Send + Sync {
    /// Run `work` in a single isolated transaction. Everything it wrote is
    /// committed when it returns `Ok` and discarded when it returns `Err`.
    ///
    /// Implementations must ensure two concurrent units of work cannot both
    /// observe "no overlap" for the same clinician and both commit.
    fn in_transaction(&self, work: BookingWork<'_>) -> Result<Appointment, AppointmentError>;

    /// Appointments matching `filter`, ascending by start time.
    fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError>;
}

// ==============================================================================
// SQLITE IMPLEMENTATION
// ==============================================================================

const APPOINTMENT_COLUMNS: &str = "id, clinician_id, patient_id, start_time, end_time, created_at";

#[derive(Clone)]
pub struct SqliteSchedulingStore {
    db: Arc<Database>,
}

impl SqliteSchedulingStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(Arc::new(Database::open_in_memory()?)))
    }

    pub fn find_clinician(&self, clinician_id: &str) -> Result<Option<Clinician>, AppointmentError> {
        self.db.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, specialty, created_at FROM clinicians WHERE id = ?1",
                    params![clinician_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, name, specialty, created_at)| {
                Ok::<_, AppointmentError>(Clinician {
                    id,
                    name,
                    specialty,
                    created_at: parse_stored(&created_at)?,
                })
            })
            .transpose()
        })
    }

    pub fn find_patient(&self, patient_id: &str) -> Result<Option<Patient>, AppointmentError> {
        self.db.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, email, phone, created_at FROM patients WHERE id = ?1",
                    params![patient_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, name, email, phone, created_at)| {
                Ok::<_, AppointmentError>(Patient {
                    id,
                    name,
                    email,
                    phone,
                    created_at: parse_stored(&created_at)?,
                })
            })
            .transpose()
        })
    }

    /// Number of clinician rows with the given id (0 or 1 while the primary key holds).
    pub fn count_clinicians(&self, clinician_id: &str) -> Result<i64, AppointmentError> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM clinicians WHERE id = ?1",
                params![clinician_id],
                |row| row.get(0),
            )
            .map_err(AppointmentError::from)
        })
    }

    pub fn count_appointments(&self) -> Result<i64, AppointmentError> {
        self.db.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
                .map_err(AppointmentError::from)
        })
    }
}

impl SchedulingStore for SqliteSchedulingStore {
    fn in_transaction(&self, work: BookingWork<'_>) -> Result<Appointment, AppointmentError> {
        self.db
            .with_write_transaction(|tx| work(tx as &dyn BookingTransaction))
    }

    fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.db.with_connection(|conn| select_appointments(conn, filter))
    }
}

impl BookingTransaction for Transaction<'_> {
    fn find_overlapping(
        &self,
        clinician_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<i64>, AppointmentError> {
        self.query_row(
            "SELECT id FROM appointments
             WHERE clinician_id = ?1
             AND start_time < ?2
             AND end_time > ?3
             ORDER BY start_time ASC
             LIMIT 1",
            params![
                clinician_id,
                utc_timestamp::format(&end),
                utc_timestamp::format(&start)
            ],
            |row| row.get(0),
        )
        .optional()
        .map_err(AppointmentError::from)
    }

    fn ensure_clinician(&self, clinician_id: &str, name: &str) -> Result<bool, AppointmentError> {
        let inserted = self.execute(
            "INSERT OR IGNORE INTO clinicians (id, name) VALUES (?1, ?2)",
            params![clinician_id, name],
        )?;
        Ok(inserted > 0)
    }

    fn ensure_patient(&self, patient_id: &str, name: &str) -> Result<bool, AppointmentError> {
        let inserted = self.execute(
            "INSERT OR IGNORE INTO patients (id, name) VALUES (?1, ?2)",
            params![patient_id, name],
        )?;
        Ok(inserted > 0)
    }

    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<i64, AppointmentError> {
        self.execute(
            "INSERT INTO appointments (clinician_id, patient_id, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                appointment.clinician_id,
                appointment.patient_id,
                utc_timestamp::format(&appointment.start_time),
                utc_timestamp::format(&appointment.end_time)
            ],
        )?;
        Ok(self.last_insert_rowid())
    }

    fn fetch_appointment(&self, id: i64) -> Result<Appointment, AppointmentError> {
        let raw = self.query_row(
            &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS),
            params![id],
            StoredAppointment::from_row,
        )?;
        raw.into_appointment()
    }
}

fn select_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<Appointment>, AppointmentError> {
    let mut sql = format!("SELECT {} FROM appointments WHERE 1=1", APPOINTMENT_COLUMNS);
    let mut values: Vec<String> = Vec::new();

    if let Some(clinician_id) = &filter.clinician_id {
        values.push(clinician_id.clone());
        sql.push_str(&format!(" AND clinician_id = ?{}", values.len()));
    }

    // Intersection with the requested range, not containment.
    if let Some(from) = &filter.from {
        values.push(utc_timestamp::format(from));
        sql.push_str(&format!(" AND end_time >= ?{}", values.len()));
    }

    if let Some(to) = &filter.to {
        values.push(utc_timestamp::format(to));
        sql.push_str(&format!(" AND start_time <= ?{}", values.len()));
    }

    if let Some(now) = &filter.upcoming_after {
        values.push(utc_timestamp::format(now));
        sql.push_str(&format!(" AND start_time >= ?{}", values.len()));
    }

    sql.push_str(" ORDER BY start_time ASC, id ASC");
    debug!("Listing appointments: {}", sql);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), StoredAppointment::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(StoredAppointment::into_appointment)
        .collect()
}

/// Appointment row as text, before timestamp parsing.
struct StoredAppointment {
    id: i64,
    clinician_id: String,
    patient_id: String,
    start_time: String,
    end_time: String,
    created_at: String,
}

impl StoredAppointment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            clinician_id: row.get(1)?,
            patient_id: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_appointment(self) -> Result<Appointment, AppointmentError> {
        Ok(Appointment {
            id: self.id,
            clinician_id: self.clinician_id,
            patient_id: self.patient_id,
            start_time: parse_stored(&self.start_time)?,
            end_time: parse_stored(&self.end_time)?,
            created_at: parse_stored(&self.created_at)?,
        })
    }
}

fn parse_stored(raw: &str) -> Result<DateTime<Utc>, AppointmentError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| {
            AppointmentError::from(DatabaseError::CorruptRow(format!(
                "invalid timestamp {:?}: {}",
                raw, e
            )))
        })
}
