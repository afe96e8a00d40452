// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::DatabaseError;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub clinician_id: String,
    pub patient_id: String,
    #[serde(with = "utc_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "utc_timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(with = "utc_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap: back-to-back appointments do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinician {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    #[serde(with = "utc_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(with = "utc_timestamp")]
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST / QUERY MODELS
// ==============================================================================

/// Booking request as submitted by the client. Every field is optional on the
/// wire so absence can be reported as `MissingFields` rather than a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub clinician_id: Option<String>,
    pub patient_id: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn new(clinician_id: &str, patient_id: &str, start: &str, end: &str) -> Self {
        Self {
            clinician_id: Some(clinician_id.to_string()),
            patient_id: Some(patient_id.to_string()),
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }
    }

    /// All four fields present and not blank.
    pub fn has_required_fields(&self) -> bool {
        [&self.clinician_id, &self.patient_id, &self.start, &self.end]
            .iter()
            .all(|field| field.as_deref().is_some_and(|value| !value.trim().is_empty()))
    }
}

/// A booking that passed validation and is ready for the atomic section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub clinician_id: String,
    pub patient_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl AppointmentRangeQuery {
    pub fn between(from: &str, to: &str) -> Self {
        Self {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
        }
    }
}

/// Store-level selection of appointments. Built by the query engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub clinician_id: Option<String>,
    /// Keep appointments with `end_time >= from`.
    pub from: Option<DateTime<Utc>>,
    /// Keep appointments with `start_time <= to`.
    pub to: Option<DateTime<Utc>>,
    /// Keep appointments with `start_time >= upcoming_after`.
    pub upcoming_after: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.clinician_id
            .as_deref()
            .map_or(true, |id| appointment.clinician_id == id)
            && self.from.map_or(true, |from| appointment.end_time >= from)
            && self.to.map_or(true, |to| appointment.start_time <= to)
            && self
                .upcoming_after
                .map_or(true, |now| appointment.start_time >= now)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid date format: {field} must be an ISO-8601 UTC timestamp")]
    InvalidDateFormat { field: &'static str },

    #[error("Appointment start time must be in the future")]
    PastAppointment,

    #[error("Start time must be before end time")]
    InvalidTimeRange,

    #[error("Appointment time conflicts with existing booking")]
    Conflict { existing_id: i64 },

    #[error("Storage failure: {0}")]
    Store(String),
}

impl AppointmentError {
    /// Validation failures happen before any write.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppointmentError::MissingFields
                | AppointmentError::InvalidDateFormat { .. }
                | AppointmentError::PastAppointment
                | AppointmentError::InvalidTimeRange
        )
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        AppointmentError::Store(e.to_string())
    }
}

impl From<rusqlite::Error> for AppointmentError {
    fn from(e: rusqlite::Error) -> Self {
        AppointmentError::from(DatabaseError::from(e))
    }
}

// ==============================================================================
// TIMESTAMP ENCODING
// ==============================================================================

/// UTC timestamps on the wire and in the store: `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub mod utc_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(time: &DateTime<Utc>) -> String {
        time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
