use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};

use crate::models::{
    AppointmentError, AppointmentFilter, AppointmentRangeQuery, CreateAppointmentRequest,
    NewAppointment,
};

/// Parse a client timestamp that must carry the UTC designator.
///
/// Accepts RFC 3339 (`2025-12-01T10:00:00Z`, fractional seconds allowed) and
/// minute precision (`2025-12-01T10:00Z`). Anything without a trailing `Z`,
/// including explicit `+00:00` offsets, is rejected. Precision is truncated to
/// milliseconds, the resolution the store keeps.
pub fn parse_utc_timestamp(
    raw: &str,
    field: &'static str,
) -> Result<DateTime<Utc>, AppointmentError> {
    let invalid = || AppointmentError::InvalidDateFormat { field };

    if !(raw.ends_with('Z') || raw.ends_with('z')) {
        return Err(invalid());
    }

    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(time) => time.with_timezone(&Utc),
        Err(_) => {
            let naive = NaiveDateTime::parse_from_str(&raw[..raw.len() - 1], "%Y-%m-%dT%H:%M")
                .map_err(|_| invalid())?;
            Utc.from_utc_datetime(&naive)
        }
    };

    Ok(parsed.trunc_subsecs(3))
}

fn required(field: &Option<String>) -> Result<&str, AppointmentError> {
    match field.as_deref() {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppointmentError::MissingFields),
    }
}

/// Booking validation, first failing check wins:
/// presence, format, start in the future, start before end.
pub fn validate_booking(
    request: &CreateAppointmentRequest,
    now: DateTime<Utc>,
) -> Result<NewAppointment, AppointmentError> {
    let clinician_id = required(&request.clinician_id)?;
    let patient_id = required(&request.patient_id)?;
    let start_raw = required(&request.start)?;
    let end_raw = required(&request.end)?;

    let start_time = parse_utc_timestamp(start_raw, "start")?;
    let end_time = parse_utc_timestamp(end_raw, "end")?;

    // Only the start is compared against the clock.
    if start_time <= now {
        return Err(AppointmentError::PastAppointment);
    }

    if start_time >= end_time {
        return Err(AppointmentError::InvalidTimeRange);
    }

    Ok(NewAppointment {
        clinician_id: clinician_id.to_string(),
        patient_id: patient_id.to_string(),
        start_time,
        end_time,
    })
}

fn optional_bound(
    raw: &Option<String>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, AppointmentError> {
    match raw.as_deref() {
        Some(value) if !value.trim().is_empty() => parse_utc_timestamp(value, field).map(Some),
        _ => Ok(None),
    }
}

/// Translate a client range into a store filter.
///
/// Without `from`, only appointments starting at or after `now` are kept.
/// A lone `to` does not change that.
pub fn build_filter(
    clinician_id: Option<&str>,
    range: &AppointmentRangeQuery,
    now: DateTime<Utc>,
) -> Result<AppointmentFilter, AppointmentError> {
    let from = optional_bound(&range.from, "from")?;
    let to = optional_bound(&range.to, "to")?;

    Ok(AppointmentFilter {
        clinician_id: clinician_id.map(str::to_string),
        from,
        to,
        upcoming_after: if from.is_none() { Some(now) } else { None },
    })
}
