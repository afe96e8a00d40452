use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Role;

pub struct TestConfig {
    pub database_path: String,
    pub busy_timeout_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            busy_timeout_ms: 1000,
        }
    }
}

impl TestConfig {
    pub fn with_database_path(path: &str) -> Self {
        Self {
            database_path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_path: self.database_path.clone(),
            host: "127.0.0.1".to_string(),
            port: 0,
            database_busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}

/// Identifier that will not collide with anything created by another test.
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// UTC timestamp in the same text form clients send (`...T10:00:00.000Z`).
pub fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct TestSlots;

impl TestSlots {
    /// A slot starting `hours_ahead` hours from now, truncated to the minute.
    pub fn future(hours_ahead: i64, duration_minutes: i64) -> (String, String) {
        let now = Utc::now();
        let base = now - Duration::seconds(now.timestamp() % 60)
            - Duration::nanoseconds(now.timestamp_subsec_nanos() as i64);
        let start = base + Duration::hours(hours_ahead);
        let end = start + Duration::minutes(duration_minutes);
        (iso(start), iso(end))
    }

    /// A slot that already started `hours_ago` hours ago.
    pub fn past(hours_ago: i64, duration_minutes: i64) -> (String, String) {
        let start = Utc::now() - Duration::hours(hours_ago);
        let end = start + Duration::minutes(duration_minutes);
        (iso(start), iso(end))
    }
}

pub struct TestRequests;

impl TestRequests {
    pub fn appointment_body(
        clinician_id: &str,
        patient_id: &str,
        start: &str,
        end: &str,
    ) -> serde_json::Value {
        json!({
            "clinicianId": clinician_id,
            "patientId": patient_id,
            "start": start,
            "end": end
        })
    }

    pub fn role_header(role: Role) -> (&'static str, &'static str) {
        (shared_models::auth::ROLE_HEADER, role.as_str())
    }
}
