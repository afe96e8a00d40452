/// Clinic scheduling schema. Every statement is idempotent so it runs on each open.
///
/// Timestamps are stored as fixed-width UTC text (`YYYY-MM-DDTHH:MM:SS.sssZ`),
/// which keeps SQL string comparison chronological.
pub const CLINIC_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS clinicians (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        specialty TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS patients (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        clinician_id TEXT NOT NULL,
        patient_id TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),

        FOREIGN KEY (clinician_id) REFERENCES clinicians(id),
        FOREIGN KEY (patient_id) REFERENCES patients(id)
    );

    CREATE INDEX IF NOT EXISTS idx_clinician_times
    ON appointments(clinician_id, start_time, end_time);
";

pub const TABLES: [&str; 3] = ["clinicians", "patients", "appointments"];
