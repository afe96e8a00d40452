// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::{Database, DatabaseError};

use crate::policy::{AccessPolicy, HeaderRolePolicy};
use crate::services::{AppointmentBookingService, AppointmentQueryService, Clock, SystemClock};
use crate::store::{SchedulingStore, SqliteSchedulingStore};

/// Everything the scheduling routes need, built once at startup.
#[derive(Clone)]
pub struct SchedulingState {
    pub booking: AppointmentBookingService,
    pub query: AppointmentQueryService,
    pub policy: Arc<dyn AccessPolicy>,
}

impl SchedulingState {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self::with_parts(store, Arc::new(SystemClock), Arc::new(HeaderRolePolicy))
    }

    pub fn with_parts(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            booking: AppointmentBookingService::with_clock(Arc::clone(&store), Arc::clone(&clock)),
            query: AppointmentQueryService::with_clock(store, clock),
            policy,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, DatabaseError> {
        let db = Arc::new(Database::from_config(config)?);
        Ok(Self::new(Arc::new(SqliteSchedulingStore::new(db))))
    }
}
