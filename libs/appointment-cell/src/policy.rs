// libs/appointment-cell/src/policy.rs
use tracing::debug;

use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::extractor::CallerRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingAction {
    BookAppointment,
    ListClinicianAppointments,
    ListAllAppointments,
}

impl SchedulingAction {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            SchedulingAction::BookAppointment => &[Role::Patient, Role::Admin],
            SchedulingAction::ListClinicianAppointments => &[Role::Clinician, Role::Admin],
            SchedulingAction::ListAllAppointments => &[Role::Admin],
        }
    }

    /// e.g. "Patient or Admin role required"
    pub fn requirement(&self) -> String {
        let names: Vec<&str> = self.allowed_roles().iter().map(Role::title).collect();
        format!("{} role required", names.join(" or "))
    }
}

/// Decides whether a caller may perform an action.
pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, caller: &CallerRole, action: SchedulingAction) -> Result<(), AppError>;
}

/// Trusts the role header verbatim. A missing or unrecognized role is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderRolePolicy;

impl AccessPolicy for HeaderRolePolicy {
    fn authorize(&self, caller: &CallerRole, action: SchedulingAction) -> Result<(), AppError> {
        match caller.role {
            Some(role) if action.allowed_roles().contains(&role) => Ok(()),
            _ => {
                debug!("Refusing {:?} for role {:?}", action, caller.raw);
                Err(AppError::Forbidden(action.requirement()))
            }
        }
    }
}
