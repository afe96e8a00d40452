pub mod booking;
pub mod clock;
pub mod query;
pub mod validation;

pub use booking::AppointmentBookingService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use query::AppointmentQueryService;
