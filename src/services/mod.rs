pub mod reservation;

pub use reservation::{BookingRequest, ReservationService};
