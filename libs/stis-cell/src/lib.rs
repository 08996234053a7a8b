pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::{stis_booking_routes, stis_feedback_routes, stis_result_routes, stis_service_routes};
