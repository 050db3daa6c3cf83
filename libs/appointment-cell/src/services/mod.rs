pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notify;
