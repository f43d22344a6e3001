pub mod availability;
pub mod booking;
pub mod cascade;
pub mod records;
