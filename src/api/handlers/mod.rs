pub mod bookings;
pub mod fleet;
pub mod health;
pub mod ledgers;
pub mod trip_sheets;
