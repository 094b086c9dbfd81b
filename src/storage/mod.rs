mod bookings;
mod fleet;
mod ledgers;
mod repository;

pub use bookings::BookingFilter;
pub use fleet::TripSheetFilter;
pub use ledgers::MonthlySummaryRow;
pub use repository::*;

/// Users, vehicles and ledger sequence counters
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Trips, opening balances and the cash book
pub const MIGRATION_002_LEDGERS: &str = include_str!("migrations/002_ledgers.sql");

/// Bookings, service logs and trip sheets
pub const MIGRATION_003_BOOKINGS_AND_FLEET: &str =
    include_str!("migrations/003_bookings_and_fleet.sql");
