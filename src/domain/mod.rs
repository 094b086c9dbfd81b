mod availability;
mod booking;
mod cash_entry;
mod clock;
mod ledger;
mod money;
mod opening_balance;
mod service_log;
mod trip;
mod trip_sheet;
mod user;
mod vehicle;

pub use availability::*;
pub use booking::*;
pub use cash_entry::*;
pub use clock::*;
pub use ledger::*;
pub use money::*;
pub use opening_balance::*;
pub use service_log::*;
pub use trip::*;
pub use trip_sheet::*;
pub use user::*;
pub use vehicle::*;
