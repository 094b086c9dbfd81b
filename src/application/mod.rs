// Application layer: use cases, authorization and transactions.
// Both the CLI and the HTTP API go through FleetService.

mod bookings;
pub mod error;
mod fleet;
mod locks;
mod service;

pub use error::*;
pub use fleet::NewUser;
pub use locks::{LockKey, OwnerLocks};
pub use service::*;
