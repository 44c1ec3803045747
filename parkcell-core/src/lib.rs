//! # parkcell-core
//!
//! Reservation lifecycle and cell-state reconciliation engine for parking
//! lots. Validates reservation windows against vehicle, customer and cell
//! overlap rules, moves reservations OPEN -> CLOSED as time passes, and
//! keeps each cell's FREE/OCCUPIED status in line with the reservations
//! covering now.

pub mod cells;
pub mod client;
pub mod clock;
pub mod conflict;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod reconcile;
pub mod reservations;
pub mod scheduler;
pub mod types;

pub use error::{ParkingError, Result};

#[cfg(test)]
mod test_support;

#[cfg(test)]
#[path = "infrastructure_test.rs"]
mod infrastructure_test;
