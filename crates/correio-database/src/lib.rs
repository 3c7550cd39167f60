//! Database connectivity for the Correio service.

pub use sea_orm;

mod connection;
pub use connection::{establish_connection, DbConnection};

// Shared Postgres test harness, used by the other crates' tests.
pub mod test_utils;
