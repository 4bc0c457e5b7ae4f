//! Core abstractions shared by the engine and the drivers.
//!
//! - [`traits`]: connection, statement and result-set traits
//! - [`value`]: SQL value representation and parameter maps
//!
//! Driver modules (`drivers/sqlite`) implement the traits; everything in
//! `sql`, `transfer` and `pipeline` is written against them only.

pub mod traits;
pub mod value;

pub use traits::{Connection, DriverError, DriverResult, Rows, Statement};
pub use value::{Parameters, SqlNullType, SqlValue};
