#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Plansync Shared Types and Store Access
//!
//! This crate contains the mirrored row types, the row-level store interface
//! and its Postgres and in-memory implementations.

pub mod db;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod types;

pub use db::*;
pub use error::*;
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use store::BillingStore;
pub use types::*;
