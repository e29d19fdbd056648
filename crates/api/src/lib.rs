#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Plansync API Library
//!
//! HTTP surface for Plansync: session-protected checkout and views,
//! signed payment and identity webhooks, and the wiring that binds them.

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
