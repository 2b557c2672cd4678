//! HTTP service and validation orchestrator for account categories.
//!
//! The orchestrator lives in [`validation`]; everything under [`routes`]
//! and [`handlers`] is thin glue over it and the repositories.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
