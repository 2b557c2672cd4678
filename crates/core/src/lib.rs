//! Domain logic for the account hub.
//!
//! Everything here is free of database access so it can be shared by the
//! repository layer, the orchestrator and tests.

pub mod cron;
pub mod error;
pub mod scripting;
pub mod types;
pub mod validation;
