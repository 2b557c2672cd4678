//! Running category check scripts out of process.
//!
//! Nothing here touches the database; callers render the script, hand a
//! path to a [`executor::ScriptExecutor`] and interpret the output.

pub mod executor;
pub mod python;
pub mod subprocess;
