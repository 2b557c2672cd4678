//! Repository layer: one unit struct per table with async query methods.

pub mod account_repo;
pub mod category_repo;
pub mod validation_run_repo;

pub use account_repo::AccountRepo;
pub use category_repo::CategoryRepo;
pub use validation_run_repo::ValidationRunRepo;
