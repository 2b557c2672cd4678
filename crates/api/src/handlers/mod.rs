pub mod accounts;
pub mod categories;
pub mod validation;
