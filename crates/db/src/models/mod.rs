pub mod account;
pub mod category;
pub mod validation_run;
