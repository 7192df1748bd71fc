pub mod api;
pub mod models;
pub mod schedule;
pub mod validation;
