pub mod config;
pub mod deadline;
pub mod deps;
pub mod schedule;
