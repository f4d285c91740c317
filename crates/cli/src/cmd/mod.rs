//! CLI command implementations

pub mod config;
pub mod interrupt;
pub mod pause;
pub mod reset;
pub mod run;
pub mod status;
