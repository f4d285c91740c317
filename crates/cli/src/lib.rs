//! Support code for the `versions-cleaner` binary

pub mod logging;
pub mod overrides;
pub mod settings;
