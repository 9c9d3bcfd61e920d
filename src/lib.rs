// Top-level modules (single files)
pub mod config;
pub mod dataset;
pub mod drivers;
pub mod duplicates;
pub mod entity;
pub mod error;
pub mod format;
pub mod formats;
pub mod gateway;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod status;
pub mod status_cache;
pub mod validation_helper;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod commands;
