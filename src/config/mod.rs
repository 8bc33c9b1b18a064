//! Run configuration: the options of one sync run and the settings file they come from.

pub mod error;
pub mod settings;
pub mod sync_config;
