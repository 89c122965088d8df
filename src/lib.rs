pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::UpdaterConfig;
pub use errors::{Result, UpdaterError};
pub use models::{Manifest, ManifestFile, UpdaterState, UpdaterStatus};
pub use services::Updater;
