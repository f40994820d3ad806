//! Digitizer configuration loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `DIGITIZER_CONFIG` environment variable (path to TOML file)
//! 2. `digitizer.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded [`DigitizerConfig`] is passed explicitly to
//! [`crate::service::PlateService`]; there is no process-wide instance.
//!
//! ```ignore
//! let config = DigitizerConfig::load();
//! config.validate()?;
//! let service = PlateService::from_config(config)?;
//! ```

mod digitizer_config;
pub mod defaults;
pub mod validation;

pub use digitizer_config::*;
