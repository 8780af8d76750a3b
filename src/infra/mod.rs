//! Infrastructure - configuration
//!
//! - `config` - Application configuration (TOML loading, defaults, overrides)

pub mod config;

pub use config::Config;
