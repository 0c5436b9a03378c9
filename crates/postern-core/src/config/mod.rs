//! Configuration loading.
//!
//! The configuration is a TOML file with `[general]`, `[commands]` and one
//! `[account.<name>]` table per sending address.

mod model;
mod validation;

pub use model::{
    Account, CommandLine, Commands, Config, DEFAULT_DATABASE, DEFAULT_DELIVERY_TIMEOUT_SECS,
    DEFAULT_EDITOR, General,
};
pub use validation::{ValidationError, ValidationResult, validate_account, validate_config};
