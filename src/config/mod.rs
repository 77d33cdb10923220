//! Configuration loading and validation.
//!
//! - [`settings`] - environment-variable driven [`settings::load_settings`]
//! - [`rate_limits`] - loads per-model rules from an external JSON file
//! - [`validation`] - comprehensive startup validation with warnings

pub mod rate_limits;
pub mod settings;
pub mod validation;
