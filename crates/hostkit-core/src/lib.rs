//! # hostkit-core
//!
//! Core crate for hostkit. Contains the unified error system, configuration
//! schemas, the option map handed to plugins, and the shared task priority
//! constants.
//!
//! This crate has **no** internal dependencies on other hostkit crates.

pub mod config;
pub mod error;
pub mod guard;
pub mod options;
pub mod priority;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use options::{OptionSpec, Options, OptionsSchema};
pub use result::AppResult;
