//! Core functionality shared by the library and the binary
//!
//! This module contains:
//! - Configuration management
//! - Error types
//! - Logging setup
//! - Services behind the command line

pub mod config;
pub mod error;
pub mod logging;
pub mod services;

pub use config::{CliArgs, Command, Config};
pub use error::{DrinkError, Result};
pub use logging::Logger;
pub use services::{DrinkService, Recipe, Usage};
