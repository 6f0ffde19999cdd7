//! Mixed drinks store
//!
//! A small relational model of drinks, ingredients and the association
//! table between them, persisted in SQLite through an explicit unit of work.

pub mod core;
pub mod db;

// Re-export commonly used types
pub use crate::core::{Config, DrinkError, DrinkService, Result};
pub use db::{DatabaseManager, Ingredient, MixedDrink, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
