//! Database module
//!
//! This module provides database management functionality including:
//! - Database connection pool management
//! - The unit of work (`Session`)
//! - Repository pattern implementations
//! - Schema migrations
//! - Data models

pub mod manager;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod session;

pub use manager::{DatabaseLocation, DatabaseManager};
pub use models::{DrinkId, DrinkIngredient, DrinkIngredientId, Ingredient, IngredientId, MixedDrink};
pub use repository::{
    drinks_of, ingredients_of, DrinkIngredientRepository, DrinkRepository, IngredientRepository,
    Repository,
};
pub use session::{CommitSummary, DrinkKey, IngredientKey, Session};
