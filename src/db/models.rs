//! Database models
//!
//! Data structures representing database tables

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest name the schema accepts for a drink or an ingredient
pub const MAX_NAME_LEN: usize = 32;

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl rusqlite::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                rusqlite::ToSql::to_sql(&self.0)
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                <i64 as rusqlite::types::FromSql>::column_result(value).map($name)
            }
        }
    };
}

surrogate_id!(
    /// Primary key of a row in `drinks`
    DrinkId
);
surrogate_id!(
    /// Primary key of a row in `ingredients`
    IngredientId
);
surrogate_id!(
    /// Primary key of a row in `drink_ingredients`
    DrinkIngredientId
);

/// Writes an optional id the way the entity representations expect (`None` when unset)
struct OptionalId<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OptionalId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(id) => write!(f, "{}", id),
            None => f.write_str("None"),
        }
    }
}

/// Ingredient record in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub ingredient_id: Option<IngredientId>,
    pub ingredient_name: String,
}

impl Ingredient {
    /// A new, not yet persisted ingredient
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            ingredient_id: None,
            ingredient_name: name.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.ingredient_id.is_some()
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Ingredient ingredient_id={} ingredient_name={}>",
            OptionalId(self.ingredient_id),
            self.ingredient_name
        )
    }
}

/// Drink record in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixedDrink {
    pub drink_id: Option<DrinkId>,
    pub drink_name: String,
}

impl MixedDrink {
    /// A new, not yet persisted drink
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            drink_id: None,
            drink_name: name.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.drink_id.is_some()
    }
}

impl fmt::Display for MixedDrink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<MixedDrink drink_id={} drink_name={}>",
            OptionalId(self.drink_id),
            self.drink_name
        )
    }
}

/// Association row between a drink and one of its ingredients.
///
/// Carries no data of its own; the same pair may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrinkIngredient {
    pub drinkingredient_id: Option<DrinkIngredientId>,
    pub drink_id: DrinkId,
    pub ingredient_id: IngredientId,
}

impl DrinkIngredient {
    pub fn new(drink_id: DrinkId, ingredient_id: IngredientId) -> Self {
        Self {
            drinkingredient_id: None,
            drink_id,
            ingredient_id,
        }
    }
}

impl fmt::Display for DrinkIngredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<DrinkIngredient drinkingredient_id={} drink_id={} ingredient_id={}>",
            OptionalId(self.drinkingredient_id),
            self.drink_id,
            self.ingredient_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpersisted_display() {
        let teq = Ingredient::new("tequila");
        assert_eq!(
            teq.to_string(),
            "<Ingredient ingredient_id=None ingredient_name=tequila>"
        );
        assert!(!teq.is_persisted());
    }

    #[test]
    fn test_persisted_display() {
        let marge = MixedDrink {
            drink_id: Some(DrinkId(1)),
            drink_name: "margarita".to_string(),
        };
        assert_eq!(marge.to_string(), "<MixedDrink drink_id=1 drink_name=margarita>");

        let link = DrinkIngredient::new(DrinkId(1), IngredientId(2));
        assert_eq!(
            link.to_string(),
            "<DrinkIngredient drinkingredient_id=None drink_id=1 ingredient_id=2>"
        );
    }

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let marge = MixedDrink {
            drink_id: Some(DrinkId(7)),
            drink_name: "margarita".to_string(),
        };
        let json = serde_json::to_value(&marge).unwrap();
        assert_eq!(json["drink_id"], 7);

        let fresh = serde_json::to_value(MixedDrink::new("mojito")).unwrap();
        assert!(fresh["drink_id"].is_null());
    }
}
