//! Repository pattern implementation for data access layer
//!
//! The free functions are the synchronous query layer shared with
//! [`Session`](crate::db::session::Session); the repositories wrap them for
//! async callers holding a pooled [`DatabaseManager`].

use crate::core::error::Result;
use crate::db::manager::DatabaseManager;
use crate::db::models::{
    DrinkId, DrinkIngredient, DrinkIngredientId, Ingredient, IngredientId, MixedDrink,
};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row};
use std::sync::Arc;

/// Generic repository trait for the operations every entity supports
#[async_trait]
pub trait Repository<T, Id>: Send + Sync {
    /// Find an entity by its ID
    async fn find_by_id(&self, id: Id) -> Result<Option<T>>;

    /// Find all entities, oldest first
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Persist a new entity in its own transaction, returning it with its ID assigned
    async fn create(&self, entity: &T) -> Result<T>;

    /// Number of stored entities
    async fn count(&self) -> Result<i64>;
}

fn drink_from_row(row: &Row<'_>) -> rusqlite::Result<MixedDrink> {
    Ok(MixedDrink {
        drink_id: Some(row.get(0)?),
        drink_name: row.get(1)?,
    })
}

fn ingredient_from_row(row: &Row<'_>) -> rusqlite::Result<Ingredient> {
    Ok(Ingredient {
        ingredient_id: Some(row.get(0)?),
        ingredient_name: row.get(1)?,
    })
}

fn association_from_row(row: &Row<'_>) -> rusqlite::Result<DrinkIngredient> {
    Ok(DrinkIngredient {
        drinkingredient_id: Some(row.get(0)?),
        drink_id: row.get(1)?,
        ingredient_id: row.get(2)?,
    })
}

/// Ingredients of a drink, one entry per association row in insertion order
pub fn ingredients_of(conn: &Connection, drink_id: DrinkId) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare_cached(
        "SELECT i.ingredient_id, i.ingredient_name \
         FROM drink_ingredients di \
         JOIN ingredients i ON i.ingredient_id = di.ingredient_id \
         WHERE di.drink_id = ? \
         ORDER BY di.drinkingredient_id",
    )?;

    let ingredients = stmt
        .query_map([drink_id], ingredient_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ingredients)
}

/// Drinks containing an ingredient, one entry per association row in insertion order
pub fn drinks_of(conn: &Connection, ingredient_id: IngredientId) -> Result<Vec<MixedDrink>> {
    let mut stmt = conn.prepare_cached(
        "SELECT d.drink_id, d.drink_name \
         FROM drink_ingredients di \
         JOIN drinks d ON d.drink_id = di.drink_id \
         WHERE di.ingredient_id = ? \
         ORDER BY di.drinkingredient_id",
    )?;

    let drinks = stmt
        .query_map([ingredient_id], drink_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(drinks)
}

pub fn find_drink(conn: &Connection, id: DrinkId) -> Result<Option<MixedDrink>> {
    let drink = conn
        .query_row(
            "SELECT drink_id, drink_name FROM drinks WHERE drink_id = ?",
            [id],
            drink_from_row,
        )
        .optional()?;
    Ok(drink)
}

pub fn find_ingredient(conn: &Connection, id: IngredientId) -> Result<Option<Ingredient>> {
    let ingredient = conn
        .query_row(
            "SELECT ingredient_id, ingredient_name FROM ingredients WHERE ingredient_id = ?",
            [id],
            ingredient_from_row,
        )
        .optional()?;
    Ok(ingredient)
}

/// First drink with this exact name (names are not unique)
pub fn find_drink_by_name(conn: &Connection, name: &str) -> Result<Option<MixedDrink>> {
    let drink = conn
        .query_row(
            "SELECT drink_id, drink_name FROM drinks WHERE drink_name = ? ORDER BY drink_id LIMIT 1",
            [name],
            drink_from_row,
        )
        .optional()?;
    Ok(drink)
}

/// First ingredient with this exact name (names are not unique)
pub fn find_ingredient_by_name(conn: &Connection, name: &str) -> Result<Option<Ingredient>> {
    let ingredient = conn
        .query_row(
            "SELECT ingredient_id, ingredient_name FROM ingredients \
             WHERE ingredient_name = ? ORDER BY ingredient_id LIMIT 1",
            [name],
            ingredient_from_row,
        )
        .optional()?;
    Ok(ingredient)
}

pub fn all_drinks(conn: &Connection) -> Result<Vec<MixedDrink>> {
    let mut stmt = conn.prepare("SELECT drink_id, drink_name FROM drinks ORDER BY drink_id")?;
    let drinks = stmt
        .query_map([], drink_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(drinks)
}

pub fn all_ingredients(conn: &Connection) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT ingredient_id, ingredient_name FROM ingredients ORDER BY ingredient_id",
    )?;
    let ingredients = stmt
        .query_map([], ingredient_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ingredients)
}

pub fn all_associations(conn: &Connection) -> Result<Vec<DrinkIngredient>> {
    let mut stmt = conn.prepare(
        "SELECT drinkingredient_id, drink_id, ingredient_id FROM drink_ingredients \
         ORDER BY drinkingredient_id",
    )?;
    let links = stmt
        .query_map([], association_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

pub(crate) fn insert_drink(conn: &Connection, name: &str) -> Result<DrinkId> {
    conn.prepare_cached("INSERT INTO drinks (drink_name) VALUES (?)")?
        .execute([name])?;
    Ok(DrinkId(conn.last_insert_rowid()))
}

pub(crate) fn insert_ingredient(conn: &Connection, name: &str) -> Result<IngredientId> {
    conn.prepare_cached("INSERT INTO ingredients (ingredient_name) VALUES (?)")?
        .execute([name])?;
    Ok(IngredientId(conn.last_insert_rowid()))
}

pub(crate) fn insert_association(
    conn: &Connection,
    drink_id: DrinkId,
    ingredient_id: IngredientId,
) -> Result<DrinkIngredientId> {
    conn.prepare_cached("INSERT INTO drink_ingredients (drink_id, ingredient_id) VALUES (?, ?)")?
        .execute(rusqlite::params![drink_id, ingredient_id])?;
    Ok(DrinkIngredientId(conn.last_insert_rowid()))
}

fn count_rows(conn: &Connection, table: &'static str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Repository for MixedDrink entities
pub struct DrinkRepository {
    db: Arc<DatabaseManager>,
}

impl DrinkRepository {
    /// Create a new DrinkRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Ingredients of a drink ("components")
    pub async fn components(&self, drink_id: DrinkId) -> Result<Vec<Ingredient>> {
        self.db
            .execute(move |conn| ingredients_of(conn, drink_id))
            .await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<MixedDrink>> {
        let name = name.to_string();
        self.db
            .execute(move |conn| find_drink_by_name(conn, &name))
            .await
    }
}

#[async_trait]
impl Repository<MixedDrink, DrinkId> for DrinkRepository {
    async fn find_by_id(&self, id: DrinkId) -> Result<Option<MixedDrink>> {
        self.db.execute(move |conn| find_drink(conn, id)).await
    }

    async fn find_all(&self) -> Result<Vec<MixedDrink>> {
        self.db.execute(all_drinks).await
    }

    async fn create(&self, drink: &MixedDrink) -> Result<MixedDrink> {
        let mut drink = drink.clone();
        self.db
            .transaction(move |tx| {
                drink.drink_id = Some(insert_drink(tx, &drink.drink_name)?);
                Ok(drink)
            })
            .await
    }

    async fn count(&self) -> Result<i64> {
        self.db.execute(|conn| count_rows(conn, "drinks")).await
    }
}

/// Repository for Ingredient entities
pub struct IngredientRepository {
    db: Arc<DatabaseManager>,
}

impl IngredientRepository {
    /// Create a new IngredientRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Drinks containing an ingredient ("libations")
    pub async fn libations(&self, ingredient_id: IngredientId) -> Result<Vec<MixedDrink>> {
        self.db
            .execute(move |conn| drinks_of(conn, ingredient_id))
            .await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Ingredient>> {
        let name = name.to_string();
        self.db
            .execute(move |conn| find_ingredient_by_name(conn, &name))
            .await
    }
}

#[async_trait]
impl Repository<Ingredient, IngredientId> for IngredientRepository {
    async fn find_by_id(&self, id: IngredientId) -> Result<Option<Ingredient>> {
        self.db.execute(move |conn| find_ingredient(conn, id)).await
    }

    async fn find_all(&self) -> Result<Vec<Ingredient>> {
        self.db.execute(all_ingredients).await
    }

    async fn create(&self, ingredient: &Ingredient) -> Result<Ingredient> {
        let mut ingredient = ingredient.clone();
        self.db
            .transaction(move |tx| {
                ingredient.ingredient_id = Some(insert_ingredient(tx, &ingredient.ingredient_name)?);
                Ok(ingredient)
            })
            .await
    }

    async fn count(&self) -> Result<i64> {
        self.db.execute(|conn| count_rows(conn, "ingredients")).await
    }
}

/// Repository for the drink/ingredient association table
pub struct DrinkIngredientRepository {
    db: Arc<DatabaseManager>,
}

impl DrinkIngredientRepository {
    /// Create a new DrinkIngredientRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Record one association between two persisted entities
    pub async fn link(
        &self,
        drink_id: DrinkId,
        ingredient_id: IngredientId,
    ) -> Result<DrinkIngredient> {
        self.create(&DrinkIngredient::new(drink_id, ingredient_id))
            .await
    }
}

#[async_trait]
impl Repository<DrinkIngredient, DrinkIngredientId> for DrinkIngredientRepository {
    async fn find_by_id(&self, id: DrinkIngredientId) -> Result<Option<DrinkIngredient>> {
        self.db
            .execute(move |conn| {
                let link = conn
                    .query_row(
                        "SELECT drinkingredient_id, drink_id, ingredient_id \
                         FROM drink_ingredients WHERE drinkingredient_id = ?",
                        [id],
                        association_from_row,
                    )
                    .optional()?;
                Ok(link)
            })
            .await
    }

    async fn find_all(&self) -> Result<Vec<DrinkIngredient>> {
        self.db.execute(all_associations).await
    }

    async fn create(&self, link: &DrinkIngredient) -> Result<DrinkIngredient> {
        let mut link = link.clone();
        self.db
            .transaction(move |tx| {
                link.drinkingredient_id =
                    Some(insert_association(tx, link.drink_id, link.ingredient_id)?);
                Ok(link)
            })
            .await
    }

    async fn count(&self) -> Result<i64> {
        self.db
            .execute(|conn| count_rows(conn, "drink_ingredients"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DrinkError;

    fn repos() -> (DrinkRepository, IngredientRepository, DrinkIngredientRepository) {
        let db = Arc::new(DatabaseManager::new_in_memory().unwrap());
        (
            DrinkRepository::new(db.clone()),
            IngredientRepository::new(db.clone()),
            DrinkIngredientRepository::new(db),
        )
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let (drinks, ingredients, _) = repos();

        let marge = drinks.create(&MixedDrink::new("margarita")).await.unwrap();
        assert_eq!(marge.drink_id, Some(DrinkId(1)));

        let teq = ingredients.create(&Ingredient::new("tequila")).await.unwrap();
        assert_eq!(teq.ingredient_id, Some(IngredientId(1)));

        assert_eq!(drinks.find_by_id(DrinkId(1)).await.unwrap(), Some(marge));
        assert_eq!(ingredients.find_by_name("tequila").await.unwrap(), Some(teq));
        assert_eq!(drinks.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_link_visible_from_both_sides() {
        let (drinks, ingredients, links) = repos();
        let marge = drinks.create(&MixedDrink::new("margarita")).await.unwrap();
        let teq = ingredients.create(&Ingredient::new("tequila")).await.unwrap();
        let (drink_id, ingredient_id) = (marge.drink_id.unwrap(), teq.ingredient_id.unwrap());

        let link = links.link(drink_id, ingredient_id).await.unwrap();
        assert_eq!(link.drinkingredient_id, Some(DrinkIngredientId(1)));

        assert_eq!(drinks.components(drink_id).await.unwrap(), vec![teq]);
        assert_eq!(ingredients.libations(ingredient_id).await.unwrap(), vec![marge]);
    }

    #[tokio::test]
    async fn test_duplicate_links_preserved() {
        let (drinks, ingredients, links) = repos();
        let marge = drinks.create(&MixedDrink::new("margarita")).await.unwrap();
        let salt = ingredients.create(&Ingredient::new("salt")).await.unwrap();
        let (drink_id, ingredient_id) = (marge.drink_id.unwrap(), salt.ingredient_id.unwrap());

        links.link(drink_id, ingredient_id).await.unwrap();
        links.link(drink_id, ingredient_id).await.unwrap();

        assert_eq!(links.count().await.unwrap(), 2);
        assert_eq!(drinks.components(drink_id).await.unwrap(), vec![salt.clone(), salt]);
        assert_eq!(ingredients.libations(ingredient_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_link_to_missing_entity_rejected() {
        let (drinks, _, links) = repos();
        let marge = drinks.create(&MixedDrink::new("margarita")).await.unwrap();

        let err = links
            .link(marge.drink_id.unwrap(), IngredientId(99))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(links.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_over_length_name_rejected() {
        let (drinks, _, _) = repos();
        let err = drinks
            .create(&MixedDrink::new("a".repeat(33)))
            .await
            .unwrap_err();
        assert!(matches!(err, DrinkError::DatabaseError(_)));
        assert_eq!(drinks.count().await.unwrap(), 0);
    }

    #[test]
    fn test_query_layer_on_plain_connection() {
        let db = DatabaseManager::new_in_memory().unwrap();
        let conn = db.get_connection().unwrap();

        let drink_id = insert_drink(&conn, "tequila sunrise").unwrap();
        let teq = insert_ingredient(&conn, "tequila").unwrap();
        let oj = insert_ingredient(&conn, "orange juice").unwrap();
        insert_association(&conn, drink_id, teq).unwrap();
        insert_association(&conn, drink_id, oj).unwrap();

        let names: Vec<String> = ingredients_of(&conn, drink_id)
            .unwrap()
            .into_iter()
            .map(|i| i.ingredient_name)
            .collect();
        assert_eq!(names, vec!["tequila", "orange juice"]);
        assert!(drinks_of(&conn, IngredientId(42)).unwrap().is_empty());
        assert_eq!(all_associations(&conn).unwrap().len(), 2);
        assert_eq!(
            find_drink_by_name(&conn, "tequila sunrise").unwrap().unwrap().drink_id,
            Some(drink_id)
        );
        assert!(find_ingredient(&conn, IngredientId(9)).unwrap().is_none());
    }
}
