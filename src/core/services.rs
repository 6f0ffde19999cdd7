//! Business logic services
//!
//! Coordinates the repositories and units of work behind the command line.

use crate::core::error::{DrinkError, Result};
use crate::db::manager::DatabaseManager;
use crate::db::models::{DrinkId, DrinkIngredient, Ingredient, IngredientId, MixedDrink};
use crate::db::repository::{
    DrinkIngredientRepository, DrinkRepository, IngredientRepository, Repository,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// A drink together with its ingredients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub drink: MixedDrink,
    pub components: Vec<Ingredient>,
}

/// An ingredient together with the drinks it goes into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub ingredient: Ingredient,
    pub libations: Vec<MixedDrink>,
}

/// Drink service for the mixed drinks business logic
pub struct DrinkService {
    db: Arc<DatabaseManager>,
    drinks: DrinkRepository,
    ingredients: IngredientRepository,
    links: DrinkIngredientRepository,
}

impl DrinkService {
    /// Create a new DrinkService
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self {
            drinks: DrinkRepository::new(db.clone()),
            ingredients: IngredientRepository::new(db.clone()),
            links: DrinkIngredientRepository::new(db.clone()),
            db,
        }
    }

    /// Create a drink and its ingredients in one unit of work.
    ///
    /// Ingredients are matched by name; names nobody has used yet become new
    /// ingredients stored along with the drink.
    pub async fn mix_drink(&self, name: &str, ingredient_names: Vec<String>) -> Result<Recipe> {
        validate_name("Drink", name)?;
        for ingredient in &ingredient_names {
            validate_name("Ingredient", ingredient)?;
        }

        let name = name.to_string();
        let recipe = self
            .db
            .unit_of_work(move |session| {
                let drink = session.add_drink(MixedDrink::new(name));
                for ingredient in ingredient_names {
                    match session.ingredient_named(&ingredient)? {
                        Some(key) => session.attach(drink, key)?,
                        None => {
                            session.append_component(drink, Ingredient::new(ingredient))?;
                        }
                    }
                }
                session.commit()?;

                Ok(Recipe {
                    drink: session
                        .drink(drink)
                        .cloned()
                        .ok_or_else(|| DrinkError::NotFound("drink vanished from session".into()))?,
                    components: session.components(drink)?,
                })
            })
            .await?;

        info!(drink = %recipe.drink, components = recipe.components.len(), "Drink mixed");
        Ok(recipe)
    }

    /// Create a single ingredient
    pub async fn add_ingredient(&self, name: &str) -> Result<Ingredient> {
        validate_name("Ingredient", name)?;
        let ingredient = self.ingredients.create(&Ingredient::new(name)).await?;
        info!(ingredient = %ingredient, "Ingredient added");
        Ok(ingredient)
    }

    /// Record that a drink contains an ingredient. Repeating the call records
    /// the pair again.
    pub async fn attach(
        &self,
        drink_id: DrinkId,
        ingredient_id: IngredientId,
    ) -> Result<DrinkIngredient> {
        if self.drinks.find_by_id(drink_id).await?.is_none() {
            return Err(DrinkError::NotFound(format!("drink {}", drink_id)));
        }
        if self.ingredients.find_by_id(ingredient_id).await?.is_none() {
            return Err(DrinkError::NotFound(format!("ingredient {}", ingredient_id)));
        }

        let link = self.links.link(drink_id, ingredient_id).await?;
        info!(link = %link, "Ingredient attached");
        Ok(link)
    }

    /// A drink and its ingredients
    pub async fn recipe(&self, drink_id: DrinkId) -> Result<Recipe> {
        let drink = self
            .drinks
            .find_by_id(drink_id)
            .await?
            .ok_or_else(|| DrinkError::NotFound(format!("drink {}", drink_id)))?;
        let components = self.drinks.components(drink_id).await?;
        Ok(Recipe { drink, components })
    }

    /// An ingredient and the drinks containing it
    pub async fn usage(&self, ingredient_id: IngredientId) -> Result<Usage> {
        let ingredient = self
            .ingredients
            .find_by_id(ingredient_id)
            .await?
            .ok_or_else(|| DrinkError::NotFound(format!("ingredient {}", ingredient_id)))?;
        let libations = self.ingredients.libations(ingredient_id).await?;
        Ok(Usage {
            ingredient,
            libations,
        })
    }

    /// Every drink with its ingredients, oldest drink first
    pub async fn menu(&self) -> Result<Vec<Recipe>> {
        let drinks = self.drinks.find_all().await?;
        let mut menu = Vec::with_capacity(drinks.len());
        for drink in drinks {
            let components = match drink.drink_id {
                Some(id) => self.drinks.components(id).await?,
                None => Vec::new(),
            };
            menu.push(Recipe { drink, components });
        }
        Ok(menu)
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DrinkError::InvalidRequest(format!(
            "{} name cannot be empty",
            kind
        )));
    }
    Ok(())
}

/// Replay the margarita and tequila sunrise walk-through against a fresh
/// schema, returning one line per step
pub async fn demo(db: &DatabaseManager) -> Result<Vec<String>> {
    db.reset()?;

    db.unit_of_work(|session| {
        let mut out = Vec::new();

        let marge = session.add_drink(MixedDrink::new("margarita"));
        session.commit()?;
        out.push(drink_line(session.drink(marge)));

        let teq = session.add_ingredient(Ingredient::new("tequila"));
        out.push(ingredient_line(session.ingredient(teq)));
        session.commit()?;
        out.push(ingredient_line(session.ingredient(teq)));

        let (marge_id, teq_id) = match (
            session.drink(marge).and_then(|d| d.drink_id),
            session.ingredient(teq).and_then(|i| i.ingredient_id),
        ) {
            (Some(d), Some(i)) => (d, i),
            _ => return Err(DrinkError::NotFound("committed ids".into())),
        };
        session.add_association(DrinkIngredient::new(marge_id, teq_id));
        session.commit()?;
        out.push(format!("margarita.components = {}", listing(&session.components(marge)?)));

        let limey = session.append_component(marge, Ingredient::new("lime juice"))?;
        session.commit()?;
        out.push(format!("tequila.libations = {}", listing(&session.libations(teq)?)));
        out.push(format!("lime juice.libations = {}", listing(&session.libations(limey)?)));

        let sunny = session.append_libation(teq, MixedDrink::new("tequila sunrise"))?;
        let oj = session.append_component(sunny, Ingredient::new("orange juice"))?;
        let cran = session.add_ingredient(Ingredient::new("cranberry juice"));
        session.attach(sunny, cran)?;
        session.commit()?;

        out.push(format!("tequila sunrise.components = {}", listing(&session.components(sunny)?)));
        out.push(format!("tequila.libations = {}", listing(&session.libations(teq)?)));
        out.push(format!("orange juice.libations = {}", listing(&session.libations(oj)?)));

        Ok(out)
    })
    .await
}

fn drink_line(drink: Option<&MixedDrink>) -> String {
    drink.map(ToString::to_string).unwrap_or_default()
}

fn ingredient_line(ingredient: Option<&Ingredient>) -> String {
    ingredient.map(ToString::to_string).unwrap_or_default()
}

fn listing<T: std::fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (DrinkService, Arc<DatabaseManager>) {
        let db = Arc::new(DatabaseManager::new_in_memory().unwrap());
        (DrinkService::new(db.clone()), db)
    }

    #[tokio::test]
    async fn test_mix_drink_reuses_known_ingredients() {
        let (service, _db) = service();
        let tequila = service.add_ingredient("tequila").await.unwrap();

        let recipe = service
            .mix_drink("margarita", vec!["tequila".into(), "lime juice".into()])
            .await
            .unwrap();
        assert_eq!(recipe.drink.drink_id, Some(DrinkId(1)));
        assert_eq!(recipe.components[0], tequila);
        assert_eq!(recipe.components[1].ingredient_name, "lime juice");
        assert_eq!(recipe.components[1].ingredient_id, Some(IngredientId(2)));

        let usage = service.usage(IngredientId(1)).await.unwrap();
        assert_eq!(usage.libations, vec![recipe.drink]);
    }

    #[tokio::test]
    async fn test_mix_drink_rejects_blank_names() {
        let (service, _db) = service();
        assert!(matches!(
            service.mix_drink("  ", vec![]).await,
            Err(DrinkError::InvalidRequest(_))
        ));
        assert!(service
            .mix_drink("margarita", vec!["".into()])
            .await
            .is_err());
        assert!(service.menu().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_twice_keeps_both() {
        let (service, _db) = service();
        let recipe = service.mix_drink("salty dog", vec![]).await.unwrap();
        let salt = service.add_ingredient("salt").await.unwrap();
        let drink_id = recipe.drink.drink_id.unwrap();
        let salt_id = salt.ingredient_id.unwrap();

        let first = service.attach(drink_id, salt_id).await.unwrap();
        let second = service.attach(drink_id, salt_id).await.unwrap();
        assert_ne!(first.drinkingredient_id, second.drinkingredient_id);
        assert_eq!(service.recipe(drink_id).await.unwrap().components.len(), 2);
    }

    #[tokio::test]
    async fn test_attach_unknown_ids() {
        let (service, _db) = service();
        assert!(matches!(
            service.attach(DrinkId(1), IngredientId(1)).await,
            Err(DrinkError::NotFound(_))
        ));
        assert!(matches!(service.recipe(DrinkId(3)).await, Err(DrinkError::NotFound(_))));
        assert!(matches!(
            service.usage(IngredientId(3)).await,
            Err(DrinkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_menu_lists_every_drink() {
        let (service, _db) = service();
        service
            .mix_drink("margarita", vec!["tequila".into()])
            .await
            .unwrap();
        service
            .mix_drink("tequila sunrise", vec!["tequila".into(), "orange juice".into()])
            .await
            .unwrap();

        let menu = service.menu().await.unwrap();
        assert_eq!(menu.len(), 2);
        assert_eq!(menu[1].components.len(), 2);
        assert_eq!(menu[0].components[0], menu[1].components[0]);
    }

    #[tokio::test]
    async fn test_demo_transcript() {
        let (_service, db) = service();
        let lines = demo(&db).await.unwrap();

        assert_eq!(lines[0], "<MixedDrink drink_id=1 drink_name=margarita>");
        assert_eq!(lines[1], "<Ingredient ingredient_id=None ingredient_name=tequila>");
        assert_eq!(lines[2], "<Ingredient ingredient_id=1 ingredient_name=tequila>");
        assert_eq!(
            lines[3],
            "margarita.components = [<Ingredient ingredient_id=1 ingredient_name=tequila>]"
        );
        assert_eq!(
            lines[7],
            "tequila.libations = [<MixedDrink drink_id=1 drink_name=margarita>, \
             <MixedDrink drink_id=2 drink_name=tequila sunrise>]"
        );
        assert_eq!(
            lines[8],
            "orange juice.libations = [<MixedDrink drink_id=2 drink_name=tequila sunrise>]"
        );

        // Running it again starts over from identifier 1
        let again = demo(&db).await.unwrap();
        assert_eq!(again, lines);
    }
}
