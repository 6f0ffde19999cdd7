//! Unit of work
//!
//! A [`Session`] borrows one connection and collects pending changes: new
//! drinks and ingredients, explicit association records, and links between
//! entities it tracks. Nothing touches the database until [`Session::commit`],
//! which writes the whole pending set in one transaction and only then hands
//! out identifiers.
//!
//! Entities are addressed through copyable keys. A key stays valid for the
//! life of the session, so the same [`DrinkKey`] reads `drink_id=None` before
//! the commit and the assigned id afterwards. Keys carry the id of the session
//! that issued them; any other session refuses them.

use crate::core::error::{DrinkError, Result};
use crate::db::models::{DrinkId, DrinkIngredient, Ingredient, IngredientId, MixedDrink};
use crate::db::repository;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a drink tracked by a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrinkKey {
    session: u64,
    index: usize,
}

/// Handle to an ingredient tracked by a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IngredientKey {
    session: u64,
    index: usize,
}

#[derive(Debug, Clone)]
enum PendingLink {
    Tracked(DrinkKey, IngredientKey),
    Record(DrinkIngredient),
}

/// What a commit wrote
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub drinks: Vec<MixedDrink>,
    pub ingredients: Vec<Ingredient>,
    pub associations: Vec<DrinkIngredient>,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.drinks.is_empty() && self.ingredients.is_empty() && self.associations.is_empty()
    }
}

/// Unit of work over a single connection
pub struct Session<'c> {
    id: u64,
    conn: &'c mut Connection,
    // Slots are never removed so keys stay stable; rollback empties the
    // slots of entities that never got an id.
    drinks: Vec<Option<MixedDrink>>,
    ingredients: Vec<Option<Ingredient>>,
    drink_keys: HashMap<DrinkId, DrinkKey>,
    ingredient_keys: HashMap<IngredientId, IngredientKey>,
    links: Vec<PendingLink>,
}

impl<'c> Session<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            conn,
            drinks: Vec::new(),
            ingredients: Vec::new(),
            drink_keys: HashMap::new(),
            ingredient_keys: HashMap::new(),
            links: Vec::new(),
        }
    }

    /// Register a drink. A drink without an id joins the pending set; one
    /// that already has an id is tracked as persisted.
    pub fn add_drink(&mut self, drink: MixedDrink) -> DrinkKey {
        if let Some(id) = drink.drink_id {
            if let Some(key) = self.drink_keys.get(&id) {
                return *key;
            }
            let key = self.drink_key(self.drinks.len());
            self.drink_keys.insert(id, key);
            self.drinks.push(Some(drink));
            return key;
        }

        let key = self.drink_key(self.drinks.len());
        self.drinks.push(Some(drink));
        key
    }

    /// Register an ingredient. An ingredient without an id joins the
    /// pending set; one that already has an id is tracked as persisted.
    pub fn add_ingredient(&mut self, ingredient: Ingredient) -> IngredientKey {
        if let Some(id) = ingredient.ingredient_id {
            if let Some(key) = self.ingredient_keys.get(&id) {
                return *key;
            }
            let key = self.ingredient_key(self.ingredients.len());
            self.ingredient_keys.insert(id, key);
            self.ingredients.push(Some(ingredient));
            return key;
        }

        let key = self.ingredient_key(self.ingredients.len());
        self.ingredients.push(Some(ingredient));
        key
    }

    /// Track a stored drink, or `None` when no drink has this id
    pub fn load_drink(&mut self, id: DrinkId) -> Result<Option<DrinkKey>> {
        if let Some(key) = self.drink_keys.get(&id) {
            return Ok(Some(*key));
        }
        Ok(repository::find_drink(&*self.conn, id)?.map(|drink| self.add_drink(drink)))
    }

    /// Track a stored ingredient, or `None` when no ingredient has this id
    pub fn load_ingredient(&mut self, id: IngredientId) -> Result<Option<IngredientKey>> {
        if let Some(key) = self.ingredient_keys.get(&id) {
            return Ok(Some(*key));
        }
        Ok(repository::find_ingredient(&*self.conn, id)?.map(|ingredient| self.add_ingredient(ingredient)))
    }

    /// Track the first ingredient with this name, looking at the session
    /// before the database
    pub fn ingredient_named(&mut self, name: &str) -> Result<Option<IngredientKey>> {
        let tracked = self
            .ingredients
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|i| i.ingredient_name == name));
        if let Some(index) = tracked {
            return Ok(Some(self.ingredient_key(index)));
        }
        Ok(repository::find_ingredient_by_name(&*self.conn, name)?
            .map(|ingredient| self.add_ingredient(ingredient)))
    }

    /// `None` for a key from another session or one forgotten by a rollback
    pub fn drink(&self, key: DrinkKey) -> Option<&MixedDrink> {
        if key.session != self.id {
            return None;
        }
        self.drinks.get(key.index).and_then(Option::as_ref)
    }

    pub fn ingredient(&self, key: IngredientKey) -> Option<&Ingredient> {
        if key.session != self.id {
            return None;
        }
        self.ingredients.get(key.index).and_then(Option::as_ref)
    }

    /// Queue an explicit association record between two stored entities.
    ///
    /// The ids are checked by the database's foreign keys at commit.
    pub fn add_association(&mut self, link: DrinkIngredient) {
        self.links.push(PendingLink::Record(link));
    }

    /// Queue a link between two tracked entities; either may still be pending
    pub fn attach(&mut self, drink: DrinkKey, ingredient: IngredientKey) -> Result<()> {
        self.check_drink(drink)?;
        self.check_ingredient(ingredient)?;
        self.links.push(PendingLink::Tracked(drink, ingredient));
        Ok(())
    }

    /// Put an ingredient into a drink. The ingredient is registered with the
    /// session as part of the link, so the next commit stores both.
    pub fn append_component(
        &mut self,
        drink: DrinkKey,
        ingredient: Ingredient,
    ) -> Result<IngredientKey> {
        self.check_drink(drink)?;
        let key = self.add_ingredient(ingredient);
        self.links.push(PendingLink::Tracked(drink, key));
        Ok(key)
    }

    /// Put a drink on an ingredient's list of drinks. The drink is
    /// registered with the session as part of the link.
    pub fn append_libation(
        &mut self,
        ingredient: IngredientKey,
        drink: MixedDrink,
    ) -> Result<DrinkKey> {
        self.check_ingredient(ingredient)?;
        let key = self.add_drink(drink);
        self.links.push(PendingLink::Tracked(key, ingredient));
        Ok(key)
    }

    /// Ingredients this session will link to the drink at the next commit.
    ///
    /// An association record shows up only while its ingredient is tracked
    /// by this session; the record itself is still written at commit.
    pub fn pending_components(&self, drink: DrinkKey) -> Vec<&Ingredient> {
        let drink_id = self.drink(drink).and_then(|d| d.drink_id);

        self.links
            .iter()
            .filter_map(|link| match link {
                PendingLink::Tracked(d, i) if *d == drink => self.ingredient(*i),
                PendingLink::Record(record) if Some(record.drink_id) == drink_id => self
                    .ingredient_keys
                    .get(&record.ingredient_id)
                    .and_then(|key| self.ingredient(*key)),
                _ => None,
            })
            .collect()
    }

    /// Drinks this session will link to the ingredient at the next commit.
    ///
    /// As with [`Session::pending_components`], association records count
    /// only when their drink is tracked.
    pub fn pending_libations(&self, ingredient: IngredientKey) -> Vec<&MixedDrink> {
        let ingredient_id = self.ingredient(ingredient).and_then(|i| i.ingredient_id);

        self.links
            .iter()
            .filter_map(|link| match link {
                PendingLink::Tracked(d, i) if *i == ingredient => self.drink(*d),
                PendingLink::Record(record) if Some(record.ingredient_id) == ingredient_id => self
                    .drink_keys
                    .get(&record.drink_id)
                    .and_then(|key| self.drink(*key)),
                _ => None,
            })
            .collect()
    }

    /// Committed ingredients of a tracked drink; empty until the drink has an id
    pub fn components(&self, drink: DrinkKey) -> Result<Vec<Ingredient>> {
        match self.check_drink(drink)?.drink_id {
            Some(id) => repository::ingredients_of(&*self.conn, id),
            None => Ok(Vec::new()),
        }
    }

    /// Committed drinks of a tracked ingredient; empty until the ingredient has an id
    pub fn libations(&self, ingredient: IngredientKey) -> Result<Vec<MixedDrink>> {
        match self.check_ingredient(ingredient)?.ingredient_id {
            Some(id) => repository::drinks_of(&*self.conn, id),
            None => Ok(Vec::new()),
        }
    }

    /// Number of entities and links waiting for a commit
    pub fn pending_count(&self) -> usize {
        let drinks = self.drinks.iter().flatten().filter(|d| !d.is_persisted()).count();
        let ingredients = self
            .ingredients
            .iter()
            .flatten()
            .filter(|i| !i.is_persisted())
            .count();
        drinks + ingredients + self.links.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.pending_count() > 0
    }

    /// Write the pending set in one transaction.
    ///
    /// Identifiers are handed out only once the transaction has committed.
    /// If any statement fails the transaction rolls back, nothing is
    /// assigned and the pending set is left as it was.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        if !self.is_dirty() {
            return Ok(CommitSummary::default());
        }

        let tx = self.conn.transaction()?;

        let mut drink_ids: Vec<Option<DrinkId>> = Vec::with_capacity(self.drinks.len());
        for slot in &self.drinks {
            let id = match slot {
                Some(drink) => match drink.drink_id {
                    Some(id) => Some(id),
                    None => Some(repository::insert_drink(&tx, &drink.drink_name)?),
                },
                None => None,
            };
            drink_ids.push(id);
        }

        let mut ingredient_ids: Vec<Option<IngredientId>> =
            Vec::with_capacity(self.ingredients.len());
        for slot in &self.ingredients {
            let id = match slot {
                Some(ingredient) => match ingredient.ingredient_id {
                    Some(id) => Some(id),
                    None => Some(repository::insert_ingredient(&tx, &ingredient.ingredient_name)?),
                },
                None => None,
            };
            ingredient_ids.push(id);
        }

        let mut associations = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let (drink_id, ingredient_id) = match link {
                PendingLink::Tracked(drink, ingredient) => {
                    match (drink_ids[drink.index], ingredient_ids[ingredient.index]) {
                        (Some(d), Some(i)) => (d, i),
                        _ => {
                            return Err(DrinkError::InvalidRequest(
                                "link refers to an entity that was rolled back".to_string(),
                            ))
                        }
                    }
                }
                PendingLink::Record(record) => (record.drink_id, record.ingredient_id),
            };
            let id = repository::insert_association(&tx, drink_id, ingredient_id)?;
            associations.push(DrinkIngredient {
                drinkingredient_id: Some(id),
                drink_id,
                ingredient_id,
            });
        }

        tx.commit()?;

        let session = self.id;
        let mut summary = CommitSummary {
            associations,
            ..CommitSummary::default()
        };

        for (index, (slot, id)) in self.drinks.iter_mut().zip(drink_ids).enumerate() {
            if let (Some(drink), Some(id)) = (slot.as_mut(), id) {
                if drink.drink_id.is_none() {
                    drink.drink_id = Some(id);
                    self.drink_keys.insert(id, DrinkKey { session, index });
                    summary.drinks.push(drink.clone());
                }
            }
        }

        for (index, (slot, id)) in self.ingredients.iter_mut().zip(ingredient_ids).enumerate() {
            if let (Some(ingredient), Some(id)) = (slot.as_mut(), id) {
                if ingredient.ingredient_id.is_none() {
                    ingredient.ingredient_id = Some(id);
                    self.ingredient_keys.insert(id, IngredientKey { session, index });
                    summary.ingredients.push(ingredient.clone());
                }
            }
        }

        self.links.clear();

        debug!(
            drinks = summary.drinks.len(),
            ingredients = summary.ingredients.len(),
            associations = summary.associations.len(),
            "Session committed"
        );

        Ok(summary)
    }

    /// Discard the pending set. Entities that never got an id are forgotten
    /// and their keys stop resolving.
    pub fn rollback(&mut self) {
        let discarded = self.pending_count();

        for slot in &mut self.drinks {
            if slot.as_ref().is_some_and(|d| !d.is_persisted()) {
                *slot = None;
            }
        }
        for slot in &mut self.ingredients {
            if slot.as_ref().is_some_and(|i| !i.is_persisted()) {
                *slot = None;
            }
        }
        self.links.clear();

        if discarded > 0 {
            debug!(discarded, "Session rolled back");
        }
    }

    fn drink_key(&self, index: usize) -> DrinkKey {
        DrinkKey {
            session: self.id,
            index,
        }
    }

    fn ingredient_key(&self, index: usize) -> IngredientKey {
        IngredientKey {
            session: self.id,
            index,
        }
    }

    fn check_drink(&self, key: DrinkKey) -> Result<&MixedDrink> {
        self.drink(key).ok_or_else(|| {
            DrinkError::InvalidRequest(format!(
                "drink key {} of session {} is not tracked by session {}",
                key.index, key.session, self.id
            ))
        })
    }

    fn check_ingredient(&self, key: IngredientKey) -> Result<&Ingredient> {
        self.ingredient(key).ok_or_else(|| {
            DrinkError::InvalidRequest(format!(
                "ingredient key {} of session {} is not tracked by session {}",
                key.index, key.session, self.id
            ))
        })
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.is_dirty() {
            warn!(
                pending = self.pending_count(),
                "Session dropped with uncommitted changes; discarding them"
            );
        }
    }
}
