use crate::models::{Favorite, Ingredient, Recipe, ShoppingCartEntry, Tag};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const TAGS_FILE: &str = "tags.json";
const INGREDIENTS_FILE: &str = "ingredients.json";
const RECIPES_FILE: &str = "recipes.json";
const FAVORITES_FILE: &str = "favorites.json";
const CART_FILE: &str = "shopping_carts.json";

/// One line of the aggregated shopping list: amounts summed over every
/// recipe in the user's cart, grouped by (name, unit).
#[derive(Debug, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: u64,
}

/// Tags, ingredients, recipes, and the favorite/cart join records. Recipes
/// embed their ingredient rows, so deleting a recipe drops them along with
/// any favorite and cart entries pointing at it.
pub struct RecipeStorage {
    dir: PathBuf,
    tags: RwLock<Vec<Tag>>,
    ingredients: RwLock<Vec<Ingredient>>,
    recipes: RwLock<Vec<Recipe>>,
    favorites: RwLock<Vec<Favorite>>,
    cart: RwLock<Vec<ShoppingCartEntry>>,
}

fn load_collection<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if path.exists() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))
    } else {
        Ok(Vec::new())
    }
}

fn save_collection<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(items).context("Failed to serialize collection")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

impl RecipeStorage {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        Ok(Self {
            dir: data_dir.to_path_buf(),
            tags: RwLock::new(load_collection(&data_dir.join(TAGS_FILE))?),
            ingredients: RwLock::new(load_collection(&data_dir.join(INGREDIENTS_FILE))?),
            recipes: RwLock::new(load_collection(&data_dir.join(RECIPES_FILE))?),
            favorites: RwLock::new(load_collection(&data_dir.join(FAVORITES_FILE))?),
            cart: RwLock::new(load_collection(&data_dir.join(CART_FILE))?),
        })
    }

    pub async fn add_tag(&self, tag: Tag) -> Result<Tag> {
        let mut tags = self.tags.write().await;

        if tags.iter().any(|t| t.name == tag.name) {
            bail!("Tag name already exists");
        }
        if tags.iter().any(|t| t.color == tag.color) {
            bail!("Tag color already exists");
        }
        if tags.iter().any(|t| t.slug == tag.slug) {
            bail!("Tag slug already exists");
        }

        tags.push(tag.clone());
        save_collection(&self.dir.join(TAGS_FILE), &tags)?;
        Ok(tag)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = self.tags.read().await;
        Ok(tags.clone())
    }

    pub async fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        let tags = self.tags.read().await;
        Ok(tags.iter().find(|t| t.id == id).cloned())
    }

    pub async fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let tags = self.tags.read().await;
        Ok(tags.iter().find(|t| t.slug == slug).cloned())
    }

    pub async fn add_ingredient(&self, ingredient: Ingredient) -> Result<Ingredient> {
        let mut ingredients = self.ingredients.write().await;
        ingredients.push(ingredient.clone());
        save_collection(&self.dir.join(INGREDIENTS_FILE), &ingredients)?;
        Ok(ingredient)
    }

    /// Bulk insert for the CSV loader. Rows whose (name, unit) pair is
    /// already present are skipped; returns the number inserted.
    pub async fn add_ingredients_bulk(&self, batch: Vec<Ingredient>) -> Result<usize> {
        let mut ingredients = self.ingredients.write().await;
        let mut inserted = 0;
        for ingredient in batch {
            let exists = ingredients.iter().any(|i| {
                i.name == ingredient.name && i.measurement_unit == ingredient.measurement_unit
            });
            if !exists {
                ingredients.push(ingredient);
                inserted += 1;
            }
        }
        save_collection(&self.dir.join(INGREDIENTS_FILE), &ingredients)?;
        Ok(inserted)
    }

    /// Reference-data listing with the case-insensitive name-prefix filter.
    pub async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let ingredients = self.ingredients.read().await;
        match name_prefix {
            Some(prefix) => {
                let prefix = prefix.to_lowercase();
                Ok(ingredients
                    .iter()
                    .filter(|i| i.name.to_lowercase().starts_with(&prefix))
                    .cloned()
                    .collect())
            }
            None => Ok(ingredients.clone()),
        }
    }

    pub async fn get_ingredient(&self, id: &str) -> Result<Option<Ingredient>> {
        let ingredients = self.ingredients.read().await;
        Ok(ingredients.iter().find(|i| i.id == id).cloned())
    }

    pub async fn add_recipe(&self, recipe: Recipe) -> Result<Recipe> {
        let mut recipes = self.recipes.write().await;
        recipes.push(recipe.clone());
        save_collection(&self.dir.join(RECIPES_FILE), &recipes)?;
        Ok(recipe)
    }

    pub async fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        let recipes = self.recipes.read().await;
        Ok(recipes.iter().find(|r| r.id == id).cloned())
    }

    /// Replace a stored recipe wholesale, ingredient rows included.
    pub async fn update_recipe(&self, recipe: Recipe) -> Result<()> {
        let mut recipes = self.recipes.write().await;

        if let Some(stored) = recipes.iter_mut().find(|r| r.id == recipe.id) {
            *stored = recipe;
            save_collection(&self.dir.join(RECIPES_FILE), &recipes)?;
            Ok(())
        } else {
            bail!("Recipe not found");
        }
    }

    /// Delete a recipe and cascade to favorites and cart entries.
    pub async fn delete_recipe(&self, id: &str) -> Result<bool> {
        let mut recipes = self.recipes.write().await;
        let before = recipes.len();
        recipes.retain(|r| r.id != id);
        if recipes.len() == before {
            return Ok(false);
        }
        save_collection(&self.dir.join(RECIPES_FILE), &recipes)?;
        drop(recipes);

        let mut favorites = self.favorites.write().await;
        favorites.retain(|f| f.recipe_id != id);
        save_collection(&self.dir.join(FAVORITES_FILE), &favorites)?;
        drop(favorites);

        let mut cart = self.cart.write().await;
        cart.retain(|c| c.recipe_id != id);
        save_collection(&self.dir.join(CART_FILE), &cart)?;
        Ok(true)
    }

    /// All recipes, newest first.
    pub async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let recipes = self.recipes.read().await;
        let mut all = recipes.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    pub async fn recipes_by_author(&self, author_id: &str) -> Result<Vec<Recipe>> {
        Ok(self
            .list_recipes()
            .await?
            .into_iter()
            .filter(|r| r.author_id == author_id)
            .collect())
    }

    /// Mark a recipe as a favorite. Returns false when it already is one.
    pub async fn add_favorite(&self, user_id: &str, recipe_id: &str) -> Result<bool> {
        let mut favorites = self.favorites.write().await;

        if favorites
            .iter()
            .any(|f| f.user_id == user_id && f.recipe_id == recipe_id)
        {
            return Ok(false);
        }

        favorites.push(Favorite {
            user_id: user_id.to_string(),
            recipe_id: recipe_id.to_string(),
            created_at: Utc::now(),
        });
        save_collection(&self.dir.join(FAVORITES_FILE), &favorites)?;
        Ok(true)
    }

    pub async fn remove_favorite(&self, user_id: &str, recipe_id: &str) -> Result<bool> {
        let mut favorites = self.favorites.write().await;
        let before = favorites.len();
        favorites.retain(|f| !(f.user_id == user_id && f.recipe_id == recipe_id));
        if favorites.len() == before {
            return Ok(false);
        }
        save_collection(&self.dir.join(FAVORITES_FILE), &favorites)?;
        Ok(true)
    }

    pub async fn is_favorited(&self, user_id: &str, recipe_id: &str) -> Result<bool> {
        let favorites = self.favorites.read().await;
        Ok(favorites
            .iter()
            .any(|f| f.user_id == user_id && f.recipe_id == recipe_id))
    }

    pub async fn favorite_count(&self, recipe_id: &str) -> Result<usize> {
        let favorites = self.favorites.read().await;
        Ok(favorites.iter().filter(|f| f.recipe_id == recipe_id).count())
    }

    pub async fn add_to_cart(&self, user_id: &str, recipe_id: &str) -> Result<bool> {
        let mut cart = self.cart.write().await;

        if cart
            .iter()
            .any(|c| c.user_id == user_id && c.recipe_id == recipe_id)
        {
            return Ok(false);
        }

        cart.push(ShoppingCartEntry {
            user_id: user_id.to_string(),
            recipe_id: recipe_id.to_string(),
            created_at: Utc::now(),
        });
        save_collection(&self.dir.join(CART_FILE), &cart)?;
        Ok(true)
    }

    pub async fn remove_from_cart(&self, user_id: &str, recipe_id: &str) -> Result<bool> {
        let mut cart = self.cart.write().await;
        let before = cart.len();
        cart.retain(|c| !(c.user_id == user_id && c.recipe_id == recipe_id));
        if cart.len() == before {
            return Ok(false);
        }
        save_collection(&self.dir.join(CART_FILE), &cart)?;
        Ok(true)
    }

    pub async fn is_in_cart(&self, user_id: &str, recipe_id: &str) -> Result<bool> {
        let cart = self.cart.read().await;
        Ok(cart
            .iter()
            .any(|c| c.user_id == user_id && c.recipe_id == recipe_id))
    }

    pub async fn favorite_recipe_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let favorites = self.favorites.read().await;
        Ok(favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.recipe_id.clone())
            .collect())
    }

    pub async fn cart_recipe_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let cart = self.cart.read().await;
        Ok(cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.recipe_id.clone())
            .collect())
    }

    /// Aggregate the user's cart: group ingredient rows across recipes by
    /// (name, unit) and sum the amounts, sorted by name.
    pub async fn shopping_list(&self, user_id: &str) -> Result<Vec<ShoppingListItem>> {
        let recipe_ids = self.cart_recipe_ids(user_id).await?;

        let recipes = self.recipes.read().await;
        let ingredients = self.ingredients.read().await;

        let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();
        for recipe in recipes.iter().filter(|r| recipe_ids.contains(&r.id)) {
            for row in &recipe.ingredients {
                let Some(ingredient) = ingredients.iter().find(|i| i.id == row.ingredient_id)
                else {
                    continue;
                };
                let key = (
                    ingredient.name.clone(),
                    ingredient.measurement_unit.clone(),
                );
                *totals.entry(key).or_insert(0) += u64::from(row.amount);
            }
        }

        Ok(totals
            .into_iter()
            .map(|((name, measurement_unit), amount)| ShoppingListItem {
                name,
                measurement_unit,
                amount,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipeIngredient;
    use chrono::Duration;
    use uuid::Uuid;

    fn test_storage() -> RecipeStorage {
        let dir = std::env::temp_dir().join(format!("foodgram-recipes-{}", Uuid::new_v4()));
        RecipeStorage::new(&dir).unwrap()
    }

    fn recipe(name: &str, ingredients: Vec<RecipeIngredient>) -> Recipe {
        Recipe::new(
            "author-1".to_string(),
            name.to_string(),
            "/media/recipes/x.png".to_string(),
            "Some steps.".to_string(),
            10,
            vec!["tag-1".to_string()],
            ingredients,
        )
    }

    fn row(ingredient_id: &str, amount: u32) -> RecipeIngredient {
        RecipeIngredient {
            ingredient_id: ingredient_id.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn tag_fields_are_unique() {
        let storage = test_storage();
        storage
            .add_tag(Tag::new(
                "Breakfast".to_string(),
                "#E26C2D".to_string(),
                "breakfast".to_string(),
            ))
            .await
            .unwrap();

        let dup_slug = Tag::new(
            "Brunch".to_string(),
            "#49B64E".to_string(),
            "breakfast".to_string(),
        );
        assert!(storage.add_tag(dup_slug).await.is_err());
    }

    #[tokio::test]
    async fn ingredient_prefix_filter_is_case_insensitive() {
        let storage = test_storage();
        storage
            .add_ingredient(Ingredient::new("Flour".to_string(), "g".to_string()))
            .await
            .unwrap();
        storage
            .add_ingredient(Ingredient::new("Salt".to_string(), "g".to_string()))
            .await
            .unwrap();

        let found = storage.list_ingredients(Some("fl")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Flour");

        assert_eq!(storage.list_ingredients(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bulk_insert_skips_existing_pairs() {
        let storage = test_storage();
        storage
            .add_ingredient(Ingredient::new("Flour".to_string(), "g".to_string()))
            .await
            .unwrap();

        let inserted = storage
            .add_ingredients_bulk(vec![
                Ingredient::new("Flour".to_string(), "g".to_string()),
                Ingredient::new("Sugar".to_string(), "g".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(storage.list_ingredients(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn recipes_list_newest_first() {
        let storage = test_storage();
        let mut old = recipe("Old", vec![row("i1", 1)]);
        old.created_at = Utc::now() - Duration::hours(1);
        storage.add_recipe(old).await.unwrap();
        storage
            .add_recipe(recipe("New", vec![row("i1", 1)]))
            .await
            .unwrap();

        let all = storage.list_recipes().await.unwrap();
        assert_eq!(all[0].name, "New");
        assert_eq!(all[1].name, "Old");
    }

    #[tokio::test]
    async fn favorite_toggles_once() {
        let storage = test_storage();
        let saved = storage
            .add_recipe(recipe("Pancakes", vec![row("i1", 1)]))
            .await
            .unwrap();

        assert!(storage.add_favorite("u1", &saved.id).await.unwrap());
        assert!(!storage.add_favorite("u1", &saved.id).await.unwrap());
        assert!(storage.is_favorited("u1", &saved.id).await.unwrap());
        assert_eq!(storage.favorite_count(&saved.id).await.unwrap(), 1);

        assert!(storage.remove_favorite("u1", &saved.id).await.unwrap());
        assert!(!storage.remove_favorite("u1", &saved.id).await.unwrap());
    }

    #[tokio::test]
    async fn cart_entry_is_unique_per_user_recipe() {
        let storage = test_storage();
        let saved = storage
            .add_recipe(recipe("Soup", vec![row("i1", 1)]))
            .await
            .unwrap();

        assert!(storage.add_to_cart("u1", &saved.id).await.unwrap());
        assert!(!storage.add_to_cart("u1", &saved.id).await.unwrap());
        assert!(storage.add_to_cart("u2", &saved.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_recipe_cascades_to_joins() {
        let storage = test_storage();
        let saved = storage
            .add_recipe(recipe("Soup", vec![row("i1", 1)]))
            .await
            .unwrap();
        storage.add_favorite("u1", &saved.id).await.unwrap();
        storage.add_to_cart("u1", &saved.id).await.unwrap();

        assert!(storage.delete_recipe(&saved.id).await.unwrap());
        assert!(!storage.is_favorited("u1", &saved.id).await.unwrap());
        assert!(!storage.is_in_cart("u1", &saved.id).await.unwrap());
        assert!(!storage.delete_recipe(&saved.id).await.unwrap());
    }

    #[tokio::test]
    async fn shopping_list_groups_and_sums() {
        let storage = test_storage();
        let flour = storage
            .add_ingredient(Ingredient::new("flour".to_string(), "g".to_string()))
            .await
            .unwrap();
        let salt = storage
            .add_ingredient(Ingredient::new("salt".to_string(), "g".to_string()))
            .await
            .unwrap();

        let r1 = storage
            .add_recipe(recipe("Bread", vec![row(&flour.id, 200)]))
            .await
            .unwrap();
        let r2 = storage
            .add_recipe(recipe(
                "Crackers",
                vec![row(&flour.id, 300), row(&salt.id, 5)],
            ))
            .await
            .unwrap();

        storage.add_to_cart("u1", &r1.id).await.unwrap();
        storage.add_to_cart("u1", &r2.id).await.unwrap();

        let items = storage.shopping_list("u1").await.unwrap();
        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: "flour".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 500,
                },
                ShoppingListItem {
                    name: "salt".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 5,
                },
            ]
        );
    }

    #[tokio::test]
    async fn shopping_list_empty_for_other_user() {
        let storage = test_storage();
        assert!(storage.shopping_list("nobody").await.unwrap().is_empty());
    }
}
