use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user_models::UserResponse;

pub const MIN_COOKING_TIME: u32 = 1;
pub const MIN_AMOUNT: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl Tag {
    pub fn new(name: String, color: String, slug: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            color,
            slug,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub measurement_unit: String,
}

impl Ingredient {
    pub fn new(name: String, measurement_unit: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            measurement_unit,
        }
    }
}

/// One ingredient row of a recipe. Owned by the recipe: replaced wholesale
/// on update and deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub ingredient_id: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub author_id: String,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
    pub tag_ids: Vec<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    pub fn new(
        author_id: String,
        name: String,
        image: String,
        text: String,
        cooking_time: u32,
        tag_ids: Vec<String>,
        ingredients: Vec<RecipeIngredient>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id,
            name,
            image,
            text,
            cooking_time,
            tag_ids,
            ingredients,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: String,
    pub recipe_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingCartEntry {
    pub user_id: String,
    pub recipe_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TagPayload {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagPayload {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.slug.trim().is_empty() {
            return Err("Tag name and slug cannot be empty".to_string());
        }
        let hex = self
            .color
            .strip_prefix('#')
            .ok_or_else(|| "Color must be a hex value like #49B64E".to_string())?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("Color must be a hex value like #49B64E".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct IngredientPayload {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientPayload {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.measurement_unit.trim().is_empty() {
            return Err("Ingredient name and measurement unit cannot be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct IngredientAmount {
    pub id: String,
    pub amount: u32,
}

/// Create/update payload for a recipe. `image` carries a base64 data URI;
/// it may be omitted on update to keep the stored picture.
#[derive(Debug, Deserialize)]
pub struct RecipeWrite {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: u32,
}

impl RecipeWrite {
    pub fn validate(&self, image_required: bool) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Recipe name cannot be empty".to_string());
        }
        if self.text.trim().is_empty() {
            return Err("Recipe text cannot be empty".to_string());
        }
        if self.cooking_time < MIN_COOKING_TIME {
            return Err(format!(
                "Cooking time cannot be less than {MIN_COOKING_TIME}"
            ));
        }
        if self.ingredients.is_empty() {
            return Err("Recipe must have at least one ingredient".to_string());
        }
        if self.tags.is_empty() {
            return Err("Recipe must have at least one tag".to_string());
        }
        for entry in &self.ingredients {
            if entry.amount < MIN_AMOUNT {
                return Err(format!(
                    "Ingredient amount cannot be less than {MIN_AMOUNT}"
                ));
            }
        }
        for (i, entry) in self.ingredients.iter().enumerate() {
            if self.ingredients[..i].iter().any(|e| e.id == entry.id) {
                return Err("Duplicate ingredient in recipe".to_string());
            }
        }
        if image_required && self.image.as_deref().map_or(true, |s| s.is_empty()) {
            return Err("Recipe image is required".to_string());
        }
        Ok(())
    }
}

/// Abbreviated recipe form used in favorites, the cart, and subscriptions.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeShort {
    pub id: String,
    pub name: String,
    pub image: String,
    pub cooking_time: u32,
}

impl RecipeShort {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeIngredientRead {
    pub id: String,
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

/// Full read form: nested tags, author, and quantified ingredients, plus
/// the viewer-relative flags.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeRead {
    pub id: String,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientRead>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_payload() -> RecipeWrite {
        RecipeWrite {
            ingredients: vec![
                IngredientAmount {
                    id: "flour".to_string(),
                    amount: 200,
                },
                IngredientAmount {
                    id: "salt".to_string(),
                    amount: 5,
                },
            ],
            tags: vec!["breakfast".to_string()],
            image: Some("data:image/png;base64,aGk=".to_string()),
            name: "Pancakes".to_string(),
            text: "Mix and fry.".to_string(),
            cooking_time: 20,
        }
    }

    #[test]
    fn valid_recipe_passes() {
        assert!(write_payload().validate(true).is_ok());
    }

    #[test]
    fn zero_cooking_time_rejected_one_accepted() {
        let mut payload = write_payload();
        payload.cooking_time = 0;
        assert!(payload.validate(true).is_err());
        payload.cooking_time = 1;
        assert!(payload.validate(true).is_ok());
    }

    #[test]
    fn empty_ingredients_rejected() {
        let mut payload = write_payload();
        payload.ingredients.clear();
        assert!(payload.validate(true).is_err());
    }

    #[test]
    fn empty_tags_rejected() {
        let mut payload = write_payload();
        payload.tags.clear();
        assert!(payload.validate(true).is_err());
    }

    #[test]
    fn duplicate_ingredient_rejected() {
        let mut payload = write_payload();
        payload.ingredients[1].id = payload.ingredients[0].id.clone();
        let err = payload.validate(true).unwrap_err();
        assert!(err.contains("Duplicate"));
    }

    #[test]
    fn zero_amount_rejected() {
        let mut payload = write_payload();
        payload.ingredients[0].amount = 0;
        assert!(payload.validate(true).is_err());
    }

    #[test]
    fn missing_image_rejected_only_on_create() {
        let mut payload = write_payload();
        payload.image = None;
        assert!(payload.validate(true).is_err());
        assert!(payload.validate(false).is_ok());
    }

    #[test]
    fn tag_color_must_be_hex() {
        let tag = TagPayload {
            name: "Dinner".to_string(),
            color: "green".to_string(),
            slug: "dinner".to_string(),
        };
        assert!(tag.validate().is_err());

        let tag = TagPayload {
            name: "Dinner".to_string(),
            color: "#49B64E".to_string(),
            slug: "dinner".to_string(),
        };
        assert!(tag.validate().is_ok());
    }
}
