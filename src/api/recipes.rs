use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use log::info;
use std::sync::Arc;

use super::{
    authenticate, bad_request, internal_error, maybe_authenticate, not_found, ApiError, AppState,
};
use crate::media;
use crate::models::{
    Recipe, RecipeIngredient, RecipeIngredientRead, RecipeRead, RecipeShort, RecipeWrite,
};
use crate::pagination::{paginate, Page, PageParams};
use crate::storage::ShoppingListItem;
use crate::user_models::{User, UserResponse};

/// Assemble the full read form: nested tags, author, quantified
/// ingredients, and the viewer-relative flags.
async fn render_recipe(
    state: &AppState,
    recipe: &Recipe,
    viewer: Option<&User>,
) -> Result<RecipeRead, ApiError> {
    let author = state
        .users
        .get_user(&recipe.author_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| internal_error(anyhow::anyhow!("Recipe author missing from storage")))?;

    let is_subscribed = match viewer {
        Some(v) => state
            .users
            .is_following(&v.id, &author.id)
            .await
            .map_err(internal_error)?,
        None => false,
    };

    let mut tags = Vec::with_capacity(recipe.tag_ids.len());
    for tag_id in &recipe.tag_ids {
        if let Some(tag) = state.recipes.get_tag(tag_id).await.map_err(internal_error)? {
            tags.push(tag);
        }
    }

    let mut ingredients = Vec::with_capacity(recipe.ingredients.len());
    for row in &recipe.ingredients {
        if let Some(ingredient) = state
            .recipes
            .get_ingredient(&row.ingredient_id)
            .await
            .map_err(internal_error)?
        {
            ingredients.push(RecipeIngredientRead {
                id: ingredient.id,
                name: ingredient.name,
                measurement_unit: ingredient.measurement_unit,
                amount: row.amount,
            });
        }
    }

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(v) => (
            state
                .recipes
                .is_favorited(&v.id, &recipe.id)
                .await
                .map_err(internal_error)?,
            state
                .recipes
                .is_in_cart(&v.id, &recipe.id)
                .await
                .map_err(internal_error)?,
        ),
        None => (false, false),
    };

    Ok(RecipeRead {
        id: recipe.id.clone(),
        tags,
        author: UserResponse::from_user(&author, is_subscribed),
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name.clone(),
        image: recipe.image.clone(),
        text: recipe.text.clone(),
        cooking_time: recipe.cooking_time,
    })
}

/// Check every referenced tag and ingredient exists; returns the
/// association rows for storage.
async fn resolve_associations(
    state: &AppState,
    payload: &RecipeWrite,
) -> Result<(Vec<String>, Vec<RecipeIngredient>), ApiError> {
    let mut tag_ids = Vec::with_capacity(payload.tags.len());
    for tag_id in &payload.tags {
        state
            .recipes
            .get_tag(tag_id)
            .await
            .map_err(internal_error)?
            .ok_or_else(|| bad_request(format!("Unknown tag: {tag_id}")))?;
        tag_ids.push(tag_id.clone());
    }

    let mut rows = Vec::with_capacity(payload.ingredients.len());
    for entry in &payload.ingredients {
        state
            .recipes
            .get_ingredient(&entry.id)
            .await
            .map_err(internal_error)?
            .ok_or_else(|| bad_request(format!("Unknown ingredient: {}", entry.id)))?;
        rows.push(RecipeIngredient {
            ingredient_id: entry.id.clone(),
            amount: entry.amount,
        });
    }
    Ok((tag_ids, rows))
}

fn store_payload_image(state: &AppState, data_uri: &str) -> Result<String, ApiError> {
    let (bytes, ext) = media::decode_data_uri(data_uri).map_err(bad_request)?;
    media::store_image(&state.config.media_dir, &bytes, &ext).map_err(internal_error)
}

/// Author-or-admin gate for mutating a recipe.
fn check_can_edit(user: &User, recipe: &Recipe) -> Result<(), ApiError> {
    if recipe.author_id == user.id || user.is_admin {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            "Only the author can modify this recipe".to_string(),
        ))
    }
}

fn truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<RecipeRead>>, ApiError> {
    let viewer = maybe_authenticate(&state, &headers).await?;

    let author = pairs.iter().find(|(k, _)| k == "author").map(|(_, v)| v);
    let tag_slugs: Vec<&String> = pairs
        .iter()
        .filter(|(k, _)| k == "tags")
        .map(|(_, v)| v)
        .collect();
    let only_favorited = pairs
        .iter()
        .any(|(k, v)| k == "is_favorited" && truthy(v));
    let only_in_cart = pairs
        .iter()
        .any(|(k, v)| k == "is_in_shopping_cart" && truthy(v));

    if (only_favorited || only_in_cart) && viewer.is_none() {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Authentication required for this filter".to_string(),
        ));
    }

    let mut wanted_tag_ids = Vec::new();
    for slug in &tag_slugs {
        if let Some(tag) = state
            .recipes
            .get_tag_by_slug(slug)
            .await
            .map_err(internal_error)?
        {
            wanted_tag_ids.push(tag.id);
        }
    }

    let mut recipes = state.recipes.list_recipes().await.map_err(internal_error)?;
    if let Some(author_id) = author {
        recipes.retain(|r| &r.author_id == author_id);
    }
    if !tag_slugs.is_empty() {
        recipes.retain(|r| r.tag_ids.iter().any(|id| wanted_tag_ids.contains(id)));
    }
    if let Some(v) = &viewer {
        if only_favorited {
            let ids = state
                .recipes
                .favorite_recipe_ids(&v.id)
                .await
                .map_err(internal_error)?;
            recipes.retain(|r| ids.contains(&r.id));
        }
        if only_in_cart {
            let ids = state
                .recipes
                .cart_recipe_ids(&v.id)
                .await
                .map_err(internal_error)?;
            recipes.retain(|r| ids.contains(&r.id));
        }
    }

    let params = PageParams::from_pairs(&pairs, state.config.page_size);
    let mut results = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        results.push(render_recipe(&state, recipe, viewer.as_ref()).await?);
    }
    Ok(Json(paginate(results, params, "/api/recipes/", &pairs)))
}

pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RecipeWrite>,
) -> Result<(StatusCode, Json<RecipeRead>), ApiError> {
    let user = authenticate(&state, &headers).await?;
    payload.validate(true).map_err(bad_request)?;

    let (tag_ids, ingredient_rows) = resolve_associations(&state, &payload).await?;
    let image = store_payload_image(&state, payload.image.as_deref().unwrap_or_default())?;

    let recipe = Recipe::new(
        user.id.clone(),
        payload.name,
        image,
        payload.text,
        payload.cooking_time,
        tag_ids,
        ingredient_rows,
    );
    let saved = state
        .recipes
        .add_recipe(recipe)
        .await
        .map_err(internal_error)?;

    info!("User {} published recipe {}", user.username, saved.name);
    let body = render_recipe(&state, &saved, Some(&user)).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RecipeRead>, ApiError> {
    let viewer = maybe_authenticate(&state, &headers).await?;
    let recipe = state
        .recipes
        .get_recipe(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Recipe not found"))?;
    let body = render_recipe(&state, &recipe, viewer.as_ref()).await?;
    Ok(Json(body))
}

pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RecipeWrite>,
) -> Result<Json<RecipeRead>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let mut recipe = state
        .recipes
        .get_recipe(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Recipe not found"))?;
    check_can_edit(&user, &recipe)?;

    payload.validate(false).map_err(bad_request)?;
    let (tag_ids, ingredient_rows) = resolve_associations(&state, &payload).await?;

    // Associations are replaced wholesale; the image only when resubmitted.
    if let Some(data_uri) = payload.image.as_deref().filter(|s| !s.is_empty()) {
        recipe.image = store_payload_image(&state, data_uri)?;
    }
    recipe.name = payload.name;
    recipe.text = payload.text;
    recipe.cooking_time = payload.cooking_time;
    recipe.tag_ids = tag_ids;
    recipe.ingredients = ingredient_rows;

    state
        .recipes
        .update_recipe(recipe.clone())
        .await
        .map_err(internal_error)?;
    let body = render_recipe(&state, &recipe, Some(&user)).await?;
    Ok(Json(body))
}

pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let recipe = state
        .recipes
        .get_recipe(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Recipe not found"))?;
    check_can_edit(&user, &recipe)?;

    state
        .recipes
        .delete_recipe(&id)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_on(
    state: &AppState,
    recipe_id: &str,
    add: impl std::future::Future<Output = anyhow::Result<bool>>,
    conflict: &str,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    let recipe = state
        .recipes
        .get_recipe(recipe_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Recipe not found"))?;

    let created = add.await.map_err(internal_error)?;
    if !created {
        return Err((StatusCode::CONFLICT, conflict.to_string()));
    }
    Ok((StatusCode::CREATED, Json(RecipeShort::from_recipe(&recipe))))
}

pub async fn favorite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    let user = authenticate(&state, &headers).await?;
    toggle_on(
        &state,
        &id,
        state.recipes.add_favorite(&user.id, &id),
        "Recipe is already in favorites",
    )
    .await
}

pub async fn unfavorite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state
        .recipes
        .get_recipe(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Recipe not found"))?;

    let removed = state
        .recipes
        .remove_favorite(&user.id, &id)
        .await
        .map_err(internal_error)?;
    if !removed {
        return Err(not_found("Recipe is not in favorites"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    let user = authenticate(&state, &headers).await?;
    toggle_on(
        &state,
        &id,
        state.recipes.add_to_cart(&user.id, &id),
        "Recipe is already in the shopping cart",
    )
    .await
}

pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state
        .recipes
        .get_recipe(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Recipe not found"))?;

    let removed = state
        .recipes
        .remove_from_cart(&user.id, &id)
        .await
        .map_err(internal_error)?;
    if !removed {
        return Err(not_found("Recipe is not in the shopping cart"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Flat text form of the aggregated list, one `name - amount, unit` line
/// per ingredient.
fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut text = String::from("Shopping list:\n");
    for item in items {
        text.push_str(&format!(
            "\n{} - {}, {}",
            item.name, item.amount, item.measurement_unit
        ));
    }
    text
}

pub async fn download_shopping_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let items = state
        .recipes
        .shopping_list(&user.id)
        .await
        .map_err(internal_error)?;

    let body = render_shopping_list(&items);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_cart.txt\"",
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shopping_list_renders_one_line_per_item() {
        let items = vec![
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
        ];
        let text = render_shopping_list(&items);
        assert_eq!(text, "Shopping list:\n\nflour - 500, g\nsalt - 5, g");
    }

    #[test]
    fn empty_cart_renders_header_only() {
        assert_eq!(render_shopping_list(&[]), "Shopping list:\n");
    }
}
