use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use super::{bad_request, internal_error, not_found, ApiError, AppState};
use crate::models::{Ingredient, IngredientPayload};

pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    let name = pairs
        .iter()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.as_str());
    let ingredients = state
        .recipes
        .list_ingredients(name)
        .await
        .map_err(internal_error)?;
    Ok(Json(ingredients))
}

pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ingredient>, ApiError> {
    let ingredient = state
        .recipes
        .get_ingredient(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Ingredient not found"))?;
    Ok(Json(ingredient))
}

pub async fn create_ingredient(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngredientPayload>,
) -> Result<(StatusCode, Json<Ingredient>), ApiError> {
    payload.validate().map_err(bad_request)?;

    let ingredient = Ingredient::new(payload.name, payload.measurement_unit);
    let saved = state
        .recipes
        .add_ingredient(ingredient)
        .await
        .map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(saved)))
}
