use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use super::{bad_request, internal_error, not_found, ApiError, AppState};
use crate::models::{Tag, TagPayload};

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Tag>>, ApiError> {
    let tags = state.recipes.list_tags().await.map_err(internal_error)?;
    Ok(Json(tags))
}

pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state
        .recipes
        .get_tag(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Tag not found"))?;
    Ok(Json(tag))
}

pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TagPayload>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    payload.validate().map_err(bad_request)?;

    let existing = state.recipes.list_tags().await.map_err(internal_error)?;
    if existing.iter().any(|t| t.name == payload.name) {
        return Err(bad_request("Tag name already exists"));
    }
    if existing.iter().any(|t| t.color == payload.color) {
        return Err(bad_request("Tag color already exists"));
    }
    if existing.iter().any(|t| t.slug == payload.slug) {
        return Err(bad_request("Tag slug already exists"));
    }

    let tag = Tag::new(payload.name, payload.color, payload.slug);
    let saved = state
        .recipes
        .add_tag(tag)
        .await
        .map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;

    fn payload(name: &str, color: &str, slug: &str) -> TagPayload {
        TagPayload {
            name: name.to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_client_error() {
        let state = test_state();
        create_tag(
            State(state.clone()),
            Json(payload("Breakfast", "#E26C2D", "breakfast")),
        )
        .await
        .unwrap();

        let (status, message) = create_tag(
            State(state),
            Json(payload("Brunch", "#49B64E", "breakfast")),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("slug"));
    }

    #[tokio::test]
    async fn create_and_fetch_round_trip() {
        let state = test_state();
        let (_, Json(saved)) = create_tag(
            State(state.clone()),
            Json(payload("Dinner", "#8775D2", "dinner")),
        )
        .await
        .unwrap();

        let Json(found) = get_tag(State(state), Path(saved.id.clone())).await.unwrap();
        assert_eq!(found.slug, "dinner");
    }
}
