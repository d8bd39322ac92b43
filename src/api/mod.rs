pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use log::error;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::storage::RecipeStorage;
use crate::user_models::User;
use crate::user_storage::UserStorage;

pub struct AppState {
    pub config: Config,
    pub users: UserStorage,
    pub recipes: RecipeStorage,
}

/// Handler error: status plus a client-facing message.
pub type ApiError = (StatusCode, String);

pub fn internal_error(err: anyhow::Error) -> ApiError {
    error!("Storage failure: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, message.into())
}

pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Token ")
}

/// Resolve the viewer when an `Authorization: Token <key>` header is
/// present. A presented-but-unknown token is a 401; no header is an
/// anonymous viewer.
pub async fn maybe_authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<User>, ApiError> {
    let Some(key) = token_from_headers(headers) else {
        return Ok(None);
    };
    match state.users.user_for_token(key).await.map_err(internal_error)? {
        Some(user) => Ok(Some(user)),
        None => Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string())),
    }
}

/// Resolve the viewer for endpoints that require authentication.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    maybe_authenticate(state, headers).await?.ok_or((
        StatusCode::UNAUTHORIZED,
        "Authentication credentials were not provided".to_string(),
    ))
}

pub fn router(state: Arc<AppState>) -> Router {
    let media_dir = state.config.media_dir.clone();

    Router::new()
        .route("/api/users/", get(users::list_users).post(users::create_user))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/:id/", get(users::get_user))
        .route(
            "/api/users/:id/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/api/auth/token/login/", post(users::token_login))
        .route("/api/auth/token/logout/", post(users::token_logout))
        .route("/api/tags/", get(tags::list_tags).post(tags::create_tag))
        .route("/api/tags/:id/", get(tags::get_tag))
        .route(
            "/api/ingredients/",
            get(ingredients::list_ingredients).post(ingredients::create_ingredient),
        )
        .route("/api/ingredients/:id/", get(ingredients::get_ingredient))
        .route(
            "/api/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/:id/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/api/recipes/:id/favorite/",
            post(recipes::favorite).delete(recipes::unfavorite),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Fresh state over throwaway stores for handler tests.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    let dir = std::env::temp_dir().join(format!("foodgram-api-{}", uuid::Uuid::new_v4()));
    Arc::new(AppState {
        config: Config {
            addr: "127.0.0.1:0".to_string(),
            data_dir: dir.clone(),
            media_dir: dir.join("media"),
            page_size: 6,
        },
        users: UserStorage::new(&dir).unwrap(),
        recipes: RecipeStorage::new(&dir).unwrap(),
    })
}
