use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use log::info;
use std::sync::Arc;

use super::{
    authenticate, bad_request, internal_error, maybe_authenticate, not_found, token_from_headers,
    ApiError, AppState,
};
use crate::models::RecipeShort;
use crate::pagination::{paginate, Page, PageParams};
use crate::user_models::{
    CreateUserRequest, SetPasswordRequest, SubscriptionResponse, TokenLoginRequest,
    TokenLoginResponse, User, UserResponse,
};

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials";

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(bad_request)?;

    if state
        .users
        .get_user_by_email(&payload.email)
        .await
        .map_err(internal_error)?
        .is_some()
    {
        return Err(bad_request("Email already registered"));
    }
    if state
        .users
        .get_user_by_username(&payload.username)
        .await
        .map_err(internal_error)?
        .is_some()
    {
        return Err(bad_request("Username already taken"));
    }

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST)
        .map_err(|e| internal_error(e.into()))?;

    let user = User::new(
        payload.email,
        payload.username,
        payload.first_name,
        payload.last_name,
        password_hash,
    );
    let saved = state
        .users
        .create_user(user)
        .await
        .map_err(internal_error)?;

    info!("Registered user {}", saved.username);
    Ok((
        StatusCode::CREATED,
        Json(UserResponse::from_user(&saved, false)),
    ))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<UserResponse>>, ApiError> {
    let viewer = maybe_authenticate(&state, &headers).await?;
    let users = state.users.list_users().await.map_err(internal_error)?;

    let mut results = Vec::with_capacity(users.len());
    for user in &users {
        let is_subscribed = match &viewer {
            Some(v) => state
                .users
                .is_following(&v.id, &user.id)
                .await
                .map_err(internal_error)?,
            None => false,
        };
        results.push(UserResponse::from_user(user, is_subscribed));
    }

    let params = PageParams::from_pairs(&pairs, state.config.page_size);
    Ok(Json(paginate(results, params, "/api/users/", &pairs)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let viewer = maybe_authenticate(&state, &headers).await?;
    let user = state
        .users
        .get_user(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("User not found"))?;

    let is_subscribed = match &viewer {
        Some(v) => state
            .users
            .is_following(&v.id, &user.id)
            .await
            .map_err(internal_error)?,
        None => false,
    };
    Ok(Json(UserResponse::from_user(&user, is_subscribed)))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    Ok(Json(UserResponse::from_user(&user, false)))
}

pub async fn set_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;

    if payload.new_password.trim().is_empty() {
        return Err(bad_request("New password cannot be empty"));
    }
    let current_ok = bcrypt::verify(&payload.current_password, &user.password_hash)
        .map_err(|e| internal_error(e.into()))?;
    if !current_ok {
        return Err(bad_request("Current password is incorrect"));
    }

    let password_hash = bcrypt::hash(&payload.new_password, bcrypt::DEFAULT_COST)
        .map_err(|e| internal_error(e.into()))?;
    state
        .users
        .set_password(&user.id, password_hash)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn token_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenLoginRequest>,
) -> Result<Json<TokenLoginResponse>, ApiError> {
    let user = state
        .users
        .get_user_by_email(&payload.email)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| bad_request(BAD_CREDENTIALS))?;

    let password_ok = bcrypt::verify(&payload.password, &user.password_hash)
        .map_err(|e| internal_error(e.into()))?;
    if !password_ok {
        return Err(bad_request(BAD_CREDENTIALS));
    }

    let token = state
        .users
        .create_token(user.id)
        .await
        .map_err(internal_error)?;
    Ok(Json(TokenLoginResponse {
        auth_token: token.key,
    }))
}

pub async fn token_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authenticate(&state, &headers).await?;
    // authenticate succeeded, so the header and token are present and valid
    let key = token_from_headers(&headers).unwrap_or_default();
    state
        .users
        .delete_token(key)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build one subscriptions entry: author profile plus a preview of their
/// recipes, truncated by `recipes_limit`.
async fn subscription_entry(
    state: &AppState,
    author: &User,
    recipes_limit: Option<usize>,
) -> Result<SubscriptionResponse, ApiError> {
    let recipes = state
        .recipes
        .recipes_by_author(&author.id)
        .await
        .map_err(internal_error)?;
    let recipes_count = recipes.len();

    let shown = match recipes_limit {
        Some(limit) => &recipes[..recipes.len().min(limit)],
        None => &recipes[..],
    };
    Ok(SubscriptionResponse {
        user: UserResponse::from_user(author, true),
        recipes: shown.iter().map(RecipeShort::from_recipe).collect(),
        recipes_count,
    })
}

pub async fn subscriptions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<SubscriptionResponse>>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let recipes_limit = pairs
        .iter()
        .find(|(k, _)| k == "recipes_limit")
        .and_then(|(_, v)| v.parse::<usize>().ok());

    let authors = state
        .users
        .subscriptions_of(&user.id)
        .await
        .map_err(internal_error)?;

    let mut results = Vec::with_capacity(authors.len());
    for author in &authors {
        results.push(subscription_entry(&state, author, recipes_limit).await?);
    }

    let params = PageParams::from_pairs(&pairs, state.config.page_size);
    Ok(Json(paginate(
        results,
        params,
        "/api/users/subscriptions/",
        &pairs,
    )))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), ApiError> {
    let user = authenticate(&state, &headers).await?;
    let author = state
        .users
        .get_user(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("User not found"))?;

    if author.id == user.id {
        return Err(bad_request("Users cannot subscribe to themselves"));
    }

    let created = state
        .users
        .add_follow(&user.id, &author.id)
        .await
        .map_err(internal_error)?;
    if !created {
        return Err((
            StatusCode::CONFLICT,
            "Already subscribed to this author".to_string(),
        ));
    }

    let entry = subscription_entry(&state, &author, None).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let author = state
        .users
        .get_user(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("User not found"))?;

    let removed = state
        .users
        .remove_follow(&user.id, &author.id)
        .await
        .map_err(internal_error)?;
    if !removed {
        return Err(not_found("Not subscribed to this author"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;

    fn signup(email: &str, username: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_a_client_error() {
        let state = test_state();
        create_user(State(state.clone()), Json(signup("a@b.c", "alice")))
            .await
            .unwrap();

        let (status, message) = create_user(State(state), Json(signup("x@y.z", "alice")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("Username"));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_client_error() {
        let state = test_state();
        create_user(State(state.clone()), Json(signup("a@b.c", "alice")))
            .await
            .unwrap();

        let (status, _) = create_user(State(state), Json(signup("a@b.c", "bob")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
