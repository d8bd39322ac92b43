use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RecipeShort;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: String,
        username: String,
        first_name: String,
        last_name: String,
        password_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            first_name,
            last_name,
            password_hash,
            is_admin: false,
            created_at: Utc::now(),
        }
    }
}

/// Server-side auth token, presented as `Authorization: Token <key>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub key: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(user_id: String) -> Self {
        Self {
            key: Uuid::new_v4().to_string(),
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// A follow edge: `user` is subscribed to `author`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub user_id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("email", &self.email),
            ("username", &self.username),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(format!("Field '{}' cannot be empty", field));
            }
        }
        if !self.email.contains('@') {
            return Err("Invalid email address".to_string());
        }
        Ok(())
    }
}

/// Public user representation; `is_subscribed` is relative to the viewer.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub email: String,
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenLoginResponse {
    pub auth_token: String,
}

/// Subscription entry: the followed author plus a preview of their recipes.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            email: "amelie@example.com".to_string(),
            username: "amelie".to_string(),
            first_name: "Amelie".to_string(),
            last_name: "Poulain".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[test]
    fn valid_signup_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn blank_username_rejected() {
        let mut req = request();
        req.username = "   ".to_string();
        let err = req.validate().unwrap_err();
        assert!(err.contains("username"));
    }

    #[test]
    fn email_without_at_rejected() {
        let mut req = request();
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());
    }
}
