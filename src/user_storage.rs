use crate::user_models::{Follow, Token, User};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const USERS_FILE: &str = "users.json";
const TOKENS_FILE: &str = "tokens.json";
const FOLLOWS_FILE: &str = "follows.json";

/// Users, their auth tokens, and the follow graph. Uniqueness of email,
/// username, token key, and (user, author) pairs is enforced here while the
/// write lock is held.
pub struct UserStorage {
    dir: PathBuf,
    users: RwLock<Vec<User>>,
    tokens: RwLock<Vec<Token>>,
    follows: RwLock<Vec<Follow>>,
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

impl UserStorage {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        Ok(Self {
            dir: data_dir.to_path_buf(),
            users: RwLock::new(load_collection(&data_dir.join(USERS_FILE))?),
            tokens: RwLock::new(load_collection(&data_dir.join(TOKENS_FILE))?),
            follows: RwLock::new(load_collection(&data_dir.join(FOLLOWS_FILE))?),
        })
    }

    pub async fn create_user(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email == user.email) {
            bail!("Email already registered");
        }
        if users.iter().any(|u| u.username == user.username) {
            bail!("Username already taken");
        }

        users.push(user.clone());
        save_collection(&self.dir.join(USERS_FILE), &users)?;
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut all = users.clone();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    pub async fn set_password(&self, user_id: &str, password_hash: String) -> Result<()> {
        let mut users = self.users.write().await;

        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = password_hash;
            save_collection(&self.dir.join(USERS_FILE), &users)?;
            Ok(())
        } else {
            bail!("User not found");
        }
    }

    pub async fn create_token(&self, user_id: String) -> Result<Token> {
        let mut tokens = self.tokens.write().await;
        let token = Token::new(user_id);
        tokens.push(token.clone());
        save_collection(&self.dir.join(TOKENS_FILE), &tokens)?;
        Ok(token)
    }

    /// Revoke a token. Returns false when the key was not known.
    pub async fn delete_token(&self, key: &str) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|t| t.key != key);
        if tokens.len() == before {
            return Ok(false);
        }
        save_collection(&self.dir.join(TOKENS_FILE), &tokens)?;
        Ok(true)
    }

    pub async fn user_for_token(&self, key: &str) -> Result<Option<User>> {
        let user_id = {
            let tokens = self.tokens.read().await;
            match tokens.iter().find(|t| t.key == key) {
                Some(token) => token.user_id.clone(),
                None => return Ok(None),
            }
        };
        self.get_user(&user_id).await
    }

    /// Create a follow edge. Returns false when it already exists.
    pub async fn add_follow(&self, user_id: &str, author_id: &str) -> Result<bool> {
        if user_id == author_id {
            bail!("Users cannot subscribe to themselves");
        }
        let mut follows = self.follows.write().await;

        if follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
        {
            return Ok(false);
        }

        follows.push(Follow {
            user_id: user_id.to_string(),
            author_id: author_id.to_string(),
            created_at: Utc::now(),
        });
        save_collection(&self.dir.join(FOLLOWS_FILE), &follows)?;
        Ok(true)
    }

    /// Remove a follow edge. Returns false when there was none.
    pub async fn remove_follow(&self, user_id: &str, author_id: &str) -> Result<bool> {
        let mut follows = self.follows.write().await;
        let before = follows.len();
        follows.retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        if follows.len() == before {
            return Ok(false);
        }
        save_collection(&self.dir.join(FOLLOWS_FILE), &follows)?;
        Ok(true)
    }

    pub async fn is_following(&self, user_id: &str, author_id: &str) -> Result<bool> {
        let follows = self.follows.read().await;
        Ok(follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }

    /// Authors the user is subscribed to, in subscription order.
    pub async fn subscriptions_of(&self, user_id: &str) -> Result<Vec<User>> {
        let author_ids: Vec<String> = {
            let follows = self.follows.read().await;
            follows
                .iter()
                .filter(|f| f.user_id == user_id)
                .map(|f| f.author_id.clone())
                .collect()
        };

        let users = self.users.read().await;
        Ok(author_ids
            .iter()
            .filter_map(|id| users.iter().find(|u| &u.id == id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_storage() -> UserStorage {
        let dir = std::env::temp_dir().join(format!("foodgram-users-{}", Uuid::new_v4()));
        UserStorage::new(&dir).unwrap()
    }

    fn user(email: &str, username: &str) -> User {
        User::new(
            email.to_string(),
            username.to_string(),
            "First".to_string(),
            "Last".to_string(),
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let storage = test_storage();
        storage.create_user(user("a@b.c", "alice")).await.unwrap();
        let err = storage
            .create_user(user("a@b.c", "bob"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Email"));
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let storage = test_storage();
        storage.create_user(user("a@b.c", "alice")).await.unwrap();
        assert!(storage.create_user(user("x@y.z", "alice")).await.is_err());
    }

    #[tokio::test]
    async fn token_round_trip() {
        let storage = test_storage();
        let alice = storage.create_user(user("a@b.c", "alice")).await.unwrap();
        let token = storage.create_token(alice.id.clone()).await.unwrap();

        let found = storage.user_for_token(&token.key).await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);

        assert!(storage.delete_token(&token.key).await.unwrap());
        assert!(!storage.delete_token(&token.key).await.unwrap());
        assert!(storage.user_for_token(&token.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn follow_is_unique_per_pair() {
        let storage = test_storage();
        let alice = storage.create_user(user("a@b.c", "alice")).await.unwrap();
        let bob = storage.create_user(user("b@b.c", "bob")).await.unwrap();

        assert!(storage.add_follow(&alice.id, &bob.id).await.unwrap());
        assert!(!storage.add_follow(&alice.id, &bob.id).await.unwrap());

        let subs = storage.subscriptions_of(&alice.id).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, bob.id);

        assert!(storage.remove_follow(&alice.id, &bob.id).await.unwrap());
        assert!(!storage.remove_follow(&alice.id, &bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn self_follow_rejected() {
        let storage = test_storage();
        let alice = storage.create_user(user("a@b.c", "alice")).await.unwrap();
        assert!(storage.add_follow(&alice.id, &alice.id).await.is_err());
    }

    #[tokio::test]
    async fn users_survive_reload() {
        let dir = std::env::temp_dir().join(format!("foodgram-users-{}", Uuid::new_v4()));
        {
            let storage = UserStorage::new(&dir).unwrap();
            storage.create_user(user("a@b.c", "alice")).await.unwrap();
        }
        let storage = UserStorage::new(&dir).unwrap();
        let users = storage.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
    }
}
