//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{user::UserClaims, NewUser, Role, User},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate user by email and password, returning a JWT token
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            tracing::warn!("Login failed for {}", email);
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        if user.blocked {
            tracing::warn!("Login refused for blocked user id={}", user.id);
            return Err(AppError::Authentication("Account is blocked".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        tracing::info!("User id={} logged in", user.id);
        Ok((token, user))
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.repository
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))
    }

    /// Every account that is not an administrator
    pub async fn list_readers(&self) -> AppResult<Vec<User>> {
        self.repository.users.list_where_role_not(Role::Admin).await
    }

    /// Block an active user or unblock a blocked one
    pub async fn toggle_block(&self, user_id: i32) -> AppResult<User> {
        let user = self.repository.users.toggle_blocked(user_id).await?;
        tracing::info!(
            "User id={} is now {}",
            user.id,
            if user.blocked { "blocked" } else { "active" }
        );
        Ok(user)
    }

    /// Create the configured administrator account if its email is unknown.
    /// Returns the account when one was created.
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<Option<User>> {
        let (email, password) = match (
            &self.config.bootstrap_admin_email,
            &self.config.bootstrap_admin_password,
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => return Ok(None),
        };

        if self.repository.users.find_by_email(email).await?.is_some() {
            return Ok(None);
        }

        let admin = self
            .create_user("Administrator", email, password, Role::Admin)
            .await?;
        tracing::info!("Created administrator account {}", admin.email);
        Ok(Some(admin))
    }

    /// Register an account with an already chosen role
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> AppResult<User> {
        let user = self
            .repository
            .users
            .insert(&NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password: self.hash_password(password)?,
                role,
            })
            .await?;
        tracing::info!("Created {} account id={}", user.role, user.id);
        Ok(user)
    }
}
