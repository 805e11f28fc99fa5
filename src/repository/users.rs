//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{NewUser, Role, User},
};

use super::{conflict_on_unique, UserDirectory};

const USER_COLUMNS: &str = "id, name, email, password, role, fine, blocked";

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UsersRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password, role, fine, blocked)
            VALUES ($1, $2, $3, $4, 0, FALSE)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Email {} is already registered", user.email)))
    }

    async fn toggle_blocked(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET blocked = NOT blocked WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn list_where_role_not(&self, role: Role) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE role <> $1 ORDER BY name, id",
            USER_COLUMNS
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
