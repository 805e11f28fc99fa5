//! User model, roles and token claims

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use crate::error::AppError;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Librarian,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Librarian => "LIBRARIAN",
            Role::Reader => "READER",
        }
    }

    /// Librarian view: every subscription instead of the reader's own
    pub fn can_view_all_subscriptions(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }

    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }

    pub fn can_approve_loans(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "LIBRARIAN" => Ok(Role::Librarian),
            "READER" => Ok(Role::Reader),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// Stored as text; any string column type decodes
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    /// Accumulated fine over all loans
    pub fine: i64,
    pub blocked: bool,
}

/// A user that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Email of the user, used as the borrower identity
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_manage_catalog(&self) -> Result<(), AppError> {
        if self.role.can_manage_catalog() {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to edit the catalog".to_string()))
        }
    }

    pub fn require_approve_loans(&self) -> Result<(), AppError> {
        if self.role.can_approve_loans() {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to approve subscriptions".to_string()))
        }
    }

    pub fn require_manage_users(&self) -> Result<(), AppError> {
        if self.role.can_manage_users() {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to manage users".to_string()))
        }
    }
}
