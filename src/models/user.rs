//! User model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+$").unwrap_or_else(|e| panic!("invalid username pattern: {e}"))
});

/// User role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Usuario,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Usuario => "usuario",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "usuario" => Ok(UserRole::Usuario),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

// SQLx conversion for UserRole (stored as TEXT)
impl sqlx::Type<Postgres> for UserRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for UserRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for UserRole {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 100, message = "Username must be 3 to 100 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(max = 150, message = "Full name must be at most 150 characters"))]
    pub full_name: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    /// Only honored when admin self-registration is enabled
    pub role: Option<UserRole>,
}

impl RegisterUser {
    /// Derive validation plus the checks the derive cannot express.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        validate_username(&self.username)?;
        validate_password_strength(&self.password)?;
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ))
    }
}

/// A password needs at least one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Password must contain at least one letter and one digit".to_string(),
        ))
    }
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Admin role change
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    pub role: UserRole,
}

/// Admin activation toggle
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateActive {
    pub is_active: bool,
}

/// The caller of an operation, resolved from a validated token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub role: UserRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Owner of the resource or an admin
    pub fn require_owner_or_admin(&self, owner_id: i32) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Not allowed to access another user's resource".to_string(),
            ))
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Username
    pub sub: String,
    pub user_id: i32,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, expiration_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            exp: (now + chrono::Duration::minutes(expiration_minutes)).timestamp(),
            iat: now.timestamp(),
        }
    }

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

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin rights required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 7,
            username: "lector_1".to_string(),
            email: "lector@example.com".to_string(),
            full_name: None,
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_roundtrip_keeps_role() {
        let claims = UserClaims::new(&user(UserRole::Admin), 30);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.sub, "lector_1");
        assert_eq!(parsed.role, UserRole::Admin);
        assert!(parsed.require_admin().is_ok());
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let token = UserClaims::new(&user(UserRole::Usuario), 30)
            .create_token("secret")
            .unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = UserClaims::new(&user(UserRole::Usuario), -10)
            .create_token("secret")
            .unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_require_admin_forbids_regular_user() {
        let claims = UserClaims::new(&user(UserRole::Usuario), 30);
        assert!(matches!(claims.require_admin(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_owner_or_admin() {
        let reader = Actor { user_id: 1, role: UserRole::Usuario };
        let admin = Actor { user_id: 2, role: UserRole::Admin };
        assert!(reader.require_owner_or_admin(1).is_ok());
        assert!(reader.require_owner_or_admin(3).is_err());
        assert!(admin.require_owner_or_admin(3).is_ok());
    }

    #[test]
    fn test_registration_rules() {
        let mut req = RegisterUser {
            username: "ana_maria".to_string(),
            email: "ana@example.com".to_string(),
            full_name: Some("Ana María".to_string()),
            password: "secreto1".to_string(),
            role: None,
        };
        assert!(req.check().is_ok());

        req.password = "solotexto".to_string();
        assert!(req.check().is_err());

        req.password = "secreto1".to_string();
        req.username = "ana-maria".to_string();
        assert!(req.check().is_err());

        req.username = "ab".to_string();
        assert!(req.check().is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("librarian".parse::<UserRole>().is_err());
        assert_eq!(serde_json::to_string(&UserRole::Usuario).unwrap(), "\"usuario\"");
    }
}
