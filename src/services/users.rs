//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterUser, TokenResponse, User, UserClaims, UserRole},
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

    /// Create an account. The requested role is honored only when admin
    /// self-registration is enabled.
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.check()?;

        if self
            .repository
            .users
            .username_or_email_taken(&request.username, &request.email)
            .await?
        {
            return Err(AppError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }

        let role = match request.role {
            Some(UserRole::Admin) if self.config.open_admin_registration => UserRole::Admin,
            Some(UserRole::Admin) => {
                tracing::warn!("Ignoring admin role requested at registration by {}", request.username);
                UserRole::Usuario
            }
            _ => UserRole::Usuario,
        };

        let password_hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(
                &request.username,
                &request.email,
                request.full_name.as_deref(),
                &password_hash,
                role,
            )
            .await?;

        tracing::info!("User registered: {} ({})", user.username, user.role);
        Ok(user)
    }

    /// Authenticate user by username and return a bearer token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<TokenResponse> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&user.password_hash, password)? {
            tracing::warn!("Failed login attempt for {}", username);
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let token = UserClaims::new(&user, self.config.jwt_expiration_minutes)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!("User logged in: {}", user.username);
        Ok(TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        })
    }

    /// Resolve the account behind a validated token; disabled accounts are refused
    pub async fn current_user(&self, claims: &UserClaims) -> AppResult<User> {
        let user = self
            .repository
            .users
            .get_by_id(claims.user_id)
            .await
            .map_err(token_user_error)?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        Ok(user)
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    pub async fn update_role(&self, id: i32, role: UserRole) -> AppResult<User> {
        let user = self.repository.users.update_role(id, role).await?;
        tracing::info!("Role of user {} set to {}", user.username, role);
        Ok(user)
    }

    pub async fn update_active(&self, id: i32, is_active: bool) -> AppResult<User> {
        let user = self.repository.users.update_active(id, is_active).await?;
        tracing::info!("User {} active = {}", user.username, is_active);
        Ok(user)
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// A token whose user row is gone no longer authenticates; store failures
/// stay store failures.
fn token_user_error(error: AppError) -> AppError {
    match error {
        AppError::NotFound(_) => AppError::Authentication("User no longer exists".to_string()),
        other => other,
    }
}
