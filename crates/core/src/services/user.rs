//! User service: accounts, credentials and session tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::{Validate, ValidationError};
use yatube_common::{AppError, AppResult, IdGenerator};
use yatube_db::{entities::user, repositories::UserRepository};

use crate::forms::{FormErrors, Submission};

/// Longest accepted username.
pub const USERNAME_MAX_LEN: u64 = 150;

const PASSWORD_TOO_SHORT: &str =
    "This password is too short. It must contain at least 8 characters.";
const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Registration form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignupInput {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[serde(default)]
    #[validate(custom(function = "valid_username"))]
    pub username: String,

    #[serde(default)]
    #[validate(custom(function = "optional_email"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password1: String,

    #[serde(default)]
    pub password2: String,
}

/// Login form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Password change form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChangeInput {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// An authenticated user and the token identifying their session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: user::Model,
    pub token: String,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Collect every problem with a registration form.
    pub async fn check_signup(&self, input: &SignupInput) -> AppResult<FormErrors> {
        let mut errors = FormErrors::new();
        if let Err(e) = input.validate() {
            errors.extend_from(&e);
        }

        if input.password1 != input.password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        }

        if !errors.has("username") && self.user_repo.username_taken(&input.username).await? {
            errors.add("username", "A user with that username already exists.");
        }

        Ok(errors)
    }

    /// Register a new user. The account starts with a session token.
    pub async fn signup(&self, input: SignupInput) -> AppResult<Submission<Session>> {
        let errors = self.check_signup(&input).await?;
        if !errors.is_empty() {
            return Ok(Submission::Rejected(errors));
        }

        let password_hash = hash_password(&input.password1)?;
        let token = self.id_gen.generate_token();

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            email: Set(input.email.trim().to_string()),
            password: Set(password_hash),
            token: Set(Some(token.clone())),
            reset_token: Set(None),
            reset_requested_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

        Ok(Submission::Accepted(Session { user, token }))
    }

    /// Check a username and password pair.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let matches = verify_password(password, &user.password).unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
            false
        });

        if !matches {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Resolve a session token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.user_repo.find_by_token(token).await
    }

    /// Log in with a form, returning the session token on success.
    pub async fn login(&self, input: &LoginInput) -> AppResult<Submission<Session>> {
        let mut errors = FormErrors::new();
        if input.username.trim().is_empty() {
            errors.add("username", "This field is required.");
        }
        if input.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        if !errors.is_empty() {
            return Ok(Submission::Rejected(errors));
        }

        let user = match self.authenticate(&input.username, &input.password).await {
            Ok(user) => user,
            Err(AppError::Unauthorized) => {
                tracing::debug!(username = %input.username, "Login rejected");
                errors.add(FormErrors::NON_FIELD, BAD_CREDENTIALS);
                return Ok(Submission::Rejected(errors));
            }
            Err(e) => return Err(e),
        };

        let session = match user.token.clone() {
            Some(token) => Session { user, token },
            None => self.issue_token(user).await?,
        };

        tracing::info!(user_id = %session.user.id, "User logged in");
        Ok(Submission::Accepted(session))
    }

    /// End every session of a user by rotating their token.
    pub async fn logout(&self, user: user::Model) -> AppResult<()> {
        let user_id = user.id.clone();
        self.issue_token(user).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    async fn issue_token(&self, user: user::Model) -> AppResult<Session> {
        let token = self.id_gen.generate_token();
        let mut active = user.into_active_model();
        active.token = Set(Some(token.clone()));
        let user = self.user_repo.update(active).await?;
        Ok(Session { user, token })
    }

    /// Collect every problem with a password change form.
    #[must_use]
    pub fn check_password_change(
        &self,
        user: &user::Model,
        input: &PasswordChangeInput,
    ) -> FormErrors {
        let mut errors = FormErrors::new();

        if !verify_password(&input.old_password, &user.password).unwrap_or(false) {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        check_new_password(&mut errors, &input.new_password1, &input.new_password2);

        errors
    }

    /// Change a user's password.
    ///
    /// Every other session ends: the token is rotated and the returned
    /// session carries the new one. A pending reset link stops working.
    pub async fn change_password(
        &self,
        user: user::Model,
        input: &PasswordChangeInput,
    ) -> AppResult<Submission<Session>> {
        let errors = self.check_password_change(&user, input);
        if !errors.is_empty() {
            return Ok(Submission::Rejected(errors));
        }

        let token = self.id_gen.generate_token();
        let mut active = user.into_active_model();
        active.password = Set(hash_password(&input.new_password1)?);
        active.token = Set(Some(token.clone()));
        active.reset_token = Set(None);
        active.reset_requested_at = Set(None);
        let user = self.user_repo.update(active).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(Submission::Accepted(Session { user, token }))
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_username(username).await
    }

    /// Delete a user with their posts, comments and follow edges.
    pub async fn delete_by_username(&self, username: &str) -> AppResult<user::Model> {
        let user = self.user_repo.get_by_username(username).await?;
        if !self.user_repo.delete(&user.id).await? {
            return Err(AppError::UserNotFound(username.to_string()));
        }

        tracing::info!(user_id = %user.id, username = %user.username, "User deleted");
        Ok(user)
    }
}

/// Letters, digits and `@.+-_` only.
fn valid_username(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required.".into());
        return Err(error);
    }

    let well_formed = value.chars().count() <= USERNAME_MAX_LEN as usize
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));

    if !well_formed {
        let mut error = ValidationError::new("username");
        error.message = Some(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        );
        return Err(error);
    }
    Ok(())
}

/// Empty, or a valid email address.
fn optional_email(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || validator::ValidateEmail::validate_email(&value.to_string()) {
        return Ok(());
    }
    let mut error = ValidationError::new("email");
    error.message = Some("Enter a valid email address.".into());
    Err(error)
}

/// Length and confirmation rules shared by every new-password form.
pub(crate) fn check_new_password(errors: &mut FormErrors, password1: &str, password2: &str) {
    if password1.chars().count() < 8 {
        errors.add("new_password1", PASSWORD_TOO_SHORT);
    }
    if password1 != password2 {
        errors.add("new_password2", PASSWORD_MISMATCH);
    }
}

/// Hash a password using Argon2.
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
