//! Credentials of local accounts.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use plaza_common::{AppError, AppResult};
use plaza_db::Database;
use plaza_db::entities::{account, user};
use tracing::info;
use validator::Validate;

use crate::api::PasswordChangeForm;

/// Password and email confirmation operations.
#[derive(Clone)]
pub struct UserProcessor {
    db: Arc<dyn Database>,
    min_password_length: usize,
}

impl UserProcessor {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, min_password_length: usize) -> Self {
        Self {
            db,
            min_password_length,
        }
    }

    async fn user_of(&self, account: &account::Model) -> AppResult<user::Model> {
        self.db
            .get_user_by_account_id(&account.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no user for account {}", account.id)))
    }

    /// Replace the password after checking the old one.
    pub async fn change_password(
        &self,
        account: &account::Model,
        form: PasswordChangeForm,
    ) -> AppResult<()> {
        form.validate()?;
        let mut user = self.user_of(account).await?;
        if !verify_password(&form.old_password, &user.encrypted_password)? {
            return Err(AppError::Unauthorized("old password was incorrect".to_string()));
        }
        if form.old_password == form.new_password {
            return Err(AppError::BadRequest(
                "new password cannot be the same as the old one".to_string(),
            ));
        }
        check_password_strength(&form.new_password, self.min_password_length)?;

        user.encrypted_password = hash_password(&form.new_password)?;
        self.db.update_user(user).await?;
        info!(account_id = %account.id, "Changed password");
        Ok(())
    }

    /// Confirm the email address of `account` with the token sent to it.
    pub async fn confirm_email(&self, account: &account::Model, token: &str) -> AppResult<()> {
        let mut user = self.user_of(account).await?;
        if user.confirmed_at.is_some() {
            return Ok(());
        }
        if user.confirmation_token.as_deref() != Some(token) {
            return Err(AppError::Unauthorized("invalid confirmation token".to_string()));
        }
        user.confirmed_at = Some(Utc::now().fixed_offset());
        user.confirmation_token = None;
        self.db.update_user(user).await?;
        info!(account_id = %account.id, "Confirmed email");
        Ok(())
    }
}

/// Reject passwords that are too short or use a single kind of character.
pub(crate) fn check_password_strength(password: &str, min_length: usize) -> AppResult<()> {
    let length = password.chars().count();
    if length < min_length {
        return Err(AppError::BadRequest(format!(
            "password should be at least {min_length} characters but was {length}"
        )));
    }
    let classes = [
        password.chars().any(char::is_lowercase),
        password.chars().any(char::is_uppercase),
        password.chars().any(char::is_numeric),
        password.chars().any(|c| !c.is_alphanumeric()),
    ];
    if classes.iter().filter(|c| **c).count() < 2 {
        return Err(AppError::BadRequest(
            "password is too weak, mix letters with digits, cases or symbols".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

pub(crate) fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
