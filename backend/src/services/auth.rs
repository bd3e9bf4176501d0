//! Account and session service: sign-up, email verification, sign-in,
//! refresh token rotation, password reset and admin account management
//!
//! Every read-modify-write of a user record runs under that user's lock in
//! the shared [`LockRegistry`] and works on a copy reloaded after locking.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{validate_email, validate_password, validate_phone, AccountEmailKind, Role, User};
use uuid::Uuid;
use validator::Validate;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::external::Mailer;
use crate::services::locks::{LockRegistry, LockSet};
use crate::store::{Change, Store};
use crate::AppState;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    locks: LockRegistry,
    jwt: JwtConfig,
    site_url: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    /// Makes tokens minted in the same second distinct
    pub jti: String,
}

/// Sign-up request. Farmers must fill in every profile field.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub tel_number: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDetailsInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub tel_number: Option<String>,
}

/// Issued tokens. `refresh_token` is absent when a refresh was honoured
/// without rotation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Digest of a refresh token as stored on the user
pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

fn required_field(value: &Option<String>, field: &str) -> AppResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(AppError::validation(field, format!("{} is required", field))),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn token_is_live(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expiry.map_or(false, |at| at > now)
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            mailer: state.mailer.clone(),
            locks: state.locks.clone(),
            jwt: state.config.jwt.clone(),
            site_url: state.config.mail.site_url.clone(),
        }
    }

    async fn load_user(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Lock a user and load the record as it is once the lock is held
    async fn lock_user(&self, user_id: Uuid) -> AppResult<(LockSet, User)> {
        let lock = self.locks.lock(user_id).await;
        let user = self.load_user(user_id).await?;
        Ok((lock, user))
    }

    async fn load_user_by_email(&self, email: &str) -> AppResult<User> {
        self.store
            .find_user_by_email(&normalize_email(email)?)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    fn email_link(&self, site: Option<&str>, kind: AccountEmailKind, token: &str) -> String {
        let site = site.unwrap_or(&self.site_url).trim_end_matches('/');
        format!("{}/{}/{}", site, kind.link_path(), token)
    }

    /// Store a fresh one-hour email token on the user and mail the link
    async fn send_email_token(&self, user_id: Uuid, kind: AccountEmailKind, site: Option<&str>) -> AppResult<User> {
        let (lock, mut user) = self.lock_user(user_id).await?;
        let token = Uuid::new_v4().to_string();
        let expiry = Utc::now() + Duration::seconds(self.jwt.email_token_expiry);
        match kind {
            AccountEmailKind::Verify => {
                user.verify_token = Some(token.clone());
                user.verify_token_expiry = Some(expiry);
            }
            AccountEmailKind::Reset => {
                user.forgot_password_token = Some(token.clone());
                user.forgot_password_token_expiry = Some(expiry);
            }
        }
        user.updated_at = Utc::now();
        self.store.commit(Change::UpdateUser(user.clone()).into()).await?;
        drop(lock);

        let link = self.email_link(site, kind, &token);
        self.mailer.send_account_email(&user.email, kind, &link).await?;
        Ok(user)
    }

    // ========================================================================
    // Registration & verification
    // ========================================================================

    /// Register an account and send the verification email
    pub async fn sign_up(&self, input: SignUpInput) -> AppResult<User> {
        input.validate()?;
        if input.role == Role::Farmer {
            required_field(&input.first_name, "firstName")?;
            required_field(&input.last_name, "lastName")?;
            required_field(&input.farm_name, "farmName")?;
            required_field(&input.farm_location, "farmLocation")?;
            required_field(&input.tel_number, "telNumber")?;
        }
        if let Some(tel) = &input.tel_number {
            validate_phone(tel).map_err(|msg| AppError::validation("telNumber", msg))?;
        }

        let email = input.email.trim().to_lowercase();
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("email", "An account with this email already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: trimmed(input.first_name),
            last_name: trimmed(input.last_name),
            email,
            password_hash: hash_password(&input.password)?,
            farm_name: trimmed(input.farm_name),
            farm_location: trimmed(input.farm_location),
            tel_number: trimmed(input.tel_number),
            role: input.role,
            email_verified: false,
            admin_verified: false,
            refresh_token_hash: None,
            tokens_revoked_at: None,
            verify_token: None,
            verify_token_expiry: None,
            forgot_password_token: None,
            forgot_password_token_expiry: None,
            created_at: now,
            updated_at: now,
        };
        self.store.commit(Change::CreateUser(user.clone()).into()).await?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

        match self.send_email_token(user.id, AccountEmailKind::Verify, None).await {
            Ok(user) => Ok(user),
            Err(e) => {
                // account stays; the user can ask for the email again
                tracing::error!(user_id = %user.id, error = %e, "Verification email failed");
                Ok(user)
            }
        }
    }

    pub async fn resend_verification(&self, email: &str) -> AppResult<()> {
        let user = self.load_user_by_email(email).await?;
        if user.email_verified {
            return Err(AppError::validation("email", "Email is already verified"));
        }
        self.send_email_token(user.id, AccountEmailKind::Verify, None).await?;
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> AppResult<User> {
        let now = Utc::now();
        let invalid = || AppError::Unauthorized("Invalid or expired verification token".to_string());
        let found = self.store.find_user_by_verify_token(token).await?.ok_or_else(invalid)?;

        let _lock = self.locks.lock(found.id).await;
        let mut user = self
            .store
            .get_user(found.id)
            .await?
            .filter(|u| u.verify_token.as_deref() == Some(token))
            .filter(|u| token_is_live(u.verify_token_expiry, now))
            .ok_or_else(invalid)?;

        user.email_verified = true;
        user.verify_token = None;
        user.verify_token_expiry = None;
        user.updated_at = now;
        self.store.commit(Change::UpdateUser(user.clone()).into()).await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Authenticate with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<SignInResponse> {
        let user = self.load_user_by_email(email).await?;

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(user_id = %user.id, "Sign-in with wrong password");
            return Err(AppError::Unauthorized("Invalid email or password".to_string()));
        }
        if !user.email_verified {
            return Err(AppError::Unauthorized("Email address has not been verified".to_string()));
        }

        let (_lock, mut user) = self.lock_user(user.id).await?;
        let tokens = self.generate_tokens(&user)?;
        user.refresh_token_hash = tokens.refresh_token.as_deref().map(token_digest);
        user.updated_at = Utc::now();
        self.store.commit(Change::UpdateUser(user.clone()).into()).await?;

        tracing::info!(user_id = %user.id, "User signed in");
        Ok(SignInResponse { user, tokens })
    }

    /// Exchange a refresh token.
    ///
    /// The stored token is rotated. A token that verifies but is not the
    /// stored one lost a concurrent rotation: it still earns an access token,
    /// unless it was issued before the last sign-out or password reset.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let claims = self.decode(refresh_token, &self.jwt.refresh_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;
        let _lock = self.locks.lock(user_id).await;
        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        if user.refresh_token_hash.as_deref() == Some(token_digest(refresh_token).as_str()) {
            let tokens = self.generate_tokens(&user)?;
            user.refresh_token_hash = tokens.refresh_token.as_deref().map(token_digest);
            user.updated_at = Utc::now();
            self.store.commit(Change::UpdateUser(user).into()).await?;
            tracing::debug!(%user_id, "Refresh token rotated");
            return Ok(tokens);
        }

        let revoked = user
            .tokens_revoked_at
            .map_or(false, |at| claims.iat <= at.timestamp());
        if revoked {
            tracing::warn!(%user_id, "Revoked refresh token presented");
            return Err(AppError::Unauthorized("Refresh token has been revoked".to_string()));
        }

        tracing::debug!(%user_id, "Superseded refresh token honoured without rotation");
        let (access_token, expires_in) = self.access_token(&user)?;
        Ok(AuthTokens {
            access_token,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    /// End every session of the token's owner
    pub async fn sign_out(&self, refresh_token: &str) -> AppResult<()> {
        let claims = self.decode(refresh_token, &self.jwt.refresh_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;
        let (_lock, mut user) = self.lock_user(user_id).await?;

        user.refresh_token_hash = None;
        user.tokens_revoked_at = Some(Utc::now());
        user.updated_at = Utc::now();
        self.store.commit(Change::UpdateUser(user).into()).await?;

        tracing::info!(%user_id, "User signed out");
        Ok(())
    }

    // ========================================================================
    // Password reset
    // ========================================================================

    pub async fn forgot_password(&self, email: &str, site: Option<&str>) -> AppResult<()> {
        let user_id = self.load_user_by_email(email).await?.id;
        self.send_email_token(user_id, AccountEmailKind::Reset, site).await?;
        tracing::info!(%user_id, "Password reset requested");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> AppResult<()> {
        validate_password(password).map_err(|msg| AppError::validation("password", msg))?;

        let now = Utc::now();
        let invalid = || AppError::Unauthorized("Invalid or expired reset token".to_string());
        let found = self.store.find_user_by_reset_token(token).await?.ok_or_else(invalid)?;

        let _lock = self.locks.lock(found.id).await;
        let mut user = self
            .store
            .get_user(found.id)
            .await?
            .filter(|u| u.forgot_password_token.as_deref() == Some(token))
            .filter(|u| token_is_live(u.forgot_password_token_expiry, now))
            .ok_or_else(invalid)?;

        let same = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if same {
            return Err(AppError::validation(
                "password",
                "New password must be different from the current one",
            ));
        }

        user.password_hash = hash_password(password)?;
        user.forgot_password_token = None;
        user.forgot_password_token_expiry = None;
        user.refresh_token_hash = None;
        user.tokens_revoked_at = Some(now);
        user.updated_at = now;
        self.store.commit(Change::UpdateUser(user.clone()).into()).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    // ========================================================================
    // Profiles & administration
    // ========================================================================

    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        self.load_user(user_id).await
    }

    pub async fn edit_details(&self, user_id: Uuid, input: EditDetailsInput) -> AppResult<User> {
        let (_lock, mut user) = self.lock_user(user_id).await?;

        if let Some(tel) = &input.tel_number {
            validate_phone(tel).map_err(|msg| AppError::validation("telNumber", msg))?;
        }
        if let Some(v) = trimmed(input.first_name) {
            user.first_name = Some(v);
        }
        if let Some(v) = trimmed(input.last_name) {
            user.last_name = Some(v);
        }
        if let Some(v) = trimmed(input.farm_name) {
            user.farm_name = Some(v);
        }
        if let Some(v) = trimmed(input.farm_location) {
            user.farm_location = Some(v);
        }
        if let Some(v) = trimmed(input.tel_number) {
            user.tel_number = Some(v);
        }
        user.updated_at = Utc::now();
        self.store.commit(Change::UpdateUser(user.clone()).into()).await?;

        tracing::info!(%user_id, "User details updated");
        Ok(user)
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn admin_verify(&self, user_id: Uuid) -> AppResult<User> {
        let (_lock, mut user) = self.lock_user(user_id).await?;
        user.admin_verified = true;
        user.updated_at = Utc::now();
        self.store.commit(Change::UpdateUser(user.clone()).into()).await?;
        tracing::info!(%user_id, "User verified by admin");
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        let (_lock, _) = self.lock_user(user_id).await?;
        self.store.commit(Change::DeleteUser(user_id).into()).await?;
        tracing::info!(%user_id, "User deleted");
        Ok(())
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    fn claims(&self, user: &User, lifetime: i64) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: (now + Duration::seconds(lifetime)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    fn sign(&self, claims: &Claims, secret: &str) -> AppResult<String> {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn access_token(&self, user: &User) -> AppResult<(String, i64)> {
        let claims = self.claims(user, self.jwt.access_token_expiry);
        Ok((self.sign(&claims, &self.jwt.access_secret)?, self.jwt.access_token_expiry))
    }

    fn generate_tokens(&self, user: &User) -> AppResult<AuthTokens> {
        let (access_token, expires_in) = self.access_token(user)?;
        let refresh_claims = self.claims(user, self.jwt.refresh_token_expiry);
        let refresh_token = self.sign(&refresh_claims, &self.jwt.refresh_secret)?;
        Ok(AuthTokens {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    fn decode(&self, token: &str, secret: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }

    /// Validate an access token
    pub fn validate_access_token(&self, token: &str) -> AppResult<Claims> {
        self.decode(token, &self.jwt.access_secret)
    }
}

/// Check an email address before it is looked up
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    validate_email(&email).map_err(|msg| AppError::validation("email", msg))?;
    Ok(email)
}
