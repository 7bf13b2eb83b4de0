//! Local identity provider: accounts, password hashing, bearer tokens and
//! Google sign-in.

use anyhow::{Context, Result, anyhow};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use moari_db::Database;
use moari_db::models::UserRow;
use moari_types::api::Claims;
use moari_types::models::display_name_or_local_part;

pub const MIN_PASSWORD_LEN: usize = 6;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("The email address is improperly formatted.")]
    InvalidEmail,
    #[error("The password must be a string with at least 6 characters.")]
    WeakPassword,
    #[error("The email address is already in use by another account.")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SignupError {
    /// Message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "유효하지 않은 이메일 형식입니다.",
            Self::WeakPassword => "비밀번호는 6자리 이상이어야 합니다.",
            Self::EmailTaken => "이미 사용 중인 이메일입니다.",
            Self::Other(_) => "계정 생성 오류",
        }
    }
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Create a password account. Returns the new uid.
pub fn register_user(
    db: &Database,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<String, SignupError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(SignupError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SignupError::WeakPassword);
    }
    if db.get_user_by_email(&email)?.is_some() {
        return Err(SignupError::EmailTaken);
    }

    let password_hash = hash_password(password)?;
    let uid = Uuid::new_v4().to_string();
    let display_name = display_name_or_local_part(display_name, &email);

    // A concurrent signup can win between the lookup and the insert.
    db.create_user(&uid, &email, &display_name, Some(&password_hash))
        .map_err(|e| {
            if moari_db::is_unique_violation(&e) {
                SignupError::EmailTaken
            } else {
                SignupError::Other(e)
            }
        })?;
    info!("Created account {} for {}", uid, email);
    Ok(uid)
}

/// Check an email/password pair. `None` covers unknown emails, wrong
/// passwords and Google-only accounts alike.
pub fn check_credentials(db: &Database, email: &str, password: &str) -> Result<Option<UserRow>> {
    let Some(user) = db.get_user_by_email(&normalize_email(email))? else {
        return Ok(None);
    };

    let verified = user
        .password
        .as_deref()
        .is_some_and(|hash| verify_password(hash, password));

    Ok(verified.then_some(user))
}

/// Find the account for a verified Google identity, creating it on first
/// sign-in.
pub fn sign_in_federated(db: &Database, identity: &GoogleIdentity) -> Result<UserRow> {
    let email = normalize_email(&identity.email);
    if let Some(user) = db.get_user_by_email(&email)? {
        debug!("Google subject {} signed in as {}", identity.subject, user.id);
        return Ok(user);
    }

    let uid = Uuid::new_v4().to_string();
    let display_name = display_name_or_local_part(identity.name.as_deref(), &email);
    db.create_user(&uid, &email, &display_name, None)?;
    info!(
        "Created Google account {} for {} (subject {})",
        uid, email, identity.subject
    );

    db.get_user_by_id(&uid)?
        .ok_or_else(|| anyhow!("Account {} vanished after insert", uid))
}

// -- Tokens --

pub fn issue_token(secret: &str, uid: &str, email: &str, ttl: chrono::Duration) -> Result<String> {
    let claims = Claims {
        sub: uid.to_string(),
        email: email.to_string(),
        exp: chrono::Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("Token lifetime out of range"))?
            .timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

// -- Google --

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

/// Verifies Google ID tokens through Google's `tokeninfo` endpoint.
#[derive(Clone)]
pub struct GoogleVerifier {
    client_id: String,
    tokeninfo_url: String,
    http: reqwest::Client,
}

impl GoogleVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_endpoint(client_id, GOOGLE_TOKENINFO_URL)
    }

    pub fn with_endpoint(client_id: impl Into<String>, tokeninfo_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tokeninfo_url: tokeninfo_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn verify(&self, id_token: &str) -> Result<GoogleIdentity> {
        let body = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("tokeninfo request failed")?
            .error_for_status()
            .context("Google rejected the ID token")?
            .text()
            .await?;

        let info: TokenInfo = serde_json::from_str(&body).context("Malformed tokeninfo response")?;
        self.check(info)
    }

    fn check(&self, info: TokenInfo) -> Result<GoogleIdentity> {
        if info.aud != self.client_id {
            return Err(anyhow!("ID token was issued for another client"));
        }

        let verified = match &info.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        };
        let email = info
            .email
            .filter(|_| verified)
            .ok_or_else(|| anyhow!("ID token carries no verified email"))?;

        Ok(GoogleIdentity {
            subject: info.sub,
            email,
            name: info.name,
        })
    }
}
