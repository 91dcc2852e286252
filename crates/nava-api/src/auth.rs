use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nava_db::models::UserRow;
use nava_db::{Database, is_unique_violation, to_db_time};
use nava_feed::{ApprovalMatch, Reconciler};
use nava_types::api::{
    AckResponse, Claims, ForgotPasswordRequest, LoginRequest, LoginResponse, SignupRequest,
    SignupResponse, UpdatePasswordRequest,
};
use nava_types::models::Role;
use nava_types::phone::{phone_key, short_code};

use crate::error::{ApiError, run_blocking};
use crate::notify::SmsSender;
use crate::users::profile;

/// Unambiguous characters for generated passwords (no 0/O, 1/l/I).
const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";
const PASSWORD_LEN: usize = 8;
const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_TTL_DAYS: i64 = 1;
const CODE_ATTEMPTS: usize = 3;
const MAX_CODE_SUFFIX: usize = 1000;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub feed: Arc<Reconciler>,
    pub sms: Arc<dyn SmsSender>,
    pub jwt_secret: String,
    /// Shared secret the WhatsApp webhook must present. Ingestion is
    /// refused while unset.
    pub ingest_key: Option<String>,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        approval: ApprovalMatch,
        sms: Arc<dyn SmsSender>,
        jwt_secret: String,
        ingest_key: Option<String>,
    ) -> AppState {
        let feed = Arc::new(Reconciler::new(db.clone(), approval));
        Arc::new(Self { db, feed, sms, jwt_secret, ingest_key })
    }
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let phone_number = req.phone_number.trim().to_string();
    if phone_number.is_empty() {
        return Err(ApiError::Validation("Phone number is required".into()));
    }

    let password = generate_password();
    let user_id = Uuid::new_v4();

    let row = {
        let password = password.clone();
        let phone_number = phone_number.clone();
        let db = state.db.clone();
        run_blocking(move || {
            if db.get_user_by_phone(&phone_number)?.is_some() {
                return Err(ApiError::Conflict("User already exists".into()));
            }

            let now = to_db_time(Utc::now());
            let mut row = UserRow {
                id: user_id.to_string(),
                phone_key: phone_key(&phone_number),
                code: short_code(&phone_number).to_lowercase(),
                phone_number,
                name: req.name,
                age: req.age,
                photo: req.photo,
                profession: req.profession,
                resident: req.resident,
                social_media_influencer: req.social_media_influencer,
                influencer_platforms: serde_json::to_string(&req.influencer_platforms)
                    .map_err(anyhow::Error::from)?,
                password: hash_password(&password)?,
                referral_code: req.referral_code,
                role: Role::User.as_str().to_string(),
                social_media_links: serde_json::to_string(&req.social_media_links)
                    .map_err(anyhow::Error::from)?,
                created_at: now.clone(),
                updated_at: now,
            };
            insert_with_free_code(&db, &mut row)?;
            Ok(row)
        })
        .await?
    };
    info!("User {} registered ({})", user_id, row.code);

    let message = format!("Welcome to Nava Dharavi! Your login password is: {}", password);
    if let Err(e) = state.sms.send(&phone_number, &message).await {
        warn!("Signup SMS for user {} failed: {}", user_id, e);
    }

    let token = create_token(&state.jwt_secret, user_id, &row.phone_number, Role::User)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User registered successfully".into(),
            token,
            code: row.code,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    let phone_number = req.phone_number.trim().to_string();
    if phone_number.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Phone number and password are required".into()));
    }

    let db = state.db.clone();
    let row = run_blocking(move || {
        let row = db
            .get_user_by_phone(&phone_number)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        verify_password(&req.password, &row.password)?;
        Ok(row)
    })
    .await?;

    let user = profile(row);
    let token = create_token(&state.jwt_secret, user.id, &user.phone_number, user.role)?;
    info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user,
    }))
}

/// Issues a fresh password and texts it to the user.
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(req) = payload?;
    let phone_number = req.phone_number.trim().to_string();
    if phone_number.is_empty() {
        return Err(ApiError::Validation("Phone number is required".into()));
    }

    let password = generate_password();
    let db = state.db.clone();
    let user_id = {
        let password = password.clone();
        let phone_number = phone_number.clone();
        run_blocking(move || {
            let row = db
                .get_user_by_phone(&phone_number)?
                .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
            let hash = hash_password(&password)?;
            db.set_user_password(&row.id, &hash, &to_db_time(Utc::now()))?;
            Ok(row.id)
        })
        .await?
    };
    info!("Password reset for user {}", user_id);

    let message = format!("Your new Nava Dharavi password is: {}", password);
    if let Err(e) = state.sms.send(&phone_number, &message).await {
        warn!("Password reset SMS for user {} failed: {}", user_id, e);
    }

    Ok(Json(AckResponse::new("A new password has been sent to your phone")))
}

pub async fn update_password(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(req) = payload?;
    let phone_number = req.phone_number.trim().to_string();
    if phone_number.is_empty() || req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::Validation(
            "Phone number, old password and new password are required".into(),
        ));
    }
    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "New password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let db = state.db.clone();
    let user_id = run_blocking(move || {
        let row = db
            .get_user_by_phone(&phone_number)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        verify_password(&req.old_password, &row.password)?;
        let hash = hash_password(&req.new_password)?;
        db.set_user_password(&row.id, &hash, &to_db_time(Utc::now()))?;
        Ok(row.id)
    })
    .await?;
    info!("Password updated for user {}", user_id);

    Ok(Json(AckResponse::new("Password updated successfully")))
}

/// Inserts `row`, moving its code to the first free variant when another
/// number already holds it. Numbers sharing their last six digits share a
/// base code, so the later signup gets `<base>-2`, `<base>-3` and so on.
fn insert_with_free_code(db: &Database, row: &mut UserRow) -> Result<(), ApiError> {
    let base = row.code.clone();

    for attempt in 0..CODE_ATTEMPTS {
        let mut suffix = 1;
        while db.code_taken(&row.code)? {
            suffix += 1;
            if suffix > MAX_CODE_SUFFIX {
                return Err(ApiError::Internal(anyhow::anyhow!("no free code left for {}", base)));
            }
            row.code = format!("{}-{}", base, suffix);
        }

        match db.create_user(row) {
            Ok(()) => return Ok(()),
            Err(e) if is_unique_violation(&e) => {
                // Lost a race: either the number or the code was taken since
                // the checks above.
                if db.get_user_by_phone(&row.phone_number)?.is_some() {
                    return Err(ApiError::Conflict("User already exists".into()));
                }
                debug!("Code {} taken during signup, retry {}", row.code, attempt + 1);
            }
            Err(e) => return Err(ApiError::Internal(e)),
        }
    }

    Err(ApiError::Internal(anyhow::anyhow!("could not allocate a code for {}", base)))
}

fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LEN)
        .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

/// Argon2id with a random salt.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored password hash unreadable: {}", e)))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".into()))
}

fn create_token(secret: &str, user_id: Uuid, phone_number: &str, role: Role) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        phone_number: phone_number.to_string(),
        role,
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_avoid_ambiguous_characters() {
        for _ in 0..50 {
            let password = generate_password();
            assert_eq!(password.len(), PASSWORD_LEN);
            assert!(!password.contains(['0', 'O', '1', 'l', 'I']));
        }
    }

    #[test]
    fn hash_verifies_only_the_original() {
        let hash = hash_password("s3cret!").unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(verify_password("s3cret!", &hash).is_ok());
        assert!(matches!(verify_password("wrong", &hash), Err(ApiError::Unauthorized(_))));
    }
}
