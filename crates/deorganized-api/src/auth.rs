use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use deorganized_db::Database;
use deorganized_db::models::UserRow;
use deorganized_db::queries::NewUser;
use deorganized_types::api::{
    AccessResponse, AuthResponse, Claims, CompleteSetupRequest, LoginRequest, RefreshRequest,
    RegisterRequest, TokenKind, TokenPair, VerifyRequest, WalletCheckRequest, WalletCheckResponse,
};
use deorganized_types::validation::{
    BIO_MAX, FieldErrors, PASSWORD_MIN, check_email, check_max_len, check_url, check_username,
    check_wallet_address, check_wallet_prefix,
};

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AuthConfig {
    /// One-hour access tokens and 30-day refresh tokens.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(30),
        }
    }
}

// -- Password registration --

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut errors = FieldErrors::default();
    if let Err(msg) = check_username(&req.username) {
        errors.add("username", msg);
    }
    if let Err(msg) = check_email(&req.email) {
        errors.add("email", msg);
    }
    if req.password.chars().count() < PASSWORD_MIN {
        errors.add("password", format!("Ensure this field has at least {PASSWORD_MIN} characters."));
    }
    if req.password != req.password2 {
        errors.add("password", "Passwords must match.");
    }
    errors.into_result()?;

    // Hash password with Argon2id
    let password_hash = hash_password(&req.password)?;

    let config = state.auth.clone();
    blocking(&state, move |db| {
        if db.username_taken(&req.username, None)? {
            return Err(ApiError::field("username", "A user with that username already exists."));
        }

        let user = db.create_user(&NewUser {
            username: req.username,
            email: Some(req.email),
            password_hash: Some(password_hash),
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            role: req.role,
            ..NewUser::default()
        })?;
        info!("Registered user {}", user.username);

        let tokens = issue_tokens(&config, &user)?;
        Ok((
            StatusCode::CREATED,
            Json(AuthResponse {
                user: views::user_response(db, user)?,
                tokens,
            }),
        ))
    })
    .await
}

/// Password login; `username` may also be the account's email.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let config = state.auth.clone();
    blocking(&state, move |db| {
        let user = db.get_user_by_login(&req.username)?.ok_or(ApiError::Unauthorized)?;

        // Wallet-only accounts have no usable password
        let hash = user.password.as_deref().ok_or(ApiError::Unauthorized)?;
        if !verify_password(hash, &req.password) {
            return Err(ApiError::Unauthorized);
        }

        let tokens = issue_tokens(&config, &user)?;
        Ok(Json(AuthResponse {
            user: views::user_response(db, user)?,
            tokens,
        }))
    })
    .await
}

// -- Wallet sign-in --

pub async fn wallet_login_or_check(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WalletCheckRequest>,
) -> ApiResult<Json<WalletCheckResponse>> {
    check_wallet_address(&req.wallet_address).map_err(|msg| ApiError::field("wallet_address", msg))?;

    let config = state.auth.clone();
    blocking(&state, move |db| {
        let Some(user) = db.get_user_by_wallet(&req.wallet_address)? else {
            info!("New wallet detected: {}", req.wallet_address);
            return Ok(Json(WalletCheckResponse {
                is_new: true,
                user: None,
                tokens: None,
            }));
        };

        let tokens = issue_tokens(&config, &user)?;
        Ok(Json(WalletCheckResponse {
            is_new: false,
            user: Some(views::user_response(db, user)?),
            tokens: Some(tokens),
        }))
    })
    .await
}

/// Create the account for a wallet seen by `wallet_login_or_check`.
pub async fn complete_setup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CompleteSetupRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut errors = FieldErrors::default();
    if let Err(msg) = check_wallet_prefix(&req.wallet_address) {
        errors.add("wallet_address", msg);
    }
    let username = req.username.clone().filter(|u| !u.is_empty());
    if let Some(name) = &username {
        if let Err(msg) = check_username(name) {
            errors.add("username", msg);
        }
    }
    check_max_len(&mut errors, "bio", req.bio.as_deref().unwrap_or_default(), BIO_MAX);
    for (field, value) in [("website", &req.website), ("youtube", &req.youtube)] {
        if let Some(url) = value.as_deref().filter(|u| !u.is_empty()) {
            if let Err(msg) = check_url(url) {
                errors.add(field, msg);
            }
        }
    }
    errors.into_result()?;

    let config = state.auth.clone();
    blocking(&state, move |db| {
        if db.wallet_exists(&req.wallet_address)? {
            warn!("Duplicate registration attempt for wallet: {}", req.wallet_address);
            return Err(ApiError::bad_request("Wallet address already registered"));
        }

        let username = match username {
            Some(name) if db.username_taken(&name, None)? => {
                return Err(ApiError::field("username", "This username is already taken"));
            }
            Some(name) => name,
            None => generate_username(db, &req.wallet_address)?,
        };

        let new_user = NewUser {
            username,
            wallet_address: Some(req.wallet_address),
            display_name: req.display_name.filter(|d| !d.is_empty()),
            role: req.role,
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            bio: req.bio.unwrap_or_default(),
            website: req.website.unwrap_or_default(),
            twitter: req.twitter.unwrap_or_default(),
            instagram: req.instagram.unwrap_or_default(),
            youtube: req.youtube.unwrap_or_default(),
            ..NewUser::default()
        };

        // A concurrent signup for the same wallet or name loses at commit
        let user = db.create_wallet_user(&new_user).map_err(|e| {
            if deorganized_db::is_constraint_violation(&e) {
                ApiError::bad_request("Wallet address or username already registered")
            } else {
                ApiError::Internal(e)
            }
        })?;
        info!("Wallet user {} created", user.username);

        let tokens = issue_tokens(&config, &user)?;
        Ok((
            StatusCode::CREATED,
            Json(AuthResponse {
                user: views::user_response(db, user)?,
                tokens,
            }),
        ))
    })
    .await
}

/// `user_<first 8 chars of wallet>`, then `_1` to `_9`, then a random suffix.
fn generate_username(db: &Database, wallet_address: &str) -> anyhow::Result<String> {
    let prefix: String = wallet_address.chars().take(8).collect();
    let base = format!("user_{prefix}");

    if !db.username_taken(&base, None)? {
        return Ok(base);
    }
    for counter in 1..10 {
        let candidate = format!("{base}_{counter}");
        if !db.username_taken(&candidate, None)? {
            return Ok(candidate);
        }
    }
    Ok(format!("user_{:08x}", rand::random::<u32>()))
}

// -- Tokens --

pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<AccessResponse>> {
    let claims = decode_token(&state.auth.jwt_secret, &req.refresh)?;
    if claims.kind != TokenKind::Refresh {
        return Err(ApiError::Unauthorized);
    }

    let config = state.auth.clone();
    blocking(&state, move |db| {
        let user = db.get_user_by_id(claims.sub)?.ok_or(ApiError::Unauthorized)?;
        let access = create_token(&config, user.id, &user.username, TokenKind::Access)?;
        Ok(Json(AccessResponse { access }))
    })
    .await
}

pub async fn verify_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    decode_token(&state.auth.jwt_secret, &req.token)?;
    Ok(Json(serde_json::json!({})))
}

pub fn issue_tokens(config: &AuthConfig, user: &UserRow) -> anyhow::Result<TokenPair> {
    Ok(TokenPair {
        access: create_token(config, user.id, &user.username, TokenKind::Access)?,
        refresh: create_token(config, user.id, &user.username, TokenKind::Refresh)?,
    })
}

pub fn create_token(
    config: &AuthConfig,
    user_id: Uuid,
    username: &str,
    kind: TokenKind,
) -> anyhow::Result<String> {
    let ttl = match kind {
        TokenKind::Access => config.access_ttl,
        TokenKind::Refresh => config.refresh_ttl,
    };
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        kind,
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate signature and expiry. Any failure is a 401.
pub fn decode_token(secret: &str, token: &str) -> ApiResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
