use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use segora_db::Database;
use segora_gateway::Dispatcher;
use segora_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, SessionUser};

use crate::error::{ApiError, blocking};
use crate::images::ImageStore;

/// Session tokens are valid for 30 days.
const TOKEN_LIFETIME_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 8;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub images: ImageStore,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        return Err(ApiError::validation("a valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }

    let db = state.clone();
    let lookup = email.clone();
    if blocking(move || db.db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let full_name = non_empty(req.full_name);
    let campus = non_empty(req.campus);

    let db = state.clone();
    let (uid, mail) = (user_id.to_string(), email.clone());
    let created = blocking(move || {
        db.db.create_user(
            &uid,
            &mail,
            &password_hash,
            full_name.as_deref(),
            campus.as_deref(),
        )
    })
    .await?;
    // A concurrent registration can win the race after the lookup above.
    if !created {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    info!("Registered user {}", user_id);

    let token = create_token(&state.jwt_secret, user_id, &email)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            email,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let db = state.clone();
    let user = blocking(move || db.db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash is unreadable: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.email)?;
    Ok(Json(AuthResponse {
        user_id,
        email: user.email,
        token,
    }))
}

/// The signed-in user with the profile facts clients key off (`campus`, `is_seller`).
pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SessionUser>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let profile = blocking(move || db.db.get_profile(&uid)).await?;

    let mut metadata = HashMap::new();
    if let Some(profile) = profile {
        if let Some(campus) = profile.campus {
            metadata.insert("campus".to_string(), campus.into());
        }
        if let Some(full_name) = profile.full_name {
            metadata.insert("full_name".to_string(), full_name.into());
        }
        metadata.insert("is_seller".to_string(), profile.is_seller.into());
    }

    Ok(Json(SessionUser {
        id: claims.sub,
        email: claims.email,
        metadata,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(looks_like_email("budi@kampus.ac.id"));
        assert!(!looks_like_email("budi"));
        assert!(!looks_like_email("@kampus.ac.id"));
        assert!(!looks_like_email("budi@localhost"));
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" untirta ".into())), Some("untirta".into()));
        assert_eq!(non_empty(None), None);
    }
}
