use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use thodibaat_db::now_rfc3339;
use thodibaat_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest};

use crate::error::ApiError;
use crate::users::to_profile;
use crate::{AppState, run_blocking};

const DEFAULT_PRIVACY_SETTINGS: &str = r#"{"publicProfile":true,"showEmail":false}"#;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, email, password) = match (req.name, req.email, req.password) {
        (Some(n), Some(e), Some(p)) if !n.is_empty() && !e.is_empty() && !p.is_empty() => (n, e, p),
        _ => return Err(ApiError::BadRequest("Missing required fields".into())),
    };

    // Password hashing is CPU-bound, so it rides the blocking pool with the
    // database work.
    run_blocking(&state, move |state| {
        if state.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("User already exists".into()));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hash failed: {}", e))?
            .to_string();

        let user_id = Uuid::new_v4().to_string();
        state.db.create_user(
            &user_id,
            &name,
            &email,
            &password_hash,
            DEFAULT_PRIVACY_SETTINGS,
            &now_rfc3339(),
        )?;

        let user = state
            .db
            .get_user_by_id(&user_id)?
            .ok_or_else(|| anyhow::anyhow!("user vanished after insert"))?;

        let token = create_token(&state.jwt_secret, &user_id, &user.email, &user.role)?;

        Ok((
            StatusCode::CREATED,
            Json(AuthResponse {
                message: "User created successfully".into(),
                token,
                user: to_profile(user),
            }),
        ))
    })
    .await
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = match (req.email, req.password) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => return Err(ApiError::BadRequest("Missing email or password".into())),
    };

    run_blocking(&state, move |state| {
        let user = state
            .db
            .get_user_by_email(&email)?
            .ok_or(ApiError::Unauthorized)?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        let token = create_token(&state.jwt_secret, &user.id, &user.email, &user.role)?;

        Ok(Json(AuthResponse {
            message: "Login successful".into(),
            token,
            user: to_profile(user),
        }))
    })
    .await
}

fn create_token(secret: &str, user_id: &str, email: &str, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
