use bcrypt::{hash, verify, DEFAULT_COST};
use crate::dtos::user::{RegisterRequest, UserResponse, LoginRequest, LoginResponse};
use crate::auth::jwt::sign_token;
use crate::error::AppError;
use axum::{extract::State, Json};
use sqlx::Row;
use crate::state::AppState;
use crate::middleware::auth::AuthContext;
use axum::extract::Extension;

// One message for unknown email and wrong password alike, so accounts
// cannot be enumerated.
const LOGIN_FAILED: &str = "Login failed. Check your credentials.";

pub async fn register_user(
    State(AppState { db_pool }): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, Json<UserResponse>), AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("Valid email required"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::validation("Password too short"));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("Hash error: {e}")))?;

    let row = sqlx::query(
        r#"INSERT INTO users (email, password_hash)
           VALUES ($1, $2)
           RETURNING id, email, created_at"#,
    )
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::conflict("Email already registered");
            }
        }
        AppError::db(e)
    })?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(UserResponse {
            id: row.get("id"),
            email: row.get("email"),
            is_admin: is_admin_email(&email),
            created_at: row.get("created_at"),
        }),
    ))
}

pub async fn login_user(
    State(AppState { db_pool }): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Email and password required"));
    }

    let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::unauthorized(LOGIN_FAILED))?;

    let password_hash: String = row.get("password_hash");
    let ok = verify(&payload.password, &password_hash)
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))?;

    if !ok {
        return Err(AppError::unauthorized(LOGIN_FAILED));
    }

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::internal("JWT secret not configured"))?;

    let user_id: i64 = row.get("id");
    let token = sign_token(user_id, &email, &secret)?;

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer",
        expires_in_seconds: 8 * 60 * 60,
    }))
}

pub async fn get_me(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let row = sqlx::query("SELECT id, email, created_at FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_one(&db_pool)
        .await?;

    Ok(Json(UserResponse {
        id: row.get("id"),
        email: row.get("email"),
        is_admin: auth.is_admin,
        created_at: row.get("created_at"),
    }))
}

fn is_admin_email(email: &str) -> bool {
    std::env::var("ADMIN_EMAIL")
        .map(|admin| email.eq_ignore_ascii_case(&admin))
        .unwrap_or(false)
}
