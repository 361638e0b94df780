use axum::{response::{Response, IntoResponse}};
use axum::http::StatusCode;
use axum::middleware::Next;
use crate::auth::jwt::verify_token;
use serde::Serialize;

/// Authenticated caller, attached to the request by `require_auth`.
/// `is_admin` gates dashboard visibility only; all data stays scoped to
/// `user_id` regardless of role.
#[derive(Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Serialize)]
struct ErrorBody { error: String, code: &'static str }

use axum::http::Request;

pub async fn require_auth(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let auth_header = match req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok()) {
        Some(h) => h,
        None => return unauthorized("Missing Authorization header"),
    };

    // Expect "Bearer <token>"
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return unauthorized("Invalid Authorization format"),
    };

    let secret = match std::env::var("JWT_SECRET") {
        Ok(s) => s,
        Err(_) => return unauthorized("Server auth misconfiguration"),
    };

    let claims = match verify_token(token, &secret) {
        Ok(c) => c,
        Err(_) => return unauthorized("Invalid or expired token"),
    };

    let is_admin = std::env::var("ADMIN_EMAIL")
        .map(|admin| claims.email.eq_ignore_ascii_case(&admin))
        .unwrap_or(false);

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        email: claims.email,
        is_admin,
    });

    next.run(req).await
}

fn unauthorized(msg: &str) -> Response {
    let body = axum::Json(ErrorBody { error: msg.to_string(), code: "unauthorized" });
    (StatusCode::UNAUTHORIZED, body).into_response()
}
