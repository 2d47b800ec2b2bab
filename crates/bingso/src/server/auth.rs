//! Session cookies and the login gateway.
//!
//! A signed-in browser carries two signed cookies: `funeral_authenticated`
//! and `funeral_home_id`. Requests outside the public paths without both
//! are redirected to `/login`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::handlers::blocking;
use super::state::AppState;

/// Cookie set once the password is accepted.
pub const AUTH_COOKIE: &str = "funeral_authenticated";

/// Cookie holding the signed-in home id.
pub const HOME_COOKIE: &str = "funeral_home_id";

/// Where unauthenticated requests are sent.
pub const LOGIN_PATH: &str = "/login";

/// Paths served without a session, with everything below them.
pub const PUBLIC_PATHS: [&str; 4] = ["/login", "/api/auth", "/obituary", "/status-board"];

/// Health check, also open to the public.
pub const HEALTH_PATH: &str = "/health";

/// The signed-in home, added to request extensions by [`require_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Home id from the session cookie.
    pub home_id: String,
}

/// Whether `path` is open to the public.
#[must_use]
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|public| {
        path == *public
            || path
                .strip_prefix(public)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Gateway middleware: let public paths through, require a session elsewhere.
pub async fn require_session(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == HEALTH_PATH || is_public_path(path) {
        return next.run(request).await;
    }

    let authenticated = jar.get(AUTH_COOKIE).is_some_and(|c| c.value() == "true");
    let home_id = jar
        .get(HOME_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|id| state.config.auth.home(id).is_some());

    match home_id {
        Some(home_id) if authenticated => {
            request.extensions_mut().insert(Session { home_id });
            next.run(request).await
        }
        _ => Redirect::to(LOGIN_PATH).into_response(),
    }
}

/// Login form.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Home id.
    pub funeral_home_id: String,
    /// Password.
    pub password: String,
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// `POST /api/auth`: check the password and set the session cookies.
///
/// # Errors
///
/// Returns [`Error::Unauthorized`] for an unknown home or wrong password.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(form): Json<LoginRequest>,
) -> Result<(SignedCookieJar, Json<serde_json::Value>)> {
    let home_id = form.funeral_home_id.clone();
    let config = Arc::clone(&state.config);
    let account = blocking(move || {
        Ok(config
            .auth
            .home(&form.funeral_home_id)
            .filter(|account| account.verify_password(&form.password))
            .cloned())
    })
    .await?
    .ok_or_else(|| {
        warn!(home = %home_id, "Rejected login");
        Error::unauthorized("invalid funeral home id or password")
    })?;

    info!(home = %account.id, "Signed in");
    let jar = jar
        .add(session_cookie(AUTH_COOKIE, "true".to_string()))
        .add(session_cookie(HOME_COOKIE, account.id.clone()));
    Ok((
        jar,
        Json(json!({
            "status": "success",
            "funeral_home_id": account.id,
            "name": account.name,
        })),
    ))
}

/// `DELETE /api/auth`: clear the session cookies.
pub async fn logout(jar: SignedCookieJar) -> (SignedCookieJar, Json<serde_json::Value>) {
    let jar = jar
        .remove(Cookie::build(AUTH_COOKIE).path("/"))
        .remove(Cookie::build(HOME_COOKIE).path("/"));
    (jar, Json(json!({ "status": "success" })))
}

/// `GET /login`: tell clients how to sign in.
pub async fn login_page() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "login_required",
            "message": "POST funeral_home_id and password to /api/auth",
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/login"));
        assert!(is_public_path("/api/auth"));
        assert!(is_public_path("/obituary/abc"));
        assert!(is_public_path("/status-board"));
        assert!(is_public_path("/status-board/rotation"));

        assert!(!is_public_path("/"));
        assert!(!is_public_path("/obituary-admin"));
        assert!(!is_public_path("/api/authority"));
        assert!(!is_public_path("/api/rooms"));
    }
}
