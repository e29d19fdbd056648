//! Route protection for identity-provider sessions

use axum::{
    extract::{Request, State},
    http::header::{AUTHORIZATION, COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use plansync_billing::BillingUser;

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie the identity provider sets for same-site browser sessions
pub const SESSION_COOKIE: &str = "__session";

/// Paths reachable without a session
pub const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/auth/sign-in",
    "/auth/sign-up",
    "/api/webhook/stripe",
    "/api/webhook/clerk",
    "/health",
    "/health/live",
    "/health/ready",
];

pub fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.contains(&path)
}

/// Authenticated caller extracted from a verified session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl AuthUser {
    pub fn billing_user(&self) -> BillingUser {
        BillingUser {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

fn extract_token_from_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                cookie
                    .trim()
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(String::from)
            })
        })
}

/// Extract bearer token from Authorization header or the session cookie
/// Prefers Authorization header but falls back to cookie for browser navigation
fn extract_bearer_token(request: &Request) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    extract_token_from_cookie(request)
}

/// Global middleware: every non-public path needs a valid session
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_public_route(&path) {
        return next.run(request).await;
    }

    let Some(token) = extract_bearer_token(&request) else {
        tracing::debug!(path = %path, "require_session: no session token");
        return ApiError::Unauthorized.into_response();
    };

    match state.sessions.verify(&token) {
        Ok(claims) => {
            let auth_user = AuthUser {
                name: claims.display_name(),
                user_id: claims.sub,
                email: claims.email,
            };
            tracing::debug!(path = %path, user_id = %auth_user.user_id, "require_session: authenticated");
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "require_session: token rejected");
            ApiError::Unauthorized.into_response()
        }
    }
}
