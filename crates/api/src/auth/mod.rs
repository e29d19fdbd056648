//! Session authentication for Plansync

pub mod jwt;
pub mod middleware;

pub use jwt::{join_names, JwtError, SessionClaims, SessionVerifier};
pub use middleware::{is_public_route, require_session, AuthUser, PUBLIC_ROUTES, SESSION_COOKIE};
