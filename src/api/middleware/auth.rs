//! Bearer token authentication for the admin routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{error::AppError, state::AppState};

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation key for hashing admin tokens before comparison.
const ADMIN_TOKEN_KEY: &[u8] = b"campaign-router/admin-token";

/// The configured admin token, kept only as a MAC so presented tokens are
/// compared in constant time.
#[derive(Clone)]
pub struct AdminToken {
    mac: HmacSha256,
    expected: Vec<u8>,
}

impl AdminToken {
    /// Returns `None` only if the MAC cannot be keyed, which HMAC never refuses.
    pub fn new(token: &str) -> Option<Self> {
        let mac = HmacSha256::new_from_slice(ADMIN_TOKEN_KEY).ok()?;
        let mut digest = mac.clone();
        digest.update(token.as_bytes());
        Some(Self {
            mac,
            expected: digest.finalize().into_bytes().to_vec(),
        })
    }

    pub fn verify(&self, presented: &str) -> bool {
        let mut mac = self.mac.clone();
        mac.update(presented.as_bytes());
        mac.verify_slice(&self.expected).is_ok()
    }
}

/// Authenticates requests using the admin bearer token.
///
/// # Header Format
///
/// ```text
/// Authorization: Bearer <ADMIN_TOKEN>
/// ```
///
/// # Errors
///
/// Returns `401 Unauthorized` if the header is missing, malformed or carries
/// the wrong token. The response includes `WWW-Authenticate: Bearer`.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let AuthBearer(token) = AuthBearer::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            AppError::unauthorized(
                "Unauthorized",
                serde_json::json!({"reason": "Authorization header is missing or invalid"}),
            )
        })?;

    if !st.admin_token.verify(&token) {
        tracing::warn!("Rejected admin request with invalid token");
        return Err(AppError::unauthorized(
            "Unauthorized",
            serde_json::json!({"reason": "Invalid token"}),
        ));
    }

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}
