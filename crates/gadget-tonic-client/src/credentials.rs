//! Login, token caching, and refresh.
//!
//! [`CredentialAgent`] is the client-side half of the authentication
//! pipeline. It holds the current access token and its expiry behind an
//! async reader/writer lock: the hot path is a shared read of the cached
//! token, and only a call that finds the token absent or inside the refresh
//! margin takes the write lock and performs a login. The staleness check is
//! repeated under the write lock, so a burst of concurrent calls produces
//! at most one refresh and the rest reuse its result. A failed refresh
//! fails that call; there is no retry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gadget_tonic_core::proto::{LoginRequest, auth_client::AuthClient};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tonic::{Request, Status, metadata::AsciiMetadataValue, transport::Channel};

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Obtains and caches access tokens for one user, and attaches them to
/// outgoing calls.
pub struct CredentialAgent {
    auth: AuthClient<Channel>,
    username: String,
    password: String,
    refresh_margin: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl CredentialAgent {
    /// `refresh_margin` is how long before expiry a cached token is already
    /// treated as stale; it should comfortably exceed one round-trip.
    pub fn new(
        channel: Channel,
        username: impl Into<String>,
        password: impl Into<String>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            auth: AuthClient::new(channel),
            username: username.into(),
            password: password.into(),
            refresh_margin,
            cached: RwLock::new(None),
        }
    }

    /// Returns a token that is valid for at least the refresh margin,
    /// logging in first when necessary.
    pub async fn token(&self) -> Result<String, Status> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if !self.needs_refresh(cached) {
                return Ok(cached.token.clone());
            }
        }

        let mut slot = self.cached.write().await;

        // Another call may have refreshed while this one waited for the
        // write lock.
        if let Some(cached) = slot.as_ref() {
            if !self.needs_refresh(cached) {
                return Ok(cached.token.clone());
            }
        }

        let token = self.login().await?;
        let expires_at = decode_expiry(&token)?;
        tracing::debug!(%expires_at, "refreshed access token");

        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });

        Ok(token)
    }

    /// Wraps `message` in a request with the bearer token attached to its
    /// metadata, refreshing first if needed.
    pub async fn authenticated<T>(&self, message: T) -> Result<Request<T>, Status> {
        let token = self.token().await?;

        let value: AsciiMetadataValue = format!("Bearer {token}")
            .parse()
            .map_err(|_| Status::internal("access token is not valid metadata"))?;

        let mut request = Request::new(message);
        request.metadata_mut().insert("authorization", value);
        Ok(request)
    }

    fn needs_refresh(&self, cached: &CachedToken) -> bool {
        let margin = chrono::Duration::from_std(self.refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());

        Utc::now() + margin >= cached.expires_at
    }

    async fn login(&self) -> Result<String, Status> {
        let mut auth = self.auth.clone();

        let response = auth
            .login(LoginRequest {
                username: self.username.clone(),
                password: self.password.clone(),
            })
            .await?;

        Ok(response.into_inner().access_token)
    }
}

/// Reads the expiry claim without verifying the signature. The client only
/// uses it to schedule refreshes; the server remains the authority on
/// whether a token is actually valid.
fn decode_expiry(token: &str) -> Result<DateTime<Utc>, Status> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| Status::internal(format!("cannot decode access token: {e}")))?;

    DateTime::from_timestamp(data.claims.exp, 0)
        .ok_or_else(|| Status::internal("access token carries an invalid expiry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    #[test]
    fn expiry_is_read_from_the_token_itself() {
        let exp = Utc::now().timestamp() + 900;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: "admin1".to_string(),
                exp,
            },
            &EncodingKey::from_secret(b"whatever"),
        )
        .unwrap();

        let expires_at = decode_expiry(&token).unwrap();
        assert_eq!(expires_at.timestamp(), exp);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(decode_expiry("not-a-token").is_err());
    }
}
