//! Issuing and verification of access tokens.
//!
//! Tokens are HS256 JWTs carrying {sub, role, iat, exp}. Verification uses
//! zero leeway so expiry behaves deterministically: the instant `exp`
//! passes, the token is rejected. An expired token and a tampered token are
//! reported as distinct errors even though both map to `UNAUTHENTICATED` on
//! the wire.

use std::time::Duration;

use chrono::Utc;
use gadget_tonic_core::{Error, Result};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::server::store::User;

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject: the username the token was issued to.
    pub sub: String,
    /// Role used by the gateway's per-method allow-list.
    pub role: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Issues and verifies access tokens with a shared symmetric secret.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Signs a token for `user`, expiring after the configured TTL.
    pub fn generate(&self, user: &User) -> Result<String> {
        if user.username.is_empty() || user.role.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).map_err(|e| Error::TokenIssue {
            context: format!("token TTL out of range: {e}"),
        })?;

        let claims = UserClaims {
            sub: user.username.clone(),
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            Error::TokenIssue {
                context: e.to_string(),
            }
        })
    }

    /// Verifies signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<UserClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<UserClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::TokenExpired,
                ErrorKind::InvalidSignature => Error::InvalidSignature,
                _ => Error::Unauthenticated {
                    reason: format!("invalid access token: {e}"),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gadget_tonic_core::types::ROLE_ADMIN;

    fn manager() -> TokenManager {
        TokenManager::new("test-secret", Duration::from_secs(900))
    }

    fn admin() -> User {
        User::new("admin1", "secret", ROLE_ADMIN).unwrap()
    }

    #[test]
    fn generated_token_verifies_with_original_claims() {
        let manager = manager();
        let token = manager.generate(&admin()).unwrap();

        let claims = manager.verify(&token).unwrap();
        assert_eq!(claims.sub, "admin1");
        assert_eq!(claims.role, ROLE_ADMIN);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let manager = manager();

        let now = Utc::now().timestamp();
        let stale = UserClaims {
            sub: "admin1".to_string(),
            role: ROLE_ADMIN.to_string(),
            iat: now - 1000,
            exp: now - 100,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            manager.verify(&token).unwrap_err(),
            Error::TokenExpired
        ));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let manager = manager();
        let token = manager.generate(&admin()).unwrap();

        let mut tampered = token;
        let last = if tampered.ends_with('A') { 'B' } else { 'A' };
        tampered.pop();
        tampered.push(last);

        assert!(matches!(
            manager.verify(&tampered).unwrap_err(),
            Error::InvalidSignature
        ));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = TokenManager::new("other-secret", Duration::from_secs(900))
            .generate(&admin())
            .unwrap();

        assert!(matches!(
            manager().verify(&token).unwrap_err(),
            Error::InvalidSignature
        ));
    }

    #[test]
    fn garbage_is_unauthenticated() {
        assert!(matches!(
            manager().verify("not-a-token").unwrap_err(),
            Error::Unauthenticated { .. }
        ));
    }

    #[test]
    fn user_without_a_role_cannot_get_a_token() {
        let mut user = admin();
        user.role.clear();

        assert!(matches!(
            manager().generate(&user).unwrap_err(),
            Error::InvalidCredentials
        ));
    }
}
