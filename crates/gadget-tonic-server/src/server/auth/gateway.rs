//! Role-gate in front of the gRPC router.
//!
//! [`AuthLayer`] wraps the whole router as a tower layer. Each call's
//! fully-qualified method path is looked up in an [`AccessPolicy`]; methods
//! absent from the policy (login, search, health, reflection) pass through
//! untouched. For protected methods the bearer token is extracted from the
//! `authorization` metadata, verified, and its role checked against the
//! method's allow-list; the verified claims are attached to the request's
//! extensions for handlers that want them.
//!
//! Rejections never reach the inner service: they are answered directly
//! with a trailers-only gRPC response carrying the status.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use gadget_tonic_core::Error;
use http::{HeaderMap, HeaderValue, Request, Response, header::CONTENT_TYPE};
use tonic::{Status, body::Body};
use tower::{Layer, Service};

use super::token::{TokenManager, UserClaims};

/// Mapping from fully-qualified method path to the roles permitted to call
/// it. Fixed at construction; methods not listed are open.
#[derive(Debug, Default)]
pub struct AccessPolicy {
    rules: HashMap<String, Vec<String>>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an allow-list entry for one method path.
    pub fn rule(mut self, method: impl Into<String>, roles: &[&str]) -> Self {
        self.rules
            .insert(method.into(), roles.iter().map(ToString::to_string).collect());
        self
    }

    /// The role table for the catalog service: create and upload are
    /// admin-only, rating is open to admins and users, everything else is
    /// unprotected.
    pub fn catalog_defaults() -> Self {
        use gadget_tonic_core::types::{ROLE_ADMIN, ROLE_USER};

        const CATALOG: &str = "/gadget.v1.Catalog";

        Self::new()
            .rule(format!("{CATALOG}/CreateDevice"), &[ROLE_ADMIN])
            .rule(format!("{CATALOG}/UploadAsset"), &[ROLE_ADMIN])
            .rule(format!("{CATALOG}/RateDevice"), &[ROLE_ADMIN, ROLE_USER])
    }

    fn allowed_roles(&self, method: &str) -> Option<&[String]> {
        self.rules.get(method).map(Vec::as_slice)
    }
}

/// The shared state behind the layer: the verifier and the role table.
struct Gateway {
    tokens: TokenManager,
    policy: AccessPolicy,
}

impl Gateway {
    /// Decides one call. `Ok(None)` means the method is open; `Ok(Some)`
    /// carries the verified claims; `Err` is the rejection status.
    fn authorize(&self, method: &str, headers: &HeaderMap) -> Result<Option<UserClaims>, Status> {
        let Some(allowed) = self.policy.allowed_roles(method) else {
            return Ok(None);
        };

        let token = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                tracing::debug!(method, "rejected call without bearer token");
                Status::from(Error::Unauthenticated {
                    reason: "missing authorization token".to_string(),
                })
            })?;

        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(method, error = %e, "rejected call with unusable token");
            Status::from(e)
        })?;

        if !allowed.iter().any(|role| role == &claims.role) {
            tracing::debug!(method, role = %claims.role, "rejected call with disallowed role");
            return Err(Error::PermissionDenied {
                method: method.to_string(),
            }
            .into());
        }

        Ok(Some(claims))
    }
}

/// Tower layer enforcing the per-method role table.
#[derive(Clone)]
pub struct AuthLayer {
    gateway: Arc<Gateway>,
}

impl AuthLayer {
    pub fn new(tokens: TokenManager, policy: AccessPolicy) -> Self {
        Self {
            gateway: Arc::new(Gateway { tokens, policy }),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthGateway<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthGateway {
            inner,
            gateway: Arc::clone(&self.gateway),
        }
    }
}

/// The per-call service produced by [`AuthLayer`].
#[derive(Clone)]
pub struct AuthGateway<S> {
    inner: S,
    gateway: Arc<Gateway>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AuthGateway<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the service that was polled ready and leave a fresh clone in
        // its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        match self.gateway.authorize(req.uri().path(), req.headers()) {
            Ok(Some(claims)) => {
                req.extensions_mut().insert(claims);
                Box::pin(async move { inner.call(req).await })
            }
            Ok(None) => Box::pin(async move { inner.call(req).await }),
            Err(status) => Box::pin(async move { Ok(reject(status)) }),
        }
    }
}

/// Builds a trailers-only gRPC response from a rejection status.
fn reject(status: Status) -> Response<Body> {
    let mut response = Response::new(Body::empty());

    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));

    let mut headers = HeaderMap::new();
    match status.add_header(&mut headers) {
        Ok(()) => response.headers_mut().extend(headers),
        Err(_) => {
            // Internal: the message contained bytes not representable in
            // headers.
            response
                .headers_mut()
                .insert("grpc-status", HeaderValue::from_static("13"));
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::User;
    use gadget_tonic_core::types::{ROLE_ADMIN, ROLE_USER};
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::{ServiceExt, service_fn};

    const PROTECTED: &str = "/gadget.v1.Catalog/CreateDevice";
    const OPEN: &str = "/gadget.v1.Catalog/SearchDevices";

    fn tokens() -> TokenManager {
        TokenManager::new("test-secret", Duration::from_secs(900))
    }

    fn layer() -> AuthLayer {
        AuthLayer::new(tokens(), AccessPolicy::catalog_defaults())
    }

    fn token_for(role: &str) -> String {
        let user = User::new("someone", "pw", role).unwrap();
        tokens().generate(&user).unwrap()
    }

    async fn echo(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .insert("x-inner-called", HeaderValue::from_static("yes"));
        Ok(response)
    }

    fn request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = http::Request::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn grpc_status(response: &Response<Body>) -> Option<i32> {
        response
            .headers()
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    fn inner_called(response: &Response<Body>) -> bool {
        response.headers().contains_key("x-inner-called")
    }

    #[tokio::test]
    async fn open_method_passes_without_token() {
        let svc = layer().layer(service_fn(echo));
        let response = svc.oneshot(request(OPEN, None)).await.unwrap();

        assert!(inner_called(&response));
    }

    #[tokio::test]
    async fn protected_method_without_token_is_unauthenticated() {
        let svc = layer().layer(service_fn(echo));
        let response = svc.oneshot(request(PROTECTED, None)).await.unwrap();

        assert!(!inner_called(&response));
        assert_eq!(grpc_status(&response), Some(tonic::Code::Unauthenticated as i32));
    }

    #[tokio::test]
    async fn protected_method_with_disallowed_role_is_permission_denied() {
        let svc = layer().layer(service_fn(echo));
        let token = token_for(ROLE_USER);
        let response = svc.oneshot(request(PROTECTED, Some(&token))).await.unwrap();

        assert!(!inner_called(&response));
        assert_eq!(
            grpc_status(&response),
            Some(tonic::Code::PermissionDenied as i32)
        );
    }

    #[tokio::test]
    async fn protected_method_with_allowed_role_reaches_the_handler() {
        let svc = layer().layer(service_fn(echo));
        let token = token_for(ROLE_ADMIN);
        let response = svc.oneshot(request(PROTECTED, Some(&token))).await.unwrap();

        assert!(inner_called(&response));
    }

    #[tokio::test]
    async fn tampered_token_is_unauthenticated() {
        let svc = layer().layer(service_fn(echo));
        let mut token = token_for(ROLE_ADMIN);
        let replacement = if token.ends_with('A') { 'B' } else { 'A' };
        token.pop();
        token.push(replacement);

        let response = svc.oneshot(request(PROTECTED, Some(&token))).await.unwrap();

        assert!(!inner_called(&response));
        assert_eq!(grpc_status(&response), Some(tonic::Code::Unauthenticated as i32));
    }

    #[tokio::test]
    async fn claims_are_attached_for_the_handler() {
        let inspect = service_fn(|req: Request<Body>| async move {
            let claims = req.extensions().get::<UserClaims>();
            let mut response = Response::new(Body::empty());
            if let Some(claims) = claims {
                response.headers_mut().insert(
                    "x-claims-role",
                    HeaderValue::from_str(&claims.role).unwrap(),
                );
            }
            Ok::<_, Infallible>(response)
        });

        let svc = layer().layer(inspect);
        let token = token_for(ROLE_ADMIN);
        let response = svc.oneshot(request(PROTECTED, Some(&token))).await.unwrap();

        assert_eq!(
            response.headers().get("x-claims-role").unwrap(),
            ROLE_ADMIN
        );
    }
}
