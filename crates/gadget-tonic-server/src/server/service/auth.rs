//! The login endpoint.

use std::sync::Arc;

use gadget_tonic_core::{
    Error,
    proto::{LoginRequest, LoginResponse, auth_server::Auth},
};
use tonic::{Request, Response, Status};

use crate::server::{auth::token::TokenManager, store::UserStore};

/// Issues access tokens for seeded users. Unknown users and wrong passwords
/// get the same answer, so the endpoint cannot be used to enumerate
/// accounts.
pub struct AuthService {
    users: Arc<UserStore>,
    tokens: TokenManager,
}

impl AuthService {
    pub fn new(users: Arc<UserStore>, tokens: TokenManager) -> Self {
        Self { users, tokens }
    }
}

#[tonic::async_trait]
impl Auth for AuthService {
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let request = request.into_inner();

        let user = self
            .users
            .find(&request.username)
            .ok_or(Error::InvalidCredentials)?;

        if !user.verify_password(&request.password) {
            return Err(Error::InvalidCredentials.into());
        }

        let access_token = self.tokens.generate(&user)?;
        tracing::debug!(user = %user.username, "issued access token");

        Ok(Response::new(LoginResponse { access_token }))
    }
}
