//! gRPC service implementations.
//!
//! - [`auth`] - the login endpoint issuing access tokens.
//! - [`catalog`] - the four catalog calls (create, search, upload, rate).

pub mod auth;
pub mod catalog;

pub use auth::AuthService;
pub use catalog::CatalogService;
