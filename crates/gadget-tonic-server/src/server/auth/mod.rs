//! Authentication and authorization.
//!
//! [`token`] issues and verifies the signed, time-limited role-bearing
//! tokens; [`gateway`] enforces the per-method role table in front of the
//! gRPC router.

pub mod gateway;
pub mod token;

pub use gateway::{AccessPolicy, AuthLayer};
pub use token::{TokenManager, UserClaims};
