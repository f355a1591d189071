//! Error types for the catalog service.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure in the catalog system. It implements `From<Error>` for
//! `tonic::Status` so errors propagate to gRPC clients with the appropriate
//! status code exactly once, at the call boundary.
//!
//! Store-level errors (`AlreadyExists`, `NotFound`, `Storage`) are produced
//! by the stores and translated here; authentication errors distinguish an
//! expired token from a tampered one even though both surface to clients as
//! `UNAUTHENTICATED`.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the catalog service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The client request was malformed or exceeded constraints.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// An uploaded asset grew past the cumulative size cap.
    #[error("asset is too large: {size} > {limit}")]
    AssetTooLarge { size: usize, limit: usize },

    /// No record with the given id exists.
    #[error("record {id} is not found")]
    NotFound { id: String },

    /// A record with the given id already exists.
    #[error("record {id} already exists")]
    AlreadyExists { id: String },

    /// Login failed: unknown user or wrong password.
    #[error("incorrect username or password")]
    InvalidCredentials,

    /// The call carried no usable credentials.
    #[error("unauthenticated: {reason}")]
    Unauthenticated { reason: String },

    /// The access token is past its expiry.
    #[error("access token is expired")]
    TokenExpired,

    /// The access token signature does not match the issuer key.
    #[error("access token signature mismatch")]
    InvalidSignature,

    /// The issuer failed to sign a new access token.
    #[error("cannot issue access token: {context}")]
    TokenIssue { context: String },

    /// The token is valid but its role may not call this method.
    #[error("no permission to call {method}")]
    PermissionDenied { method: String },

    /// The client aborted the call.
    #[error("request cancelled by client")]
    Canceled,

    /// The call's deadline passed at a cancellation poll point.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// A store or I/O operation failed.
    #[error("storage error: {context}")]
    Storage { context: String },

    /// Internal channel send/receive failure (e.g. closed channel).
    #[error("channel error: {context}")]
    ChannelError { context: String },

    /// A transport-level receive or send failed mid-stream.
    #[error("transport error: {context}")]
    Transport { context: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::AssetTooLarge { size, limit } => {
                Status::invalid_argument(format!("asset is too large: {size} > {limit}"))
            }
            Error::NotFound { id } => Status::not_found(format!("record {id} is not found")),
            Error::AlreadyExists { id } => {
                Status::already_exists(format!("record {id} already exists"))
            }
            Error::InvalidCredentials => Status::not_found("incorrect username or password"),
            Error::Unauthenticated { reason } => Status::unauthenticated(reason),
            Error::TokenExpired => Status::unauthenticated("access token is expired"),
            Error::InvalidSignature => Status::unauthenticated("access token signature mismatch"),
            Error::TokenIssue { context } => {
                Status::internal(format!("cannot issue access token: {context}"))
            }
            Error::PermissionDenied { method } => {
                Status::permission_denied(format!("no permission to call {method}"))
            }
            Error::Canceled => Status::cancelled("request cancelled by client"),
            Error::DeadlineExceeded => Status::deadline_exceeded("request deadline exceeded"),
            Error::Storage { context } => Status::internal(format!("storage error: {context}")),
            Error::ChannelError { context } => {
                Status::internal(format!("channel error: {context}"))
            }
            Error::Transport { context } => Status::unknown(format!("transport error: {context}")),
        }
    }
}
