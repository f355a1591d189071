#![doc = include_str!("../README.md")]

pub mod catalog;
pub mod credentials;

pub use catalog::CatalogClient;
pub use credentials::CredentialAgent;
