//! In-memory stores backing the catalog service.
//!
//! Every store follows the same lock discipline: a `parking_lot::RwLock`
//! around a map, with reads (find, snapshot traversal) taking the shared
//! lock and writes (save, add) taking the exclusive lock. Operations are
//! atomic per store; there are no cross-store transactions, and no raw
//! reference into a store's state ever escapes its lock.

pub mod asset;
pub mod catalog;
pub mod rating;
pub mod user;

pub use asset::{AssetRecord, AssetStore};
pub use catalog::CatalogStore;
pub use rating::{Rating, RatingAggregator};
pub use user::{User, UserStore, seed_default_users};
