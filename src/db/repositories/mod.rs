//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod entity;

pub use entity::{EntityRepository, FindOptions, SqlxEntityRepository};
