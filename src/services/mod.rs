//! Services layer - Business logic
//!
//! Services coordinate repositories and the cache and own validation and
//! error classification.

pub mod entity;
pub mod slug;

pub use entity::{EntityService, EntityServiceError};
pub use slug::{apply_slug, generate_slug};
