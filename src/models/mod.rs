//! Data models
//!
//! Shared by the backend controller and the admin-side list client:
//! - The resource catalogue
//! - Stored entities
//! - Pagination parameters and response envelopes
//! - The parsed list query

mod entity;
mod pagination;
mod query;
mod resource;

pub use entity::{format_timestamp, parse_timestamp, sanitize_attributes, Entity, RESERVED_KEYS};
pub use pagination::{
    page_count, parse_int, ListMeta, ListParams, ListResponse, PageLimits, Pagination,
    SingleResponse,
};
pub use query::{ListQuery, Populate};
pub use resource::{Relation, Resource, UnknownResource};
