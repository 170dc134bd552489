//! Waldo - paginated, filterable listings for the Waldo.click marketplace
//!
//! The crate holds both halves of the listing pipeline:
//! - the HTTP list controller over a generic entity store (`api`, `services`, `db`)
//! - the admin client that drives paginated lists and remembers per-list
//!   preferences (`client`)

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
