//! Slug derivation
//!
//! Sluggable resources persist a `slug` computed from their source field on
//! every write that touches it. Client-sent slugs are overwritten.

use serde_json::{Map, Value};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::Resource;

/// Turn a display name into a URL slug.
///
/// Diacritics are dropped (`ñ` becomes `n`), everything else that is not a
/// letter or digit collapses into single hyphens.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Lifecycle hook run before a sluggable resource is written.
///
/// `attributes` is the full attribute set about to be stored; `changed`
/// holds only what the client sent. The slug is recomputed when the source
/// field was sent, and otherwise any client slug is replaced by the stored
/// source's slug.
pub fn apply_slug(resource: Resource, attributes: &mut Map<String, Value>, changed: &Map<String, Value>) {
    let Some(source) = resource.slug_source() else {
        return;
    };

    if !changed.contains_key(source) && !changed.contains_key("slug") {
        return;
    }

    match attributes.get(source).and_then(Value::as_str).map(generate_slug) {
        Some(slug) => {
            attributes.insert("slug".to_string(), Value::String(slug));
        }
        None => {
            attributes.remove("slug");
        }
    }
}
