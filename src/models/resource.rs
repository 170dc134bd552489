//! Resource catalogue
//!
//! Every listable content type served by the backend is a variant of
//! [`Resource`]. Per-resource behaviour (default sort, slug source, relations,
//! free-text search fields) is looked up from the variant instead of being
//! branched on by string in each handler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A relation stored as the related record's id inside the attribute object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Attribute holding the related id
    pub field: &'static str,
    /// Resource the id points into
    pub target: Resource,
}

/// Listable content types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Ads,
    AdPacks,
    AdReservations,
    AdFeaturedReservations,
    Categories,
    Communes,
    Conditions,
    Faqs,
    Orders,
    Regions,
}

impl Resource {
    /// Every resource, in route registration order
    pub const ALL: [Resource; 10] = [
        Resource::Ads,
        Resource::AdPacks,
        Resource::AdReservations,
        Resource::AdFeaturedReservations,
        Resource::Categories,
        Resource::Communes,
        Resource::Conditions,
        Resource::Faqs,
        Resource::Orders,
        Resource::Regions,
    ];

    /// URL path segment and storage discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Ads => "ads",
            Resource::AdPacks => "ad-packs",
            Resource::AdReservations => "ad-reservations",
            Resource::AdFeaturedReservations => "ad-featured-reservations",
            Resource::Categories => "categories",
            Resource::Communes => "communes",
            Resource::Conditions => "conditions",
            Resource::Faqs => "faqs",
            Resource::Orders => "orders",
            Resource::Regions => "regions",
        }
    }

    /// Sort applied when a list request carries none.
    ///
    /// Reference data reads alphabetically; activity data newest first.
    pub fn default_sort(&self) -> &'static str {
        match self {
            Resource::AdPacks
            | Resource::Categories
            | Resource::Communes
            | Resource::Conditions
            | Resource::Regions => "name:asc",
            Resource::Faqs => "title:asc",
            Resource::Ads
            | Resource::AdReservations
            | Resource::AdFeaturedReservations
            | Resource::Orders => "createdAt:desc",
        }
    }

    /// Attribute the persisted `slug` is derived from, if any
    pub fn slug_source(&self) -> Option<&'static str> {
        match self {
            Resource::Ads
            | Resource::Categories
            | Resource::Communes
            | Resource::Conditions
            | Resource::Regions => Some("name"),
            _ => None,
        }
    }

    /// Relations populated on single-record reads
    pub fn relations(&self) -> &'static [Relation] {
        const ADS: &[Relation] = &[
            Relation { field: "category", target: Resource::Categories },
            Relation { field: "commune", target: Resource::Communes },
            Relation { field: "condition", target: Resource::Conditions },
        ];
        const COMMUNES: &[Relation] = &[Relation { field: "region", target: Resource::Regions }];
        const AD_ONLY: &[Relation] = &[Relation { field: "ad", target: Resource::Ads }];

        match self {
            Resource::Ads => ADS,
            Resource::Communes => COMMUNES,
            Resource::AdReservations | Resource::AdFeaturedReservations | Resource::Orders => {
                AD_ONLY
            }
            _ => &[],
        }
    }

    /// Look up a relation by attribute name
    pub fn relation(&self, field: &str) -> Option<Relation> {
        self.relations().iter().copied().find(|r| r.field == field)
    }

    /// Attributes matched by the free-text `search` parameter
    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            Resource::Ads => &["name", "description"],
            Resource::AdPacks
            | Resource::Categories
            | Resource::Communes
            | Resource::Conditions
            | Resource::Regions => &["name"],
            Resource::Faqs => &["title", "text"],
            Resource::Orders => &["buyOrder"],
            Resource::AdReservations | Resource::AdFeaturedReservations => &[],
        }
    }

    /// Names of relation attributes, used by the filter compiler
    pub fn relation_fields(&self) -> Vec<&'static str> {
        self.relations().iter().map(|r| r.field).collect()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a path segment names no known resource
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource: {0}")]
pub struct UnknownResource(pub String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}
