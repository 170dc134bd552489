//! Entity service
//!
//! Implements the generic resource controller behind every list screen:
//! - Paginated, filtered, sorted listing with an exact total
//! - Single-record reads by id or slug, with catalogue relations populated
//! - Pass-through create / update / delete
//!
//! Page parameters are coerced here; filters are handed to the store as-is
//! and only validated when the store compiles them.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{EntityRepository, FindOptions};
use crate::db::FilterError;
use crate::models::{
    sanitize_attributes, Entity, ListQuery, ListResponse, PageLimits, Pagination, Populate,
    Relation, Resource,
};
use crate::services::slug::apply_slug;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Cache key prefix for single-record reads
const CACHE_KEY_ENTITY: &str = "entity:";

/// Error types for entity service operations
#[derive(Debug, thiserror::Error)]
pub enum EntityServiceError {
    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path names no catalogue resource
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Request body rejected
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filter tree or sort expression rejected by the store
    #[error("Invalid query: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for EntityServiceError {
    fn from(err: anyhow::Error) -> Self {
        // Repositories surface filter problems through anyhow
        match err.downcast::<FilterError>() {
            Ok(filter) => EntityServiceError::InvalidFilter(filter),
            Err(other) => EntityServiceError::Internal(other),
        }
    }
}

/// Entity service shared by every resource
pub struct EntityService {
    repo: Arc<dyn EntityRepository>,
    cache: Arc<MemoryCache>,
    limits: PageLimits,
    cache_ttl: Duration,
    /// Bumped on every write; reads only cache what they fetched under the
    /// current generation
    generation: AtomicU64,
}

impl EntityService {
    /// Create a new entity service
    pub fn new(repo: Arc<dyn EntityRepository>, cache: Arc<MemoryCache>, limits: PageLimits) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            limits,
            cache_ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Page limits applied to list requests
    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    /// List one page of a resource.
    ///
    /// The page fetch and the total count run concurrently with the same
    /// filters. Asking for a page past the end returns empty `data` with the
    /// real totals.
    pub async fn find(
        &self,
        resource: Resource,
        query: &ListQuery,
    ) -> Result<ListResponse<Entity>, EntityServiceError> {
        let params = query.list_params(&self.limits);
        let filters = with_search(resource, query.filters.clone(), query.search.as_deref());
        let sort = if query.sort.is_empty() {
            vec![resource.default_sort().to_string()]
        } else {
            query.sort.clone()
        };

        let options = FindOptions {
            filters,
            sort,
            start: params.start(),
            limit: params.limit(),
        };

        debug!(
            resource = %resource,
            page = params.page,
            page_size = params.page_size,
            sort = ?options.sort,
            "Listing entries"
        );

        let (mut data, total) = tokio::try_join!(
            self.repo.find_many(resource, &options),
            self.repo.count(resource, options.filters.as_ref()),
        )?;

        if query.populate != Populate::None {
            let relations: Vec<Relation> = resource
                .relations()
                .iter()
                .copied()
                .filter(|r| query.populate.includes(r.field))
                .collect();
            self.populate(&mut data, &relations).await?;
        }

        Ok(ListResponse::new(data, Pagination::new(&params, total)))
    }

    /// Fetch one record by numeric id, or by slug on sluggable resources.
    ///
    /// Catalogue relations are always populated. A miss is `NotFound`, never
    /// an empty success.
    pub async fn find_one(&self, resource: Resource, id: &str) -> Result<Entity, EntityServiceError> {
        let not_found = || EntityServiceError::NotFound(format!("{} {}", resource, id));

        if let Ok(numeric) = id.parse::<i64>() {
            let cache_key = format!("{}{}:{}", CACHE_KEY_ENTITY, resource, numeric);
            if let Some(cached) = self.cache.get::<Entity>(&cache_key).await? {
                return Ok(cached);
            }

            let generation = self.generation.load(Ordering::Acquire);
            let entity = self
                .repo
                .get_by_id(resource, numeric)
                .await?
                .ok_or_else(not_found)?;
            let populated = self.populate_one(resource, entity).await?;
            self.cache_read(&cache_key, &populated, generation).await?;
            return Ok(populated);
        }

        if resource.slug_source().is_none() {
            return Err(not_found());
        }

        // Filter then take the first match
        let options = FindOptions {
            filters: Some(json!({ "slug": { "$eq": id } })),
            sort: vec!["id:asc".to_string()],
            start: 0,
            limit: 1,
        };
        let entity = self
            .repo
            .find_many(resource, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(not_found)?;

        self.populate_one(resource, entity).await
    }

    /// Create a record from a JSON object body
    pub async fn create(&self, resource: Resource, data: Value) -> Result<Entity, EntityServiceError> {
        let body = sanitize_attributes(into_attributes(data)?);
        let mut attributes = body.clone();
        apply_slug(resource, &mut attributes, &body);

        let entity = self.repo.create(resource, &attributes).await?;
        self.invalidate().await?;

        info!(resource = %resource, id = entity.id, "Entry created");
        Ok(entity)
    }

    /// Merge the given attributes onto a stored record
    pub async fn update(
        &self,
        resource: Resource,
        id: &str,
        data: Value,
    ) -> Result<Entity, EntityServiceError> {
        let not_found = || EntityServiceError::NotFound(format!("{} {}", resource, id));
        let numeric = id.parse::<i64>().map_err(|_| not_found())?;
        let body = sanitize_attributes(into_attributes(data)?);

        let existing = self
            .repo
            .get_by_id(resource, numeric)
            .await?
            .ok_or_else(not_found)?;

        let mut attributes = existing.attributes;
        attributes.extend(body.clone());
        apply_slug(resource, &mut attributes, &body);

        let entity = self
            .repo
            .update(resource, numeric, &attributes)
            .await?
            .ok_or_else(not_found)?;
        self.invalidate().await?;

        info!(resource = %resource, id = entity.id, "Entry updated");
        Ok(entity)
    }

    /// Delete a record, returning it
    pub async fn delete(&self, resource: Resource, id: &str) -> Result<Entity, EntityServiceError> {
        let not_found = || EntityServiceError::NotFound(format!("{} {}", resource, id));
        let numeric = id.parse::<i64>().map_err(|_| not_found())?;

        let entity = self
            .repo
            .delete(resource, numeric)
            .await?
            .ok_or_else(not_found)?;
        self.invalidate().await?;

        info!(resource = %resource, id = entity.id, "Entry deleted");
        Ok(entity)
    }

    /// Store a read unless a write landed since `generation` was taken
    async fn cache_read(&self, key: &str, entity: &Entity, generation: u64) -> Result<(), EntityServiceError> {
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(key, "Skipping cache fill after concurrent write");
            return Ok(());
        }
        self.cache.set(key, entity, self.cache_ttl).await?;
        // The write may have invalidated between the check and the set
        if self.generation.load(Ordering::Acquire) != generation {
            self.cache.delete(key).await?;
        }
        Ok(())
    }

    /// Populated records embed others, so every write drops all of them
    async fn invalidate(&self) -> Result<(), EntityServiceError> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache
            .delete_pattern(&format!("{}*", CACHE_KEY_ENTITY))
            .await?;
        Ok(())
    }

    async fn populate_one(&self, resource: Resource, entity: Entity) -> Result<Entity, EntityServiceError> {
        let mut entities = vec![entity];
        self.populate(&mut entities, resource.relations()).await?;
        Ok(entities.remove(0))
    }

    /// Replace relation ids with the related records
    async fn populate(&self, entities: &mut [Entity], relations: &[Relation]) -> Result<(), EntityServiceError> {
        for relation in relations {
            let mut ids: Vec<i64> = entities
                .iter()
                .filter_map(|e| e.relation_id(relation.field))
                .collect();
            ids.sort_unstable();
            ids.dedup();
            if ids.is_empty() {
                continue;
            }

            let related: HashMap<i64, Value> = self
                .repo
                .get_many_by_ids(relation.target, &ids)
                .await?
                .into_iter()
                .map(|e| {
                    let id = e.id;
                    serde_json::to_value(e).map(|v| (id, v))
                })
                .collect::<Result<_, _>>()
                .map_err(anyhow::Error::from)?;

            for entity in entities.iter_mut() {
                let Some(id) = entity.relation_id(relation.field) else {
                    continue;
                };
                // Dangling ids populate to null
                let value = related.get(&id).cloned().unwrap_or(Value::Null);
                entity.attributes.insert(relation.field.to_string(), value);
            }
        }
        Ok(())
    }
}

fn into_attributes(data: Value) -> Result<Map<String, Value>, EntityServiceError> {
    match data {
        Value::Object(map) => Ok(map),
        _ => Err(EntityServiceError::Validation(
            "Request body `data` must be an object".to_string(),
        )),
    }
}

/// AND the free-text search onto the client filters
fn with_search(resource: Resource, filters: Option<Value>, search: Option<&str>) -> Option<Value> {
    let fields = resource.search_fields();
    let term = match search {
        Some(term) if !fields.is_empty() => term,
        _ => return filters,
    };

    let any_field: Vec<Value> = fields
        .iter()
        .map(|field| {
            let mut clause = Map::new();
            clause.insert(field.to_string(), json!({ "$containsi": term }));
            Value::Object(clause)
        })
        .collect();
    let search_filter = json!({ "$or": any_field });

    match filters {
        None | Some(Value::Null) => Some(search_filter),
        Some(filters) => Some(json!({ "$and": [filters, search_filter] })),
    }
}
