use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use shared_models::page::{Page, PageRequest};

use crate::query::Query;
use crate::supabase::SupabaseClient;

/// Row-level persistence used by every service. Rows travel as JSON objects
/// keyed by snake_case column names.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(&self, query: &Query) -> Result<Vec<Value>>;

    /// Ordered page plus exact total count of rows matching the filters.
    async fn find_page(&self, query: &Query, page: PageRequest) -> Result<Page<Value>>;

    /// Inserts one row and returns it as stored (with its generated `id`).
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Applies `patch` to every row matching the query's filters and returns
    /// the updated rows.
    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>>;

    /// Removes every row matching the query's filters and returns how many
    /// were removed.
    async fn delete(&self, query: &Query) -> Result<usize>;
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn find(&self, query: &Query) -> Result<Vec<Value>> {
        self.request(Method::GET, &query.to_postgrest(), None).await
    }

    async fn find_page(&self, query: &Query, page: PageRequest) -> Result<Page<Value>> {
        let windowed = query
            .clone()
            .window(page.offset(), page.size as u64);

        let (rows, total): (Vec<Value>, u64) =
            self.request_with_count(&windowed.to_postgrest()).await?;

        Ok(Page::new(rows, total, page))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let path = format!("/rest/v1/{}", table);
        let inserted: Vec<Value> = self.request(Method::POST, &path, Some(row)).await?;

        inserted
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert into {} returned no rows", table))
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        if query.predicates().is_empty() {
            return Err(anyhow!("refusing unfiltered update on {}", query.table_name()));
        }

        self.request(Method::PATCH, &query.to_postgrest_filter(), Some(patch))
            .await
    }

    async fn delete(&self, query: &Query) -> Result<usize> {
        if query.predicates().is_empty() {
            return Err(anyhow!("refusing unfiltered delete on {}", query.table_name()));
        }

        let removed: Vec<Value> = self
            .request(Method::DELETE, &query.to_postgrest_filter(), None)
            .await?;
        Ok(removed.len())
    }
}

// ==============================================================================
// TYPED HELPERS
// ==============================================================================

pub async fn find_as<T>(store: &dyn RecordStore, query: &Query) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let rows = store.find(query).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

pub async fn find_one_as<T>(store: &dyn RecordStore, query: &Query) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let rows = store.find(&query.clone().limit(1)).await?;
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

pub async fn find_page_as<T>(
    store: &dyn RecordStore,
    query: &Query,
    page: PageRequest,
) -> Result<Page<T>>
where
    T: DeserializeOwned,
{
    store
        .find_page(query, page)
        .await?
        .try_map(|row| serde_json::from_value(row).map_err(Into::into))
}

pub async fn insert_as<T, R>(store: &dyn RecordStore, table: &str, row: &R) -> Result<T>
where
    T: DeserializeOwned,
    R: Serialize + Sync,
{
    let inserted = store.insert(table, serde_json::to_value(row)?).await?;
    debug!("Inserted row into {}", table);
    Ok(serde_json::from_value(inserted)?)
}

/// Updates the single row matched by `query`; `None` when nothing matched.
pub async fn update_one_as<T>(
    store: &dyn RecordStore,
    query: &Query,
    patch: Value,
) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let updated = store.update(query, patch).await?;
    match updated.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}
