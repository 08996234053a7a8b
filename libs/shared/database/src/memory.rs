use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use shared_models::page::{Page, PageRequest};

use crate::query::Query;
use crate::store::RecordStore;

#[derive(Default)]
struct Table {
    rows: Vec<Value>,
    next_id: i64,
}

/// Process-local store evaluating the same `Query` predicates the PostgREST
/// renderer emits. Used for local runs and router tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert fixture rows, keeping any explicit ids.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) -> Result<()> {
        for row in rows {
            self.insert(table, row).await?;
        }
        Ok(())
    }

    pub async fn all(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, query: &Query) -> Result<Vec<Value>> {
        let rows = self.all(query.table_name()).await;
        Ok(query.apply(rows))
    }

    async fn find_page(&self, query: &Query, page: PageRequest) -> Result<Page<Value>> {
        let rows = self.all(query.table_name()).await;
        let selected = query.filter_and_sort(rows);
        let total = selected.len() as u64;

        let content = selected
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .collect();

        Ok(Page::new(content, total, page))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let mut object: Map<String, Value> = match row {
            Value::Object(map) => map,
            other => return Err(anyhow!("expected a JSON object for {}, got {}", table, other)),
        };

        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();

        match object.get("id").and_then(Value::as_i64) {
            Some(id) => entry.next_id = entry.next_id.max(id),
            None => {
                entry.next_id += 1;
                object.insert("id".to_string(), Value::from(entry.next_id));
            }
        }

        let stored = Value::Object(object);
        entry.rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let patch = match patch {
            Value::Object(map) => map,
            other => return Err(anyhow!("expected a JSON object patch, got {}", other)),
        };
        if query.predicates().is_empty() {
            return Err(anyhow!("refusing unfiltered update on {}", query.table_name()));
        }

        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(query.table_name()) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in entry.rows.iter_mut().filter(|row| query.matches(row)) {
            if let Value::Object(fields) = &mut *row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }

        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<usize> {
        if query.predicates().is_empty() {
            return Err(anyhow!("refusing unfiltered delete on {}", query.table_name()));
        }

        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(query.table_name()) else {
            return Ok(0);
        };

        let before = entry.rows.len();
        entry.rows.retain(|row| !query.matches(row));
        Ok(before - entry.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_models::page::SortDirection;

    #[tokio::test]
    async fn test_insert_assigns_ids_after_seeded_rows() {
        let store = MemoryStore::new();
        store
            .seed("users", vec![json!({ "id": 10, "full_name": "Seeded" })])
            .await
            .unwrap();

        let row = store.insert("users", json!({ "full_name": "New" })).await.unwrap();
        assert_eq!(row["id"], 11);
    }

    #[tokio::test]
    async fn test_page_reports_total_before_window() {
        let store = MemoryStore::new();
        for n in 0..7 {
            store
                .insert("questions", json!({ "customer_id": 1, "rank": n }))
                .await
                .unwrap();
        }

        let query = Query::table("questions")
            .eq("customer_id", 1)
            .order_by("rank", SortDirection::Desc);
        let page = store
            .find_page(&query, PageRequest::new(Some(1), Some(5), 10))
            .await
            .unwrap();

        assert_eq!(page.total_elements, 7);
        assert_eq!(page.total_pages, 2);
        let ranks: Vec<i64> = page.content.iter().filter_map(|r| r["rank"].as_i64()).collect();
        assert_eq!(ranks, vec![1, 0]);
    }

    #[tokio::test]
    async fn test_update_patches_only_matching_rows() {
        let store = MemoryStore::new();
        store.insert("questions", json!({ "status": "PENDING" })).await.unwrap();
        store.insert("questions", json!({ "status": "PENDING" })).await.unwrap();

        let updated = store
            .update(&Query::table("questions").eq("id", 2), json!({ "status": "ANSWERED" }))
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        let rows = store.all("questions").await;
        assert_eq!(rows[0]["status"], "PENDING");
        assert_eq!(rows[1]["status"], "ANSWERED");
    }

    #[tokio::test]
    async fn test_delete_removes_matching_rows_only() {
        let store = MemoryStore::new();
        store.insert("consultant_profiles", json!({ "consultant_id": 7 })).await.unwrap();
        store.insert("consultant_profiles", json!({ "consultant_id": 8 })).await.unwrap();

        let removed = store
            .delete(&Query::table("consultant_profiles").eq("consultant_id", 7))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let rows = store.all("consultant_profiles").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["consultant_id"], 8);
        assert!(store.delete(&Query::table("consultant_profiles")).await.is_err());
    }
}
