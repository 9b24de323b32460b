use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{compare_values, into_object, matches, Document, DocumentStore, Filter, SortBy, StoreError};

/// Process-local document store. Used when no database is configured and in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.lock().await;
        collections.get(collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, filter)))
            .cloned())
    }

    async fn upsert(&self, collection: &str, filter: &Filter, document: Document) -> Result<(), StoreError> {
        let fields = into_object(document)?;
        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(Value::Object(existing)) = docs.iter_mut().find(|d| matches(d, filter)) {
            existing.extend(fields);
            return Ok(());
        }

        let mut created = filter.clone();
        created.extend(fields);
        created
            .entry("_id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        docs.push(Value::Object(created));
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let mut fields = into_object(document)?;
        let id = Uuid::new_v4().to_string();
        fields.insert("_id".into(), Value::String(id.clone()));

        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Value::Object(fields));
        Ok(id)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<i64>,
        sort: Option<SortBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.lock().await;
        let mut found: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).cloned().collect())
            .unwrap_or_default();
        drop(collections);

        if let Some(sort) = sort {
            found.sort_by(|a, b| {
                let ord = compare_values(a.get(&sort.field), b.get(&sort.field));
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = limit {
            found.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::filter_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_inserts_then_merges() {
        let store = MemoryStore::new();
        let filter = filter_eq("wallet_address", "w1");

        store.upsert("c", &filter, json!({"score": 1})).await.unwrap();
        store.upsert("c", &filter, json!({"score": 2, "extra": true})).await.unwrap();

        assert_eq!(store.count("c").await, 1);
        let doc = store.find_one("c", &filter).await.unwrap().unwrap();
        assert_eq!(doc["wallet_address"], "w1");
        assert_eq!(doc["score"], 2);
        assert_eq!(doc["extra"], true);
    }

    #[tokio::test]
    async fn test_find_many_sorted_and_limited() {
        let store = MemoryStore::new();
        for n in [3, 1, 2] {
            store.insert_one("c", json!({"n": n})).await.unwrap();
        }
        let docs = store
            .find_many("c", &Filter::new(), Some(2), Some(SortBy::desc("n")))
            .await
            .unwrap();
        let ns: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_find_one_missing() {
        let store = MemoryStore::new();
        assert!(store.find_one("c", &filter_eq("a", 1)).await.unwrap().is_none());
    }
}
