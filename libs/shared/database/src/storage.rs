use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::supabase::SupabaseClient;

/// Object storage for uploaded documents. Returns the public URL of the
/// stored object.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload(&self, object_path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String>;
}

pub struct SupabaseFileStorage {
    client: Arc<SupabaseClient>,
    bucket: String,
}

impl SupabaseFileStorage {
    pub fn new(client: Arc<SupabaseClient>, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl FileStorage for SupabaseFileStorage {
    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let size = bytes.len();
        self.client
            .upload_object(&self.bucket, object_path, bytes, content_type)
            .await?;

        info!("Stored {} ({} bytes) in bucket {}", object_path, size, self.bucket);
        Ok(self.client.public_object_url(&self.bucket, object_path))
    }
}

#[derive(Default)]
pub struct MemoryFileStorage {
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, object_path: &str) -> Option<(String, Vec<u8>)> {
        self.objects.read().await.get(object_path).cloned()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        self.objects
            .write()
            .await
            .insert(object_path.to_string(), (content_type.to_string(), bytes));

        Ok(format!("memory://{}", object_path))
    }
}
