use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ObjectStorage, StorageError, StorageResult};
use crate::config::StorageConfig;

/// Storage REST client (`/storage/v1/object/...`) authenticated with the
/// service key
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| StorageError::NotConfigured("STORAGE_URL is not set".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let service_key = config.service_key.clone().ok_or_else(|| {
            StorageError::NotConfigured("STORAGE_SERVICE_KEY is not set".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            service_key,
            bucket: config.bucket.clone(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, key
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(
        operation: &'static str,
        response: reqwest::Response,
    ) -> StorageResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(message));
        }
        Err(StorageError::Rejected {
            operation,
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        debug!(key = %key, size = bytes.len(), "uploading object");
        let response = self
            .authorized(self.client.post(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Self::check("upload", response).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.client.delete(url))
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Self::check("remove", response).await?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, self.bucket, key
        );
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "expiresIn": expires_in.as_secs() }))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let signed: SignedUrlResponse = Self::check("sign", response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Request(format!("invalid sign response: {}", e)))?;

        // The API answers with a path relative to /storage/v1
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>, key: Option<&str>) -> StorageConfig {
        StorageConfig {
            url: url.map(str::to_string),
            service_key: key.map(str::to_string),
            bucket: "visa-documents".to_string(),
        }
    }

    #[test]
    fn requires_url_and_key() {
        assert!(matches!(
            SupabaseStorage::new(&config(None, Some("key"))),
            Err(StorageError::NotConfigured(_))
        ));
        assert!(matches!(
            SupabaseStorage::new(&config(Some("https://x.supabase.co"), None)),
            Err(StorageError::NotConfigured(_))
        ));
    }

    #[test]
    fn builds_bucket_scoped_object_urls() {
        let storage = SupabaseStorage::new(&config(Some("https://x.supabase.co/"), Some("key")))
            .unwrap();
        assert_eq!(
            storage.object_url("u/photo/1_me.jpg"),
            "https://x.supabase.co/storage/v1/object/visa-documents/u/photo/1_me.jpg"
        );
    }
}
