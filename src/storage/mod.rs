//! Object storage for uploaded application documents

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::error::AppError;

pub use memory::InMemoryStorage;
pub use supabase::SupabaseStorage;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage is not configured: {0}")]
    NotConfigured(String),
    #[error("storage request failed: {0}")]
    Request(String),
    #[error("storage rejected {operation} with status {status}: {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        message: String,
    },
    #[error("object not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured(message) => AppError::configuration(message),
            other => AppError::storage(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Bucket-scoped object store
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Time-limited download URL for `key`
    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn storage_errors_map_to_app_errors() {
        let err: AppError = StorageError::Request("connection reset".to_string()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), ErrorCode::StorageError);
        assert!(err.details().is_some());

        let err: AppError = StorageError::NotConfigured("STORAGE_URL".to_string()).into();
        assert_eq!(err.error_code(), ErrorCode::ConfigurationError);
        assert!(err.details().is_none());
    }
}
