//! HTTP client for the external image store.

use bytes::Bytes;
use serde::Deserialize;

use commune_core::error::ApiError;

use crate::domain::repository::ImageStore;
use crate::domain::types::ImageRef;

/// Store response for an upload: the stable (url, id) pair.
#[derive(Deserialize)]
struct UploadResponse {
    url: String,
    id: String,
}

#[derive(Clone)]
pub struct HttpImageStore {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
}

impl HttpImageStore {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

impl ImageStore for HttpImageStore {
    async fn upload(&self, data: Bytes, folder: &str) -> Result<ImageRef, ApiError> {
        let response = self
            .client
            .post(format!("{}/images", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("folder", folder)])
            .body(data)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.into()))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(anyhow::anyhow!(
                "image upload failed with status {}",
                response.status()
            )));
        }
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.into()))?;
        Ok(ImageRef {
            url: body.url,
            storage_id: body.id,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/images/{storage_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.into()))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(anyhow::anyhow!(
                "image delete failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
