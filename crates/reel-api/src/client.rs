use std::sync::OnceLock;

use async_trait::async_trait;
use reel_engine::{DeviceId, Engagement, FeedItem, ItemId, LikeAction, PlaybackError, ViewReceipt};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use crate::models::{
    ErrorBody, LikeRequest, LikeResponse, Product, ViewRequest, ViewResponse, ViewStatus,
};

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 256;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client for the feed collection and its engagement endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    collection: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if !config.timeout().is_zero() {
            builder = builder.timeout(config.timeout());
        }

        let http = builder.build()?;
        Self::with_client(http, config)
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(http: reqwest::Client, config: &ApiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ApiError::invalid_url(&config.base_url, e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::invalid_url(&config.base_url, "not a base URL"));
        }
        let collection = base
            .join(&config.collection_path)
            .map_err(|e| ApiError::invalid_url(&config.collection_path, e.to_string()))?;

        Ok(Self {
            http,
            base,
            collection,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection
    }

    /// `GET {collection}`. Relative media and thumbnail URLs are resolved
    /// against the API origin.
    pub async fn list_items(&self) -> Result<Vec<FeedItem>> {
        let url = self.collection.clone();
        let mut items: Vec<FeedItem> = self
            .send_json(self.http.get(url.clone()), &url, "list items")
            .await?;

        for item in &mut items {
            item.media_url = self.resolve(&item.media_url);
            if let Some(thumbnail) = item.thumbnail_url.as_mut() {
                *thumbnail = self.resolve(thumbnail);
            }
        }
        debug!(count = items.len(), url = %url, "Fetched feed");
        Ok(items)
    }

    /// `POST {collection}/{id}/view`
    pub async fn record_view(&self, item: &ItemId, device: &DeviceId) -> Result<ViewReceipt> {
        let url = self.endpoint(&[item.as_str(), "view"])?;
        let request = self
            .http
            .post(url.clone())
            .json(&ViewRequest { device_id: device });
        let response: ViewResponse = self.send_json(request, &url, "record view").await?;
        Ok(response.into())
    }

    /// `GET {collection}/{id}/view/{deviceId}`
    pub async fn view_status(&self, item: &ItemId, device: &DeviceId) -> Result<ViewStatus> {
        let url = self.endpoint(&[item.as_str(), "view", device.as_str()])?;
        self.send_json(self.http.get(url.clone()), &url, "view status")
            .await
    }

    /// `POST {collection}/{id}/like`; returns the server's like count.
    pub async fn set_like(&self, item: &ItemId, action: LikeAction) -> Result<u64> {
        let url = self.endpoint(&[item.as_str(), "like"])?;
        let request = self.http.post(url.clone()).json(&LikeRequest { action });
        let response: LikeResponse = self.send_json(request, &url, "set like").await?;
        Ok(response.like_count)
    }

    /// `GET {collection}/{id}/products`
    pub async fn item_products(&self, item: &ItemId) -> Result<Vec<Product>> {
        let url = self.endpoint(&[item.as_str(), "products"])?;
        self.send_json(self.http.get(url.clone()), &url, "list products")
            .await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.collection.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::invalid_url(self.collection.as_str(), "not a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn resolve(&self, raw: &str) -> String {
        match self.base.join(raw) {
            Ok(url) => url.into(),
            Err(e) => {
                warn!(url = raw, error = %e, "Leaving unresolvable media URL as is");
                raw.to_string()
            }
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
        operation: &'static str,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => parsed.error,
                Err(_) => truncate(&body, MAX_ERROR_BODY),
            };
            return Err(ApiError::http_status(status, url.as_str(), operation, message));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::invalid_response(operation, e.to_string()))
    }
}

#[async_trait]
impl Engagement for ApiClient {
    async fn record_view(
        &self,
        item: &ItemId,
        device: &DeviceId,
    ) -> std::result::Result<ViewReceipt, PlaybackError> {
        Ok(ApiClient::record_view(self, item, device).await?)
    }

    async fn set_like(
        &self,
        item: &ItemId,
        action: LikeAction,
    ) -> std::result::Result<u64, PlaybackError> {
        Ok(ApiClient::set_like(self, item, action).await?)
    }
}

fn truncate(body: &str, max: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
