//! Wire types of the feed API. Field names follow the server's camelCase JSON.

use reel_engine::{DeviceId, ItemId, LikeAction, ViewReceipt};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest<'a> {
    pub device_id: &'a DeviceId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    pub view_count: u64,
    pub is_new_view: bool,
}

impl From<ViewResponse> for ViewReceipt {
    fn from(response: ViewResponse) -> Self {
        ViewReceipt {
            view_count: response.view_count,
            is_new_view: response.is_new_view,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeRequest {
    pub action: LikeAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    pub like_count: u64,
}

/// Whether a device has been counted for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatus {
    pub has_viewed: bool,
    #[serde(default)]
    pub view_info: Option<ViewInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInfo {
    pub device_id: DeviceId,
    pub video_id: ItemId,
    /// RFC 3339 timestamp of the first counted view.
    #[serde(default)]
    pub viewed_at: Option<String>,
}

/// Catalog entry attached to a feed item. Prices are in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(rename = "videoId")]
    pub item_id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: u64,
    #[serde(default)]
    pub original_price: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

impl Product {
    pub fn display_price(&self) -> String {
        format_price(self.price)
    }

    pub fn is_discounted(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }
}

/// Render minor units as a decimal amount (`29900` -> `299.00`).
pub fn format_price(minor_units: u64) -> String {
    format!("{}.{:02}", minor_units / 100, minor_units % 100)
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

fn default_success() -> bool {
    true
}
