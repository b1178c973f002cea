//! View and like reporting.
//!
//! The feed actor only needs these two calls from the collaborator API. The
//! HTTP implementation lives in `reel-api`; [`InMemoryEngagement`] keeps the
//! same counting rules locally for offline sessions and tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::device::DeviceId;
use crate::error::PlaybackError;
use crate::model::{FeedItem, ItemId, LikeAction, ViewReceipt};

#[async_trait]
pub trait Engagement: Send + Sync {
    /// Report that `device` watched `item`. The server counts each device once.
    async fn record_view(
        &self,
        item: &ItemId,
        device: &DeviceId,
    ) -> Result<ViewReceipt, PlaybackError>;

    /// Apply a like or unlike and return the authoritative like count.
    async fn set_like(&self, item: &ItemId, action: LikeAction) -> Result<u64, PlaybackError>;
}

#[derive(Debug, Default)]
struct Counters {
    views: u64,
    likes: u64,
    viewers: HashSet<DeviceId>,
}

/// Process-local counters with server semantics.
#[derive(Debug, Default)]
pub struct InMemoryEngagement {
    counters: Mutex<HashMap<ItemId, Counters>>,
}

impl InMemoryEngagement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed counters from a fetched feed.
    pub fn from_items(items: &[FeedItem]) -> Self {
        let counters = items
            .iter()
            .map(|item| {
                (
                    item.id.clone(),
                    Counters {
                        views: item.view_count,
                        likes: item.like_count,
                        viewers: HashSet::new(),
                    },
                )
            })
            .collect();
        Self {
            counters: Mutex::new(counters),
        }
    }

    pub fn view_count(&self, item: &ItemId) -> Option<u64> {
        self.counters.lock().get(item).map(|c| c.views)
    }
}

#[async_trait]
impl Engagement for InMemoryEngagement {
    async fn record_view(
        &self,
        item: &ItemId,
        device: &DeviceId,
    ) -> Result<ViewReceipt, PlaybackError> {
        let mut counters = self.counters.lock();
        let entry = counters
            .get_mut(item)
            .ok_or_else(|| PlaybackError::engagement(format!("unknown item {item}")))?;

        let is_new_view = entry.viewers.insert(device.clone());
        if is_new_view {
            entry.views += 1;
        }
        Ok(ViewReceipt {
            view_count: entry.views,
            is_new_view,
        })
    }

    async fn set_like(&self, item: &ItemId, action: LikeAction) -> Result<u64, PlaybackError> {
        let mut counters = self.counters.lock();
        let entry = counters
            .get_mut(item)
            .ok_or_else(|| PlaybackError::engagement(format!("unknown item {item}")))?;

        entry.likes = match action {
            LikeAction::Like => entry.likes + 1,
            LikeAction::Unlike => entry.likes.saturating_sub(1),
        };
        Ok(entry.likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_item(id: &str, views: u64, likes: u64) -> FeedItem {
        FeedItem {
            id: ItemId::from(id),
            media_url: format!("{id}.mp4"),
            title: String::new(),
            description: String::new(),
            thumbnail_url: None,
            is_live: false,
            view_count: views,
            like_count: likes,
        }
    }

    #[tokio::test]
    async fn test_view_counted_once_per_device() {
        let engagement = InMemoryEngagement::from_items(&[create_test_item("a", 5, 0)]);
        let item = ItemId::from("a");

        let first = engagement
            .record_view(&item, &DeviceId::from("d1"))
            .await
            .unwrap();
        assert_eq!(first.view_count, 6);
        assert!(first.is_new_view);

        let repeat = engagement
            .record_view(&item, &DeviceId::from("d1"))
            .await
            .unwrap();
        assert_eq!(repeat.view_count, 6);
        assert!(!repeat.is_new_view);

        let other = engagement
            .record_view(&item, &DeviceId::from("d2"))
            .await
            .unwrap();
        assert_eq!(other.view_count, 7);
    }

    #[tokio::test]
    async fn test_unlike_never_goes_negative() {
        let engagement = InMemoryEngagement::from_items(&[create_test_item("a", 0, 0)]);
        let item = ItemId::from("a");
        assert_eq!(engagement.set_like(&item, LikeAction::Unlike).await.unwrap(), 0);
        assert_eq!(engagement.set_like(&item, LikeAction::Like).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_item_is_an_error() {
        let engagement = InMemoryEngagement::new();
        let err = engagement
            .record_view(&ItemId::from("x"), &DeviceId::from("d"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Engagement { .. }));
    }
}
