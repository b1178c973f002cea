//! Per-session feed state shared by the router, controller and engagement calls.

use std::collections::HashSet;

use tracing::debug;

use crate::device::DeviceId;
use crate::model::{FeedItem, ItemId, LikeAction, ViewReceipt};

/// Everything the feed remembers for the lifetime of one session.
///
/// Owned by the feed actor and lent to the playback controller, so there is
/// exactly one mute flag and one view-tracking set per session.
#[derive(Debug, Clone)]
pub struct FeedSession {
    device_id: DeviceId,
    items: Vec<FeedItem>,
    muted: bool,
    /// `(device, item)` pairs already reported as viewed.
    viewed: HashSet<(DeviceId, ItemId)>,
    liked: HashSet<ItemId>,
}

impl FeedSession {
    /// Start a session. Audio starts muted.
    pub fn new(device_id: DeviceId, items: Vec<FeedItem>) -> Self {
        Self {
            device_id,
            items,
            muted: true,
            viewed: HashSet::new(),
            liked: HashSet::new(),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&FeedItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Media URL for a position, empty when out of range.
    pub fn media_url(&self, index: usize) -> &str {
        self.items
            .get(index)
            .map(|item| item.media_url.as_str())
            .unwrap_or_default()
    }

    pub fn index_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    // --- mute ---

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Returns true when the flag changed.
    pub fn set_muted(&mut self, muted: bool) -> bool {
        let changed = self.muted != muted;
        self.muted = muted;
        changed
    }

    /// Flip the flag and return the new value.
    pub fn toggle_muted(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    // --- views ---

    /// Claim the view report for the item at `index`.
    ///
    /// Returns the item id when this device has not reported it yet in this
    /// session; the pair is recorded before the request is sent.
    pub fn begin_view(&mut self, index: usize) -> Option<ItemId> {
        let id = self.items.get(index)?.id.clone();
        if self
            .viewed
            .insert((self.device_id.clone(), id.clone()))
        {
            Some(id)
        } else {
            None
        }
    }

    /// Drop a pair after a failed report so a later activation retries it.
    pub fn forget_view(&mut self, id: &ItemId) {
        self.viewed.remove(&(self.device_id.clone(), id.clone()));
    }

    pub fn has_viewed(&self, id: &ItemId) -> bool {
        self.viewed.contains(&(self.device_id.clone(), id.clone()))
    }

    /// Overwrite the local view counter with the server's value.
    ///
    /// Returns the position of the updated item.
    pub fn apply_view_receipt(&mut self, id: &ItemId, receipt: ViewReceipt) -> Option<usize> {
        let index = self.index_of(id)?;
        let item = &mut self.items[index];
        debug!(
            item = %id,
            view_count = receipt.view_count,
            is_new_view = receipt.is_new_view,
            "View recorded"
        );
        item.view_count = receipt.view_count;
        Some(index)
    }

    // --- likes ---

    pub fn is_liked(&self, id: &ItemId) -> bool {
        self.liked.contains(id)
    }

    /// Flip the local like flag of the item at `index`.
    ///
    /// Returns the action to send to the server.
    pub fn toggle_like(&mut self, index: usize) -> Option<(ItemId, LikeAction)> {
        let id = self.items.get(index)?.id.clone();
        let action = if self.liked.remove(&id) {
            LikeAction::Unlike
        } else {
            self.liked.insert(id.clone());
            LikeAction::Like
        };
        Some((id, action))
    }

    /// Undo a local toggle after the server call failed.
    pub fn revert_like(&mut self, id: &ItemId, action: LikeAction) {
        match action {
            LikeAction::Like => {
                self.liked.remove(id);
            }
            LikeAction::Unlike => {
                self.liked.insert(id.clone());
            }
        }
    }

    pub fn apply_like_count(&mut self, id: &ItemId, like_count: u64) -> Option<usize> {
        let index = self.index_of(id)?;
        self.items[index].like_count = like_count;
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_session() -> FeedSession {
        let items = ["a", "b", "c"]
            .into_iter()
            .map(|id| FeedItem {
                id: ItemId::from(id),
                media_url: format!("https://cdn.example.com/{id}.mp4"),
                title: id.to_uppercase(),
                description: String::new(),
                thumbnail_url: None,
                is_live: false,
                view_count: 10,
                like_count: 3,
            })
            .collect();
        FeedSession::new(DeviceId::from("device-a"), items)
    }

    #[test]
    fn test_starts_muted() {
        let mut session = create_test_session();
        assert!(session.muted());
        assert!(!session.toggle_muted());
        assert!(!session.set_muted(false));
        assert!(session.set_muted(true));
    }

    #[test]
    fn test_view_claimed_once_per_device_and_item() {
        let mut session = create_test_session();
        assert_eq!(session.begin_view(1), Some(ItemId::from("b")));
        assert_eq!(session.begin_view(1), None);
        assert!(session.has_viewed(&ItemId::from("b")));
        assert_eq!(session.begin_view(7), None);
    }

    #[test]
    fn test_forgotten_view_can_be_claimed_again() {
        let mut session = create_test_session();
        let id = session.begin_view(0).unwrap();
        session.forget_view(&id);
        assert_eq!(session.begin_view(0), Some(id));
    }

    #[test]
    fn test_repeat_view_receipt_does_not_double_count() {
        let mut session = create_test_session();
        let id = ItemId::from("a");

        session.apply_view_receipt(
            &id,
            ViewReceipt {
                view_count: 11,
                is_new_view: true,
            },
        );
        // Same device reported again elsewhere; the server does not count it.
        session.apply_view_receipt(
            &id,
            ViewReceipt {
                view_count: 11,
                is_new_view: false,
            },
        );
        assert_eq!(session.item(0).unwrap().view_count, 11);
    }

    #[test]
    fn test_like_toggle_and_revert() {
        let mut session = create_test_session();
        let (id, action) = session.toggle_like(2).unwrap();
        assert_eq!(action, LikeAction::Like);
        assert!(session.is_liked(&id));

        let (_, action) = session.toggle_like(2).unwrap();
        assert_eq!(action, LikeAction::Unlike);
        assert!(!session.is_liked(&id));

        session.revert_like(&id, LikeAction::Unlike);
        assert!(session.is_liked(&id));

        assert_eq!(session.apply_like_count(&id, 42), Some(2));
        assert_eq!(session.item(2).unwrap().like_count, 42);
    }
}
