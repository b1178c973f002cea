//! Offline demo feed.

use reel_engine::{FeedItem, ItemId};

const CATALOGUE: &[(&str, &str)] = &[
    ("Trail runners", "Grip test on wet rock"),
    ("Noise cancelling headphones", "Subway ride, before and after"),
    ("Cast iron skillet", "Seasoning in three minutes"),
    ("Mechanical keyboard", "Tactile switch sound check"),
    ("Travel backpack", "Everything for a week, one bag"),
    ("Pour-over kettle", ""),
    ("Desk lamp", "Warm to cool in one dial"),
    ("Rain shell", "Shower test, live"),
];

/// Build `count` items cycling through a fixed catalogue.
///
/// Counters are derived from the position so repeated runs look the same.
pub fn demo_feed(count: usize) -> Vec<FeedItem> {
    (0..count)
        .map(|i| {
            let (title, description) = CATALOGUE[i % CATALOGUE.len()];
            let seed = (i as u64 + 1) * 7_919;
            FeedItem {
                id: ItemId::new(format!("demo-{}", i + 1)),
                media_url: format!("demo://clips/{}.mp4", i + 1),
                title: title.to_string(),
                description: description.to_string(),
                thumbnail_url: None,
                is_live: description.ends_with("live"),
                view_count: seed % 250_000,
                like_count: seed % 9_000,
            }
        })
        .collect()
}
