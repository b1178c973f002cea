use std::io::Write;

use reel_api::Product;
use reel_engine::model::format_count;
use reel_engine::monitor::MemorySample;
use reel_engine::{FeedEvent, FeedItem, FeedSnapshot};
use serde::Serialize;
use tracing::warn;

/// Writes feed output to stdout, either as text or as JSON lines.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    json: bool,
    raw: bool,
}

impl Console {
    /// `raw` is set while the terminal is in raw mode, where a bare `\n`
    /// does not return the cursor.
    pub fn new(json: bool, raw: bool) -> Self {
        Self { json, raw }
    }

    pub fn line(&self, text: &str) {
        let ending = if self.raw { "\r\n" } else { "\n" };
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{text}{ending}");
        let _ = stdout.flush();
    }

    fn json_line<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(text) => self.line(&text),
            Err(e) => warn!(error = %e, "Failed to serialize output"),
        }
    }

    pub fn event(&self, event: &FeedEvent, items: &[FeedItem]) {
        if self.json {
            self.json_line(event);
            return;
        }
        if let Some(text) = describe_event(event, items) {
            self.line(&text);
        }
    }

    pub fn snapshot(&self, snapshot: &FeedSnapshot, memory: Option<&MemorySample>) {
        if self.json {
            self.json_line(snapshot);
            return;
        }
        let viewport = &snapshot.viewport;
        self.line(&format!(
            "-- {}/{} | gen {} | {} | {} transitions, {} sweeps, {} failed plays",
            viewport.current_index + 1,
            viewport.item_count,
            snapshot.generation,
            if snapshot.muted { "muted" } else { "sound on" },
            snapshot.stats.transitions,
            snapshot.stats.sweeps,
            snapshot.stats.failed_plays,
        ));
        let slots: Vec<String> = snapshot
            .slots
            .iter()
            .filter(|slot| slot.has_source || slot.error.is_some())
            .map(|slot| format!("#{}:{}", slot.index + 1, slot.state))
            .collect();
        self.line(&format!("   slots {}", slots.join(" ")));
        if let Some(sample) = memory {
            self.line(&format!("   memory {sample}"));
        }
    }

    pub fn products(&self, item: &FeedItem, products: &[Product]) {
        if self.json {
            self.json_line(&products);
            return;
        }
        if products.is_empty() {
            self.line(&format!("   no products for \"{}\"", item.title));
            return;
        }
        for product in products {
            let mut text = format!("   {} {}", product.name, product.display_price());
            if product.is_discounted() {
                text.push_str(" (sale)");
            }
            self.line(&text);
        }
    }
}

pub fn describe_event(event: &FeedEvent, items: &[FeedItem]) -> Option<String> {
    let text = match event {
        FeedEvent::IndexChanged { to, .. } => {
            let item = items.get(*to)?;
            let live = if item.is_live { " [LIVE]" } else { "" };
            format!(
                "> {}/{}{} {}  ({} views, {} likes)",
                to + 1,
                items.len(),
                live,
                item.caption(),
                format_count(item.view_count),
                format_count(item.like_count),
            )
        }
        FeedEvent::SlotFailed {
            index,
            error,
            hide_media,
        } => {
            let hint = if *hide_media {
                "media hidden"
            } else {
                "press r to retry"
            };
            format!("! #{} failed: {error} ({hint})", index + 1)
        }
        FeedEvent::MuteChanged { muted } => {
            if *muted {
                "  muted".to_string()
            } else {
                "  sound on".to_string()
            }
        }
        FeedEvent::ViewCountUpdated { index, view_count } => {
            format!("  #{} {} views", index + 1, format_count(*view_count))
        }
        FeedEvent::LikeCountUpdated {
            index,
            like_count,
            liked,
        } => {
            let mark = if *liked { "liked" } else { "unliked" };
            format!("  #{} {mark}, {} likes", index + 1, format_count(*like_count))
        }
        FeedEvent::ScrollTo(_) | FeedEvent::SlotChanged { .. } => return None,
    };
    Some(text)
}
