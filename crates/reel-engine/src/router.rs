//! Scroll and gesture routing.
//!
//! Turns raw input (scroll offsets, wheel deltas, touch swipes, arrow keys)
//! into index changes for the playback controller and scroll commands for the
//! host. The router owns [`ViewportState`]; nothing else mutates it.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::GestureConfig;

/// Which feed position fills the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewportState {
    pub current_index: usize,
    pub item_count: usize,
    pub viewport_height: f64,
}

impl ViewportState {
    pub fn last_index(&self) -> usize {
        self.item_count.saturating_sub(1)
    }

    /// Scroll offset at which `index` is snapped into view.
    pub fn offset_of(&self, index: usize) -> f64 {
        index as f64 * self.viewport_height
    }

    pub fn max_offset(&self) -> f64 {
        self.offset_of(self.last_index())
    }

    /// Nearest position for a raw offset, clamped to the feed.
    pub fn index_at(&self, offset: f64) -> usize {
        if self.item_count == 0 || !offset.is_finite() || offset <= 0.0 {
            return 0;
        }
        let raw = (offset / self.viewport_height).round();
        (raw as usize).min(self.last_index())
    }
}

/// Programmatic scroll the host should perform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollTarget {
    pub offset: f64,
    pub smooth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexChange {
    pub from: usize,
    pub to: usize,
}

/// Outcome of routing one input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Routed {
    pub index_change: Option<IndexChange>,
    pub scroll_to: Option<ScrollTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavKey {
    ArrowUp,
    ArrowDown,
    Other,
}

impl NavKey {
    /// Navigation keys replace the host's default page scroll, including at
    /// the ends of the feed where the step itself is rejected.
    pub fn is_navigation(self) -> bool {
        !matches!(self, NavKey::Other)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingScroll {
    offset: f64,
    deadline: Instant,
}

pub struct GestureRouter {
    config: GestureConfig,
    viewport: ViewportState,
    pending: Option<PendingScroll>,
    wheel_locked_until: Option<Instant>,
    touch_start: Option<f64>,
}

impl GestureRouter {
    pub fn new(config: GestureConfig, item_count: usize) -> Self {
        let viewport = ViewportState {
            current_index: 0,
            item_count,
            viewport_height: config.viewport_height,
        };
        Self {
            config,
            viewport,
            pending: None,
            wheel_locked_until: None,
            touch_start: None,
        }
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn current_index(&self) -> usize {
        self.viewport.current_index
    }

    /// When the pending scroll sample should be resolved, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    pub fn debounce(&self) -> Duration {
        self.config.scroll_debounce()
    }

    /// Record a raw scroll offset. The latest sample wins once the debounce
    /// window passes quietly.
    ///
    /// Offsets outside the feed are corrected at once with a non-animated scroll.
    pub fn on_scroll(&mut self, offset: f64, now: Instant) -> Routed {
        if self.viewport.item_count == 0 || !offset.is_finite() {
            return Routed::default();
        }

        let max = self.viewport.max_offset();
        let clamped = offset.clamp(0.0, max);
        let mut routed = Routed::default();
        if clamped != offset {
            trace!(offset, clamped, "Correcting overscroll");
            routed.scroll_to = Some(ScrollTarget {
                offset: clamped,
                smooth: false,
            });
        }

        self.pending = Some(PendingScroll {
            offset: clamped,
            deadline: now + self.config.scroll_debounce(),
        });
        routed
    }

    /// Resolve the pending scroll sample if its quiet period has elapsed.
    pub fn settle(&mut self, now: Instant) -> Routed {
        let Some(pending) = self.pending else {
            return Routed::default();
        };
        if now < pending.deadline {
            return Routed::default();
        }
        self.pending = None;

        let index = self.viewport.index_at(pending.offset);
        let mut routed = Routed::default();
        if index != self.viewport.current_index {
            routed.index_change = Some(self.set_index(index));
        }

        let snapped = self.viewport.offset_of(index);
        if (pending.offset - snapped).abs() > self.config.snap_tolerance_px {
            routed.scroll_to = Some(ScrollTarget {
                offset: snapped,
                smooth: true,
            });
        }
        routed
    }

    /// One step per wheel gesture, then a cooldown that swallows the rest of it.
    pub fn on_wheel(&mut self, delta_y: f64, now: Instant) -> Routed {
        if let Some(until) = self.wheel_locked_until {
            if now < until {
                trace!(delta_y, "Wheel input swallowed during cooldown");
                return Routed::default();
            }
            self.wheel_locked_until = None;
        }

        if !delta_y.is_finite() || delta_y.abs() <= self.config.wheel_min_delta {
            return Routed::default();
        }

        self.wheel_locked_until = Some(now + self.config.wheel_cooldown());
        self.step(if delta_y > 0.0 { 1 } else { -1 })
    }

    pub fn on_touch_start(&mut self, y: f64) {
        self.touch_start = Some(y);
    }

    /// Finish a swipe. An upward swipe (start below end) advances.
    pub fn on_touch_end(&mut self, y: f64) -> Routed {
        let Some(start) = self.touch_start.take() else {
            return Routed::default();
        };
        let diff = start - y;
        if diff.abs() > self.config.swipe_threshold_px {
            self.step(if diff > 0.0 { 1 } else { -1 })
        } else {
            Routed::default()
        }
    }

    pub fn on_key(&mut self, key: NavKey) -> Routed {
        match key {
            NavKey::ArrowDown => self.step(1),
            NavKey::ArrowUp => self.step(-1),
            NavKey::Other => Routed::default(),
        }
    }

    /// Move one position. Steps past either end are rejected.
    pub fn step(&mut self, delta: isize) -> Routed {
        let current = self.viewport.current_index;
        let Some(target) = current.checked_add_signed(delta) else {
            debug!(current, delta, "Step before first item rejected");
            return Routed::default();
        };
        if target >= self.viewport.item_count {
            debug!(current, delta, "Step past last item rejected");
            return Routed::default();
        }

        // A programmatic move supersedes any half-settled scroll.
        self.pending = None;
        let change = self.set_index(target);
        Routed {
            index_change: Some(change),
            scroll_to: Some(ScrollTarget {
                offset: self.viewport.offset_of(target),
                smooth: true,
            }),
        }
    }

    /// Move straight to `index`, clamped to the feed.
    pub fn jump_to(&mut self, index: usize) -> Routed {
        if self.viewport.item_count == 0 {
            return Routed::default();
        }
        let index = index.min(self.viewport.last_index());
        self.pending = None;

        let index_change = (index != self.viewport.current_index).then(|| self.set_index(index));
        Routed {
            index_change,
            scroll_to: Some(ScrollTarget {
                offset: self.viewport.offset_of(index),
                smooth: false,
            }),
        }
    }

    /// Viewport height changed; re-snap the current position.
    pub fn resize(&mut self, viewport_height: f64) -> Routed {
        if !(viewport_height.is_finite() && viewport_height > 0.0) {
            return Routed::default();
        }
        self.viewport.viewport_height = viewport_height;
        self.pending = None;
        Routed {
            index_change: None,
            scroll_to: Some(ScrollTarget {
                offset: self.viewport.offset_of(self.viewport.current_index),
                smooth: false,
            }),
        }
    }

    fn set_index(&mut self, index: usize) -> IndexChange {
        let change = IndexChange {
            from: self.viewport.current_index,
            to: index,
        };
        debug!(from = change.from, to = change.to, "Viewport index changed");
        self.viewport.current_index = index;
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_router(count: usize) -> GestureRouter {
        GestureRouter::new(GestureConfig::default(), count)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_scroll_debounce_latest_sample_wins() {
        let mut router = create_test_router(10);
        let t0 = Instant::now();

        router.on_scroll(300.0, t0);
        router.on_scroll(1_000.0, t0 + ms(40));
        router.on_scroll(1_600.0, t0 + ms(80));

        // Quiet period measured from the last sample.
        assert_eq!(router.settle(t0 + ms(150)), Routed::default());
        assert_eq!(router.next_deadline(), Some(t0 + ms(180)));

        let routed = router.settle(t0 + ms(180));
        assert_eq!(routed.index_change, Some(IndexChange { from: 0, to: 2 }));
        assert!(routed.scroll_to.is_none());
        assert_eq!(router.current_index(), 2);
        assert!(router.next_deadline().is_none());
    }

    #[test]
    fn test_scroll_rounds_and_snaps() {
        let mut router = create_test_router(10);
        let t0 = Instant::now();

        router.on_scroll(1_300.0, t0);
        let routed = router.settle(t0 + ms(100));
        assert_eq!(routed.index_change, Some(IndexChange { from: 0, to: 2 }));
        assert_eq!(
            routed.scroll_to,
            Some(ScrollTarget {
                offset: 1_600.0,
                smooth: true
            })
        );
    }

    #[test]
    fn test_small_drift_is_not_corrected() {
        let mut router = create_test_router(10);
        let t0 = Instant::now();
        router.on_scroll(803.0, t0);
        let routed = router.settle(t0 + ms(100));
        assert_eq!(routed.index_change, Some(IndexChange { from: 0, to: 1 }));
        assert!(routed.scroll_to.is_none());
    }

    #[test]
    fn test_overscroll_corrected_immediately() {
        let mut router = create_test_router(3);
        let t0 = Instant::now();

        let routed = router.on_scroll(-120.0, t0);
        assert_eq!(
            routed.scroll_to,
            Some(ScrollTarget {
                offset: 0.0,
                smooth: false
            })
        );

        let routed = router.on_scroll(5_000.0, t0);
        assert_eq!(
            routed.scroll_to,
            Some(ScrollTarget {
                offset: 1_600.0,
                smooth: false
            })
        );
        let settled = router.settle(t0 + ms(100));
        assert_eq!(settled.index_change, Some(IndexChange { from: 0, to: 2 }));
    }

    #[test]
    fn test_wheel_burst_moves_one_step() {
        let mut router = create_test_router(10);
        let t0 = Instant::now();

        let transitions = (0..5)
            .map(|i| router.on_wheel(120.0, t0 + ms(i * 150)))
            .filter(|r| r.index_change.is_some())
            .count();
        assert_eq!(transitions, 1);
        assert_eq!(router.current_index(), 1);

        // Cooldown over: the next gesture moves again.
        let routed = router.on_wheel(120.0, t0 + ms(800));
        assert_eq!(routed.index_change, Some(IndexChange { from: 1, to: 2 }));
    }

    #[test]
    fn test_wheel_small_delta_ignored() {
        let mut router = create_test_router(10);
        let routed = router.on_wheel(10.0, Instant::now());
        assert!(routed.index_change.is_none());
        // A tiny delta does not arm the cooldown.
        let routed = router.on_wheel(40.0, Instant::now());
        assert_eq!(routed.index_change, Some(IndexChange { from: 0, to: 1 }));
    }

    #[test]
    fn test_swipe_threshold_and_direction() {
        let mut router = create_test_router(10);

        router.on_touch_start(500.0);
        assert!(router.on_touch_end(460.0).index_change.is_none());

        router.on_touch_start(500.0);
        let up = router.on_touch_end(420.0);
        assert_eq!(up.index_change, Some(IndexChange { from: 0, to: 1 }));

        router.on_touch_start(300.0);
        let down = router.on_touch_end(400.0);
        assert_eq!(down.index_change, Some(IndexChange { from: 1, to: 0 }));

        // End without start is ignored.
        assert_eq!(router.on_touch_end(0.0), Routed::default());
    }

    #[test]
    fn test_arrow_keys_consumed_at_boundaries() {
        let mut router = create_test_router(2);

        let up = router.on_key(NavKey::ArrowUp);
        assert!(NavKey::ArrowUp.is_navigation());
        assert!(up.index_change.is_none());

        let down = router.on_key(NavKey::ArrowDown);
        assert!(NavKey::ArrowDown.is_navigation());
        assert_eq!(down.index_change, Some(IndexChange { from: 0, to: 1 }));
        assert_eq!(
            down.scroll_to,
            Some(ScrollTarget {
                offset: 800.0,
                smooth: true
            })
        );

        let past_end = router.on_key(NavKey::ArrowDown);
        assert!(past_end.index_change.is_none());

        assert!(!NavKey::Other.is_navigation());
        assert_eq!(router.on_key(NavKey::Other), Routed::default());
    }

    #[test]
    fn test_step_discards_pending_scroll() {
        let mut router = create_test_router(10);
        let t0 = Instant::now();
        router.on_scroll(4_000.0, t0);
        router.on_key(NavKey::ArrowDown);
        assert!(router.next_deadline().is_none());
        assert_eq!(router.settle(t0 + ms(500)), Routed::default());
        assert_eq!(router.current_index(), 1);
    }

    #[test]
    fn test_jump_and_resize() {
        let mut router = create_test_router(5);

        let routed = router.jump_to(99);
        assert_eq!(routed.index_change, Some(IndexChange { from: 0, to: 4 }));
        assert!(router.jump_to(4).index_change.is_none());

        let routed = router.resize(600.0);
        assert_eq!(
            routed.scroll_to,
            Some(ScrollTarget {
                offset: 2_400.0,
                smooth: false
            })
        );
        assert_eq!(router.resize(0.0), Routed::default());
        assert_eq!(router.viewport().viewport_height, 600.0);
    }

    #[test]
    fn test_empty_feed_ignores_input() {
        let mut router = create_test_router(0);
        let t0 = Instant::now();
        assert_eq!(router.on_scroll(100.0, t0), Routed::default());
        assert!(router.on_key(NavKey::ArrowDown).index_change.is_none());
        assert_eq!(router.jump_to(3), Routed::default());
    }
}
