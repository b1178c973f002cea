//! The feed actor: one task that owns the session, router and controller.
//!
//! Inputs, host media events and the results of spawned work are handled
//! one at a time, so a transition's pause/attach/play dispatch always
//! completes before the next message is looked at. Spawned work (play with
//! retry, the delayed sweep, view and like calls) reports back through an
//! internal channel and is re-validated on arrival.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{DEFAULT_EVENT_CAPACITY, DEFAULT_MAILBOX_CAPACITY, FeedHandle};
use super::messages::{Completion, FeedCommand, FeedEvent, FeedOutcome, FeedSnapshot, FeedStats};
use crate::config::EngineConfig;
use crate::engagement::Engagement;
use crate::error::PlaybackError;
use crate::media::SharedElement;
use crate::model::{ItemId, LikeAction, ViewReceipt};
use crate::playback::{PlayCompletion, PlaybackController, SlotState, SweepOutcome, TransitionPlan};
use crate::router::{GestureRouter, Routed};
use crate::session::FeedSession;

pub struct FeedActor {
    session: FeedSession,
    router: GestureRouter,
    controller: PlaybackController,
    engagement: Arc<dyn Engagement>,
    mailbox: mpsc::Receiver<FeedCommand>,
    internal_tx: mpsc::UnboundedSender<Completion>,
    internal_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<FeedEvent>,
    cancellation_token: CancellationToken,
    /// Slot states as last published.
    published: Vec<SlotState>,
    stats: FeedStats,
}

impl FeedActor {
    /// Create an actor and its handle. `elements` must hold one element per
    /// feed item, in feed order.
    pub fn new(
        config: EngineConfig,
        session: FeedSession,
        elements: Vec<SharedElement>,
        engagement: Arc<dyn Engagement>,
        cancellation_token: CancellationToken,
    ) -> Result<(Self, FeedHandle), PlaybackError> {
        if elements.len() != session.len() {
            return Err(PlaybackError::MissingElement {
                index: elements.len().min(session.len()),
            });
        }

        let (tx, mailbox) = mpsc::channel(DEFAULT_MAILBOX_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let handle = FeedHandle::new(tx, events.clone(), cancellation_token.clone());

        let router = GestureRouter::new(config.gestures, session.len());
        let controller = PlaybackController::new(config.playback, elements);
        let published = vec![SlotState::Unloaded; session.len()];

        let actor = Self {
            session,
            router,
            controller,
            engagement,
            mailbox,
            internal_tx,
            internal_rx,
            events,
            cancellation_token,
            published,
            stats: FeedStats::default(),
        };
        Ok((actor, handle))
    }

    /// Run the actor's event loop until stopped or cancelled.
    pub async fn run(mut self) -> FeedOutcome {
        info!(
            items = self.session.len(),
            device_id = %self.session.device_id(),
            "Feed actor starting"
        );

        self.activate(self.router.current_index());

        let outcome = loop {
            let scroll_timer = Self::scroll_timer(self.router.next_deadline());

            tokio::select! {
                biased;

                Some(done) = self.internal_rx.recv() => {
                    self.handle_completion(done);
                }

                msg = self.mailbox.recv() => {
                    match msg {
                        Some(cmd) => {
                            if self.handle_command(cmd) {
                                debug!("Feed actor received stop signal");
                                break FeedOutcome::Stopped;
                            }
                        }
                        None => {
                            debug!("All feed handles dropped");
                            break FeedOutcome::Stopped;
                        }
                    }
                }

                // Self-scheduled scroll debounce
                _ = scroll_timer => {
                    let routed = self.router.settle(Instant::now());
                    self.apply_routed(routed);
                }

                _ = self.cancellation_token.cancelled() => {
                    info!("Feed actor cancelled");
                    break FeedOutcome::Cancelled;
                }
            }

            self.publish_slot_changes();
        };

        info!(
            transitions = self.stats.transitions,
            sweeps = self.stats.sweeps,
            failed_plays = self.stats.failed_plays,
            views_reported = self.stats.views_reported,
            ?outcome,
            "Feed actor stopped"
        );
        outcome
    }

    /// Resolves at `deadline`, or never when no scroll sample is pending.
    async fn scroll_timer(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Handle an incoming command.
    ///
    /// Returns `true` if the actor should stop.
    fn handle_command(&mut self, cmd: FeedCommand) -> bool {
        let now = Instant::now();
        match cmd {
            FeedCommand::Scroll { offset } => {
                let routed = self.router.on_scroll(offset, now);
                self.apply_routed(routed);
            }
            FeedCommand::Wheel { delta_y } => {
                let routed = self.router.on_wheel(delta_y, now);
                self.apply_routed(routed);
            }
            FeedCommand::TouchStart { y } => self.router.on_touch_start(y),
            FeedCommand::TouchEnd { y } => {
                let routed = self.router.on_touch_end(y);
                self.apply_routed(routed);
            }
            FeedCommand::Key(key) => {
                let routed = self.router.on_key(key);
                self.apply_routed(routed);
            }
            FeedCommand::Resize { viewport_height } => {
                let routed = self.router.resize(viewport_height);
                self.apply_routed(routed);
            }
            FeedCommand::JumpTo(index) => {
                let routed = self.router.jump_to(index);
                self.apply_routed(routed);
            }
            FeedCommand::ToggleMute => {
                let muted = self.session.toggle_muted();
                self.sync_mute(muted);
            }
            FeedCommand::SetMuted(muted) => {
                if self.session.set_muted(muted) {
                    self.sync_mute(muted);
                }
            }
            FeedCommand::ToggleLike => self.toggle_like(),
            FeedCommand::RetryCurrent => {
                if let Some(plan) = self.controller.retry_current(&self.session) {
                    self.dispatch(plan);
                }
            }
            FeedCommand::Media { index, event } => {
                if let Some(error) = self.controller.handle_media_event(index, event) {
                    self.emit(FeedEvent::SlotFailed {
                        index,
                        hide_media: error.hides_media(),
                        error,
                    });
                }
            }
            FeedCommand::GetSnapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            FeedCommand::Stop => return true,
        }
        false
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::PlayFinished {
                index,
                generation,
                report,
            } => match self
                .controller
                .complete_play(&self.session, index, generation, report)
            {
                PlayCompletion::Activated { index } => self.report_view(index),
                PlayCompletion::Failed { index, error } => {
                    self.stats.failed_plays += 1;
                    self.emit(FeedEvent::SlotFailed {
                        index,
                        hide_media: error.hides_media(),
                        error,
                    });
                }
                PlayCompletion::Superseded { .. } => {}
            },
            Completion::SweepDue { index } => {
                match self.controller.sweep(&self.session, index) {
                    SweepOutcome::Stale => self.stats.stale_sweeps += 1,
                    SweepOutcome::Completed { .. } => self.stats.sweeps += 1,
                }
            }
            Completion::ViewRecorded { item, result } => self.handle_view_recorded(item, result),
            Completion::LikeRecorded {
                item,
                action,
                result,
            } => self.handle_like_recorded(item, action, result),
        }
    }

    fn apply_routed(&mut self, routed: Routed) {
        if let Some(change) = routed.index_change {
            self.emit(FeedEvent::IndexChanged {
                from: change.from,
                to: change.to,
            });
            self.activate(change.to);
        }
        if let Some(target) = routed.scroll_to {
            self.emit(FeedEvent::ScrollTo(target));
        }
    }

    fn activate(&mut self, index: usize) {
        if let Some(plan) = self.controller.transition(&self.session, index) {
            self.stats.transitions += 1;
            self.dispatch(plan);
        }
    }

    /// Spawn the deferred work of a transition.
    fn dispatch(&self, plan: TransitionPlan) {
        if let Some(request) = plan.play {
            let tx = self.internal_tx.clone();
            let (index, generation) = (request.index, request.generation);
            tokio::spawn(async move {
                let report = request.run().await;
                let _ = tx.send(Completion::PlayFinished {
                    index,
                    generation,
                    report,
                });
            });
        }

        let tx = self.internal_tx.clone();
        let (index, delay) = (plan.index, plan.sweep_after);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::SweepDue { index });
        });
    }

    fn sync_mute(&mut self, muted: bool) {
        let touched = self.controller.apply_mute(muted);
        debug!(muted, touched, "Mute state applied");
        self.emit(FeedEvent::MuteChanged { muted });
    }

    /// Report the first activation of an item in this session.
    fn report_view(&mut self, index: usize) {
        let Some(item) = self.session.begin_view(index) else {
            return;
        };
        let device = self.session.device_id().clone();
        let engagement = Arc::clone(&self.engagement);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = engagement.record_view(&item, &device).await;
            let _ = tx.send(Completion::ViewRecorded { item, result });
        });
    }

    fn handle_view_recorded(&mut self, item: ItemId, result: Result<ViewReceipt, PlaybackError>) {
        match result {
            Ok(receipt) => {
                self.stats.views_reported += 1;
                if let Some(index) = self.session.apply_view_receipt(&item, receipt) {
                    self.emit(FeedEvent::ViewCountUpdated {
                        index,
                        view_count: receipt.view_count,
                    });
                }
            }
            Err(e) => {
                warn!(item = %item, error = %e, "Failed to record view");
                self.session.forget_view(&item);
            }
        }
    }

    fn toggle_like(&mut self) {
        let index = self.router.current_index();
        let Some((item, action)) = self.session.toggle_like(index) else {
            return;
        };
        debug!(item = %item, %action, "Sending like toggle");
        let engagement = Arc::clone(&self.engagement);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = engagement.set_like(&item, action).await;
            let _ = tx.send(Completion::LikeRecorded {
                item,
                action,
                result,
            });
        });
    }

    fn handle_like_recorded(
        &mut self,
        item: ItemId,
        action: LikeAction,
        result: Result<u64, PlaybackError>,
    ) {
        let like_count = match result {
            Ok(count) => {
                self.session.apply_like_count(&item, count);
                count
            }
            Err(e) => {
                warn!(item = %item, %action, error = %e, "Failed to update like");
                self.session.revert_like(&item, action);
                match self.session.index_of(&item) {
                    Some(index) => self.session.items()[index].like_count,
                    None => return,
                }
            }
        };

        if let Some(index) = self.session.index_of(&item) {
            self.emit(FeedEvent::LikeCountUpdated {
                index,
                like_count,
                liked: self.session.is_liked(&item),
            });
        }
    }

    /// Emit `SlotChanged` for every slot whose state moved since the last call.
    fn publish_slot_changes(&mut self) {
        for index in 0..self.published.len() {
            let Some(state) = self.controller.slot(index).map(|slot| slot.state) else {
                continue;
            };
            if self.published[index] != state {
                self.published[index] = state;
                self.emit(FeedEvent::SlotChanged { index, state });
            }
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        let liked = self
            .session
            .items()
            .iter()
            .filter(|item| self.session.is_liked(&item.id))
            .map(|item| item.id.clone())
            .collect();

        FeedSnapshot {
            viewport: self.router.viewport(),
            muted: self.session.muted(),
            generation: self.controller.generation(),
            slots: self.controller.snapshot(),
            items: self.session.items().to_vec(),
            liked,
            stats: self.stats,
        }
    }

    fn emit(&self, event: FeedEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::device::DeviceId;
    use crate::engagement::InMemoryEngagement;
    use crate::media::{MediaElement, MediaEvent, PlayScript, SimulatedElement};
    use crate::model::FeedItem;
    use crate::router::NavKey;

    fn create_test_items(count: usize) -> Vec<FeedItem> {
        (0..count)
            .map(|i| FeedItem {
                id: ItemId::new(format!("item-{i}")),
                media_url: format!("https://cdn.example.com/{i}.mp4"),
                title: format!("Item {i}"),
                description: String::new(),
                thumbnail_url: None,
                is_live: false,
                view_count: 100,
                like_count: 10,
            })
            .collect()
    }

    struct TestFeed {
        handle: FeedHandle,
        elements: Vec<Arc<SimulatedElement>>,
        task: tokio::task::JoinHandle<FeedOutcome>,
    }

    fn spawn_feed_with(
        count: usize,
        engagement: Arc<dyn Engagement>,
        setup: impl FnOnce(&[Arc<SimulatedElement>]),
    ) -> TestFeed {
        let items = create_test_items(count);
        let elements = SimulatedElement::feed(count);
        setup(&elements);

        let session = FeedSession::new(DeviceId::from("device-a"), items);
        let (actor, handle) = FeedActor::new(
            EngineConfig::default(),
            session,
            SimulatedElement::shared(&elements),
            engagement,
            CancellationToken::new(),
        )
        .unwrap();
        let task = tokio::spawn(actor.run());

        TestFeed {
            handle,
            elements,
            task,
        }
    }

    fn spawn_feed(count: usize) -> TestFeed {
        let engagement = Arc::new(InMemoryEngagement::from_items(&create_test_items(count)));
        spawn_feed_with(count, engagement, |_| {})
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    /// Fails the first `failures` view reports, then delegates.
    struct FlakyEngagement {
        failures: AtomicU32,
        calls: AtomicU32,
        inner: InMemoryEngagement,
    }

    #[async_trait]
    impl Engagement for FlakyEngagement {
        async fn record_view(
            &self,
            item: &ItemId,
            device: &DeviceId,
        ) -> Result<ViewReceipt, PlaybackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(PlaybackError::engagement("connection reset"));
            }
            self.inner.record_view(item, device).await
        }

        async fn set_like(&self, _item: &ItemId, _action: LikeAction) -> Result<u64, PlaybackError> {
            Err(PlaybackError::engagement("service unavailable"))
        }
    }

    #[test]
    fn test_element_count_must_match_items() {
        let session = FeedSession::new(DeviceId::from("d"), create_test_items(3));
        let result = FeedActor::new(
            EngineConfig::default(),
            session,
            SimulatedElement::shared(&SimulatedElement::feed(2)),
            Arc::new(InMemoryEngagement::new()),
            CancellationToken::new(),
        );
        assert!(matches!(
            result,
            Err(PlaybackError::MissingElement { index: 2 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_item_plays_and_reports_view() {
        let feed = spawn_feed(5);
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(0), Some(SlotState::Active));
        assert_eq!(snapshot.state_of(1), Some(SlotState::Preloaded));
        assert_eq!(snapshot.state_of(2), Some(SlotState::Unloaded));
        assert!(snapshot.muted);
        assert!(feed.elements[0].is_playing());
        assert!(feed.elements[0].is_muted());
        assert_eq!(snapshot.items[0].view_count, 101);
        assert_eq!(snapshot.stats.views_reported, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rejections_then_success_ends_active() {
        let feed = spawn_feed_with(
            3,
            Arc::new(InMemoryEngagement::from_items(&create_test_items(3))),
            |elements| {
                elements[0].script([
                    PlayScript::Reject("autoplay blocked".into()),
                    PlayScript::Reject("decoder busy".into()),
                ]);
            },
        );
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(0), Some(SlotState::Active));
        assert!(snapshot.slots[0].error.is_none());
        assert_eq!(feed.elements[0].stats().play_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_mark_slot_failed() {
        let feed = spawn_feed_with(
            3,
            Arc::new(InMemoryEngagement::from_items(&create_test_items(3))),
            |elements| {
                elements[0].script([PlayScript::Fail("unsupported codec".into())]);
            },
        );
        let mut events = feed.handle.subscribe();
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(0), Some(SlotState::Failed));
        assert_eq!(snapshot.stats.failed_plays, 1);

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let FeedEvent::SlotFailed {
                index, hide_media, ..
            } = event
            {
                assert_eq!(index, 0);
                assert!(!hide_media);
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        // Explicit retry clears the failure; the next play resolves.
        feed.handle.retry_current().await.unwrap();
        settle().await;
        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(0), Some(SlotState::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jump_releases_far_slots_after_grace() {
        let feed = spawn_feed(11);
        settle().await;

        feed.handle.jump_to(5).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Within the grace period the old slot is paused but still attached.
        let early = feed.handle.snapshot().await.unwrap();
        assert!(!feed.elements[0].is_playing());
        assert!(feed.elements[0].has_source());
        assert_eq!(early.state_of(5), Some(SlotState::Active));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let snapshot = feed.handle.snapshot().await.unwrap();
        for index in 0..11 {
            let expected = match index {
                5 => SlotState::Active,
                4 | 6 => SlotState::Preloaded,
                _ => SlotState::Unloaded,
            };
            assert_eq!(snapshot.state_of(index), Some(expected), "position {index}");
        }
        assert!(!feed.elements[0].has_source());
        assert_eq!(snapshot.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_navigation_leaves_one_active() {
        let feed = spawn_feed(8);
        settle().await;

        for _ in 0..3 {
            feed.handle.key(NavKey::ArrowDown).await.unwrap();
        }
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.viewport.current_index, 3);
        assert_eq!(snapshot.state_of(3), Some(SlotState::Active));
        assert_eq!(snapshot.active_count(), 1);
        assert_eq!(snapshot.state_of(0), Some(SlotState::Unloaded));
        let playing = feed.elements.iter().filter(|e| e.is_playing()).count();
        assert_eq!(playing, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_burst_causes_one_transition() {
        let feed = spawn_feed(10);
        settle().await;
        let mut events = feed.handle.subscribe();

        for _ in 0..5 {
            feed.handle.wheel(120.0).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        settle().await;

        let mut transitions = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, FeedEvent::IndexChanged { .. }) {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(feed.handle.snapshot().await.unwrap().viewport.current_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_samples_are_debounced() {
        let feed = spawn_feed(10);
        settle().await;
        let mut events = feed.handle.subscribe();

        for offset in [200.0, 900.0, 1_700.0, 2_350.0] {
            feed.handle.scroll(offset).await.unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        settle().await;

        let changes: Vec<FeedEvent> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, FeedEvent::IndexChanged { .. }))
            .collect();
        assert_eq!(changes, vec![FeedEvent::IndexChanged { from: 0, to: 3 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_mute_resyncs_attached_handles() {
        let feed = spawn_feed(6);
        settle().await;

        feed.handle.toggle_mute().await.unwrap();
        let snapshot = feed.handle.snapshot().await.unwrap();
        assert!(!snapshot.muted);
        for slot in snapshot.slots.iter().filter(|s| s.has_source) {
            assert!(!slot.muted, "position {} still muted", slot.index);
        }

        // Newly attached neighbours pick up the session state.
        feed.handle.key(NavKey::ArrowDown).await.unwrap();
        settle().await;
        assert!(!feed.elements[2].is_muted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_reports_whether_default_scroll_is_replaced() {
        let feed = spawn_feed(3);
        settle().await;

        // Rejected at the top, but the host still must not scroll the page.
        assert!(feed.handle.key(NavKey::ArrowUp).await.unwrap());
        assert!(!feed.handle.key(NavKey::Other).await.unwrap());
        settle().await;
        assert_eq!(feed.handle.snapshot().await.unwrap().viewport.current_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisit_does_not_report_view_twice() {
        let engagement = Arc::new(InMemoryEngagement::from_items(&create_test_items(4)));
        let feed = spawn_feed_with(4, engagement.clone(), |_| {});
        settle().await;

        feed.handle.key(NavKey::ArrowDown).await.unwrap();
        settle().await;
        feed.handle.key(NavKey::ArrowUp).await.unwrap();
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.items[0].view_count, 101);
        assert_eq!(engagement.view_count(&ItemId::from("item-0")), Some(101));
        assert_eq!(snapshot.stats.views_reported, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_view_is_reported_again_later() {
        let engagement = Arc::new(FlakyEngagement {
            failures: AtomicU32::new(1),
            calls: AtomicU32::new(0),
            inner: InMemoryEngagement::from_items(&create_test_items(3)),
        });
        let feed = spawn_feed_with(3, engagement.clone(), |_| {});
        settle().await;

        // First report failed and was swallowed; playback is unaffected.
        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(0), Some(SlotState::Active));
        assert_eq!(snapshot.items[0].view_count, 100);

        feed.handle.key(NavKey::ArrowDown).await.unwrap();
        settle().await;
        feed.handle.key(NavKey::ArrowUp).await.unwrap();
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.items[0].view_count, 101);
        assert_eq!(engagement.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_like_toggle_uses_server_count() {
        let feed = spawn_feed(3);
        settle().await;
        let mut events = feed.handle.subscribe();

        feed.handle.toggle_like().await.unwrap();
        settle().await;

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            FeedEvent::LikeCountUpdated {
                index: 0,
                like_count: 11,
                liked: true,
            }
        );
        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.liked, vec![ItemId::from("item-0")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_like_is_reverted() {
        let engagement = Arc::new(FlakyEngagement {
            failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            inner: InMemoryEngagement::from_items(&create_test_items(2)),
        });
        let feed = spawn_feed_with(2, engagement, |_| {});
        settle().await;

        feed.handle.toggle_like().await.unwrap();
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert!(snapshot.liked.is_empty());
        assert_eq!(snapshot.items[0].like_count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_hides_media() {
        let feed = spawn_feed(4);
        settle().await;
        let mut events = feed.handle.subscribe();

        feed.handle
            .media_event(
                1,
                MediaEvent::LoadFailed {
                    reason: "404 Not Found".into(),
                },
            )
            .await
            .unwrap();
        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(1), Some(SlotState::Failed));

        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            FeedEvent::SlotFailed {
                index: 1,
                hide_media: true,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_during_play_retry_stays_failed() {
        let feed = spawn_feed_with(
            3,
            Arc::new(InMemoryEngagement::from_items(&create_test_items(3))),
            |elements| {
                elements[0].script([PlayScript::Reject("decoder busy".into())]);
            },
        );
        // The first attempt is rejected; the load error lands during backoff.
        tokio::time::sleep(Duration::from_millis(10)).await;
        feed.handle
            .media_event(
                0,
                MediaEvent::LoadFailed {
                    reason: "404 Not Found".into(),
                },
            )
            .await
            .unwrap();
        settle().await;

        let snapshot = feed.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(0), Some(SlotState::Failed));
        assert!(snapshot.slots[0].error.as_ref().unwrap().hides_media());
        assert_eq!(snapshot.stats.views_reported, 0);
        assert_eq!(feed.elements[0].stats().play_calls, 1);
        assert!(!feed.elements[0].is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_cancel() {
        let feed = spawn_feed(2);
        feed.handle.stop().await.unwrap();
        assert_eq!(feed.task.await.unwrap(), FeedOutcome::Stopped);

        let feed = spawn_feed(2);
        feed.handle.cancel();
        assert_eq!(feed.task.await.unwrap(), FeedOutcome::Cancelled);
        assert!(feed.handle.snapshot().await.is_err());
    }
}
