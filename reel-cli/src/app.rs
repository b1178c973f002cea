use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reel_api::ApiClient;
use reel_engine::media::PlayScript;
use reel_engine::monitor::MemorySample;
use reel_engine::playback::SlotState;
use reel_engine::router::NavKey;
use reel_engine::{
    DeviceId, Engagement, FeedActor, FeedEvent, FeedHandle, FeedItem, FeedOutcome, FeedSession,
    InMemoryEngagement, MediaEvent, MemoryMonitor, SimulatedElement,
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::Args;
use crate::config::{AppConfig, default_device_file};
use crate::demo::demo_feed;
use crate::error::{AppError, Result};
use crate::input::{Action, spawn_key_reader};
use crate::output::Console;

/// Play rejections scripted for each `--reject` position.
const SCRIPTED_REJECTIONS: usize = 2;

pub async fn run(args: Args, mut config: AppConfig) -> Result<()> {
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(path) = &args.collection {
        config.api.collection_path = path.clone();
    }

    let device_id = load_device_id(&args)?;
    info!(device_id = %device_id, "Starting feed session");

    let (items, engagement, api) = if args.offline {
        let items = demo_feed(args.items);
        let engagement: Arc<dyn Engagement> = Arc::new(InMemoryEngagement::from_items(&items));
        (items, engagement, None)
    } else {
        let client = ApiClient::new(&config.api)?;
        let items = client.list_items().await?;
        info!(count = items.len(), url = %client.collection_url(), "Loaded feed");
        let engagement: Arc<dyn Engagement> = Arc::new(client.clone());
        (items, engagement, Some(client))
    };
    if items.is_empty() {
        return Err(AppError::EmptyFeed);
    }

    let latency = Duration::from_millis(args.play_latency_ms);
    let elements: Vec<Arc<SimulatedElement>> = (0..items.len())
        .map(|_| Arc::new(SimulatedElement::with_latency(latency)))
        .collect();
    for &index in &args.reject {
        match elements.get(index) {
            Some(element) => element.script(
                std::iter::repeat_n(PlayScript::Reject("decoder busy".into()), SCRIPTED_REJECTIONS),
            ),
            None => warn!(index, "Ignoring --reject beyond the end of the feed"),
        }
    }
    let shared = SimulatedElement::shared(&elements);

    let token = CancellationToken::new();
    let session = FeedSession::new(device_id, items.clone());
    let (actor, handle) = FeedActor::new(
        config.engine.clone(),
        session,
        shared.clone(),
        engagement,
        token.clone(),
    )?;

    // Subscribe before the actor starts so the first transition is seen.
    let host_events = handle.subscribe();
    let printer_events = handle.subscribe();
    let actor_task = tokio::spawn(actor.run());

    let monitor_token = token.child_token();
    let (monitor_task, memory) = if config.engine.monitor.enabled {
        let (task, rx) = MemoryMonitor::with_sysinfo(shared)
            .spawn(config.engine.monitor.interval(), monitor_token.clone());
        (Some(task), rx)
    } else {
        (None, watch::channel(None).1)
    };

    let interactive = args.steps.is_none();
    let console = Console::new(args.json, interactive);
    let broken: HashSet<usize> = args.broken.iter().copied().collect();
    let host_task = tokio::spawn(simulate_host(
        handle.clone(),
        host_events,
        broken,
        token.clone(),
    ));
    let printer_task = tokio::spawn(print_events(
        console,
        printer_events,
        items.clone(),
        token.clone(),
    ));

    let driven = match args.steps {
        Some(steps) => {
            drive_steps(&handle, steps, Duration::from_millis(args.dwell_ms), &console, &memory)
                .await
        }
        None => drive_keys(&handle, &token, &console, &memory, api.as_ref()).await,
    };

    if let Err(e) = handle.stop().await {
        debug!(error = %e, "Feed actor already stopped");
    }
    let outcome = actor_task.await.unwrap_or(FeedOutcome::Cancelled);
    token.cancel();
    let _ = host_task.await;
    let _ = printer_task.await;

    if let Some(task) = monitor_task
        && let Ok(peaks) = task.await
    {
        info!(
            attached = peaks.with_source,
            playing = peaks.playing,
            resident_bytes = ?peaks.resident_bytes,
            "Peak media usage"
        );
    }
    info!(?outcome, "Feed session ended");
    driven
}

fn load_device_id(args: &Args) -> Result<DeviceId> {
    let path = args.device_file.clone().or_else(default_device_file);
    match path {
        Some(path) => Ok(DeviceId::load_or_create(path)?),
        None => {
            warn!("No data directory; using a device id for this run only");
            Ok(DeviceId::generate())
        }
    }
}

/// Step through the feed at a fixed pace, then print the final state.
async fn drive_steps(
    handle: &FeedHandle,
    steps: usize,
    dwell: Duration,
    console: &Console,
    memory: &watch::Receiver<Option<MemorySample>>,
) -> Result<()> {
    for step in 0..steps {
        tokio::select! {
            _ = tokio::time::sleep(dwell) => {}
            _ = tokio::signal::ctrl_c() => {
                info!(step, "Interrupted");
                break;
            }
        }
        handle.key(NavKey::ArrowDown).await?;
    }
    tokio::time::sleep(dwell).await;

    let snapshot = handle.snapshot().await?;
    console.snapshot(&snapshot, (*memory.borrow()).as_ref());
    Ok(())
}

/// Forward key presses to the feed until the user quits.
async fn drive_keys(
    handle: &FeedHandle,
    token: &CancellationToken,
    console: &Console,
    memory: &watch::Receiver<Option<MemorySample>>,
    api: Option<&ApiClient>,
) -> Result<()> {
    let reader_token = token.child_token();
    let (reader, mut actions) = spawn_key_reader(reader_token.clone());

    let result: Result<()> = loop {
        let action = tokio::select! {
            action = actions.recv() => action,
            _ = token.cancelled() => None,
        };
        let Some(action) = action else {
            break Ok(());
        };

        let step = match action {
            Action::Previous => handle.key(NavKey::ArrowUp).await.map(|_| ()),
            Action::Next => handle.key(NavKey::ArrowDown).await.map(|_| ()),
            Action::ToggleMute => handle.toggle_mute().await,
            Action::ToggleLike => handle.toggle_like().await,
            Action::Retry => handle.retry_current().await,
            Action::Status => match handle.snapshot().await {
                Ok(snapshot) => {
                    console.snapshot(&snapshot, (*memory.borrow()).as_ref());
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Action::Products => {
                match handle.snapshot().await {
                    Ok(snapshot) => {
                        if let Some(item) = snapshot.current_item() {
                            show_products(console, api, item).await;
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Action::Quit => break Ok(()),
        };
        if let Err(e) = step {
            break Err(e.into());
        }
    };

    reader_token.cancel();
    let _ = reader.await;
    result
}

async fn show_products(console: &Console, api: Option<&ApiClient>, item: &FeedItem) {
    let Some(api) = api else {
        console.line("   products are not available offline");
        return;
    };
    match api.item_products(&item.id).await {
        Ok(products) => console.products(item, &products),
        Err(e) => {
            warn!(item = %item.id, error = %e, "Failed to load products");
            console.line(&format!("   products unavailable: {e}"));
        }
    }
}

/// Stand in for the media host: report readiness for every newly attached
/// element, or a load failure for positions listed in `broken`.
async fn simulate_host(
    handle: FeedHandle,
    mut events: broadcast::Receiver<FeedEvent>,
    broken: HashSet<usize>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = token.cancelled() => break,
        };
        let (index, state) = match event {
            Ok(FeedEvent::SlotChanged { index, state }) => (index, state),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Host fell behind feed events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !matches!(state, SlotState::Loading | SlotState::Preloaded) {
            continue;
        }
        let media_event = if broken.contains(&index) {
            MediaEvent::LoadFailed {
                reason: "source unreachable".into(),
            }
        } else {
            MediaEvent::Ready
        };
        if handle.media_event(index, media_event).await.is_err() {
            break;
        }
    }
}

async fn print_events(
    console: Console,
    mut events: broadcast::Receiver<FeedEvent>,
    items: Vec<FeedItem>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = token.cancelled() => break,
        };
        match event {
            Ok(event) => console.event(&event, &items),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Output fell behind feed events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
