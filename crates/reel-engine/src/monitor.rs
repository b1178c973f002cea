//! Memory monitor.
//!
//! Periodically counts media elements by state and reads process memory where
//! the platform exposes it. Observability only: nothing here feeds back into
//! playback decisions.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sysinfo::{MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::media::SharedElement;

/// Process memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapUsage {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
}

/// Source of process memory figures.
pub trait HeapSource: Send {
    /// `None` when the platform does not expose the figures.
    fn sample(&mut self) -> Option<HeapUsage>;
}

/// Reads the current process through `sysinfo`.
pub struct SysinfoSource {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            debug!("Current pid unavailable; heap usage will be reported as unknown");
        }
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
            ),
            pid,
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapSource for SysinfoSource {
    fn sample(&mut self) -> Option<HeapUsage> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|process| HeapUsage {
            resident_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        })
    }
}

/// Source for hosts with no memory introspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSource;

impl HeapSource for UnsupportedSource {
    fn sample(&mut self) -> Option<HeapUsage> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySample {
    pub total_elements: usize,
    pub with_source: usize,
    pub playing: usize,
    pub heap: Option<HeapUsage>,
}

impl fmt::Display for MemorySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elements={} attached={} playing={}",
            self.total_elements, self.with_source, self.playing
        )?;
        match self.heap {
            Some(heap) => write!(f, " rss={}", format_bytes(heap.resident_bytes)),
            None => f.write_str(" rss=unknown"),
        }
    }
}

/// Highest values seen since the monitor started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeakUsage {
    pub with_source: usize,
    pub playing: usize,
    pub resident_bytes: Option<u64>,
}

pub struct MemoryMonitor {
    elements: Vec<SharedElement>,
    heap: Box<dyn HeapSource>,
    peaks: PeakUsage,
}

impl MemoryMonitor {
    pub fn new(elements: Vec<SharedElement>, heap: Box<dyn HeapSource>) -> Self {
        Self {
            elements,
            heap,
            peaks: PeakUsage::default(),
        }
    }

    /// Monitor using `sysinfo` for process memory.
    pub fn with_sysinfo(elements: Vec<SharedElement>) -> Self {
        Self::new(elements, Box::new(SysinfoSource::new()))
    }

    pub fn peaks(&self) -> PeakUsage {
        self.peaks
    }

    pub fn sample(&mut self) -> MemorySample {
        let with_source = self.elements.iter().filter(|e| e.has_source()).count();
        let playing = self.elements.iter().filter(|e| e.is_playing()).count();
        let heap = self.heap.sample();

        self.peaks.with_source = self.peaks.with_source.max(with_source);
        self.peaks.playing = self.peaks.playing.max(playing);
        if let Some(heap) = heap {
            self.peaks.resident_bytes = Some(
                self.peaks
                    .resident_bytes
                    .map_or(heap.resident_bytes, |peak| peak.max(heap.resident_bytes)),
            );
        }

        MemorySample {
            total_elements: self.elements.len(),
            with_source,
            playing,
            heap,
        }
    }

    /// Sample every `interval` until `token` is cancelled.
    ///
    /// Samples are published on the returned channel and logged at debug level.
    pub fn spawn(
        mut self,
        interval: Duration,
        token: CancellationToken,
    ) -> (JoinHandle<PeakUsage>, watch::Receiver<Option<MemorySample>>) {
        let (tx, rx) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let sample = self.sample();
                        debug!(
                            total = sample.total_elements,
                            attached = sample.with_source,
                            playing = sample.playing,
                            rss = ?sample.heap.map(|h| h.resident_bytes),
                            "Memory sample"
                        );
                        tx.send_replace(Some(sample));
                    }
                }
            }

            let peaks = self.peaks;
            info!(
                peak_attached = peaks.with_source,
                peak_playing = peaks.playing,
                peak_rss = ?peaks.resident_bytes,
                "Memory monitor stopped"
            );
            peaks
        });

        (handle, rx)
    }
}

/// Human-readable byte count (`512 B`, `3.2 MiB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
