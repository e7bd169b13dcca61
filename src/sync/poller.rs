//! Generic scheduled-refresh primitive with stale-while-revalidate semantics.
//!
//! A `Poller` owns one fetch-and-store cycle: an immediate fetch on
//! activation, then background refreshes on a visibility-aware cadence. The
//! displayed value survives every failure — an error only ever lands in the
//! `error` field next to the last good data.
//!
//! Completions are not ordered: each fetch is spawned and whichever finishes
//! last writes the view, even if it was issued earlier. A generation counter
//! fences completions from torn-down or restarted cycles, nothing more.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::api::FetchError;
use crate::visibility::Visibility;

/// The injected fetch operation.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// The `{data, loading, error}` view a poller maintains.
///
/// `loading` is true only during the activation fetch; background refreshes
/// leave it untouched. `error` holds the most recent failure message and is
/// cleared by the next success; `data` is never cleared by a failure.
#[derive(Debug, Clone)]
pub struct PollState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        PollState {
            data: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Cadence while the host is in the foreground. Zero disables the
    /// background timer entirely; only activation and manual refreshes fetch.
    pub interval: Duration,
    /// Cadence while the host is backgrounded, when configured.
    pub hidden_interval: Option<Duration>,
    pub enabled: bool,
}

impl PollerConfig {
    pub fn new(interval: Duration) -> Self {
        PollerConfig {
            interval,
            hidden_interval: None,
            enabled: true,
        }
    }

    pub fn with_hidden_interval(mut self, interval: Duration) -> Self {
        self.hidden_interval = Some(interval);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn effective_interval(&self, visibility: Visibility) -> Duration {
        match self.hidden_interval {
            Some(hidden) if visibility.is_hidden() => hidden,
            _ => self.interval,
        }
    }
}

struct RunningCycle {
    refresh_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

/// Scheduled-refresh engine for one fetch operation.
pub struct Poller<T> {
    state: Arc<RwLock<PollState<T>>>,
    fetch: FetchFn<T>,
    config: PollerConfig,
    visibility: watch::Receiver<Visibility>,
    /// Bumped on every teardown; in-flight completions from an older
    /// generation are discarded instead of written.
    generation: Arc<AtomicU64>,
    running: Option<RunningCycle>,
}

impl<T: Clone + Send + Sync + 'static> Poller<T> {
    pub fn new(
        fetch: FetchFn<T>,
        config: PollerConfig,
        visibility: watch::Receiver<Visibility>,
    ) -> Self {
        let mut poller = Poller {
            state: Arc::new(RwLock::new(PollState::default())),
            fetch,
            config,
            visibility,
            generation: Arc::new(AtomicU64::new(0)),
            running: None,
        };
        if poller.config.enabled {
            poller.spawn_cycle();
        }
        poller
    }

    /// Snapshot of the current view.
    pub async fn view(&self) -> PollState<T> {
        self.state.read().await.clone()
    }

    /// Manual refresh: one background tick. Does not touch `loading` and is
    /// a no-op while disabled.
    pub fn refresh(&self) {
        if let Some(running) = &self.running {
            let _ = running.refresh_tx.send(());
        }
    }

    /// Tear down the current cycle and start over from a fresh immediate
    /// fetch, as when the fetched resource's identity changes.
    pub fn restart(&mut self) {
        self.teardown();
        if self.config.enabled {
            self.spawn_cycle();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled == enabled {
            return;
        }
        self.config.enabled = enabled;
        self.teardown();
        if enabled {
            self.spawn_cycle();
        }
    }

    fn teardown(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }

    fn spawn_cycle(&mut self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_cycle(
            Arc::clone(&self.state),
            Arc::clone(&self.fetch),
            self.config.clone(),
            self.visibility.clone(),
            Arc::clone(&self.generation),
            generation,
            refresh_rx,
        ));
        self.running = Some(RunningCycle { refresh_tx, task });
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

async fn run_cycle<T: Clone + Send + Sync + 'static>(
    state: Arc<RwLock<PollState<T>>>,
    fetch: FetchFn<T>,
    config: PollerConfig,
    mut visibility: watch::Receiver<Visibility>,
    generation: Arc<AtomicU64>,
    cycle_generation: u64,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
) {
    // Activation: the only fetch that drives the loading flag.
    state.write().await.loading = true;
    spawn_fetch(&state, &fetch, &generation, cycle_generation, true);

    let mut effective = config.effective_interval(*visibility.borrow());
    let mut next_at = deadline_after(effective);
    let mut visibility_open = true;

    loop {
        // Disabled branches still need a valid future to hand to select.
        let sleep_deadline = next_at.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
        tokio::select! {
            _ = tokio::time::sleep_until(sleep_deadline), if next_at.is_some() => {
                spawn_fetch(&state, &fetch, &generation, cycle_generation, false);
                next_at = deadline_after(effective);
            }
            Some(()) = refresh_rx.recv() => {
                spawn_fetch(&state, &fetch, &generation, cycle_generation, false);
                next_at = deadline_after(effective);
            }
            changed = visibility.changed(), if visibility_open => {
                match changed {
                    Ok(()) => {
                        effective = config.effective_interval(*visibility.borrow());
                        // Reschedule only; a visibility flip never forces an
                        // extra immediate fetch.
                        next_at = deadline_after(effective);
                        debug!("poll cadence now {:?}", effective);
                    }
                    Err(_) => visibility_open = false,
                }
            }
            else => return,
        }
    }
}

fn deadline_after(interval: Duration) -> Option<Instant> {
    if interval.is_zero() {
        None
    } else {
        Some(Instant::now() + interval)
    }
}

fn spawn_fetch<T: Clone + Send + Sync + 'static>(
    state: &Arc<RwLock<PollState<T>>>,
    fetch: &FetchFn<T>,
    generation: &Arc<AtomicU64>,
    cycle_generation: u64,
    clear_loading: bool,
) {
    let state = Arc::clone(state);
    let generation = Arc::clone(generation);
    let fut = (fetch)();
    tokio::spawn(async move {
        let result = fut.await;
        // Completions from a torn-down or restarted cycle must not write.
        if generation.load(Ordering::SeqCst) != cycle_generation {
            return;
        }
        let mut view = state.write().await;
        match result {
            Ok(data) => {
                view.data = Some(data);
                view.error = None;
            }
            Err(e) => {
                // Stale data stays on display alongside the error.
                view.error = Some(e.to_string());
            }
        }
        if clear_loading {
            view.loading = false;
        }
    });
}
