//! Run gating for the bake pipeline
//!
//! At most one run is active at a time. A request made while one is running
//! is rejected, not queued. Outfit changes go through a debounce timer so a
//! burst of edits produces a single run once the outfit settles.

use crate::appearance::orchestrator::{BakeOrchestrator, RunOptions, RunReport};
use crate::appearance::types::{WearableItem, WearableType};
use crate::appearance::wearables::WearableStore;
use crate::appearance::{AppearanceError, AppearanceResult};
use crate::config::concurrency::CancelSource;
use crate::networking::NetworkResult;
use crate::world::events::{AppearanceEvent, RunCompleteEvent, WearablesChangedEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Authoritative list of worn items, usually the inventory service
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch_current_wearables(&self, timeout: Duration) -> NetworkResult<Vec<WearableItem>>;
}

/// Session-scoped run bookkeeping
#[derive(Debug, Default)]
struct RunState {
    active_run: Option<u64>,
    next_run_id: u64,
    got_wearables_once: bool,
    /// A run of this session succeeded, so the server cache check is done
    succeeded_once: bool,
    server_baking_done: bool,
    pending_timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    cancel: Option<CancelSource>,
}

struct ControllerInner {
    orchestrator: Arc<BakeOrchestrator>,
    state: Mutex<RunState>,
    /// Held for the whole life of a run task, cancelled runs included
    run_lock: tokio::sync::Mutex<()>,
}

impl ControllerInner {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_run(&self, run_id: u64) {
        let mut state = self.state();
        if state.active_run == Some(run_id) {
            state.active_run = None;
            state.cancel = None;
        }
    }
}

/// Clears the active flag even if the run task panics or is aborted
struct ActiveRunGuard {
    inner: Arc<ControllerInner>,
    run_id: u64,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.inner.finish_run(self.run_id);
    }
}

#[derive(Clone)]
pub struct AppearanceRunController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for AppearanceRunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppearanceRunController")
            .field("state", &*self.inner.state())
            .finish()
    }
}

impl AppearanceRunController {
    pub fn new(orchestrator: Arc<BakeOrchestrator>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                orchestrator,
                state: Mutex::new(RunState::default()),
                run_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn orchestrator(&self) -> &Arc<BakeOrchestrator> {
        &self.inner.orchestrator
    }

    pub fn wearables(&self) -> &Arc<WearableStore> {
        self.inner.orchestrator.wearables()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppearanceEvent> {
        self.inner.orchestrator.events().subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().active_run.is_some()
    }

    pub fn has_pending_run(&self) -> bool {
        self.inner.state().pending_timer.is_some()
    }

    pub fn set_server_baking_done(&self, done: bool) {
        self.inner.state().server_baking_done = done;
        debug!("🧍 Server-side baking done: {}", done);
    }

    /// Start a run now. Fails with [`AppearanceError::RunInProgress`] while another is active.
    ///
    /// The returned handle resolves to the run's report; dropping it does not
    /// stop the run. A run cancelled by [`Self::on_disconnected`] no longer
    /// counts as active, but the next run only touches the orchestrator once
    /// it has unwound.
    pub fn request_run(&self, force_rebake: bool) -> AppearanceResult<JoinHandle<RunReport>> {
        let (run_id, options, token) = {
            let mut state = self.inner.state();
            if let Some(active) = state.active_run {
                warn!("🧍 Run request ignored, run #{} is still active", active);
                return Err(AppearanceError::RunInProgress);
            }
            state.next_run_id += 1;
            let run_id = state.next_run_id;
            state.active_run = Some(run_id);

            let source = CancelSource::new();
            let token = source.token();
            state.cancel = Some(source);

            let options = RunOptions {
                force_rebake,
                refresh_wearables: !state.got_wearables_once,
                server_baking_done: state.server_baking_done,
                check_server_cache: !state.succeeded_once,
            };
            (run_id, options, token)
        };

        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(async move {
            let guard = ActiveRunGuard { inner: Arc::clone(&inner), run_id };
            let exclusive = match inner.run_lock.try_lock() {
                Ok(exclusive) => exclusive,
                Err(_) => {
                    debug!("🧍 Run #{} waiting for a cancelled run to unwind", run_id);
                    inner.run_lock.lock().await
                }
            };

            let orchestrator = Arc::clone(&inner.orchestrator);
            let report = match tokio::spawn(async move { orchestrator.run(run_id, options, token).await }).await {
                Ok(report) => report,
                Err(e) => {
                    error!("❌ Appearance run #{} aborted: {}", run_id, e);
                    RunReport::new(run_id)
                }
            };

            {
                // a run cancelled by a disconnect must not mark the new session
                let mut state = inner.state();
                if state.active_run == Some(run_id) {
                    state.got_wearables_once |= report.wearables_refreshed;
                    state.succeeded_once |= report.success();
                }
            }
            drop(guard);

            inner
                .orchestrator
                .events()
                .emit(AppearanceEvent::RunComplete(RunCompleteEvent::new(run_id, report.outcome)));
            drop(exclusive);
            report
        }))
    }

    /// (Re)arm the debounce timer; only the last call within the delay starts a run
    pub fn schedule_delayed_run(&self) {
        let delay = self.inner.orchestrator.settings().rebake_delay();
        let mut state = self.inner.state();
        if let Some(timer) = state.pending_timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;
        let generation = state.timer_generation;

        let controller = self.clone();
        state.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = controller.inner.state();
                if state.timer_generation != generation {
                    return;
                }
                state.pending_timer = None;
            }
            match controller.request_run(false) {
                Ok(_) => debug!("🧍 Delayed run started"),
                Err(AppearanceError::RunInProgress) => {
                    debug!("🧍 Delayed run found a run in progress, rescheduling");
                    controller.schedule_delayed_run();
                }
                Err(e) => warn!("⚠️ Delayed run not started: {}", e),
            }
        }));
        debug!("🧍 Rebake scheduled in {:?}", delay);
    }

    /// Wear `items`. Without `replace`, occupied slots keep their current item.
    pub async fn add_to_outfit(&self, items: Vec<WearableItem>, replace: bool) -> AppearanceResult<()> {
        let store = self.wearables();
        for item in items {
            if !replace && store.is_worn(item.wearable_type).await {
                debug!("👕 {} already worn, keeping it", item.wearable_type);
                continue;
            }
            store.set(item).await?;
        }
        self.outfit_changed().await;
        Ok(())
    }

    pub async fn remove_from_outfit(&self, slot: WearableType, item_id: Uuid) -> AppearanceResult<()> {
        self.wearables().remove(slot, item_id).await?;
        self.outfit_changed().await;
        Ok(())
    }

    pub async fn replace_outfit(&self, items: Vec<WearableItem>) {
        self.wearables().replace_all(items).await;
        self.outfit_changed().await;
    }

    async fn outfit_changed(&self) {
        let worn = self.wearables().snapshot().await.into_keys().collect();
        self.inner
            .orchestrator
            .events()
            .emit(AppearanceEvent::WearablesChanged(WearablesChangedEvent::new(worn)));
        self.schedule_delayed_run();
    }

    /// Session ended: drop the pending timer, cancel the active run and forget session state
    pub fn on_disconnected(&self) {
        let mut state = self.inner.state();
        if let Some(timer) = state.pending_timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;
        if let Some(source) = state.cancel.take() {
            source.cancel();
        }
        if let Some(run_id) = state.active_run.take() {
            info!("🧍 Disconnected, cancelling appearance run #{}", run_id);
        }
        state.got_wearables_once = false;
        state.succeeded_once = false;
        state.server_baking_done = false;
    }
}
