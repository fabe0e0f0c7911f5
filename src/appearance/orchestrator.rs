//! Bake run pipeline
//!
//! One run walks the stages of [`BakeState`] in order, with a barrier between
//! stages and bounded fan-out inside each of them:
//!
//! 1. refresh the worn set from inventory when nothing is known yet
//! 2. keep bakes whose hash is unchanged, then ask the server about the rest
//! 3. download missing wearable assets and resolve their texture layers
//! 4. download input textures of every layer still lacking a bake
//! 5. composite and upload those layers, retrying uploads
//! 6. declare the resulting appearance to the simulator
//!
//! Download failures degrade the affected layers instead of aborting. Only a
//! failed inventory fetch with no prior knowledge of the outfit is fatal.

use crate::appearance::cache_hash::{all_hashes, compute_hashes, CacheHashNegotiator};
use crate::appearance::compositor::{BakeInput, Compositor};
use crate::appearance::controller::InventorySource;
use crate::appearance::layers::TextureLayerResolver;
use crate::appearance::state_machine::{BakeState, BakeStateMachine};
use crate::appearance::textures::TextureSlots;
use crate::appearance::types::{BakeType, WearableItem, WearableType};
use crate::appearance::visual_params::VisualParamTable;
use crate::appearance::visual_state::AgentVisualStateBuilder;
use crate::appearance::wearables::{WearableMap, WearableStore};
use crate::appearance::{AppearanceError, AppearanceResult};
use crate::config::concurrency::{parallel_for, CancelToken};
use crate::config::settings::AppearanceSettings;
use crate::networking::assets::{AssetFetcher, BakeUploader, TransferStats};
use crate::networking::messages::AppearanceMessage;
use crate::networking::AppearanceTransport;
use crate::world::events::{AppearanceEvent, CacheCheckEvent, EventBus, WearablesChangedEvent};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Terminal result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// Every download, bake and upload succeeded
    Success,
    /// Something failed, but an appearance was still produced
    Partial,
    Failed,
    /// Stopped by a disconnect
    Cancelled,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What happened to one bake layer during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    /// Existing bake reused, either recorded locally or reported by the server
    CacheHit { texture_id: Uuid },
    Uploaded { texture_id: Uuid, attempts: u32, degraded: bool },
    Failed { stage: BakeState, attempts: u32 },
    /// Not baked this run (skirt layer without a skirt)
    Skipped,
}

impl LayerOutcome {
    pub fn texture_id(&self) -> Option<Uuid> {
        match self {
            LayerOutcome::CacheHit { texture_id } | LayerOutcome::Uploaded { texture_id, .. } => Some(*texture_id),
            _ => None,
        }
    }

    /// True when the layer ended up with a clean bake
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            LayerOutcome::CacheHit { .. } | LayerOutcome::Skipped | LayerOutcome::Uploaded { degraded: false, .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: u64,
    pub outcome: RunOutcome,
    pub layers: BTreeMap<BakeType, LayerOutcome>,
    pub cache_hits: usize,
    pub stats: TransferStats,
    /// The worn set was refreshed from inventory during this run
    pub wearables_refreshed: bool,
    pub appearance_sent: bool,
}

impl RunReport {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::Failed,
            layers: BTreeMap::new(),
            cache_hits: 0,
            stats: TransferStats::default(),
            wearables_refreshed: false,
            appearance_sent: false,
        }
    }

    /// The single terminal success flag
    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn layer(&self, bake: BakeType) -> Option<&LayerOutcome> {
        self.layers.get(&bake)
    }

    /// Layers that went through compositing this run
    pub fn processed_layers(&self) -> usize {
        self.layers
            .values()
            .filter(|o| matches!(o, LayerOutcome::Uploaded { .. } | LayerOutcome::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore every existing bake and skip the cache check
    pub force_rebake: bool,
    /// Fetch the worn set from inventory before baking
    pub refresh_wearables: bool,
    /// The server bakes for us; only the appearance message is sent
    pub server_baking_done: bool,
    /// Ask the server for existing bakes; only until a run of the session has succeeded
    pub check_server_cache: bool,
}

/// External services a run depends on
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn AppearanceTransport>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub uploader: Arc<dyn BakeUploader>,
    pub compositor: Arc<dyn Compositor>,
    pub inventory: Arc<dyn InventorySource>,
}

pub struct BakeOrchestrator {
    wearables: Arc<WearableStore>,
    textures: Arc<TextureSlots>,
    resolver: TextureLayerResolver,
    negotiator: CacheHashNegotiator,
    visual_state: AgentVisualStateBuilder,
    services: Collaborators,
    settings: AppearanceSettings,
    events: EventBus,
    state: Arc<Mutex<BakeStateMachine>>,
    /// Hash each current bake was produced from
    baked_hashes: tokio::sync::Mutex<BTreeMap<BakeType, Uuid>>,
    appearance_serial: AtomicU32,
}

impl std::fmt::Debug for BakeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BakeOrchestrator")
            .field("state", &self.state())
            .field("negotiator", &self.negotiator)
            .finish()
    }
}

impl BakeOrchestrator {
    pub fn new(services: Collaborators, params: Arc<VisualParamTable>, settings: AppearanceSettings) -> Self {
        Self {
            wearables: Arc::new(WearableStore::new()),
            textures: Arc::new(TextureSlots::new()),
            resolver: TextureLayerResolver::new(Arc::clone(&params)),
            negotiator: CacheHashNegotiator::new(Arc::clone(&services.transport)),
            visual_state: AgentVisualStateBuilder::new(params, settings.client_tag_texture),
            services,
            settings,
            events: EventBus::default(),
            state: Arc::new(Mutex::new(BakeStateMachine::new())),
            baked_hashes: tokio::sync::Mutex::new(BTreeMap::new()),
            appearance_serial: AtomicU32::new(0),
        }
    }

    pub fn wearables(&self) -> &Arc<WearableStore> {
        &self.wearables
    }

    pub fn textures(&self) -> &Arc<TextureSlots> {
        &self.textures
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &AppearanceSettings {
        &self.settings
    }

    pub fn inventory(&self) -> &Arc<dyn InventorySource> {
        &self.services.inventory
    }

    pub fn state(&self) -> BakeState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).current_state()
    }

    /// Execute one run to completion. Never fails; the outcome is in the report.
    pub async fn run(&self, run_id: u64, options: RunOptions, cancel: CancelToken) -> RunReport {
        info!("🧍 Appearance run #{} starting ({:?})", run_id, options);
        self.state.lock().unwrap_or_else(PoisonError::into_inner).reset();

        let mut report = RunReport::new(run_id);
        match self.execute(options, &cancel, &mut report).await {
            Ok(outcome) => report.outcome = outcome,
            Err(AppearanceError::Cancelled) => {
                warn!("🧍 Appearance run #{} cancelled", run_id);
                report.outcome = RunOutcome::Cancelled;
            }
            Err(e) => {
                error!("❌ Appearance run #{} failed: {}", run_id, e);
                report.outcome = RunOutcome::Failed;
            }
        }

        self.textures.free_unbaked_textures().await;
        enter(&self.state, BakeState::Done);
        report.cache_hits = report
            .layers
            .values()
            .filter(|o| matches!(o, LayerOutcome::CacheHit { .. }))
            .count();

        info!(
            "🧍 Appearance run #{} finished: {} ({} layers baked, {} cache hits, {:.0}% downloads ok)",
            run_id,
            report.outcome,
            report.processed_layers(),
            report.cache_hits,
            report.stats.download_success_rate()
        );
        report
    }

    async fn execute(
        &self,
        options: RunOptions,
        cancel: &CancelToken,
        report: &mut RunReport,
    ) -> AppearanceResult<RunOutcome> {
        let mut clean = true;

        if options.refresh_wearables || !self.wearables.has_all_bodyparts().await {
            clean &= self.refresh_wearables(cancel, report).await?;
        }

        if options.server_baking_done && !options.force_rebake {
            info!("🧍 Server-side baking is active, sending appearance only");
        } else {
            clean &= self.bake_layers(options, cancel, report).await?;
        }

        check_cancelled(cancel)?;
        match self.send_appearance(cancel).await {
            Ok(serial) => {
                debug!("📤 Appearance #{} sent", serial);
                report.appearance_sent = true;
            }
            Err(AppearanceError::Cancelled) => return Err(AppearanceError::Cancelled),
            Err(e) => {
                warn!("⚠️ Sending appearance failed: {}", e);
                clean = false;
            }
        }

        let produced = report.appearance_sent || report.layers.values().any(|o| o.texture_id().is_some());
        Ok(if clean {
            RunOutcome::Success
        } else if produced {
            RunOutcome::Partial
        } else {
            RunOutcome::Failed
        })
    }

    /// Ok(false) when the fetch failed but a previously known outfit can be used
    async fn refresh_wearables(&self, cancel: &CancelToken, report: &mut RunReport) -> AppearanceResult<bool> {
        let timeout = self.settings.timeouts.wearables_fetch();
        let fetched = cancel
            .guard(timeout, "current wearables", self.services.inventory.fetch_current_wearables(timeout))
            .await;

        match fetched {
            Ok(items) => {
                info!("👕 Fetched {} worn items from inventory", items.len());
                self.wearables.replace_all(items).await;
                report.wearables_refreshed = true;
                let worn = self.wearables.snapshot().await.into_keys().collect();
                self.events.emit(AppearanceEvent::WearablesChanged(WearablesChangedEvent::new(worn)));
                Ok(true)
            }
            Err(AppearanceError::Cancelled) => Err(AppearanceError::Cancelled),
            Err(e) => {
                if self.wearables.is_empty().await {
                    return Err(AppearanceError::WearablesUnavailable { reason: e.to_string() });
                }
                warn!("⚠️ Could not refresh worn items, using the known outfit: {}", e);
                Ok(false)
            }
        }
    }

    /// Client-side bake of every layer lacking an output. Ok(false) when degraded.
    async fn bake_layers(&self, options: RunOptions, cancel: &CancelToken, report: &mut RunReport) -> AppearanceResult<bool> {
        let mut clean = true;
        self.textures.reset_unbaked().await;

        let snapshot = self.wearables.snapshot().await;
        let hashes: BTreeMap<BakeType, Uuid> = all_hashes(&snapshot).into_iter().collect();
        let wearing_skirt = snapshot.contains_key(&WearableType::Skirt);

        let reused = if options.force_rebake {
            self.discard_bakes().await;
            BTreeSet::new()
        } else {
            let reused = self.reuse_local_bakes(&hashes, report).await;
            if options.check_server_cache {
                enter(&self.state, BakeState::CheckingCache);
                self.check_server_cache(&snapshot, &reused, &hashes, cancel, report).await?;
            } else {
                debug!("🗂️ Session already baked once, skipping the server cache check");
            }
            reused
        };
        debug!("🧍 {} layers reused from earlier bakes", reused.len());

        check_cancelled(cancel)?;
        enter(&self.state, BakeState::ResolvingWearables);
        let degraded_layers = self.download_wearables(&snapshot, cancel, report).await?;
        clean &= degraded_layers.is_empty();

        let resolved = self.wearables.snapshot().await;
        let applied = self.resolver.apply(resolved.values(), &self.textures).await;
        debug!("🎨 Applied {} texture layers from {} wearables", applied, resolved.len());

        let mut pending = Vec::new();
        for bake in BakeType::ALL {
            if bake == BakeType::Skirt && !wearing_skirt {
                self.textures.clear_baked_texture(bake).await;
                report.layers.insert(bake, LayerOutcome::Skipped);
            } else if self.textures.baked_texture(bake).await.is_none() {
                pending.push(bake);
            }
        }
        info!("🧍 {} layers need baking: {:?}", pending.len(), pending);

        check_cancelled(cancel)?;
        enter(&self.state, BakeState::DownloadingTextures);
        let mut wanted = BTreeSet::new();
        for bake in &pending {
            wanted.extend(self.textures.missing_textures(*bake).await);
        }
        clean &= self.download_textures(wanted, cancel, report).await?;

        check_cancelled(cancel)?;
        enter(&self.state, BakeState::Compositing);
        let baker = LayerBaker {
            textures: Arc::clone(&self.textures),
            compositor: Arc::clone(&self.services.compositor),
            uploader: Arc::clone(&self.services.uploader),
            state: Arc::clone(&self.state),
            upload_attempts: self.settings.upload_attempts(),
            upload_timeout: self.settings.timeouts.upload(),
            cancel: cancel.clone(),
        };
        let results = parallel_for(pending, self.settings.concurrency.layer_bakes, move |bake| {
            let baker = baker.clone();
            let wearable_degraded = degraded_layers.contains(&bake);
            async move { baker.bake(bake, wearable_degraded).await }
        })
        .await;

        let mut cancelled = false;
        let mut baked_hashes = self.baked_hashes.lock().await;
        for result in results {
            report.stats.uploads_attempted += u64::from(result.uploads_attempted);
            report.stats.uploads_failed += u64::from(result.uploads_failed);
            report.stats.bytes_uploaded += result.bytes_uploaded;
            cancelled |= result.cancelled;
            clean &= result.outcome.is_clean();

            match result.outcome {
                LayerOutcome::Uploaded { degraded: false, .. } => {
                    baked_hashes.insert(result.bake, hashes.get(&result.bake).copied().unwrap_or_default());
                }
                _ => {
                    baked_hashes.remove(&result.bake);
                }
            }
            report.layers.insert(result.bake, result.outcome);
        }
        drop(baked_hashes);

        if cancelled {
            return Err(AppearanceError::Cancelled);
        }
        Ok(clean)
    }

    async fn discard_bakes(&self) {
        info!("🧍 Forced rebake, discarding every existing bake");
        self.baked_hashes.lock().await.clear();
        for bake in BakeType::ALL {
            self.textures.clear_baked_texture(bake).await;
        }
    }

    /// Keep bakes whose recorded hash still matches; clear the rest
    async fn reuse_local_bakes(&self, hashes: &BTreeMap<BakeType, Uuid>, report: &mut RunReport) -> BTreeSet<BakeType> {
        let mut baked_hashes = self.baked_hashes.lock().await;
        let mut reused = BTreeSet::new();

        for bake in BakeType::ALL {
            let current = hashes.get(&bake).copied().unwrap_or_default();
            let unchanged = baked_hashes.get(&bake) == Some(&current);
            match self.textures.baked_texture(bake).await {
                Some(texture_id) if unchanged => {
                    report.layers.insert(bake, LayerOutcome::CacheHit { texture_id });
                    reused.insert(bake);
                }
                _ => {
                    baked_hashes.remove(&bake);
                    self.textures.clear_baked_texture(bake).await;
                }
            }
        }
        reused
    }

    /// A failed check only means everything gets rebaked
    async fn check_server_cache(
        &self,
        snapshot: &WearableMap,
        reused: &BTreeSet<BakeType>,
        hashes: &BTreeMap<BakeType, Uuid>,
        cancel: &CancelToken,
        report: &mut RunReport,
    ) -> AppearanceResult<()> {
        let requested: Vec<(BakeType, Uuid)> = compute_hashes(snapshot)
            .into_iter()
            .filter(|(bake, _)| !reused.contains(bake))
            .collect();
        let requested_count = requested.len();

        match self
            .negotiator
            .check_cache(requested, self.settings.timeouts.cache_check(), cancel)
            .await
        {
            Ok(result) => {
                let mut baked_hashes = self.baked_hashes.lock().await;
                for (bake, texture_id) in &result.hits {
                    self.textures.set_baked_texture(*bake, *texture_id).await;
                    baked_hashes.insert(*bake, hashes.get(bake).copied().unwrap_or_default());
                    report.layers.insert(*bake, LayerOutcome::CacheHit { texture_id: *texture_id });
                }
                let hits = result.hits.iter().map(|(bake, _)| *bake).collect();
                self.events.emit(AppearanceEvent::CacheCheckComplete(CacheCheckEvent::new(
                    result.serial_num,
                    requested_count,
                    hits,
                    true,
                )));
                Ok(())
            }
            Err(AppearanceError::Cancelled) => Err(AppearanceError::Cancelled),
            Err(e) => {
                warn!("⚠️ Cache check failed, rebaking every layer: {}", e);
                self.events.emit(AppearanceEvent::CacheCheckComplete(CacheCheckEvent::new(
                    self.negotiator.serial(),
                    requested_count,
                    Vec::new(),
                    false,
                )));
                Ok(())
            }
        }
    }

    /// Fetch undecoded wearable assets; returns the layers left degraded by failures
    async fn download_wearables(
        &self,
        snapshot: &WearableMap,
        cancel: &CancelToken,
        report: &mut RunReport,
    ) -> AppearanceResult<BTreeSet<BakeType>> {
        let missing: Vec<WearableItem> = snapshot.values().filter(|item| item.asset.is_none()).cloned().collect();
        let mut degraded = BTreeSet::new();
        if missing.is_empty() {
            return Ok(degraded);
        }

        let requested = missing.len();
        report.stats.wearables_requested += requested as u64;
        info!("👕 Downloading {} wearable assets", requested);

        let fetcher = Arc::clone(&self.services.fetcher);
        let timeout = self.settings.timeouts.wearable_download();
        let token = cancel.clone();
        let results = parallel_for(missing, self.settings.concurrency.wearable_downloads, move |item| {
            let fetcher = Arc::clone(&fetcher);
            let cancel = token.clone();
            async move {
                let result = cancel
                    .guard(
                        timeout,
                        "wearable download",
                        fetcher.fetch_wearable_asset(item.asset_id, item.asset_type, timeout),
                    )
                    .await;
                (item, result)
            }
        })
        .await;

        let lost = requested - results.len();
        report.stats.wearables_failed += lost as u64;

        for (item, result) in results {
            match result {
                Ok(asset) => {
                    if !self.wearables.set_asset(item.wearable_type, item.asset_id, Arc::new(asset)).await {
                        debug!("👕 {} was re-worn while {} downloaded", item.wearable_type, item.asset_id);
                    }
                }
                Err(AppearanceError::Cancelled) => return Err(AppearanceError::Cancelled),
                Err(e) => {
                    report.stats.wearables_failed += 1;
                    warn!("⚠️ Wearable {} asset {} unavailable: {}", item.wearable_type, item.asset_id, e);
                    degraded.extend(
                        BakeType::ALL
                            .into_iter()
                            .filter(|bake| bake.contributing_wearables().contains(&item.wearable_type)),
                    );
                }
            }
        }
        Ok(degraded)
    }

    /// Best effort: a failed texture stays without pixels. Ok(false) when any failed.
    async fn download_textures(
        &self,
        wanted: BTreeSet<Uuid>,
        cancel: &CancelToken,
        report: &mut RunReport,
    ) -> AppearanceResult<bool> {
        if wanted.is_empty() {
            return Ok(true);
        }

        let requested = wanted.len();
        report.stats.textures_requested += requested as u64;
        info!("🖼️ Downloading {} layer textures", requested);

        let fetcher = Arc::clone(&self.services.fetcher);
        let timeout = self.settings.timeouts.texture_download();
        let token = cancel.clone();
        let results = parallel_for(
            wanted.into_iter().collect(),
            self.settings.concurrency.texture_downloads,
            move |texture_id: Uuid| {
                let fetcher = Arc::clone(&fetcher);
                let cancel = token.clone();
                async move {
                    let result = cancel
                        .guard(timeout, "texture download", fetcher.fetch_texture(texture_id, timeout))
                        .await;
                    (texture_id, result)
                }
            },
        )
        .await;

        let mut failed = requested - results.len();
        for (texture_id, result) in results {
            match result {
                Ok(texture) => {
                    let slots = self.textures.set_texture(texture_id, texture).await;
                    debug!("🖼️ Texture {} decoded for {} slots", texture_id, slots);
                }
                Err(AppearanceError::Cancelled) => return Err(AppearanceError::Cancelled),
                Err(e) => {
                    failed += 1;
                    warn!("⚠️ Texture {} unavailable, baking without it: {}", texture_id, e);
                }
            }
        }
        report.stats.textures_failed += failed as u64;
        Ok(failed == 0)
    }

    async fn send_appearance(&self, cancel: &CancelToken) -> AppearanceResult<u32> {
        let wearables = self.wearables.snapshot().await;
        let texture_ids = self.textures.texture_ids().await;
        let serial = self.appearance_serial.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        let message = self.visual_state.build(serial, &wearables, &texture_ids);
        info!(
            "📤 Sending appearance #{}: {} params, {} textures",
            serial,
            message.visual_params.len(),
            message.texture_entry.len()
        );
        let payload = AppearanceMessage::AgentSetAppearance(message).encode()?;
        cancel
            .guard(
                self.settings.timeouts.appearance_send(),
                "appearance update",
                self.services.transport.send_request(serial, payload),
            )
            .await?;
        Ok(serial)
    }
}

/// Per-layer compositing and upload, run inside the bake fan-out
#[derive(Clone)]
struct LayerBaker {
    textures: Arc<TextureSlots>,
    compositor: Arc<dyn Compositor>,
    uploader: Arc<dyn BakeUploader>,
    state: Arc<Mutex<BakeStateMachine>>,
    upload_attempts: u32,
    upload_timeout: Duration,
    cancel: CancelToken,
}

struct LayerResult {
    bake: BakeType,
    outcome: LayerOutcome,
    uploads_attempted: u32,
    uploads_failed: u32,
    bytes_uploaded: u64,
    cancelled: bool,
}

impl LayerResult {
    fn failed(bake: BakeType, stage: BakeState, attempts: u32) -> Self {
        Self {
            bake,
            outcome: LayerOutcome::Failed { stage, attempts },
            uploads_attempted: attempts,
            uploads_failed: attempts,
            bytes_uploaded: 0,
            cancelled: false,
        }
    }
}

impl LayerBaker {
    async fn bake(self, bake: BakeType, wearable_degraded: bool) -> LayerResult {
        if self.cancel.is_cancelled() {
            let mut result = LayerResult::failed(bake, BakeState::Compositing, 0);
            result.cancelled = true;
            return result;
        }

        let inputs = self.textures.bake_inputs(bake).await;
        let degraded = wearable_degraded || inputs.iter().any(BakeInput::is_degraded);
        if degraded {
            warn!("⚠️ Baking {} with missing inputs", bake);
        }

        let compositor = Arc::clone(&self.compositor);
        let baked = tokio::task::spawn_blocking(move || compositor.bake(bake, &inputs))
            .await
            .unwrap_or_else(|e| Err(AppearanceError::Bake { layer: bake, reason: e.to_string() }));
        let data = match baked {
            Ok(data) => data,
            Err(e) => {
                error!("❌ {}", e);
                return LayerResult::failed(bake, BakeState::Compositing, 0);
            }
        };

        enter(&self.state, BakeState::Uploading);
        let mut result = LayerResult::failed(bake, BakeState::Uploading, 0);
        for attempt in 1..=self.upload_attempts {
            result.uploads_attempted = attempt;
            let upload = self.uploader.upload_baked_texture(data.clone(), self.upload_timeout);
            match self.cancel.guard(self.upload_timeout, "bake upload", upload).await {
                Ok(texture_id) => {
                    self.textures.set_baked_texture(bake, texture_id).await;
                    info!("🧍 Uploaded {} bake as {} (attempt {}/{})", bake, texture_id, attempt, self.upload_attempts);
                    result.bytes_uploaded = data.len() as u64;
                    result.outcome = LayerOutcome::Uploaded { texture_id, attempts: attempt, degraded };
                    return result;
                }
                Err(AppearanceError::Cancelled) => {
                    result.cancelled = true;
                    result.outcome = LayerOutcome::Failed { stage: BakeState::Uploading, attempts: attempt };
                    return result;
                }
                Err(e) => {
                    result.uploads_failed += 1;
                    warn!("⚠️ Upload of {} failed (attempt {}/{}): {}", bake, attempt, self.upload_attempts, e);
                }
            }
        }

        error!("❌ Giving up on {} after {} upload attempts", bake, self.upload_attempts);
        result.outcome = LayerOutcome::Failed { stage: BakeState::Uploading, attempts: self.upload_attempts };
        result
    }
}

fn enter(state: &Mutex<BakeStateMachine>, next: BakeState) {
    let mut machine = state.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = machine.transition_to(next) {
        warn!("⚠️ {}", e);
    }
}

fn check_cancelled(cancel: &CancelToken) -> AppearanceResult<()> {
    if cancel.is_cancelled() {
        Err(AppearanceError::Cancelled)
    } else {
        Ok(())
    }
}
