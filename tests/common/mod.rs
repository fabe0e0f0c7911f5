#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use slv_appearance::appearance::{
    AppearanceRunController, AvatarTextureIndex, BakeInput, BakeOrchestrator, BakeType, Collaborators, Compositor,
    DecodedTexture, InventorySource, VisualParamTable, WearableAsset, WearableItem, WearableType,
};
use slv_appearance::appearance::{AppearanceError, AppearanceResult};
use slv_appearance::config::AppearanceSettings;
use slv_appearance::networking::messages::{AgentSetAppearance, CachedTextureReply, CachedTextureResult};
use slv_appearance::networking::{
    AppearanceMessage, AppearanceTransport, AssetFetcher, AssetType, BakeUploader, CachedTextureRequest,
    NetworkError, NetworkResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const BODY: [WearableType; 4] = [WearableType::Shape, WearableType::Skin, WearableType::Hair, WearableType::Eyes];

pub const SCENARIO_A: [WearableType; 6] = [
    WearableType::Shape,
    WearableType::Skin,
    WearableType::Hair,
    WearableType::Eyes,
    WearableType::Pants,
    WearableType::Shirt,
];

/// Answers cache checks from a configurable set of server-side bakes
#[derive(Default)]
pub struct FakeTransport {
    server_bakes: Mutex<HashMap<BakeType, Uuid>>,
    replies: Mutex<HashMap<u32, Bytes>>,
    cache_requests: Mutex<Vec<CachedTextureRequest>>,
    appearances: Mutex<Vec<AgentSetAppearance>>,
    drop_cache_replies: Mutex<bool>,
}

impl FakeTransport {
    pub fn set_server_bake(&self, bake: BakeType, texture_id: Uuid) {
        self.server_bakes.lock().unwrap().insert(bake, texture_id);
    }

    /// Cache checks are accepted but never answered
    pub fn drop_cache_replies(&self) {
        *self.drop_cache_replies.lock().unwrap() = true;
    }

    pub fn cache_requests(&self) -> Vec<CachedTextureRequest> {
        self.cache_requests.lock().unwrap().clone()
    }

    pub fn appearances(&self) -> Vec<AgentSetAppearance> {
        self.appearances.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppearanceTransport for FakeTransport {
    async fn send_request(&self, correlation_id: u32, payload: Bytes) -> NetworkResult<()> {
        match AppearanceMessage::decode(&payload)? {
            AppearanceMessage::CachedTextureRequest(request) => {
                let server = self.server_bakes.lock().unwrap().clone();
                let reply = AppearanceMessage::CachedTextureReply(CachedTextureReply {
                    serial_num: request.serial_num,
                    entries: request
                        .entries
                        .iter()
                        .map(|entry| CachedTextureResult {
                            bake: entry.bake,
                            texture_id: server.get(&entry.bake).copied().unwrap_or_default(),
                        })
                        .collect(),
                });
                let answer = !*self.drop_cache_replies.lock().unwrap();
                if answer {
                    self.replies.lock().unwrap().insert(correlation_id, reply.encode()?);
                }
                self.cache_requests.lock().unwrap().push(request);
            }
            AppearanceMessage::AgentSetAppearance(appearance) => {
                self.appearances.lock().unwrap().push(appearance);
            }
            other => {
                return Err(NetworkError::Transport { reason: format!("unexpected {}", other.name()) });
            }
        }
        Ok(())
    }

    async fn await_reply(&self, correlation_id: u32, _timeout: Duration) -> NetworkResult<Bytes> {
        self.replies
            .lock()
            .unwrap()
            .remove(&correlation_id)
            .ok_or_else(|| NetworkError::timeout("cache reply"))
    }
}

/// Serves wearable assets and textures; individual textures can be made to hang
#[derive(Default)]
pub struct FakeFetcher {
    assets: Mutex<HashMap<Uuid, WearableAsset>>,
    hanging_textures: Mutex<HashSet<Uuid>>,
    hang_wearables: Mutex<bool>,
    delay: Mutex<Duration>,
    pub wearable_requests: AtomicUsize,
    pub texture_requests: AtomicUsize,
}

impl FakeFetcher {
    pub fn add_asset(&self, asset_id: Uuid, asset: WearableAsset) {
        self.assets.lock().unwrap().insert(asset_id, asset);
    }

    /// Requests for `texture_id` never complete
    pub fn hang_texture(&self, texture_id: Uuid) {
        self.hanging_textures.lock().unwrap().insert(texture_id);
    }

    pub fn release_texture(&self, texture_id: Uuid) {
        self.hanging_textures.lock().unwrap().remove(&texture_id);
    }

    pub fn hang_wearables(&self) {
        *self.hang_wearables.lock().unwrap() = true;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    fn delay(&self) -> Duration {
        *self.delay.lock().unwrap()
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch_wearable_asset(
        &self,
        asset_id: Uuid,
        _asset_type: AssetType,
        _timeout: Duration,
    ) -> NetworkResult<WearableAsset> {
        self.wearable_requests.fetch_add(1, Ordering::SeqCst);
        let hang = *self.hang_wearables.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay()).await;
        self.assets
            .lock()
            .unwrap()
            .get(&asset_id)
            .cloned()
            .ok_or(NetworkError::AssetNotFound { asset_id })
    }

    async fn fetch_texture(&self, asset_id: Uuid, _timeout: Duration) -> NetworkResult<DecodedTexture> {
        self.texture_requests.fetch_add(1, Ordering::SeqCst);
        let hang = self.hanging_textures.lock().unwrap().contains(&asset_id);
        if hang {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay()).await;
        Ok(Arc::new(RgbaImage::new(4, 4)))
    }
}

/// Compositor output is one byte naming the layer, so uploads can be told apart
#[derive(Default)]
pub struct FakeCompositor {
    baked: Mutex<Vec<(BakeType, Vec<BakeInput>)>>,
    broken: Mutex<HashSet<u8>>,
}

impl FakeCompositor {
    /// Every bake of `bake` fails
    pub fn break_layer(&self, bake: BakeType) {
        self.broken.lock().unwrap().insert(bake as u8);
    }

    pub fn baked_layers(&self) -> Vec<BakeType> {
        self.baked.lock().unwrap().iter().map(|(bake, _)| *bake).collect()
    }

    pub fn inputs(&self, bake: BakeType) -> Option<Vec<BakeInput>> {
        self.baked
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(b, _)| *b == bake)
            .map(|(_, inputs)| inputs.clone())
    }
}

impl Compositor for FakeCompositor {
    fn bake(&self, bake: BakeType, inputs: &[BakeInput]) -> AppearanceResult<Bytes> {
        let broken = self.broken.lock().unwrap().contains(&(bake as u8));
        if broken {
            return Err(AppearanceError::Bake { layer: bake, reason: "unreadable alpha mask".into() });
        }
        self.baked.lock().unwrap().push((bake, inputs.to_vec()));
        Ok(Bytes::from(vec![bake as u8]))
    }
}

/// Fails the first N uploads of chosen layers
#[derive(Default)]
pub struct FakeUploader {
    failures: Mutex<HashMap<u8, u32>>,
    attempts: Mutex<HashMap<u8, u32>>,
}

impl FakeUploader {
    pub fn fail_times(&self, bake: BakeType, times: u32) {
        self.failures.lock().unwrap().insert(bake as u8, times);
    }

    pub fn attempts(&self, bake: BakeType) -> u32 {
        self.attempts.lock().unwrap().get(&(bake as u8)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl BakeUploader for FakeUploader {
    async fn upload_baked_texture(&self, data: Bytes, _timeout: Duration) -> NetworkResult<Uuid> {
        let layer = data.first().copied().unwrap_or(u8::MAX);
        *self.attempts.lock().unwrap().entry(layer).or_default() += 1;

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&layer) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(NetworkError::Upload { reason: "asset server said no".into() })
            }
            _ => Ok(Uuid::new_v4()),
        }
    }
}

#[derive(Default)]
pub struct FakeInventory {
    items: Mutex<Option<Vec<WearableItem>>>,
    pub calls: AtomicUsize,
}

impl FakeInventory {
    pub fn set_items(&self, items: Option<Vec<WearableItem>>) {
        *self.items.lock().unwrap() = items;
    }
}

#[async_trait]
impl InventorySource for FakeInventory {
    async fn fetch_current_wearables(&self, _timeout: Duration) -> NetworkResult<Vec<WearableItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| NetworkError::Transport { reason: "inventory offline".into() })
    }
}

/// Texture slots a test wearable of each type paints
pub fn painted_slots(wearable: WearableType) -> &'static [AvatarTextureIndex] {
    use AvatarTextureIndex as T;
    match wearable {
        WearableType::Skin => &[T::HeadBodypaint, T::UpperBodypaint, T::LowerBodypaint],
        WearableType::Hair => &[T::Hair],
        WearableType::Eyes => &[T::EyesIris],
        WearableType::Shirt => &[T::UpperShirt],
        WearableType::Pants => &[T::LowerPants],
        WearableType::Shoes => &[T::LowerShoes],
        WearableType::Jacket => &[T::UpperJacket, T::LowerJacket],
        WearableType::Skirt => &[T::Skirt],
        WearableType::Tattoo => &[T::HeadTattoo, T::UpperTattoo, T::LowerTattoo],
        _ => &[],
    }
}

fn stock_wearable(
    fetcher: &FakeFetcher,
    textures: &mut HashMap<AvatarTextureIndex, Uuid>,
    wearable: WearableType,
) -> WearableItem {
    let item = WearableItem::new(Uuid::new_v4(), Uuid::new_v4(), wearable);
    let mut asset = WearableAsset::new(wearable);
    for slot in painted_slots(wearable) {
        let texture_id = Uuid::new_v4();
        textures.insert(*slot, texture_id);
        asset = asset.with_texture(*slot, texture_id);
    }
    fetcher.add_asset(item.asset_id, asset);
    item
}

pub fn test_settings() -> AppearanceSettings {
    let mut settings = AppearanceSettings::default();
    settings.timeouts.wearables_fetch_ms = 2_000;
    settings.timeouts.wearable_download_ms = 2_000;
    settings.timeouts.texture_download_ms = 100;
    settings.timeouts.cache_check_ms = 2_000;
    settings.timeouts.upload_ms = 2_000;
    settings.timeouts.appearance_send_ms = 2_000;
    settings.rebake_delay_ms = 1_000;
    settings
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub fetcher: Arc<FakeFetcher>,
    pub compositor: Arc<FakeCompositor>,
    pub uploader: Arc<FakeUploader>,
    pub inventory: Arc<FakeInventory>,
    pub orchestrator: Arc<BakeOrchestrator>,
    pub controller: AppearanceRunController,
    /// Inventory's view of the outfit
    pub items: Vec<WearableItem>,
    textures: HashMap<AvatarTextureIndex, Uuid>,
}

impl Harness {
    pub fn new(outfit: &[WearableType]) -> Self {
        Self::with_settings(outfit, test_settings())
    }

    pub fn with_settings(outfit: &[WearableType], settings: AppearanceSettings) -> Self {
        slv_appearance::utils::init_test_logging();

        let transport = Arc::new(FakeTransport::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let compositor = Arc::new(FakeCompositor::default());
        let uploader = Arc::new(FakeUploader::default());
        let inventory = Arc::new(FakeInventory::default());

        let mut textures = HashMap::new();
        let items: Vec<WearableItem> = outfit
            .iter()
            .map(|wearable| stock_wearable(&fetcher, &mut textures, *wearable))
            .collect();
        inventory.set_items(Some(items.clone()));

        let services = Collaborators {
            transport: transport.clone(),
            fetcher: fetcher.clone(),
            uploader: uploader.clone(),
            compositor: compositor.clone(),
            inventory: inventory.clone(),
        };
        let orchestrator = Arc::new(BakeOrchestrator::new(
            services,
            Arc::new(VisualParamTable::builtin()),
            settings,
        ));
        let controller = AppearanceRunController::new(Arc::clone(&orchestrator));

        Self {
            transport,
            fetcher,
            compositor,
            uploader,
            inventory,
            orchestrator,
            controller,
            items,
            textures,
        }
    }

    /// A new wearable the fetcher can serve, not worn yet
    pub fn new_wearable(&mut self, wearable: WearableType) -> WearableItem {
        stock_wearable(&self.fetcher, &mut self.textures, wearable)
    }

    /// Texture the outfit paints into `slot`
    pub fn texture_id(&self, slot: AvatarTextureIndex) -> Uuid {
        self.textures[&slot]
    }

    pub fn item(&self, wearable: WearableType) -> WearableItem {
        self.items
            .iter()
            .find(|item| item.wearable_type == wearable)
            .cloned()
            .expect("wearable in outfit")
    }
}
