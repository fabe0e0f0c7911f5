//! Bake cache hashes and the server cache check
//!
//! A layer's hash is the XOR of the asset ids of every worn wearable that
//! feeds it, XORed once more with the layer's magic constant. XOR makes the
//! hash independent of wearable order.

use crate::appearance::types::{BakeType, WearableType};
use crate::appearance::wearables::WearableMap;
use crate::appearance::{AppearanceError, AppearanceResult};
use crate::config::concurrency::CancelToken;
use crate::networking::messages::{CachedTextureEntry, CachedTextureRequest};
use crate::networking::{AppearanceMessage, AppearanceTransport, NetworkError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cache hash of one layer; nil when nothing worn contributes to it
pub fn compute_hash(bake: BakeType, wearables: &WearableMap) -> Uuid {
    let mut hash = 0u128;
    let mut contributors = 0;
    for slot in bake.contributing_wearables() {
        if let Some(item) = wearables.get(slot) {
            if !item.asset_id.is_nil() {
                hash ^= item.asset_id.as_u128();
                contributors += 1;
            }
        }
    }
    if contributors == 0 {
        return Uuid::nil();
    }
    Uuid::from_u128(hash ^ bake.magic_hash().as_u128())
}

/// Hash of every layer, nil ones included
pub fn all_hashes(wearables: &WearableMap) -> Vec<(BakeType, Uuid)> {
    BakeType::ALL.iter().map(|bake| (*bake, compute_hash(*bake, wearables))).collect()
}

/// Hashes worth asking the server about: non-nil, and no skirt layer without a skirt
pub fn compute_hashes(wearables: &WearableMap) -> Vec<(BakeType, Uuid)> {
    let wearing_skirt = wearables.contains_key(&WearableType::Skirt);
    all_hashes(wearables)
        .into_iter()
        .filter(|(bake, _)| *bake != BakeType::Skirt || wearing_skirt)
        .filter(|(_, hash)| !hash.is_nil())
        .collect()
}

/// Outcome of one cache check round trip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheCheckResult {
    pub serial_num: u32,
    pub requested: Vec<(BakeType, Uuid)>,
    /// Layers the server already holds a bake for
    pub hits: Vec<(BakeType, Uuid)>,
}

pub struct CacheHashNegotiator {
    transport: Arc<dyn AppearanceTransport>,
    serial: AtomicU32,
}

impl std::fmt::Debug for CacheHashNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHashNegotiator")
            .field("serial", &self.serial.load(Ordering::Relaxed))
            .finish()
    }
}

impl CacheHashNegotiator {
    pub fn new(transport: Arc<dyn AppearanceTransport>) -> Self {
        Self {
            transport,
            serial: AtomicU32::new(0),
        }
    }

    /// Serial of the last cache check sent
    pub fn serial(&self) -> u32 {
        self.serial.load(Ordering::SeqCst)
    }

    /// Ask the server which of the `requested` layer hashes it already holds a bake for.
    /// Build the list with [`compute_hashes`].
    pub async fn check_cache(
        &self,
        requested: Vec<(BakeType, Uuid)>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> AppearanceResult<CacheCheckResult> {
        if requested.is_empty() {
            debug!("🗂️ Nothing to ask the server about, skipping cache check");
            return Ok(CacheCheckResult::default());
        }

        let serial_num = self.serial.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let request = AppearanceMessage::CachedTextureRequest(CachedTextureRequest {
            serial_num,
            entries: requested
                .iter()
                .map(|(bake, cache_id)| CachedTextureEntry { bake: *bake, cache_id: *cache_id })
                .collect(),
        });

        info!("🗂️ Cache check #{}: {} layers", serial_num, requested.len());
        let payload = request.encode()?;
        cancel
            .guard(timeout, "cache check send", self.transport.send_request(serial_num, payload))
            .await?;
        let reply = cancel
            .guard(timeout, "cache check reply", self.transport.await_reply(serial_num, timeout))
            .await?;

        let reply = match AppearanceMessage::decode(&reply)? {
            AppearanceMessage::CachedTextureReply(reply) if reply.serial_num == serial_num => reply,
            AppearanceMessage::CachedTextureReply(reply) => {
                warn!("🗂️ Ignoring cache reply #{} while waiting for #{}", reply.serial_num, serial_num);
                return Err(AppearanceError::Network(NetworkError::Other {
                    reason: format!("stale cache reply #{}", reply.serial_num),
                }));
            }
            other => {
                return Err(AppearanceError::Network(NetworkError::Decode {
                    reason: format!("expected cache reply, got {}", other.name()),
                }));
            }
        };

        let hits: Vec<(BakeType, Uuid)> = reply
            .entries
            .iter()
            .filter(|entry| !entry.texture_id.is_nil())
            .filter(|entry| requested.iter().any(|(bake, _)| *bake == entry.bake))
            .map(|entry| (entry.bake, entry.texture_id))
            .collect();

        info!("🗂️ Cache check #{}: {} hits of {}", serial_num, hits.len(), requested.len());
        Ok(CacheCheckResult { serial_num, requested, hits })
    }
}
