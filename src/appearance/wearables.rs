//! The set of currently worn wearables
//!
//! One exclusive lock covers the whole map. Outfit changes are rare next to
//! reads, so there is no finer-grained locking.

use crate::appearance::types::{WearableItem, WearableType};
use crate::appearance::wearable_asset::WearableAsset;
use crate::appearance::{AppearanceError, AppearanceResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Immutable copy of the worn set
pub type WearableMap = BTreeMap<WearableType, WearableItem>;

#[derive(Debug, Default)]
pub struct WearableStore {
    items: RwLock<WearableMap>,
}

impl WearableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `item` in its slot, replacing whatever was there
    pub async fn set(&self, item: WearableItem) -> AppearanceResult<Option<WearableItem>> {
        check_category(&item)?;
        let mut items = self.items.write().await;
        debug!("👕 Wearing {} {} (asset {})", item.wearable_type, item.item_id, item.asset_id);
        Ok(items.insert(item.wearable_type, item))
    }

    /// Take off the item in `slot`, but only if it is still `expected_item`
    pub async fn remove(&self, slot: WearableType, expected_item: Uuid) -> AppearanceResult<WearableItem> {
        if slot.is_bodypart() {
            return Err(AppearanceError::BodypartRemoval { slot });
        }

        let mut items = self.items.write().await;
        match items.get(&slot) {
            Some(current) if current.item_id == expected_item => {}
            _ => return Err(AppearanceError::ItemMismatch { slot }),
        }
        debug!("👕 Removing {} {}", slot, expected_item);
        items.remove(&slot).ok_or(AppearanceError::ItemMismatch { slot })
    }

    /// Swap in a whole new outfit. Body parts the new set leaves out keep
    /// their old item so the avatar never loses one.
    pub async fn replace_all(&self, new_items: impl IntoIterator<Item = WearableItem>) {
        let mut replacement = WearableMap::new();
        for item in new_items {
            match check_category(&item) {
                Ok(()) => {
                    replacement.insert(item.wearable_type, item);
                }
                Err(e) => warn!("⚠️ Dropping wearable {} from outfit: {}", item.item_id, e),
            }
        }

        let mut items = self.items.write().await;
        for (slot, old) in items.iter() {
            if old.is_bodypart() && !replacement.contains_key(slot) {
                debug!("👕 Keeping {} {} across outfit replace", slot, old.item_id);
                replacement.insert(*slot, old.clone());
            }
        }
        *items = replacement;
        info!("👕 Outfit replaced: {} wearables", items.len());
    }

    /// Attach a decoded asset, unless the slot was re-worn with a different asset meanwhile
    pub async fn set_asset(&self, slot: WearableType, asset_id: Uuid, asset: Arc<WearableAsset>) -> bool {
        let mut items = self.items.write().await;
        match items.get_mut(&slot) {
            Some(item) if item.asset_id == asset_id => {
                item.asset = Some(asset);
                true
            }
            _ => false,
        }
    }

    /// Item worn in `slot`, if any
    pub async fn get(&self, slot: WearableType) -> Option<WearableItem> {
        self.items.read().await.get(&slot).cloned()
    }

    /// Copy of the whole worn set, taken under one read lock
    pub async fn snapshot(&self) -> WearableMap {
        self.items.read().await.clone()
    }

    /// True when shape, skin, hair and eyes are all worn
    pub async fn has_all_bodyparts(&self) -> bool {
        let items = self.items.read().await;
        WearableType::BODYPARTS.iter().all(|slot| items.contains_key(slot))
    }

    /// Check if anything occupies `slot`
    pub async fn is_worn(&self, slot: WearableType) -> bool {
        self.items.read().await.contains_key(&slot)
    }

    /// Number of occupied slots
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Forget every worn item, body parts included
    pub async fn clear(&self) {
        self.items.write().await.clear();
    }
}

fn check_category(item: &WearableItem) -> AppearanceResult<()> {
    if item.asset_type != item.wearable_type.asset_type() {
        return Err(AppearanceError::InvalidWearable {
            reason: format!(
                "{} must be {:?}, got {:?}",
                item.wearable_type,
                item.wearable_type.asset_type(),
                item.asset_type
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::AssetType;

    fn item(slot: WearableType) -> WearableItem {
        WearableItem::new(Uuid::new_v4(), Uuid::new_v4(), slot)
    }

    fn full_body() -> Vec<WearableItem> {
        WearableType::BODYPARTS.iter().map(|slot| item(*slot)).collect()
    }

    #[tokio::test]
    async fn test_replace_all_preserves_missing_bodyparts() {
        let store = WearableStore::new();
        let old = full_body();
        store.replace_all(old.clone()).await;

        let new_shape = item(WearableType::Shape);
        let new_skin = item(WearableType::Skin);
        let new_eyes = item(WearableType::Eyes);
        let new_shirt = item(WearableType::Shirt);
        store
            .replace_all(vec![new_shape.clone(), new_skin.clone(), new_eyes.clone(), new_shirt.clone()])
            .await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot[&WearableType::Hair].item_id, old[2].item_id);
        assert_eq!(snapshot[&WearableType::Shape].item_id, new_shape.item_id);
        assert_eq!(snapshot[&WearableType::Skin].item_id, new_skin.item_id);
        assert_eq!(snapshot[&WearableType::Eyes].item_id, new_eyes.item_id);
        assert_eq!(snapshot[&WearableType::Shirt].item_id, new_shirt.item_id);
    }

    #[tokio::test]
    async fn test_replace_all_drops_old_clothing() {
        let store = WearableStore::new();
        let mut outfit = full_body();
        outfit.push(item(WearableType::Pants));
        store.replace_all(outfit).await;

        store.replace_all(Vec::new()).await;
        assert!(!store.is_worn(WearableType::Pants).await);
        assert!(store.has_all_bodyparts().await);
    }

    #[tokio::test]
    async fn test_remove_checks_identity() {
        let store = WearableStore::new();
        let pants = item(WearableType::Pants);
        store.set(pants.clone()).await.unwrap();

        let err = store.remove(WearableType::Pants, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppearanceError::ItemMismatch { .. }));
        assert!(store.is_worn(WearableType::Pants).await);

        let removed = store.remove(WearableType::Pants, pants.item_id).await.unwrap();
        assert_eq!(removed.item_id, pants.item_id);
        assert!(!store.is_worn(WearableType::Pants).await);
    }

    #[tokio::test]
    async fn test_bodyparts_cannot_be_removed() {
        let store = WearableStore::new();
        let skin = item(WearableType::Skin);
        store.set(skin.clone()).await.unwrap();
        let err = store.remove(WearableType::Skin, skin.item_id).await.unwrap_err();
        assert!(matches!(err, AppearanceError::BodypartRemoval { slot: WearableType::Skin }));
    }

    #[tokio::test]
    async fn test_set_rejects_wrong_category() {
        let store = WearableStore::new();
        let mut eyes = item(WearableType::Eyes);
        eyes.asset_type = AssetType::Clothing;
        assert!(store.set(eyes).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_asset_ignores_stale_download() {
        let store = WearableStore::new();
        let shirt = item(WearableType::Shirt);
        store.set(shirt.clone()).await.unwrap();

        let asset = Arc::new(WearableAsset::new(WearableType::Shirt));
        assert!(!store.set_asset(WearableType::Shirt, Uuid::new_v4(), asset.clone()).await);
        assert!(store.set_asset(WearableType::Shirt, shirt.asset_id, asset).await);
        assert!(store.get(WearableType::Shirt).await.unwrap().asset.is_some());
    }
}
