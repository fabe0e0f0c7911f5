//! Asset transfer bookkeeping shared by the bake stages

use serde::{Deserialize, Serialize};

/// Transfer statistics for one orchestration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub wearables_requested: u64,
    pub wearables_failed: u64,
    pub textures_requested: u64,
    pub textures_failed: u64,
    pub uploads_attempted: u64,
    pub uploads_failed: u64,
    pub bytes_uploaded: u64,
}

impl TransferStats {
    /// Calculate download success rate as percentage
    pub fn download_success_rate(&self) -> f64 {
        let requested = self.wearables_requested + self.textures_requested;
        if requested == 0 {
            100.0
        } else {
            let failed = self.wearables_failed + self.textures_failed;
            ((requested - failed) as f64 / requested as f64) * 100.0
        }
    }

    /// True when no download or upload failed
    pub fn is_clean(&self) -> bool {
        self.wearables_failed == 0 && self.textures_failed == 0 && self.uploads_failed == 0
    }
}
