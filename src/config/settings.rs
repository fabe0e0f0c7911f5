use anyhow::{bail, Context};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const CONFIG_FILE: &str = "appearance.toml";

// =============================================================================
// Appearance Configuration
// =============================================================================

/// Fan-out caps for each stage of a bake run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    pub wearable_downloads: usize,
    pub texture_downloads: usize,
    pub layer_bakes: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            wearable_downloads: 5,
            texture_downloads: 5,
            layer_bakes: 6,
        }
    }
}

/// Per-wait deadlines, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub wearables_fetch_ms: u64,
    pub wearable_download_ms: u64,
    pub texture_download_ms: u64,
    pub cache_check_ms: u64,
    pub upload_ms: u64,
    pub appearance_send_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            wearables_fetch_ms: 60_000,
            wearable_download_ms: 60_000,
            texture_download_ms: 120_000,
            cache_check_ms: 60_000,
            upload_ms: 120_000,
            appearance_send_ms: 10_000,
        }
    }
}

impl TimeoutSettings {
    /// Deadline for the inventory's current-wearables list
    pub fn wearables_fetch(&self) -> Duration {
        Duration::from_millis(self.wearables_fetch_ms)
    }

    /// Deadline for one wearable asset download
    pub fn wearable_download(&self) -> Duration {
        Duration::from_millis(self.wearable_download_ms)
    }

    /// Deadline for one texture download
    pub fn texture_download(&self) -> Duration {
        Duration::from_millis(self.texture_download_ms)
    }

    /// Deadline for the server cache check round trip
    pub fn cache_check(&self) -> Duration {
        Duration::from_millis(self.cache_check_ms)
    }

    /// Deadline for one bake upload attempt
    pub fn upload(&self) -> Duration {
        Duration::from_millis(self.upload_ms)
    }

    /// Deadline for handing the appearance message to the transport
    pub fn appearance_send(&self) -> Duration {
        Duration::from_millis(self.appearance_send_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    pub concurrency: ConcurrencySettings,
    pub timeouts: TimeoutSettings,
    /// Extra upload attempts after the first one fails
    pub upload_retries: u32,
    /// Quiet period after the last outfit change before a rebake starts
    pub rebake_delay_ms: u64,
    /// Texture shown in the client identification slots (0, 5, 6)
    pub client_tag_texture: Option<Uuid>,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencySettings::default(),
            timeouts: TimeoutSettings::default(),
            upload_retries: 2,
            rebake_delay_ms: 20_000,
            client_tag_texture: None,
        }
    }
}

impl AppearanceSettings {
    /// Debounce window for outfit changes
    pub fn rebake_delay(&self) -> Duration {
        Duration::from_millis(self.rebake_delay_ms)
    }

    /// Total upload attempts per layer
    pub fn upload_attempts(&self) -> u32 {
        self.upload_retries.saturating_add(1)
    }

    /// Reject settings a run cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.concurrency;
        if c.wearable_downloads == 0 || c.texture_downloads == 0 || c.layer_bakes == 0 {
            bail!(
                "concurrency limits must be non-zero (wearables {}, textures {}, bakes {})",
                c.wearable_downloads,
                c.texture_downloads,
                c.layer_bakes
            );
        }
        Ok(())
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "slv", "slv-appearance")
        .map(|proj_dirs| proj_dirs.config_dir().join(CONFIG_FILE))
}

/// Write `settings` as TOML to `path`, creating its directory
pub fn save_settings_to(settings: &AppearanceSettings, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let toml = toml::to_string_pretty(settings).context("serializing appearance settings")?;
    fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
    info!("💾 Saved appearance settings to {}", path.display());
    Ok(())
}

/// Load settings from `path`; a missing file yields the defaults
pub fn load_settings_from(path: &Path) -> anyhow::Result<AppearanceSettings> {
    if !path.exists() {
        debug!("⚙️ No settings at {}, using defaults", path.display());
        return Ok(AppearanceSettings::default());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let settings: AppearanceSettings =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Save to the per-user config directory
pub fn save_settings(settings: &AppearanceSettings) -> anyhow::Result<()> {
    match config_path() {
        Some(path) => save_settings_to(settings, &path),
        None => bail!("no configuration directory available"),
    }
}

/// Load from the per-user config directory, defaulting when there is none
pub fn load_settings() -> anyhow::Result<AppearanceSettings> {
    match config_path() {
        Some(path) => load_settings_from(&path),
        None => Ok(AppearanceSettings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: AppearanceSettings = toml::from_str(
            r#"
            upload_retries = 4

            [concurrency]
            layer_bakes = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.upload_attempts(), 5);
        assert_eq!(settings.concurrency.layer_bakes, 2);
        assert_eq!(settings.concurrency.texture_downloads, 5);
        assert_eq!(settings.rebake_delay(), Duration::from_secs(20));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let mut settings = AppearanceSettings::default();
        assert!(settings.validate().is_ok());
        settings.concurrency.texture_downloads = 0;
        assert!(settings.validate().is_err());
    }
}
