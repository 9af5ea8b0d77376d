//! Cache value representation.

use configs_core::{BannerConfig, ConfigKind, CostsConfig, GlobalConfig, UserConfig};
use serde::{Deserialize, Serialize};

/// A decoded config as held by both cache tiers.
///
/// This is what crosses the distributed tier as JSON, so the variant tags
/// are part of the shared cache's wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CachedConfig {
    Banner(BannerConfig),
    Costs(CostsConfig),
    User(UserConfig),
}

impl CachedConfig {
    /// Recover a global config, checking the cached shape matches the slot.
    ///
    /// A mismatch reads as a cache miss; the repository is authoritative.
    pub fn into_global(self, kind: ConfigKind) -> Option<GlobalConfig> {
        match (kind, self) {
            (ConfigKind::Banner, CachedConfig::Banner(value)) => Some(GlobalConfig::Banner(value)),
            (ConfigKind::Costs, CachedConfig::Costs(value)) => Some(GlobalConfig::Costs(value)),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<UserConfig> {
        match self {
            CachedConfig::User(value) => Some(value),
            _ => None,
        }
    }
}

impl From<GlobalConfig> for CachedConfig {
    fn from(value: GlobalConfig) -> Self {
        match value {
            GlobalConfig::Banner(value) => CachedConfig::Banner(value),
            GlobalConfig::Costs(value) => CachedConfig::Costs(value),
        }
    }
}

impl From<UserConfig> for CachedConfig {
    fn from(value: UserConfig) -> Self {
        CachedConfig::User(value)
    }
}
