//! Startup schema registrations.
//!
//! Every config shape registers its current schema with the registry before
//! the process serves traffic, so every row written by this process carries
//! a fingerprint the registry can resolve. Registration failure is fatal:
//! encoding with an unregistered fingerprint would strand rows.

use configs_core::{
    BannerConfig, ConfigError, ConfigKind, ConfigResult, ConfigSchema, ConfigValue, CostsConfig,
    Fingerprint, UserConfig,
};

use crate::client::SchemaRegistrar;

/// Fingerprints assigned to this process's schemas, built once at startup
/// and immutable afterwards.
///
/// Owned by the store and passed to collaborators explicitly; there is no
/// process-global registration state.
#[derive(Debug, Clone, Copy)]
pub struct SchemaRegistrations {
    banner: Fingerprint,
    costs: Fingerprint,
    user: Fingerprint,
}

impl SchemaRegistrations {
    /// Register every config shape. Fails fast on the first failure.
    pub async fn register_all<R: SchemaRegistrar>(registrar: &R) -> ConfigResult<Self> {
        let banner = register_one(registrar, BannerConfig::schema()).await?;
        let costs = register_one(registrar, CostsConfig::schema()).await?;
        let user = register_one(registrar, UserConfig::schema()).await?;
        Ok(Self {
            banner,
            costs,
            user,
        })
    }

    /// Fingerprint to encode a global config kind with.
    ///
    /// The match is exhaustive: a new `ConfigKind` variant will not compile
    /// until it registers a schema here.
    pub fn fingerprint_for(&self, kind: ConfigKind) -> Fingerprint {
        match kind {
            ConfigKind::Banner => self.banner,
            ConfigKind::Costs => self.costs,
        }
    }

    /// Fingerprint to encode user configs with.
    pub fn user_fingerprint(&self) -> Fingerprint {
        self.user
    }
}

async fn register_one<R: SchemaRegistrar>(
    registrar: &R,
    schema: ConfigSchema,
) -> ConfigResult<Fingerprint> {
    registrar.register(&schema).await.map_err(|err| {
        ConfigError::Startup(format!(
            "schema registration for {} failed: {err}",
            schema.name
        ))
    })
}
