//! HTTP client for the schema registry service.
//!
//! The registry assigns an 8-byte fingerprint to every schema definition it
//! has seen (`POST /v1/schema`) and serves definitions back by fingerprint
//! (`GET /v1/schema/{fingerprint}`). Both calls are retried with bounded
//! exponential backoff on transient failure; a missing fingerprint is not
//! transient and surfaces immediately.

use std::time::Duration;

use async_trait::async_trait;
use configs_core::{ConfigResult, ConfigSchema, Fingerprint, RegistryError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Registry endpoint and retry policy.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the registry service, no trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Total attempts per call, first try included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5007".to_string(),
            request_timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RegistryConfig {
    /// Create a registry configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONFIGS_REGISTRY_URL`: registry base URL (default: http://localhost:5007)
    /// - `CONFIGS_REGISTRY_TIMEOUT_MS`: per-request timeout (default: 5000)
    /// - `CONFIGS_REGISTRY_MAX_ATTEMPTS`: attempts per call (default: 3)
    /// - `CONFIGS_REGISTRY_BASE_DELAY_MS`: first retry delay (default: 250)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("CONFIGS_REGISTRY_URL")
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            request_timeout: std::env::var("CONFIGS_REGISTRY_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            max_attempts: std::env::var("CONFIGS_REGISTRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.max_attempts)
                .max(1),
            base_delay: std::env::var("CONFIGS_REGISTRY_BASE_DELAY_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SaveSchemaResponse {
    fingerprint: String,
}

/// Outcome of one attempt: transient failures are retried, fatal ones are not.
enum AttemptError {
    Transient(String),
    Fatal(RegistryError),
}

/// Registration side of the registry: schema in, fingerprint out.
#[async_trait]
pub trait SchemaRegistrar: Send + Sync {
    async fn register(&self, schema: &ConfigSchema) -> ConfigResult<Fingerprint>;
}

/// Lookup side of the registry: fingerprint in, schema definition out.
#[async_trait]
pub trait SchemaLookup: Send + Sync {
    async fn lookup(&self, fingerprint: Fingerprint) -> ConfigResult<ConfigSchema>;
}

/// Client for the schema registry service.
#[derive(Clone)]
pub struct SchemaRegistryClient {
    http: Client,
    config: RegistryConfig,
}

impl SchemaRegistryClient {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Register a schema definition, returning its fingerprint.
    pub async fn register(&self, schema: &ConfigSchema) -> ConfigResult<Fingerprint> {
        let url = format!("{}/v1/schema", self.config.base_url);
        let mut delay = self.config.base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.register_once(&url, schema).await {
                Ok(fingerprint) => {
                    tracing::debug!(
                        schema = %schema.name,
                        fingerprint = %fingerprint,
                        "registered schema"
                    );
                    return Ok(fingerprint);
                }
                Err(AttemptError::Fatal(err)) => return Err(err.into()),
                Err(AttemptError::Transient(reason)) => {
                    if attempt >= self.config.max_attempts {
                        return Err(RegistryError::Transport { attempts: attempt, reason }.into());
                    }
                    tracing::warn!(
                        schema = %schema.name,
                        attempt,
                        error = %reason,
                        "schema registration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    /// Fetch the schema definition a fingerprint was assigned to.
    pub async fn lookup(&self, fingerprint: Fingerprint) -> ConfigResult<ConfigSchema> {
        let url = format!(
            "{}/v1/schema/{}",
            self.config.base_url,
            fingerprint.to_base64()
        );
        let mut delay = self.config.base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.lookup_once(&url, fingerprint).await {
                Ok(schema) => return Ok(schema),
                Err(AttemptError::Fatal(err)) => return Err(err.into()),
                Err(AttemptError::Transient(reason)) => {
                    if attempt >= self.config.max_attempts {
                        return Err(RegistryError::Transport { attempts: attempt, reason }.into());
                    }
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        attempt,
                        error = %reason,
                        "schema lookup failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    async fn register_once(
        &self,
        url: &str,
        schema: &ConfigSchema,
    ) -> Result<Fingerprint, AttemptError> {
        let response = self
            .http
            .post(url)
            .timeout(self.config.request_timeout)
            .json(schema)
            .send()
            .await
            .map_err(|err| AttemptError::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!("registry returned {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(RegistryError::InvalidSchema {
                reason: format!("registry rejected schema definition: {status}"),
            }));
        }

        let body: SaveSchemaResponse = response
            .json()
            .await
            .map_err(|err| AttemptError::Transient(err.to_string()))?;
        Fingerprint::from_base64(&body.fingerprint).ok_or(AttemptError::Fatal(
            RegistryError::InvalidFingerprint {
                value: body.fingerprint,
            },
        ))
    }

    async fn lookup_once(
        &self,
        url: &str,
        fingerprint: Fingerprint,
    ) -> Result<ConfigSchema, AttemptError> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|err| AttemptError::Transient(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AttemptError::Fatal(RegistryError::SchemaNotFound {
                fingerprint: fingerprint.to_base64(),
            }));
        }
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!("registry returned {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(RegistryError::Transport {
                attempts: 1,
                reason: format!("registry returned {status}"),
            }));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| AttemptError::Transient(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| {
            AttemptError::Fatal(RegistryError::InvalidSchema {
                reason: err.to_string(),
            })
        })
    }
}

#[async_trait]
impl SchemaRegistrar for SchemaRegistryClient {
    async fn register(&self, schema: &ConfigSchema) -> ConfigResult<Fingerprint> {
        SchemaRegistryClient::register(self, schema).await
    }
}

#[async_trait]
impl SchemaLookup for SchemaRegistryClient {
    async fn lookup(&self, fingerprint: Fingerprint) -> ConfigResult<ConfigSchema> {
        SchemaRegistryClient::lookup(self, fingerprint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.base_url, "http://localhost:5007");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_save_schema_response_parses() {
        let body: SaveSchemaResponse =
            serde_json::from_str(r#"{"fingerprint":"AAECAwQFBgc"}"#).unwrap();
        let fingerprint = Fingerprint::from_base64(&body.fingerprint).unwrap();
        assert_eq!(fingerprint.as_bytes(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }
}
