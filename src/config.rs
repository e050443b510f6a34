use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use secrecy::SecretString;
use serde::Deserialize;

use crate::domain::dss::{HashAlgorithm, RetryPolicy, SignOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub credentials: Credentials,
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub uri: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Key material used to authenticate against the signing service.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub private_key_alias: String,
    pub client_cert_alias: String,
    #[serde(default)]
    pub server_cert_alias: Option<String>,
    pub keystore: StoreLocation,
    pub truststore: StoreLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub password: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    pub claimed_identity: String,
    pub hash_algorithm: String,
    pub add_timestamp: bool,
    pub add_ocsp: bool,
    #[serde(default)]
    pub certificate_profile: Option<String>,
    #[serde(default)]
    pub distinguished_name: Option<String>,
    #[serde(default)]
    pub mobile_id: Option<MobileIdConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MobileIdConfig {
    pub phone_number: String,
    pub message: String,
    pub language: String,
}

impl SigningConfig {
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, ConfigError> {
        self.hash_algorithm
            .parse()
            .map_err(|e| ConfigError::Message(format!("signing.hash_algorithm: {e}")))
    }

    pub fn sign_options(&self) -> SignOptions {
        let options = if self.claimed_identity.is_empty() {
            SignOptions::default()
        } else {
            SignOptions::new(&self.claimed_identity)
        };
        let mut options = options
            .with_timestamp(self.add_timestamp)
            .with_ocsp(self.add_ocsp);

        if let Some(profile) = &self.certificate_profile {
            options = options.with_certificate_profile(profile);
        }
        if let Some(dn) = &self.distinguished_name {
            options = options.with_distinguished_name(dn);
        }
        if let Some(mobile) = &self.mobile_id {
            options = options.with_mobile_id(&mobile.phone_number, &mobile.message, &mobile.language);
        }
        options
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(Self::environment());
        }

        builder.build()?.try_deserialize()
    }

    /// Load from file and environment, then apply `overrides` on top.
    pub fn load_with_overrides<'a>(
        overrides: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?.add_source(Self::environment());
        for (key, value) in overrides {
            builder = builder.set_override(key, value)?;
        }
        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(ConfigLib::builder()
            .set_default("service.uri", "https://ais.swisscom.com/AIS-Server/ws")?
            .set_default("service.request_timeout_secs", 90)?
            .set_default("service.connect_timeout_secs", 20)?
            .set_default("service.retry.max_retries", 0)?
            .set_default("service.retry.initial_backoff_ms", 500)?
            .set_default("service.retry.max_backoff_ms", 10_000)?
            .set_default("credentials.private_key_alias", "dss-client")?
            .set_default("credentials.client_cert_alias", "dss-client")?
            .set_default("credentials.keystore.path", "config/keystore.p12")?
            .set_default("credentials.keystore.password", "")?
            .set_default("credentials.truststore.path", "config/truststore.pem")?
            .set_default("credentials.truststore.password", "")?
            .set_default("signing.claimed_identity", "")?
            .set_default("signing.hash_algorithm", "SHA-256")?
            .set_default("signing.add_timestamp", true)?
            .set_default("signing.add_ocsp", true)?
            .add_source(File::with_name("config/settings").required(false)))
    }

    // Should be in the format APP_SERVICE__URI or APP_CREDENTIALS__KEYSTORE__PATH
    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
    }
}
