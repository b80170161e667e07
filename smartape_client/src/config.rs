//! Client configuration
//!
//! Settings come from an optional YAML file, then `SMARTAPE_*` environment
//! variables (nested keys use `__`, e.g. `SMARTAPE_LEDGER__ENDPOINT`). The
//! operator account id and private key have no defaults; leaving either out
//! is a fatal [`ConfigError`].

use crate::contract::ReadPolicy;
use crate::error::ConfigError;
use crate::hashing::HashMode;
use crate::ledger::{AccountId, Hbar};
use crate::workflow::WorkflowSettings;
use config::{Config, Environment, File};
use ed25519_dalek::{Signature, Signer, SigningKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SMARTAPE";

/// DER prefix of a PKCS#8-wrapped Ed25519 private key
const ED25519_DER_PREFIX: &str = "302e020100300506032b657004220420";

/// Ledger gateway connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7546".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Where the compiled contract is fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BytecodeConfig {
    /// `http(s)://` URL or local path
    pub location: String,
}

impl Default for BytecodeConfig {
    fn default() -> Self {
        Self {
            location: "contracts/SmartAPE.bin".to_string(),
        }
    }
}

/// Workflow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub chunk_size: usize,
    pub deploy_gas: u64,
    pub call_gas: u64,
    pub file_max_fee_hbar: u64,
    pub contract_max_fee_hbar: u64,
    pub read_policy: ReadPolicy,
    pub read_concurrency: usize,
    pub hash_mode: HashMode,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            deploy_gas: 3_000_000,
            call_gas: 3_000_000,
            file_max_fee_hbar: 2,
            contract_max_fee_hbar: 1000,
            read_policy: ReadPolicy::Sequential,
            read_concurrency: 4,
            hash_mode: HashMode::Text,
        }
    }
}

/// Raw settings as deserialized from the configuration sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub operator_account_id: Option<String>,
    pub operator_private_key: Option<String>,
    pub ledger: LedgerConfig,
    pub bytecode: BytecodeConfig,
    pub workflow: WorkflowConfig,
}

impl ClientConfig {
    /// Load from `path` (if it exists) and the `SMARTAPE_*` environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let config: ClientConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check the settings and resolve the operator credentials
    pub fn operator(&self) -> Result<Operator, ConfigError> {
        let account = self
            .operator_account_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("operator_account_id"))?;
        let key = self
            .operator_private_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("operator_private_key"))?;

        let account_id: AccountId = account
            .parse()
            .map_err(|_| ConfigError::InvalidAccountId(account.to_string()))?;
        let key = OperatorKey::from_hex(key)?;
        Ok(Operator { account_id, key })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.request_timeout_secs)
    }

    /// Workflow settings derived from this configuration
    pub fn workflow_settings(&self, operator: &Operator) -> Result<WorkflowSettings, ConfigError> {
        let w = &self.workflow;
        if w.chunk_size == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "workflow.chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if w.read_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "workflow.read_concurrency",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(WorkflowSettings {
            chunk_size: w.chunk_size,
            deploy_gas: w.deploy_gas,
            call_gas: w.call_gas,
            file_max_fee: Hbar::from_hbars(w.file_max_fee_hbar),
            contract_max_fee: Hbar::from_hbars(w.contract_max_fee_hbar),
            file_keys: vec![operator.key.public_key_hex()],
            read_policy: w.read_policy,
            read_concurrency: w.read_concurrency,
            hash_mode: w.hash_mode,
        })
    }
}

/// Operator account and its signing key
#[derive(Debug, Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub key: OperatorKey,
}

/// Ed25519 operator private key
#[derive(Clone)]
pub struct OperatorKey(SigningKey);

impl OperatorKey {
    /// Accepts 64 hex digits or the 96-digit DER form, with optional `0x`
    pub fn from_hex(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        let digits = value.strip_prefix("0x").unwrap_or(value).to_ascii_lowercase();
        let raw = digits.strip_prefix(ED25519_DER_PREFIX).unwrap_or(&digits);
        if raw.len() != 64 {
            return Err(ConfigError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {} hex digits",
                raw.len()
            )));
        }
        let bytes = hex::decode(raw).map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?;
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        Ok(Self(SigningKey::from_bytes(&secret)))
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.0.verifying_key().as_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.0.sign(message)
    }
}

impl fmt::Debug for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperatorKey(public: {})", self.public_key_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    #[test]
    fn test_operator_key_accepts_raw_and_der() {
        let raw = OperatorKey::from_hex(KEY).unwrap();
        let der = OperatorKey::from_hex(&format!("{}{}", ED25519_DER_PREFIX, KEY)).unwrap();
        let prefixed = OperatorKey::from_hex(&format!("0x{}", KEY)).unwrap();
        assert_eq!(raw.public_key_hex(), der.public_key_hex());
        assert_eq!(raw.public_key_hex(), prefixed.public_key_hex());
        // RFC 8032 test vector 1
        assert_eq!(
            raw.public_key_hex(),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn test_operator_key_rejects_bad_input() {
        assert!(OperatorKey::from_hex("abcd").is_err());
        assert!(OperatorKey::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_does_not_print_secret() {
        let key = OperatorKey::from_hex(KEY).unwrap();
        assert!(!format!("{:?}", key).contains(KEY));
    }

    #[test]
    fn test_missing_secrets_are_fatal() {
        let config = ClientConfig::default();
        assert!(matches!(
            config.operator(),
            Err(ConfigError::MissingSecret("operator_account_id"))
        ));

        let config = ClientConfig {
            operator_account_id: Some("0.0.1234".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.operator(),
            Err(ConfigError::MissingSecret("operator_private_key"))
        ));
    }

    #[test]
    fn test_invalid_account_id() {
        let config = ClientConfig {
            operator_account_id: Some("alice".to_string()),
            operator_private_key: Some(KEY.to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.operator(),
            Err(ConfigError::InvalidAccountId(_))
        ));
    }

    #[test]
    fn test_workflow_settings_defaults() {
        let config = ClientConfig {
            operator_account_id: Some("0.0.1234".to_string()),
            operator_private_key: Some(KEY.to_string()),
            ..Default::default()
        };
        let operator = config.operator().unwrap();
        let settings = config.workflow_settings(&operator).unwrap();
        assert_eq!(settings.chunk_size, 1024);
        assert_eq!(settings.deploy_gas, 3_000_000);
        assert_eq!(settings.file_max_fee, Hbar::from_hbars(2));
        assert_eq!(settings.contract_max_fee, Hbar::from_hbars(1000));
        assert_eq!(settings.file_keys, vec![operator.key.public_key_hex()]);
        assert_eq!(settings.read_policy, ReadPolicy::Sequential);
        assert_eq!(settings.hash_mode, HashMode::Text);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let mut config = ClientConfig {
            operator_account_id: Some("0.0.1234".to_string()),
            operator_private_key: Some(KEY.to_string()),
            ..Default::default()
        };
        config.workflow.chunk_size = 0;
        let operator = config.operator().unwrap();
        assert!(config.workflow_settings(&operator).is_err());
    }
}
