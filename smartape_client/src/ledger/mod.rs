//! Ledger client seam
//!
//! The workflows only talk to the ledger through [`LedgerClient`]. Every
//! transaction method submits, waits for consensus and returns the receipt;
//! contract return data is fetched separately from the transaction record.

pub mod memory;
pub mod rpc;

pub use memory::MemoryLedger;
pub use rpc::RpcLedgerClient;

use crate::abi::ContractFunctionResult;
use crate::error::{TransportError, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Receipt status of a confirmed transaction
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// `shard.realm.num` ledger entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// 20-byte long-zero address: 4 bytes shard, 8 bytes realm, 8 bytes num.
    ///
    /// Shards above `u32::MAX` have no address form.
    pub fn to_solidity_address(&self) -> Result<String, ValidationError> {
        let shard = u32::try_from(self.shard)
            .map_err(|_| ValidationError::InvalidEntityId(self.to_string()))?;
        let mut bytes = [0u8; 20];
        bytes[..4].copy_from_slice(&shard.to_be_bytes());
        bytes[4..12].copy_from_slice(&self.realm.to_be_bytes());
        bytes[12..].copy_from_slice(&self.num.to_be_bytes());
        Ok(format!("0x{}", hex::encode(bytes)))
    }

    /// Inverse of [`EntityId::to_solidity_address`]
    pub fn from_solidity_address(bytes: &[u8; 20]) -> Self {
        let mut shard = [0u8; 4];
        let mut realm = [0u8; 8];
        let mut num = [0u8; 8];
        shard.copy_from_slice(&bytes[..4]);
        realm.copy_from_slice(&bytes[4..12]);
        num.copy_from_slice(&bytes[12..]);
        Self::new(
            u32::from_be_bytes(shard) as u64,
            u64::from_be_bytes(realm),
            u64::from_be_bytes(num),
        )
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidEntityId(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut nums = [0u64; 3];
        for (slot, part) in nums.iter_mut().zip(parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

macro_rules! entity_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub EntityId);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }
    };
}

entity_newtype!(
    /// Ledger file holding staged contract bytecode
    FileId
);
entity_newtype!(
    /// Deployed contract instance
    ContractId
);
entity_newtype!(
    /// Operator or payer account
    AccountId
);

/// Transaction id as issued by the ledger, e.g. `0.0.2@1700000000.000000001`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction fee amount, stored in tinybars
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hbar(u64);

impl Hbar {
    pub const TINYBARS_PER_HBAR: u64 = 100_000_000;

    pub fn from_hbars(hbars: u64) -> Self {
        Self(hbars.saturating_mul(Self::TINYBARS_PER_HBAR))
    }

    pub fn from_tinybars(tinybars: u64) -> Self {
        Self(tinybars)
    }

    pub fn to_tinybars(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::TINYBARS_PER_HBAR;
        let frac = self.0 % Self::TINYBARS_PER_HBAR;
        if frac == 0 {
            write!(f, "{} hbar", whole)
        } else {
            write!(f, "{}.{:08} hbar", whole, frac)
        }
    }
}

/// Lowercase hex (de)serialization for byte fields
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCreateTransaction {
    #[serde(with = "hex_bytes")]
    pub contents: Vec<u8>,
    /// Public keys allowed to modify the file
    pub keys: Vec<String>,
    pub max_transaction_fee: Hbar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAppendTransaction {
    pub file_id: FileId,
    #[serde(with = "hex_bytes")]
    pub contents: Vec<u8>,
    pub max_transaction_fee: Hbar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreateTransaction {
    pub bytecode_file_id: FileId,
    #[serde(with = "hex_bytes")]
    pub constructor_parameters: Vec<u8>,
    pub gas: u64,
    pub max_transaction_fee: Hbar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractExecuteTransaction {
    pub contract_id: ContractId,
    pub gas: u64,
    /// Selector plus encoded arguments
    #[serde(with = "hex_bytes")]
    pub function_parameters: Vec<u8>,
}

/// Consensus receipt of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub status: String,
    #[serde(default)]
    pub file_id: Option<FileId>,
    #[serde(default)]
    pub contract_id: Option<ContractId>,
}

impl TransactionReceipt {
    pub fn success(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id,
            status: STATUS_SUCCESS.to_string(),
            file_id: None,
            contract_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Turns a non-success status into [`TransportError::Rejected`]
    pub fn ensure_success(self, operation: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Rejected {
                operation: operation.to_string(),
                status: self.status,
            })
        }
    }
}

/// Full record of a transaction, including contract return data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub receipt: TransactionReceipt,
    #[serde(default)]
    pub contract_function_result: Option<ContractFunctionResult>,
}

/// Ledger operations the SmartAPE workflows depend on
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn create_file(
        &self,
        tx: &FileCreateTransaction,
    ) -> Result<TransactionReceipt, TransportError>;

    async fn append_file(
        &self,
        tx: &FileAppendTransaction,
    ) -> Result<TransactionReceipt, TransportError>;

    async fn create_contract(
        &self,
        tx: &ContractCreateTransaction,
    ) -> Result<TransactionReceipt, TransportError>;

    async fn execute_contract(
        &self,
        tx: &ContractExecuteTransaction,
    ) -> Result<TransactionReceipt, TransportError>;

    async fn get_record(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionRecord, TransportError>;
}
