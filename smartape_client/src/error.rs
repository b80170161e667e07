//! Error types for the SmartAPE client
//!
//! Each concern carries its own `thiserror` enum; [`SmartApeError`] is what the
//! deploy and find workflows return.

use crate::ledger::EntityId;

/// Workflow result type
pub type Result<T> = std::result::Result<T, SmartApeError>;

/// Malformed user input, raised before any ledger call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field}: '{value}' is not a valid number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field}: '{value}' has more than {max} decimal places")]
    TooPrecise {
        field: &'static str,
        value: String,
        max: u32,
    },

    #[error("{field}: {value} is out of range ({min} to {max})")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: i64,
        max: i64,
    },

    #[error("expiration date '{0}' is not a valid date")]
    InvalidDate(String),

    #[error("expiration date {0} is not in the future")]
    ExpirationNotInFuture(String),

    #[error("other reason text is required when reason is {0}")]
    MissingOtherReason(u8),

    #[error("'{0}' is not a valid entity id (expected shard.realm.num)")]
    InvalidEntityId(String),
}

/// A ledger call that was rejected or never reached the ledger
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned HTTP {0}")]
    Status(u16),

    #[error("gateway error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{operation} rejected with status {status}")]
    Rejected { operation: String, status: String },

    #[error("malformed gateway response: {0}")]
    Malformed(String),

    #[error("unknown file {0}")]
    UnknownFile(EntityId),

    #[error("unknown contract {0}")]
    UnknownContract(EntityId),

    #[error("no record for transaction {0}")]
    UnknownTransaction(String),
}

/// Contract ABI encoding or decoding failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("'{0}' is not a valid address")]
    InvalidAddress(String),

    #[error("cannot decode contract output: {0}")]
    Decode(String),

    #[error("value does not fit in {0}")]
    Overflow(&'static str),

    #[error("contract call reverted: {0}")]
    Reverted(String),
}

/// Missing or invalid client configuration; fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    MissingSecret(&'static str),

    #[error("invalid operator account id: {0}")]
    InvalidAccountId(String),

    #[error("invalid operator private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// Top-level workflow error
#[derive(Debug, thiserror::Error)]
pub enum SmartApeError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("ledger transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("contract deployment failed: {0}")]
    Deployment(String),

    #[error("linking predecessor {previous} failed: {source}")]
    Link {
        previous: String,
        #[source]
        source: TransportError,
    },

    #[error("reading {getter} failed: {source}")]
    Read {
        getter: &'static str,
        #[source]
        source: Box<SmartApeError>,
    },

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("bytecode is empty, nothing to deploy")]
    EmptyBytecode,

    #[error("no bytecode source configured for deploy")]
    NoBytecodeSource,

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("failed to fetch bytecode from {location}: {reason}")]
    Bytecode { location: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
