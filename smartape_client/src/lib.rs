//! SmartAPE client
//!
//! Deploys property-certification contracts to a ledger and reads them back.
//! The ledger is reached through the [`ledger::LedgerClient`] trait, so the
//! same workflows run against the JSON-RPC gateway or the in-memory ledger.

pub mod abi;
pub mod bytecode;
pub mod chunker;
pub mod config;
pub mod contract;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod progress;
pub mod record;
pub mod validation;
pub mod workflow;

pub use error::{Result, SmartApeError};
pub use progress::{ProgressEvent, ProgressSink, Stage};
pub use record::{ApeRecord, ApeStatus, Reason};
pub use validation::DeployForm;
pub use workflow::{Document, SmartApeService, WorkflowSettings};
