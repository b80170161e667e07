//! Deploy and find workflows
//!
//! [`SmartApeService`] owns the ledger client and bytecode source and runs
//! the two end-to-end flows. Both report through a [`ProgressSink`] and
//! resolve with either the result or the first error hit; nothing is retried.

use crate::bytecode::BytecodeSource;
use crate::chunker::{split_into_chunks, DEFAULT_CHUNK_SIZE};
use crate::contract::{ContractDeployer, ContractLinker, ContractReader, FileUploader, ReadPolicy};
use crate::error::{Result, SmartApeError};
use crate::hashing::{hash_document_bytes, hash_document_file, HashMode};
use crate::ledger::{ContractId, Hbar, LedgerClient};
use crate::progress::{ProgressReporter, ProgressSink, Stage};
use crate::record::ApeRecord;
use crate::validation::{validate, DeployForm};
use chrono::Utc;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Share of the deploy flow's progress given to the upload
pub const UPLOAD_END: f64 = 0.9;
pub const DEPLOY_AT: f64 = 0.9;
pub const LINK_AT: f64 = 0.95;

/// Tuning for both workflows
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    pub chunk_size: usize,
    pub deploy_gas: u64,
    pub call_gas: u64,
    pub file_max_fee: Hbar,
    pub contract_max_fee: Hbar,
    /// Public keys that control the staged bytecode file
    pub file_keys: Vec<String>,
    pub read_policy: ReadPolicy,
    pub read_concurrency: usize,
    pub hash_mode: HashMode,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            deploy_gas: 3_000_000,
            call_gas: 3_000_000,
            file_max_fee: Hbar::from_hbars(2),
            contract_max_fee: Hbar::from_hbars(1000),
            file_keys: Vec::new(),
            read_policy: ReadPolicy::Sequential,
            read_concurrency: 4,
            hash_mode: HashMode::Text,
        }
    }
}

/// The certification document to hash
#[derive(Debug, Clone)]
pub enum Document {
    File(PathBuf),
    Bytes(Vec<u8>),
}

pub struct SmartApeService {
    ledger: Arc<dyn LedgerClient>,
    bytecode: Option<Arc<dyn BytecodeSource>>,
    settings: WorkflowSettings,
}

impl SmartApeService {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        bytecode: Arc<dyn BytecodeSource>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            ledger,
            bytecode: Some(bytecode),
            settings,
        }
    }

    /// A service that can only look records up; [`SmartApeService::deploy`]
    /// fails with [`SmartApeError::NoBytecodeSource`]
    pub fn reader(ledger: Arc<dyn LedgerClient>, settings: WorkflowSettings) -> Self {
        Self {
            ledger,
            bytecode: None,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Validate, hash, upload, deploy and optionally link a new SmartAPE.
    ///
    /// Validation runs first; an invalid form never reaches the ledger.
    pub async fn deploy(
        &self,
        form: &DeployForm,
        document: &Document,
        sink: &dyn ProgressSink,
    ) -> Result<ContractId> {
        let ape = validate(form, Utc::now())?;
        let s = &self.settings;

        let hash = match document {
            Document::File(path) => hash_document_file(path, s.hash_mode).await?,
            Document::Bytes(bytes) => hash_document_bytes(bytes, s.hash_mode),
        };
        info!("deploying SmartAPE {} (document {} {})", ape.id, hash.algorithm, hash.hex);
        let constructor = ape.constructor_parameters(&hash);

        let source = self.bytecode.as_ref().ok_or(SmartApeError::NoBytecodeSource)?;
        let bytecode = source.fetch().await?;
        let chunks = split_into_chunks(&bytecode, s.chunk_size)?;
        if chunks.is_empty() {
            return Err(SmartApeError::EmptyBytecode);
        }

        let ledger = self.ledger.as_ref();
        let progress = ProgressReporter::new(sink);

        let uploader = FileUploader::new(ledger, s.file_keys.clone(), s.file_max_fee);
        let file_id = uploader
            .upload(&chunks, &progress.sub_range(0.0, UPLOAD_END))
            .await?;

        progress.at(Stage::Deploy, DEPLOY_AT, "Deploying smart contract.");
        let contract_id = ContractDeployer::new(ledger, s.contract_max_fee)
            .deploy(file_id, &constructor, s.deploy_gas)
            .await?;

        if let Some(previous) = &ape.previous {
            progress.at(Stage::Link, LINK_AT, "Setting previous document address.");
            ContractLinker::new(ledger, s.call_gas)
                .link(contract_id, previous)
                .await?;
        }

        progress.at(Stage::Done, 1.0, "Done.");
        Ok(contract_id)
    }

    /// Read back the record stored in `contract_id`
    pub async fn find(&self, contract_id: &str, sink: &dyn ProgressSink) -> Result<ApeRecord> {
        let contract_id: ContractId = contract_id.parse()?;
        let s = &self.settings;
        ContractReader::new(self.ledger.as_ref(), s.call_gas)
            .with_policy(s.read_policy, s.read_concurrency)
            .read_record(contract_id, &ProgressReporter::new(sink))
            .await
    }
}
