use super::{
    AccountId, ContractCreateTransaction, ContractExecuteTransaction, ContractId, EntityId,
    FileAppendTransaction, FileCreateTransaction, FileId, LedgerClient, TransactionId,
    TransactionReceipt, TransactionRecord,
};
use crate::abi::{self, signed_to_word, ContractFunctionResult, Token};
use crate::contract::{Getter, CONSTRUCTOR_TYPES, SET_PREVIOUS_DOCUMENT};
use crate::error::TransportError;
use async_trait::async_trait;
use ethers::types::{H160, U256};
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum gas the emulated contract accepts for creation
pub const MIN_CREATE_GAS: u64 = 100_000;
/// Minimum gas the emulated contract accepts for a call
pub const MIN_CALL_GAS: u64 = 21_000;

const STATUS_INSUFFICIENT_GAS: &str = "INSUFFICIENT_GAS";
const STATUS_REVERTED: &str = "CONTRACT_REVERT_EXECUTED";
const STATUS_INVALID_FILE: &str = "INVALID_FILE_ID";
const STATUS_INVALID_CONTRACT: &str = "INVALID_CONTRACT_ID";
const STATUS_FILE_EMPTY: &str = "CONTRACT_FILE_EMPTY";

/// Ledger operation kinds, used for call logging and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOperation {
    FileCreate,
    FileAppend,
    ContractCreate,
    ContractExecute,
    GetRecord,
}

/// One logged ledger call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCall {
    pub operation: LedgerOperation,
    /// File or contract the call targeted, if any
    pub target: Option<EntityId>,
    /// Function name for contract calls
    pub function: Option<String>,
}

/// State held by one emulated SmartAPE contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartApeState {
    pub id: String,
    pub status: i8,
    pub expiration_date: i128,
    pub latitude: i128,
    pub longitude: i128,
    pub address: String,
    pub year_of_construction: i32,
    pub previous_document: H160,
    pub reason: u8,
    pub other_reason: String,
    pub document_hash: String,
    pub hash_algorithm: String,
}

impl SmartApeState {
    fn from_constructor(data: &[u8], now_ms: i64) -> Option<Self> {
        let mut tokens = abi::decode(&CONSTRUCTOR_TYPES, data).ok()?.into_iter();
        let id = tokens.next()?.into_string()?;
        let expiration = tokens.next()?.into_uint()?;
        let latitude = tokens.next()?.into_uint()?;
        let longitude = tokens.next()?.into_uint()?;
        let address = tokens.next()?.into_string()?;
        let year = tokens.next()?.into_uint()?;
        let reason = tokens.next()?.into_uint()?;
        let other_reason = tokens.next()?.into_string()?;
        let document_hash = tokens.next()?.into_string()?;
        let hash_algorithm = tokens.next()?.into_string()?;

        let expiration_date = abi::word_to_signed(expiration).ok()?;
        Some(Self {
            id,
            status: if expiration_date > now_ms as i128 { 0 } else { 1 },
            expiration_date,
            latitude: abi::word_to_signed(latitude).ok()?,
            longitude: abi::word_to_signed(longitude).ok()?,
            address,
            year_of_construction: i32::try_from(year.low_u64()).ok()?,
            previous_document: H160::zero(),
            reason: u8::try_from(reason.low_u64()).ok()?,
            other_reason,
            document_hash,
            hash_algorithm,
        })
    }

    fn get(&self, getter: Getter) -> Token {
        match getter {
            Getter::ApeId => Token::String(self.id.clone()),
            Getter::Status => Token::Int(signed_to_word(self.status as i128)),
            Getter::ExpirationDate => Token::Int(signed_to_word(self.expiration_date)),
            Getter::Latitude => Token::Int(signed_to_word(self.latitude)),
            Getter::Longitude => Token::Int(signed_to_word(self.longitude)),
            Getter::Address => Token::String(self.address.clone()),
            Getter::YearOfConstruction => {
                Token::Int(signed_to_word(self.year_of_construction as i128))
            }
            Getter::PreviousDocument => Token::Address(self.previous_document),
            Getter::Reason => Token::Int(U256::from(self.reason)),
            Getter::OtherReason => Token::String(self.other_reason.clone()),
            Getter::DocumentHash => Token::String(self.document_hash.clone()),
            Getter::HashAlgorithm => Token::String(self.hash_algorithm.clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct FailurePlan {
    operation: LedgerOperation,
    occurrence: usize,
    status: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    next_entity: u64,
    next_transaction: u64,
    files: HashMap<FileId, Vec<u8>>,
    contracts: HashMap<ContractId, SmartApeState>,
    records: HashMap<TransactionId, TransactionRecord>,
    calls: Vec<LedgerCall>,
    failures: Vec<FailurePlan>,
}

/// In-process ledger holding files and SmartAPE contract state
pub struct MemoryLedger {
    payer: AccountId,
    state: Arc<Mutex<LedgerState>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_payer(AccountId(EntityId::new(0, 0, 2)))
    }

    pub fn with_payer(payer: AccountId) -> Self {
        Self {
            payer,
            state: Arc::new(Mutex::new(LedgerState {
                next_entity: 1001,
                ..Default::default()
            })),
        }
    }

    /// Make the `occurrence`-th (1-based) call of `operation` fail with `status`
    pub fn fail_on(&self, operation: LedgerOperation, occurrence: usize, status: &str) {
        self.state.lock().failures.push(FailurePlan {
            operation,
            occurrence,
            status: status.to_string(),
        });
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.state.lock().calls.clone()
    }

    pub fn file_contents(&self, file_id: &FileId) -> Option<Vec<u8>> {
        self.state.lock().files.get(file_id).cloned()
    }

    pub fn contract_state(&self, contract_id: &ContractId) -> Option<SmartApeState> {
        self.state.lock().contracts.get(contract_id).cloned()
    }

    /// Install contract state directly, bypassing upload and creation
    pub fn register_contract(&self, contract: SmartApeState) -> ContractId {
        let mut state = self.state.lock();
        let id = ContractId(next_entity(&mut state));
        state.contracts.insert(id, contract);
        id
    }

    fn next_transaction_id(&self, state: &mut LedgerState) -> TransactionId {
        state.next_transaction += 1;
        TransactionId(format!(
            "{}@1700000000.{:09}",
            self.payer, state.next_transaction
        ))
    }

    /// Log the call and return the injected failure status, if one is due
    fn record_call(
        state: &mut LedgerState,
        operation: LedgerOperation,
        target: Option<EntityId>,
        function: Option<String>,
    ) -> Option<String> {
        state.calls.push(LedgerCall {
            operation,
            target,
            function,
        });
        let seen = state
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count();
        let position = state
            .failures
            .iter()
            .position(|f| f.operation == operation && f.occurrence == seen)?;
        Some(state.failures.remove(position).status)
    }

    fn finish(
        &self,
        state: &mut LedgerState,
        mut receipt: TransactionReceipt,
        status: Option<&str>,
        result: Option<ContractFunctionResult>,
    ) -> TransactionReceipt {
        if let Some(status) = status {
            receipt.status = status.to_string();
            receipt.file_id = None;
            receipt.contract_id = None;
        }
        state.records.insert(
            receipt.transaction_id.clone(),
            TransactionRecord {
                receipt: receipt.clone(),
                contract_function_result: result,
            },
        );
        receipt
    }
}

fn next_entity(state: &mut LedgerState) -> EntityId {
    let id = EntityId::new(0, 0, state.next_entity);
    state.next_entity += 1;
    id
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn create_file(
        &self,
        tx: &FileCreateTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        let mut state = self.state.lock();
        let failure = Self::record_call(&mut state, LedgerOperation::FileCreate, None, None);
        let transaction_id = self.next_transaction_id(&mut state);
        let mut receipt = TransactionReceipt::success(transaction_id);

        if failure.is_none() {
            let file_id = FileId(next_entity(&mut state));
            state.files.insert(file_id, tx.contents.clone());
            receipt.file_id = Some(file_id);
            debug!("memory ledger: created file {} ({} bytes)", file_id, tx.contents.len());
        }
        Ok(self.finish(&mut state, receipt, failure.as_deref(), None))
    }

    async fn append_file(
        &self,
        tx: &FileAppendTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        let mut state = self.state.lock();
        let failure = Self::record_call(
            &mut state,
            LedgerOperation::FileAppend,
            Some(tx.file_id.0),
            None,
        );
        let transaction_id = self.next_transaction_id(&mut state);
        let receipt = TransactionReceipt::success(transaction_id);

        let status = match (failure, state.files.get_mut(&tx.file_id)) {
            (Some(status), _) => Some(status),
            (None, None) => Some(STATUS_INVALID_FILE.to_string()),
            (None, Some(contents)) => {
                contents.extend_from_slice(&tx.contents);
                None
            }
        };
        Ok(self.finish(&mut state, receipt, status.as_deref(), None))
    }

    async fn create_contract(
        &self,
        tx: &ContractCreateTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        let mut state = self.state.lock();
        let failure = Self::record_call(
            &mut state,
            LedgerOperation::ContractCreate,
            Some(tx.bytecode_file_id.0),
            None,
        );
        let transaction_id = self.next_transaction_id(&mut state);
        let mut receipt = TransactionReceipt::success(transaction_id);

        let status = if let Some(status) = failure {
            Some(status)
        } else if tx.gas < MIN_CREATE_GAS {
            Some(STATUS_INSUFFICIENT_GAS.to_string())
        } else {
            let file_empty = state.files.get(&tx.bytecode_file_id).map(|c| c.is_empty());
            match file_empty {
                None => Some(STATUS_INVALID_FILE.to_string()),
                Some(true) => Some(STATUS_FILE_EMPTY.to_string()),
                Some(false) => {
                    match SmartApeState::from_constructor(&tx.constructor_parameters, now_ms()) {
                        None => Some(STATUS_REVERTED.to_string()),
                        Some(contract) => {
                            let contract_id = ContractId(next_entity(&mut state));
                            state.contracts.insert(contract_id, contract);
                            receipt.contract_id = Some(contract_id);
                            debug!("memory ledger: created contract {}", contract_id);
                            None
                        }
                    }
                }
            }
        };
        Ok(self.finish(&mut state, receipt, status.as_deref(), None))
    }

    async fn execute_contract(
        &self,
        tx: &ContractExecuteTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        let mut state = self.state.lock();
        let selector: Option<[u8; 4]> = tx
            .function_parameters
            .get(..4)
            .and_then(|s| s.try_into().ok());
        let set_previous = abi::selector(&format!("{}(address)", SET_PREVIOUS_DOCUMENT));
        let getter = selector.and_then(Getter::from_selector);
        let function = match (selector, getter) {
            (_, Some(g)) => Some(g.function_name().to_string()),
            (Some(s), None) if s == set_previous => Some(SET_PREVIOUS_DOCUMENT.to_string()),
            _ => None,
        };

        let failure = Self::record_call(
            &mut state,
            LedgerOperation::ContractExecute,
            Some(tx.contract_id.0),
            function,
        );
        let transaction_id = self.next_transaction_id(&mut state);
        let receipt = TransactionReceipt::success(transaction_id);

        if let Some(status) = failure {
            return Ok(self.finish(&mut state, receipt, Some(&status), None));
        }
        if tx.gas < MIN_CALL_GAS {
            return Ok(self.finish(&mut state, receipt, Some(STATUS_INSUFFICIENT_GAS), None));
        }
        let contract = match state.contracts.get_mut(&tx.contract_id) {
            Some(contract) => contract,
            None => {
                return Ok(self.finish(&mut state, receipt, Some(STATUS_INVALID_CONTRACT), None))
            }
        };

        let output = match (selector, getter) {
            (_, Some(getter)) => Some(abi::encode_return(&[contract.get(getter)])),
            (Some(s), None) if s == set_previous => {
                match abi::decode(&[abi::ParamType::Address], &tx.function_parameters[4..]) {
                    Ok(mut tokens) => match tokens.pop().and_then(Token::into_address) {
                        Some(address) => {
                            contract.previous_document = address;
                            Some(Vec::new())
                        }
                        None => None,
                    },
                    Err(_) => None,
                }
            }
            _ => None,
        };

        match output {
            Some(bytes) => {
                let result = ContractFunctionResult::new(tx.contract_id, bytes);
                Ok(self.finish(&mut state, receipt, None, Some(result)))
            }
            None => Ok(self.finish(&mut state, receipt, Some(STATUS_REVERTED), None)),
        }
    }

    async fn get_record(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionRecord, TransportError> {
        let mut state = self.state.lock();
        if let Some(status) = Self::record_call(&mut state, LedgerOperation::GetRecord, None, None)
        {
            return Err(TransportError::Rpc {
                code: -32000,
                message: status,
            });
        }
        state
            .records
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownTransaction(transaction_id.to_string()))
    }
}
