use super::{Getter, GETTERS};
use crate::abi::{ContractFunctionParameters, ContractFunctionResult, ParamType};
use crate::error::{Result, SmartApeError, TransportError};
use crate::ledger::{ContractExecuteTransaction, ContractId, LedgerClient};
use crate::progress::{ProgressReporter, Stage};
use crate::record::{ApeRecord, ApeStatus, Reason};
use ethers::types::H160;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the getters are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    /// One at a time, in getter order
    #[default]
    Sequential,
    /// Up to the configured number in flight
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GetterValue {
    Text(String),
    Int8(i8),
    Int32(i32),
    Int256(i128),
    Address(H160),
}

/// Reads a SmartAPE record back from its contract
pub struct ContractReader<'a> {
    ledger: &'a dyn LedgerClient,
    gas: u64,
    policy: ReadPolicy,
    concurrency: usize,
}

impl<'a> ContractReader<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, gas: u64) -> Self {
        Self {
            ledger,
            gas,
            policy: ReadPolicy::Sequential,
            concurrency: 1,
        }
    }

    pub fn with_policy(mut self, policy: ReadPolicy, concurrency: usize) -> Self {
        self.policy = policy;
        self.concurrency = concurrency.max(1);
        self
    }

    /// Execute one getter and fetch its return data from the record
    pub async fn call_getter(
        &self,
        contract_id: ContractId,
        getter: Getter,
    ) -> Result<ContractFunctionResult> {
        let tx = ContractExecuteTransaction {
            contract_id,
            gas: self.gas,
            function_parameters: ContractFunctionParameters::new()
                .to_call_bytes(getter.function_name()),
        };
        let receipt = self
            .ledger
            .execute_contract(&tx)
            .await?
            .ensure_success(getter.function_name())?;
        let record = self.ledger.get_record(&receipt.transaction_id).await?;
        let result = record.contract_function_result.ok_or_else(|| {
            TransportError::Malformed(format!(
                "record {} has no contract function result",
                receipt.transaction_id
            ))
        })?;
        result.ensure_success()?;
        Ok(result)
    }

    async fn read_value(&self, contract_id: ContractId, getter: Getter) -> Result<GetterValue> {
        let decoded = async {
            let result = self.call_getter(contract_id, getter).await?;
            let value = match getter.return_type() {
                ParamType::String => GetterValue::Text(result.get_string(0)?),
                ParamType::Int(8) => GetterValue::Int8(result.get_int8(0)?),
                ParamType::Int(32) => GetterValue::Int32(result.get_int32(0)?),
                ParamType::Address => GetterValue::Address(result.get_address(0)?),
                _ => GetterValue::Int256(result.get_int256(0)?),
            };
            debug!("{} on {} returned {:?}", getter.function_name(), contract_id, value);
            Ok::<_, SmartApeError>(value)
        };
        decoded.await.map_err(|source| SmartApeError::Read {
            getter: getter.function_name(),
            source: Box::new(source),
        })
    }

    /// Issue all twelve getters and assemble the record.
    ///
    /// Progress counts completed reads, so it advances the same way under
    /// either policy. No record is returned unless every read succeeds.
    pub async fn read_record(
        &self,
        contract_id: ContractId,
        progress: &ProgressReporter<'_>,
    ) -> Result<ApeRecord> {
        let total = GETTERS.len();
        let mut values = HashMap::with_capacity(total);
        progress.step(Stage::Read, 0, total, format!("Reading contract {}.", contract_id));

        match self.policy {
            ReadPolicy::Sequential => {
                for getter in GETTERS {
                    let value = self.read_value(contract_id, getter).await?;
                    values.insert(getter, value);
                    report_read(progress, getter, values.len(), total);
                }
            }
            ReadPolicy::Concurrent => {
                let mut reads = stream::iter(GETTERS)
                    .map(|getter| async move { (getter, self.read_value(contract_id, getter).await) })
                    .buffer_unordered(self.concurrency);
                while let Some((getter, value)) = reads.next().await {
                    values.insert(getter, value?);
                    report_read(progress, getter, values.len(), total);
                }
            }
        }

        let record = assemble(values)?;
        info!("read record {} from contract {}", record.id, contract_id);
        Ok(record)
    }
}

fn report_read(progress: &ProgressReporter<'_>, getter: Getter, done: usize, total: usize) {
    progress.step(
        Stage::Read,
        done,
        total,
        format!("Read {} ({} of {}).", getter.function_name(), done, total),
    );
}

struct Values(HashMap<Getter, GetterValue>);

impl Values {
    fn take(&mut self, getter: Getter) -> Result<GetterValue> {
        self.0.remove(&getter).ok_or_else(|| SmartApeError::Read {
            getter: getter.function_name(),
            source: Box::new(SmartApeError::Transport(TransportError::Malformed(
                "no value read".to_string(),
            ))),
        })
    }

    fn mismatch(getter: Getter, value: GetterValue) -> SmartApeError {
        SmartApeError::Read {
            getter: getter.function_name(),
            source: Box::new(SmartApeError::Transport(TransportError::Malformed(format!(
                "unexpected value {:?}",
                value
            )))),
        }
    }

    fn text(&mut self, getter: Getter) -> Result<String> {
        match self.take(getter)? {
            GetterValue::Text(s) => Ok(s),
            other => Err(Self::mismatch(getter, other)),
        }
    }

    fn int8(&mut self, getter: Getter) -> Result<i8> {
        match self.take(getter)? {
            GetterValue::Int8(v) => Ok(v),
            other => Err(Self::mismatch(getter, other)),
        }
    }

    fn int32(&mut self, getter: Getter) -> Result<i32> {
        match self.take(getter)? {
            GetterValue::Int32(v) => Ok(v),
            other => Err(Self::mismatch(getter, other)),
        }
    }

    fn int256(&mut self, getter: Getter) -> Result<i128> {
        match self.take(getter)? {
            GetterValue::Int256(v) => Ok(v),
            other => Err(Self::mismatch(getter, other)),
        }
    }

    fn address(&mut self, getter: Getter) -> Result<H160> {
        match self.take(getter)? {
            GetterValue::Address(a) => Ok(a),
            other => Err(Self::mismatch(getter, other)),
        }
    }
}

fn assemble(values: HashMap<Getter, GetterValue>) -> Result<ApeRecord> {
    let mut v = Values(values);
    let reason_code = v.int8(Getter::Reason)?;
    let other_reason = v.text(Getter::OtherReason)?;

    Ok(ApeRecord {
        id: v.text(Getter::ApeId)?,
        status: ApeStatus::from_code(v.int8(Getter::Status)?),
        expiration_ms: v.int256(Getter::ExpirationDate)?,
        latitude: v.int256(Getter::Latitude)?,
        longitude: v.int256(Getter::Longitude)?,
        address: v.text(Getter::Address)?,
        year_of_construction: v.int32(Getter::YearOfConstruction)?,
        previous_document: v.address(Getter::PreviousDocument)?,
        reason_code,
        reason: Reason::from_code(reason_code, &other_reason),
        document_hash: v.text(Getter::DocumentHash)?,
        hash_algorithm: v.text(Getter::HashAlgorithm)?,
    })
}
