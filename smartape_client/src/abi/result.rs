use super::{decode, word_to_signed, ParamType, Token};
use crate::error::AbiError;
use crate::ledger::{hex_bytes, ContractId};
use ethers::types::H160;
use serde::{Deserialize, Serialize};

/// Return data of a contract call, taken from its transaction record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFunctionResult {
    pub contract_id: Option<ContractId>,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    pub gas_used: u64,
    pub error_message: Option<String>,
}

impl ContractFunctionResult {
    pub fn new(contract_id: ContractId, bytes: Vec<u8>) -> Self {
        Self {
            contract_id: Some(contract_id),
            bytes,
            gas_used: 0,
            error_message: None,
        }
    }

    /// Fails if the call reverted
    pub fn ensure_success(&self) -> Result<(), AbiError> {
        match &self.error_message {
            Some(msg) if !msg.is_empty() => Err(AbiError::Reverted(msg.clone())),
            _ => Ok(()),
        }
    }

    /// Decode the value in head slot `index`; earlier slots are skipped
    /// as raw words whatever their type
    fn value_at(&self, index: usize, kind: ParamType) -> Result<Token, AbiError> {
        let mut types = vec![ParamType::FixedBytes(32); index];
        types.push(kind);
        decode(&types, &self.bytes)?
            .pop()
            .ok_or_else(|| AbiError::Decode(format!("no value at index {}", index)))
    }

    pub fn get_string(&self, index: usize) -> Result<String, AbiError> {
        self.value_at(index, ParamType::String)?
            .into_string()
            .ok_or_else(|| AbiError::Decode("expected a string".to_string()))
    }

    pub fn get_int8(&self, index: usize) -> Result<i8, AbiError> {
        i8::try_from(self.get_int256(index)?).map_err(|_| AbiError::Overflow("int8"))
    }

    pub fn get_int32(&self, index: usize) -> Result<i32, AbiError> {
        i32::try_from(self.get_int256(index)?).map_err(|_| AbiError::Overflow("int32"))
    }

    /// Signed 256-bit value, narrowed to `i128`
    pub fn get_int256(&self, index: usize) -> Result<i128, AbiError> {
        let word = self
            .value_at(index, ParamType::Int(256))?
            .into_int()
            .ok_or_else(|| AbiError::Decode("expected an integer".to_string()))?;
        word_to_signed(word)
    }

    pub fn get_address(&self, index: usize) -> Result<H160, AbiError> {
        self.value_at(index, ParamType::Address)?
            .into_address()
            .ok_or_else(|| AbiError::Decode("expected an address".to_string()))
    }
}
