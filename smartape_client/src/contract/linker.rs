use super::SET_PREVIOUS_DOCUMENT;
use crate::abi::ContractFunctionParameters;
use crate::error::{Result, SmartApeError};
use crate::ledger::{ContractExecuteTransaction, ContractId, EntityId, LedgerClient};
use ethers::types::H160;
use log::{debug, info};

const ENTITY_PREFIX: &str = "0.0.";

/// Convert a predecessor reference into address form.
///
/// `0.0.<decimal>` becomes the decimal in hex, zero-padded to 40 digits and
/// prefixed with `0x`. Anything else is returned unchanged.
pub fn previous_to_address(previous: &str) -> String {
    match previous.strip_prefix(ENTITY_PREFIX) {
        Some(num) if !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()) => {
            num.parse::<u64>()
                .ok()
                .and_then(|num| EntityId::new(0, 0, num).to_solidity_address().ok())
                .unwrap_or_else(|| previous.to_string())
        }
        _ => previous.to_string(),
    }
}

/// The entity a long-zero address points at; `None` for ordinary EVM
/// addresses and the zero address
pub fn address_to_entity_id(address: &H160) -> Option<EntityId> {
    if address.is_zero() || address.as_bytes()[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(EntityId::from_solidity_address(address.as_fixed_bytes()))
}

/// Points a new contract at the certificate it supersedes
pub struct ContractLinker<'a> {
    ledger: &'a dyn LedgerClient,
    gas: u64,
}

impl<'a> ContractLinker<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, gas: u64) -> Self {
        Self { ledger, gas }
    }

    /// Call `setPreviousDocument(address)` on `contract_id`.
    ///
    /// The address is encoded before anything is submitted, so a malformed
    /// `previous` costs no transaction.
    pub async fn link(&self, contract_id: ContractId, previous: &str) -> Result<()> {
        let address = previous_to_address(previous);
        debug!("linking {} to predecessor {} ({})", contract_id, previous, address);
        let params = ContractFunctionParameters::new().add_address(&address)?;

        let tx = ContractExecuteTransaction {
            contract_id,
            gas: self.gas,
            function_parameters: params.to_call_bytes(SET_PREVIOUS_DOCUMENT),
        };
        self.ledger
            .execute_contract(&tx)
            .await
            .and_then(|r| r.ensure_success(SET_PREVIOUS_DOCUMENT))
            .map_err(|source| SmartApeError::Link {
                previous: previous.to_string(),
                source,
            })?;

        info!("linked {} to predecessor {}", contract_id, previous);
        Ok(())
    }
}
