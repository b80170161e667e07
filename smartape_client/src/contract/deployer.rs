use crate::abi::ContractFunctionParameters;
use crate::error::{Result, SmartApeError};
use crate::ledger::{ContractCreateTransaction, ContractId, FileId, Hbar, LedgerClient};
use log::info;

/// Instantiates the SmartAPE contract from a staged bytecode file
pub struct ContractDeployer<'a> {
    ledger: &'a dyn LedgerClient,
    max_fee: Hbar,
}

impl<'a> ContractDeployer<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, max_fee: Hbar) -> Self {
        Self { ledger, max_fee }
    }

    /// Any failure here surfaces as [`SmartApeError::Deployment`]
    pub async fn deploy(
        &self,
        bytecode_file_id: FileId,
        constructor_parameters: &ContractFunctionParameters,
        gas: u64,
    ) -> Result<ContractId> {
        let tx = ContractCreateTransaction {
            bytecode_file_id,
            constructor_parameters: constructor_parameters.to_bytes(),
            gas,
            max_transaction_fee: self.max_fee,
        };

        let receipt = self
            .ledger
            .create_contract(&tx)
            .await
            .and_then(|r| r.ensure_success("ContractCreate"))
            .map_err(|e| SmartApeError::Deployment(e.to_string()))?;
        let contract_id = receipt.contract_id.ok_or_else(|| {
            SmartApeError::Deployment(format!(
                "receipt for {} carries no contract id",
                receipt.transaction_id
            ))
        })?;

        info!("deployed contract {} from {}", contract_id, bytecode_file_id);
        Ok(contract_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::{LedgerOperation, MIN_CREATE_GAS};
    use crate::ledger::{EntityId, FileCreateTransaction, MemoryLedger};

    async fn staged_file(ledger: &MemoryLedger) -> FileId {
        let tx = FileCreateTransaction {
            contents: b"6080".to_vec(),
            keys: vec![],
            max_transaction_fee: Hbar::from_hbars(2),
        };
        ledger.create_file(&tx).await.unwrap().file_id.unwrap()
    }

    fn params() -> ContractFunctionParameters {
        ContractFunctionParameters::new()
            .add_string("1")
            .add_uint256(4_102_444_800_000u64)
            .add_uint256(0u64)
            .add_uint256(0u64)
            .add_string("Via Roma 1")
            .add_uint32(1990)
            .add_uint8(0)
            .add_string("")
            .add_string("abc")
            .add_string("SHA-256")
    }

    #[tokio::test]
    async fn test_deploy_returns_contract_id() {
        let ledger = MemoryLedger::new();
        let file_id = staged_file(&ledger).await;
        let deployer = ContractDeployer::new(&ledger, Hbar::from_hbars(1000));

        let contract_id = deployer.deploy(file_id, &params(), 3_000_000).await.unwrap();
        let state = ledger.contract_state(&contract_id).unwrap();
        assert_eq!(state.id, "1");
        assert_eq!(state.address, "Via Roma 1");
        assert_eq!(state.status, 0);
    }

    #[tokio::test]
    async fn test_low_gas_is_a_deployment_error() {
        let ledger = MemoryLedger::new();
        let file_id = staged_file(&ledger).await;
        let deployer = ContractDeployer::new(&ledger, Hbar::from_hbars(1000));

        let err = deployer
            .deploy(file_id, &params(), MIN_CREATE_GAS - 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartApeError::Deployment(ref m) if m.contains("INSUFFICIENT_GAS")));
    }

    #[tokio::test]
    async fn test_unknown_file_is_a_deployment_error() {
        let ledger = MemoryLedger::new();
        let deployer = ContractDeployer::new(&ledger, Hbar::from_hbars(1000));
        let err = deployer
            .deploy(FileId(EntityId::new(0, 0, 5)), &params(), 3_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartApeError::Deployment(_)));
        assert_eq!(ledger.calls()[0].operation, LedgerOperation::ContractCreate);
    }
}
