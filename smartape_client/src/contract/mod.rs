//! SmartAPE contract interface and the components that drive it
//!
//! Upload, deploy, link and read-back each live in their own module; this
//! module holds the contract's function table.

pub mod deployer;
pub mod linker;
pub mod reader;
pub mod uploader;

pub use deployer::ContractDeployer;
pub use linker::ContractLinker;
pub use reader::{ContractReader, ReadPolicy};
pub use uploader::FileUploader;

use crate::abi::ParamType;

/// Links a deployed contract to the certificate it supersedes
pub const SET_PREVIOUS_DOCUMENT: &str = "setPreviousDocument";

/// Constructor argument types, in declaration order
pub const CONSTRUCTOR_TYPES: [ParamType; 10] = [
    ParamType::String,    // id
    ParamType::Uint(256), // expirationDate
    ParamType::Uint(256), // latitude
    ParamType::Uint(256), // longitude
    ParamType::String,    // address
    ParamType::Uint(32),  // yearOfConstruction
    ParamType::Uint(8),   // reason
    ParamType::String,    // otherReason
    ParamType::String,    // documentHash
    ParamType::String,    // hashAlgorithm
];

/// Read-only getters exposed by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Getter {
    ApeId,
    Status,
    ExpirationDate,
    Latitude,
    Longitude,
    Address,
    YearOfConstruction,
    PreviousDocument,
    Reason,
    OtherReason,
    DocumentHash,
    HashAlgorithm,
}

/// Getters in the order they are read for progress reporting
pub const GETTERS: [Getter; 12] = [
    Getter::ApeId,
    Getter::Status,
    Getter::ExpirationDate,
    Getter::Latitude,
    Getter::Longitude,
    Getter::Address,
    Getter::YearOfConstruction,
    Getter::PreviousDocument,
    Getter::Reason,
    Getter::OtherReason,
    Getter::DocumentHash,
    Getter::HashAlgorithm,
];

impl Getter {
    pub fn function_name(&self) -> &'static str {
        match self {
            Getter::ApeId => "getApeId",
            Getter::Status => "getStatus",
            Getter::ExpirationDate => "getExpirationDate",
            Getter::Latitude => "getLatitude",
            Getter::Longitude => "getLongitude",
            Getter::Address => "getAddress",
            Getter::YearOfConstruction => "getYearOfConstruction",
            Getter::PreviousDocument => "getPreviousDocument",
            Getter::Reason => "getReason",
            Getter::OtherReason => "getOtherReason",
            Getter::DocumentHash => "getDocumentHash",
            Getter::HashAlgorithm => "getHashAlgorithm",
        }
    }

    pub fn return_type(&self) -> ParamType {
        match self {
            Getter::ApeId
            | Getter::Address
            | Getter::OtherReason
            | Getter::DocumentHash
            | Getter::HashAlgorithm => ParamType::String,
            Getter::Status | Getter::Reason => ParamType::Int(8),
            Getter::YearOfConstruction => ParamType::Int(32),
            Getter::ExpirationDate | Getter::Latitude | Getter::Longitude => ParamType::Int(256),
            Getter::PreviousDocument => ParamType::Address,
        }
    }

    /// Canonical signature; getters take no arguments
    pub fn signature(&self) -> String {
        format!("{}()", self.function_name())
    }

    pub fn from_selector(selector: [u8; 4]) -> Option<Getter> {
        GETTERS
            .iter()
            .copied()
            .find(|g| crate::abi::selector(&g.signature()) == selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getter_selectors_are_distinct() {
        let mut selectors: Vec<[u8; 4]> = GETTERS
            .iter()
            .map(|g| crate::abi::selector(&g.signature()))
            .collect();
        selectors.sort();
        selectors.dedup();
        assert_eq!(selectors.len(), GETTERS.len());
    }

    #[test]
    fn test_from_selector_finds_getter() {
        for getter in GETTERS {
            let sel = crate::abi::selector(&getter.signature());
            assert_eq!(Getter::from_selector(sel), Some(getter));
        }
        assert_eq!(Getter::from_selector([0, 0, 0, 0]), None);
    }
}
