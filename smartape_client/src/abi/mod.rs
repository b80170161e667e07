//! Contract ABI codec
//!
//! Typed argument builder and output decoding for the SmartAPE contract,
//! layered over `ethers::abi`. Only the types the contract uses are exposed
//! through the builder: `string`, `uint8`, `uint32`, `uint256`, `int256` and
//! `address`.

pub mod result;

pub use ethers::abi::{ParamType, Token};
pub use result::ContractFunctionResult;

use crate::error::AbiError;
use ethers::abi;
use ethers::types::{H160, I256, U256};

impl From<abi::Error> for AbiError {
    fn from(err: abi::Error) -> Self {
        AbiError::Decode(err.to_string())
    }
}

/// Ordered, typed argument list for a constructor or function call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractFunctionParameters {
    params: Vec<(ParamType, Token)>,
}

impl ContractFunctionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, kind: ParamType, token: Token) -> Self {
        self.params.push((kind, token));
        self
    }

    pub fn add_string(self, value: impl Into<String>) -> Self {
        self.push(ParamType::String, Token::String(value.into()))
    }

    pub fn add_uint8(self, value: u8) -> Self {
        self.push(ParamType::Uint(8), Token::Uint(U256::from(value)))
    }

    pub fn add_uint32(self, value: u32) -> Self {
        self.push(ParamType::Uint(32), Token::Uint(U256::from(value)))
    }

    pub fn add_uint256(self, value: impl Into<U256>) -> Self {
        self.push(ParamType::Uint(256), Token::Uint(value.into()))
    }

    pub fn add_int256(self, value: i128) -> Self {
        self.push(ParamType::Int(256), Token::Int(signed_to_word(value)))
    }

    /// Address given as 40 hex digits, with or without `0x`
    pub fn add_address(self, value: &str) -> Result<Self, AbiError> {
        let address = parse_address(value)?;
        Ok(self.push(ParamType::Address, Token::Address(address)))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn types(&self) -> Vec<ParamType> {
        self.params.iter().map(|(t, _)| t.clone()).collect()
    }

    fn tokens(&self) -> Vec<Token> {
        self.params.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Canonical signature, e.g. `setPreviousDocument(address)`
    pub fn signature(&self, function_name: &str) -> String {
        let types: Vec<String> = self.params.iter().map(|(t, _)| t.to_string()).collect();
        format!("{}({})", function_name, types.join(","))
    }

    /// Argument encoding without a selector, as used for constructors
    pub fn to_bytes(&self) -> Vec<u8> {
        abi::encode(&self.tokens())
    }

    /// Selector followed by the argument encoding
    pub fn to_call_bytes(&self, function_name: &str) -> Vec<u8> {
        let mut out = abi::short_signature(function_name, &self.types()).to_vec();
        out.extend(self.to_bytes());
        out
    }
}

/// First four bytes of the Keccak-256 hash of a canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    ethers::utils::id(signature)
}

/// Parse `0x`-prefixed or bare 40-digit hex into an address
pub fn parse_address(value: &str) -> Result<H160, AbiError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.len() != 40 {
        return Err(AbiError::InvalidAddress(value.to_string()));
    }
    let bytes = hex::decode(digits).map_err(|_| AbiError::InvalidAddress(value.to_string()))?;
    Ok(H160::from_slice(&bytes))
}

/// Lowercase `0x`-prefixed 40-digit hex
pub fn format_address(address: &H160) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Two's complement word of a signed value
pub fn signed_to_word(value: i128) -> U256 {
    I256::from(value).into_raw()
}

pub fn word_to_signed(word: U256) -> Result<i128, AbiError> {
    i128::try_from(I256::from_raw(word)).map_err(|_| AbiError::Overflow("i128"))
}

/// Decode an argument block (no selector) against the given types
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    Ok(abi::decode(types, data)?)
}

/// Encode return values the way a contract getter would
pub fn encode_return(tokens: &[Token]) -> Vec<u8> {
    abi::encode(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORD: usize = 32;

    #[test]
    fn test_selector_matches_known_values() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_signature_lists_types_in_order() {
        let params = ContractFunctionParameters::new()
            .add_string("a")
            .add_uint256(1u64)
            .add_uint32(2)
            .add_uint8(3)
            .add_int256(-4);
        assert_eq!(params.signature("f"), "f(string,uint256,uint32,uint8,int256)");
    }

    #[test]
    fn test_string_encoding_layout() {
        let bytes = ContractFunctionParameters::new()
            .add_uint8(7)
            .add_string("abc")
            .to_bytes();

        // head: uint8, offset; tail: length, padded data
        assert_eq!(bytes.len(), 4 * WORD);
        assert_eq!(bytes[WORD - 1], 7);
        assert_eq!(bytes[2 * WORD - 1], 0x40);
        assert_eq!(bytes[3 * WORD - 1], 3);
        assert_eq!(&bytes[3 * WORD..3 * WORD + 3], b"abc");
        assert!(bytes[3 * WORD + 3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_address_is_left_padded() {
        let bytes = ContractFunctionParameters::new()
            .add_address("0x0000000000000000000000000000000000000064")
            .unwrap()
            .to_bytes();
        assert_eq!(bytes.len(), WORD);
        assert!(bytes[..WORD - 1].iter().all(|b| *b == 0));
        assert_eq!(bytes[WORD - 1], 0x64);
    }

    #[test]
    fn test_add_address_rejects_non_address() {
        let err = ContractFunctionParameters::new().add_address("0.0.abc").unwrap_err();
        assert_eq!(err, AbiError::InvalidAddress("0.0.abc".to_string()));
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address(&format!("0x{}", "zz".repeat(20))).is_err());
    }

    #[test]
    fn test_call_bytes_start_with_selector() {
        let bytes = ContractFunctionParameters::new().to_call_bytes("getApeId");
        assert_eq!(bytes, selector("getApeId()").to_vec());

        let bytes = ContractFunctionParameters::new()
            .add_address("0x0000000000000000000000000000000000000064")
            .unwrap()
            .to_call_bytes("setPreviousDocument");
        assert_eq!(&bytes[..4], selector("setPreviousDocument(address)"));
        assert_eq!(bytes.len(), 4 + WORD);
    }

    #[test]
    fn test_signed_words() {
        assert_eq!(signed_to_word(-1), U256::MAX);
        assert_eq!(word_to_signed(U256::MAX).unwrap(), -1);
        assert_eq!(word_to_signed(signed_to_word(-4_000_000_000)).unwrap(), -4_000_000_000);
        assert_eq!(word_to_signed(signed_to_word(i128::MIN)).unwrap(), i128::MIN);
        assert!(word_to_signed(U256::from(u128::MAX)).is_err());
    }

    #[test]
    fn test_decode_constructor_block() {
        let params = ContractFunctionParameters::new()
            .add_string("42")
            .add_uint256(1_900_000_000_000u64)
            .add_string("Via Roma 1")
            .add_uint32(1998);
        let tokens = decode(&params.types(), &params.to_bytes()).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::String("42".to_string()),
                Token::Uint(U256::from(1_900_000_000_000u64)),
                Token::String("Via Roma 1".to_string()),
                Token::Uint(U256::from(1998u32)),
            ]
        );
    }

    #[test]
    fn test_decode_truncated_data_fails() {
        let err = decode(&[ParamType::Uint(256)], &[0u8; 16]).unwrap_err();
        assert!(matches!(err, AbiError::Decode(_)));
    }
}
