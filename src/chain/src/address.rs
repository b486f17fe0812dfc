//! EVM account and contract addresses

use std::fmt;
use std::str::FromStr;

use crate::error::{ChainError, Result};

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte EVM address
///
/// Parsing accepts exactly `^0x[0-9a-fA-F]{40}$`. Formatting is always
/// lowercase, so two addresses that differ only in checksum casing compare
/// equal and render identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address, used on-chain for burned or unminted tokens
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Wrap raw bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse and validate a `0x`-prefixed hex address
    pub fn parse(input: &str) -> Result<Self> {
        let hex_part = input
            .strip_prefix("0x")
            .ok_or_else(|| ChainError::Validation(format!("address {input:?} must start with 0x")))?;

        if hex_part.len() != ADDRESS_LEN * 2 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChainError::Validation(format!(
                "address {input:?} must be 0x followed by 40 hex characters"
            )));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|e| ChainError::Validation(format!("address {input:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Whether this is [`Address::ZERO`]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Raw 20 bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_case_normalizes() {
        let upper = Address::parse("0xA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48").unwrap();
        let lower = Address::parse("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap();

        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "0x",
            "a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb4",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb488",
            "0xg0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "0Xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
        ] {
            assert!(
                matches!(Address::parse(bad), Err(ChainError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Address::ZERO);
        assert!(!Address::from_bytes([1u8; 20]).is_zero());
    }
}
