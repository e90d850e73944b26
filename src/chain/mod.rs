//! Chain identifiers, transaction hashes and the chain registry
//!
//! This module provides:
//! - `ChainId`, the opaque network identifier used as status query key
//! - `TransactionHash`, a validated source/target transaction identifier
//! - `ChainRegistry`, the explicit id <-> name mapping loaded from configuration

pub mod registry;

pub use registry::{ChainInfo, ChainRegistry};

use crate::error::InvalidTransactionHash;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a blockchain network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// Hash of a submitted transaction.
///
/// Treated as opaque apart from normalisation: `0x`-prefixed hex hashes are
/// lower-cased so the same transaction always maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionHash(String);

impl TransactionHash {
    /// Parse and normalise a transaction hash
    pub fn parse(input: &str) -> Result<Self, InvalidTransactionHash> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(InvalidTransactionHash(input.to_string()));
        }

        let hex_digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"));

        match hex_digits {
            Some(digits) => {
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(InvalidTransactionHash(input.to_string()));
                }
                Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
            }
            None => Ok(Self(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TransactionHash {
    type Err = InvalidTransactionHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TransactionHash {
    type Error = InvalidTransactionHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransactionHash> for String {
    fn from(hash: TransactionHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_hashes_are_normalised() {
        let hash = TransactionHash::parse(" 0xABCDef12 ").unwrap();
        assert_eq!(hash.as_str(), "0xabcdef12");
        assert_eq!(hash, "0XabcDEF12".parse().unwrap());
    }

    #[test]
    fn test_non_hex_hashes_are_kept_verbatim() {
        let signature = "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";
        let hash = TransactionHash::parse(signature).unwrap();
        assert_eq!(hash.as_str(), signature);
    }

    #[test]
    fn test_invalid_hashes_are_rejected() {
        assert!(TransactionHash::parse("").is_err());
        assert!(TransactionHash::parse("   ").is_err());
        assert!(TransactionHash::parse("0x").is_err());
        assert!(TransactionHash::parse("0xzz").is_err());
        assert!(TransactionHash::parse("0xab cd").is_err());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let hash: TransactionHash = serde_json::from_str("\"0xABCD\"").unwrap();
        assert_eq!(hash.as_str(), "0xabcd");
        assert!(serde_json::from_str::<TransactionHash>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&ChainId(6)).unwrap(), "6");
    }
}
