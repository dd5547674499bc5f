use std::fmt::Write as _;

use rand::RngCore;
use serde::{Deserialize, Serialize};

const ADDRESS_BYTES: usize = 20;
const HASH_BYTES: usize = 32;

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut out = String::with_capacity(2 + N * 2);
    out.push_str("0x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn is_prefixed_hex(s: &str, digits: usize) -> bool {
    s.len() == digits + 2
        && s.starts_with("0x")
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Error returned when a string is not a well-formed wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWalletAddress(pub String);

impl std::fmt::Display for InvalidWalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid wallet address: {}", self.0)
    }
}

impl std::error::Error for InvalidWalletAddress {}

/// Public wallet address of a user: `0x` followed by 40 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Generates a fresh random address.
    pub fn generate() -> Self {
        Self(random_hex::<ADDRESS_BYTES>())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for WalletAddress {
    type Err = InvalidWalletAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_prefixed_hex(s, ADDRESS_BYTES * 2) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(InvalidWalletAddress(s.to_string()))
        }
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = InvalidWalletAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

/// Hash grouping the ledger entries written by one commit.
///
/// Not a cryptographic digest: the ledger is a flat table and the hash is a
/// random correlation token rendered in the familiar `0x…` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn generate() -> Self {
        Self(random_hex::<HASH_BYTES>())
    }

    /// Wraps a hash read back from storage.
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a ledger entry.
///
/// Money enters the system from the `Bank` (top-ups) and leaves to it
/// (withdrawals); tickets are minted by the `System`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Party {
    System,
    Bank,
    Wallet(WalletAddress),
}

impl Party {
    /// Returns the wallet address if this party is a user wallet.
    pub fn wallet(&self) -> Option<&WalletAddress> {
        match self {
            Party::Wallet(address) => Some(address),
            Party::System | Party::Bank => None,
        }
    }

    pub fn is_wallet(&self, address: &WalletAddress) -> bool {
        self.wallet() == Some(address)
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Party::System => f.write_str("SYSTEM"),
            Party::Bank => f.write_str("BANK"),
            Party::Wallet(address) => write!(f, "{address}"),
        }
    }
}

impl std::str::FromStr for Party {
    type Err = InvalidWalletAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(Party::System),
            "BANK" => Ok(Party::Bank),
            other => other.parse().map(Party::Wallet),
        }
    }
}

impl TryFrom<String> for Party {
    type Error = InvalidWalletAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Party> for String {
    fn from(party: Party) -> Self {
        party.to_string()
    }
}

impl From<WalletAddress> for Party {
    fn from(address: WalletAddress) -> Self {
        Party::Wallet(address)
    }
}
