use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{PeggyError, Result};

/// An opaque ledger account identifier. Validators are identified by their account.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AccountId(#[serde(with = "hex")] Vec<u8>);

impl AccountId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        AccountId(bytes.into())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s)
            .map(AccountId)
            .map_err(|e| PeggyError::Codec(format!("account {s:?}: {e}")))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

/// A 20-byte Ethereum address.
///
/// It is always serialized in its textual `0x`-prefixed form, so encoded state does not depend on how the underlying
/// byte array chooses to serialize itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EthAddress(Address);

impl EthAddress {
    pub const ZERO: EthAddress = EthAddress(Address::ZERO);

    /// Parses an address, requiring exactly `^0x[0-9a-fA-F]{40}$`. Mixed case is accepted without checking the
    /// EIP-55 checksum.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || PeggyError::InvalidEthAddress(s.to_owned());
        let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
        if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        Ok(EthAddress(Address::from_slice(&bytes)))
    }

    pub fn into_inner(self) -> Address {
        self.0
    }
}

impl From<Address> for EthAddress {
    fn from(address: Address) -> Self {
        EthAddress(address)
    }
}

impl FromStr for EthAddress {
    type Err = PeggyError;

    fn from_str(s: &str) -> Result<Self> {
        EthAddress::parse(s)
    }
}

impl Display for EthAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({self})")
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EthAddress::parse(&s)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"an Ethereum address"))
    }
}

/// A single-denomination amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Coin {
            denom: denom.into(),
            amount,
        }
    }

    pub fn checked_add(&self, other: &Coin) -> Result<Coin> {
        if self.denom != other.denom {
            return Err(PeggyError::DenomMismatch {
                amount: self.to_string(),
                fee: other.to_string(),
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(PeggyError::Overflow("coin amount"))?;
        Ok(Coin::new(self.denom.clone(), amount))
    }
}

impl Display for Coin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Checks a denomination is well formed: 2 to 128 characters, starting with a letter, continuing with letters, digits
/// or one of `/:._-`.
pub fn validate_denom(denom: &str) -> Result<()> {
    let invalid = || PeggyError::InvalidDenom(denom.to_owned());
    if !(2..=128).contains(&denom.len()) {
        return Err(invalid());
    }
    let mut bytes = denom.bytes();
    if !bytes.next().is_some_and(|b| b.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    if !bytes.all(|b| b.is_ascii_alphanumeric() || b"/:._-".contains(&b)) {
        return Err(invalid());
    }
    Ok(())
}

/// The ledger context a message is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ctx {
    pub height: u64,
}

impl Ctx {
    pub fn at(height: u64) -> Self {
        Ctx { height }
    }
}
