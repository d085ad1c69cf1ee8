//! The cryptographic plumbing used by the bridge.
//!
//! Signature primitives come from `k256`. This module only wires them up the way Ethereum does: Keccak-256 digests,
//! 65-byte `r || s || v` signatures, and addresses derived from the uncompressed public key. Dependents should not
//! care about the exact implementations.

use alloy::primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::types::{AccountId, EthAddress};

/// The length of an Ethereum signature: `r` (32) + `s` (32) + `v` (1).
pub const SIGNATURE_LENGTH: usize = 65;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("{0}")]
    Malformed(String),
    #[error("could not recover a public key: {0}")]
    Unrecoverable(String),
    #[error("signed by {recovered}, expected {expected}")]
    WrongSigner {
        expected: EthAddress,
        recovered: EthAddress,
    },
}

pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    B256::from_slice(&Keccak256::digest(data.as_ref()))
}

/// The digest a validator's Ethereum key signs to prove it controls that key: the Keccak-256 of the account bytes.
pub fn binding_digest(validator: &AccountId) -> B256 {
    keccak256(validator.as_bytes())
}

pub fn address_of(key: &VerifyingKey) -> EthAddress {
    // Remove the first byte before hashing - The first byte specifies the encoding tag.
    let bytes = key.to_encoded_point(false).as_bytes()[1..].to_owned();
    Address::from_slice(&Keccak256::digest(bytes)[12..32]).into()
}

/// Decodes a hex signature, with or without a `0x` prefix.
pub fn decode_signature_hex(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let digits = signature.strip_prefix("0x").unwrap_or(signature);
    hex::decode(digits)
        .map_err(|e| SignatureError::Malformed(format!("could not decode hex {signature:?}: {e}")))
}

/// Recovers the address that produced `signature` over the pre-hashed `digest`.
///
/// `v` may be given either as the raw recovery id (0 or 1) or in the legacy Ethereum form (27 or 28).
pub fn recover_address(digest: &B256, signature: &[u8]) -> Result<EthAddress, SignatureError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::Malformed(format!(
            "expected {SIGNATURE_LENGTH} bytes, got {}",
            signature.len()
        )));
    }
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;
    let v = match signature[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        v => return Err(SignatureError::Malformed(format!("invalid recovery id {v}"))),
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| SignatureError::Malformed(format!("invalid recovery id {v}")))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|e| SignatureError::Unrecoverable(e.to_string()))?;
    Ok(address_of(&key))
}

pub fn verify_signer(
    digest: &B256,
    signature: &[u8],
    expected: EthAddress,
) -> Result<(), SignatureError> {
    let recovered = recover_address(digest, signature)?;
    if recovered != expected {
        return Err(SignatureError::WrongSigner {
            expected,
            recovered,
        });
    }
    Ok(())
}

/// Signs a digest the way an Ethereum key would, producing `r || s || v` with `v` in `{27, 28}`.
///
/// The core never signs anything itself; this exists for relayers, tooling and tests.
pub fn sign_digest(
    key: &SigningKey,
    digest: &B256,
) -> Result<[u8; SIGNATURE_LENGTH], SignatureError> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| SignatureError::Unrecoverable(e.to_string()))?;
    let mut bytes = [0u8; SIGNATURE_LENGTH];
    bytes[..64].copy_from_slice(&signature.to_bytes());
    bytes[64] = recovery_id.to_byte() + 27;
    Ok(bytes)
}
