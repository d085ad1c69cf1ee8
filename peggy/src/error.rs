use crate::{
    crypto::SignatureError,
    types::{AccountId, Coin},
};

/// An error from applying a bridge message.
///
/// Errors come in two tiers. Stateless errors are found by [crate::message::Msg::validate_basic] before any state is
/// read. Stateful errors are found while a transition runs; the transition is then discarded as a whole. The numeric
/// codes are stable and are what a client should match on.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeggyError {
    #[error("invalid signer: {0}")]
    EmptySigner(&'static str),
    #[error("not a valid Ethereum address: {0:?}")]
    InvalidEthAddress(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("signature does not prove control of {address}: {reason}")]
    InvalidAddressProof { address: String, reason: String },
    #[error("invalid signature from {validator}: {reason}")]
    InvalidSignature { validator: AccountId, reason: String },
    #[error("validator {0} has no bound Ethereum address")]
    UnboundValidator(AccountId),
    #[error("fee and amount must share a denomination: {amount} vs {fee}")]
    DenomMismatch { amount: String, fee: String },
    #[error("invalid denomination: {0:?}")]
    InvalidDenom(String),
    #[error("nonce must be greater than zero")]
    InvalidNonce,
    #[error("{0} not found")]
    NotFound(String),
    #[error("duplicate confirmation from {validator} for {key}")]
    DuplicateConfirmation { key: String, validator: AccountId },
    #[error("duplicate claim from {validator} for batch {nonce}")]
    DuplicateClaim { nonce: u64, validator: AccountId },
    #[error("no pending transfers for {0}")]
    EmptyBatch(String),
    #[error("batch {nonce} for {denom} is still open")]
    BatchAlreadyOpen { denom: String, nonce: u64 },
    #[error("insufficient funds: {account} cannot pay {required}")]
    InsufficientFunds { account: AccountId, required: Coin },
    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("invalid module parameter: {0}")]
    InvalidParams(&'static str),
}

impl PeggyError {
    /// Whether this error was raised before any state was touched.
    pub fn is_stateless(&self) -> bool {
        matches!(
            self,
            PeggyError::EmptySigner(_)
                | PeggyError::InvalidEthAddress(_)
                | PeggyError::MalformedSignature(_)
                | PeggyError::InvalidAddressProof { .. }
                | PeggyError::DenomMismatch { .. }
                | PeggyError::InvalidDenom(_)
                | PeggyError::InvalidNonce
                | PeggyError::Codec(_)
        )
    }

    pub fn code(&self) -> u32 {
        match self {
            PeggyError::EmptySigner(_) => 2,
            PeggyError::InvalidEthAddress(_) => 3,
            PeggyError::MalformedSignature(_) => 4,
            PeggyError::InvalidAddressProof { .. } => 5,
            PeggyError::InvalidSignature { .. } => 6,
            PeggyError::UnboundValidator(_) => 7,
            PeggyError::DenomMismatch { .. } => 8,
            PeggyError::InvalidDenom(_) => 9,
            PeggyError::InvalidNonce => 10,
            PeggyError::NotFound(_) => 11,
            PeggyError::DuplicateConfirmation { .. } => 12,
            PeggyError::DuplicateClaim { .. } => 13,
            PeggyError::EmptyBatch(_) => 14,
            PeggyError::BatchAlreadyOpen { .. } => 15,
            PeggyError::InsufficientFunds { .. } => 16,
            PeggyError::Overflow(_) => 17,
            PeggyError::Codec(_) => 18,
            PeggyError::Store(_) => 19,
            PeggyError::InvalidParams(_) => 20,
        }
    }

    /// Any failure to verify a signature that decoded as hex, including a bad length or recovery id.
    pub(crate) fn address_proof(address: impl ToString, err: SignatureError) -> Self {
        PeggyError::InvalidAddressProof {
            address: address.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn confirmation(validator: &AccountId, err: SignatureError) -> Self {
        PeggyError::InvalidSignature {
            validator: validator.clone(),
            reason: err.to_string(),
        }
    }
}

impl From<bincode::error::EncodeError> for PeggyError {
    fn from(error: bincode::error::EncodeError) -> Self {
        PeggyError::Codec(error.to_string())
    }
}

impl From<bincode::error::DecodeError> for PeggyError {
    fn from(error: bincode::error::DecodeError) -> Self {
        PeggyError::Codec(error.to_string())
    }
}

pub type Result<T, E = PeggyError> = std::result::Result<T, E>;
