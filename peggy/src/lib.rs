pub mod address;
pub mod attestation;
pub mod batch;
pub mod capabilities;
pub mod cfg;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod keys;
pub mod message;
pub mod pool;
pub mod query;
pub mod replay;
pub mod store;
pub mod types;
pub mod valset;
