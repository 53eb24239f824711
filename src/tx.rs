//! Transaction assembly and signing.
//!
//! [`builder::TxBuilder`] accumulates the proto transaction halves,
//! [`sign_mode`] produces the bytes each signer commits to, and
//! [`factory::Factory`] drives one complete build from validated messages
//! to broadcastable `TxRaw` bytes.

pub mod builder;
pub mod factory;
pub mod sign_mode;
pub mod signature;
pub mod types;
