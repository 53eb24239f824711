#![forbid(unsafe_code)]
#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]

//! Client SDK for the Veridian blockchain.
//!
//! The crate turns lists of messages into signed, wire-ready transactions
//! and drives them to a full node over gRPC: per-sender account state
//! (account number, sequence) is cached and locked so concurrent callers
//! never reuse a sequence, oversized transactions shrink the batch they
//! came from, and failed broadcasts invalidate the cache and retry within
//! a bounded budget.
//!
//! [`client::ChainClient`] is the entry point; it combines a [`keyring`],
//! an account [`cache`], a sharded sender [`locker`] and a [`transport`].

pub mod account;
pub mod address;
pub mod bank;
pub mod cache;
pub mod client;
pub mod coin;
pub mod config;
pub mod error;
pub mod keyring;
pub mod locker;
pub mod msg;
pub mod transport;
pub mod tx;
