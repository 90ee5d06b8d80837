// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # RaSe Protocol: Core Library
//!
//! RaSe protects individual records against partial loss: the kind of event
//! where ransomware encrypts or destroys some of the stored fragments but
//! not all of them. Two independent mechanisms do the work:
//!
//! - the payload is erasure coded, so any `K` of its `N` shards rebuild it;
//! - the record key is split with Shamir's scheme, so any `threshold` of its
//!   shares rebuild it and fewer reveal nothing.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **field**: GF(2^8) log/antilog arithmetic.
//! - **digest**: BLAKE3 fingerprints for shards and keys.
//! - **erasure**: Vandermonde generator, encode, Gauss-Jordan reconstruct.
//! - **sharing**: prime-field Shamir split and Lagrange reconstruct.
//! - **persistence**: where records live (memory, sled).
//! - **journal**: append-only audit and change trails.
//! - **store**: the record store and the NORMAL / UNDER_ATTACK / RECOVERY
//!   state machine that decides when recovery is attempted.
//! - **config**: constants and the serde-loadable store configuration.
//!
//! ## Design Philosophy
//!
//! 1. Redundancy loss is an expected outcome, not a crash. It has its own
//!    error class and callers are expected to branch on it.
//! 2. Never trust a fragment you cannot verify. Shards carry digests; keys
//!    carry fingerprints.
//! 3. Fields and layouts are checked up front. A prime that does not exceed
//!    the secret, or an erasure layout with an unrecoverable subset, is
//!    refused before anything is written.

pub mod config;
pub mod digest;
pub mod erasure;
pub mod field;
pub mod journal;
pub mod persistence;
pub mod sharing;
pub mod store;

pub use store::{ErrorClass, RecordStore, StoreError, SystemState};
