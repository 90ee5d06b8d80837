//! # Protected Record Store
//!
//! Ties the two engines together per record id. Storing a payload encodes
//! it into `N` shards, draws a fresh 256-bit key, splits the key into
//! threshold shares and persists both halves as one [`ProtectedRecord`].
//! Retrieving checks that enough intact shards and key-shares survive,
//! rebuilds the payload and the key, and refuses access if the key does not
//! match its fingerprint.
//!
//! ## Architecture
//!
//! ```text
//! state.rs   NORMAL / UNDER_ATTACK / RECOVERY and the attack duty cycle
//! record.rs  ProtectedRecord and the receipts/reports handed to callers
//! error.rs   StoreError and its ErrorClass
//! engine.rs  RecordStore: the operations, the record table, write gates
//! ```
//!
//! ## Failure Paths
//!
//! Two independent things can make an operation fail while the system is
//! under attack, and they are reported differently:
//!
//! 1. **Redundancy loss.** Too few fragments survive. The error class is
//!    [`ErrorClass::InsufficientRedundancy`]; nothing is wrong with the
//!    request, and a repair (or returning fragments) fixes it.
//! 2. **Injected outage.** The duty cycle refuses every n-th guarded
//!    operation with [`StoreError::SimulatedOutage`], regardless of how
//!    healthy the record is.

pub mod engine;
pub mod error;
pub mod record;
pub mod state;

pub use engine::{RecordStore, MAX_RECORD_ID_LEN};
pub use error::{ErrorClass, StoreError, StoreResult};
pub use record::{CorruptionReport, ProtectedRecord, RecordHealth, RepairReport, StoreReceipt};
pub use state::{ParseStateError, StateMachine, SystemState};
