//! The record store.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use num_bigint::BigUint;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

use super::error::{StoreError, StoreResult};
use super::record::{CorruptionReport, ProtectedRecord, RecordHealth, RepairReport, StoreReceipt};
use super::state::{StateMachine, SystemState};
use crate::config::{StoreConfig, KEY_BITS, SYSTEM_USER};
use crate::digest::{digests_match, key_fingerprint, short_hex};
use crate::erasure::{ErasureCoder, Shard};
use crate::journal::{open_journals, Action, AuditEntry, AuditSink, ChangeEntry, ChangeSink};
use crate::persistence::{open_backend, RecordBackend};
use crate::sharing::{self, generate_key, SharingConfig};

/// Longest accepted record id, in bytes.
pub const MAX_RECORD_ID_LEN: usize = 256;

/// Erasure-coded, threshold-keyed record storage.
///
/// # Concurrency
///
/// The record table maps ids to immutable `Arc<ProtectedRecord>` snapshots.
/// Readers clone the `Arc` and decode outside any lock, so a reader sees
/// either the old record or the new one, never a mix. Writers of the same id
/// queue on that id's write gate; writers of different ids never contend.
/// Table locks are released before the backend or a journal is called.
pub struct RecordStore {
    coder: Arc<ErasureCoder>,
    coders: DashMap<(usize, usize), Arc<ErasureCoder>>,
    sharing: SharingConfig,
    records: DashMap<String, Arc<ProtectedRecord>>,
    write_gates: DashMap<String, Arc<Mutex<()>>>,
    state: RwLock<StateMachine>,
    backend: Arc<dyn RecordBackend>,
    audit: Arc<dyn AuditSink>,
    changes: Arc<dyn ChangeSink>,
}

impl RecordStore {
    /// Build a store with the backend and journals named in `config`.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let backend = open_backend(&config.backend)?;
        let (audit, changes) = open_journals(&config.journal)?;
        Self::with_collaborators(config, backend, audit, changes)
    }

    /// Build a store around caller-supplied collaborators. The backend and
    /// journal sections of `config` are ignored.
    pub fn with_collaborators(
        config: &StoreConfig,
        backend: Arc<dyn RecordBackend>,
        audit: Arc<dyn AuditSink>,
        changes: Arc<dyn ChangeSink>,
    ) -> StoreResult<Self> {
        let coder = Arc::new(ErasureCoder::new(
            config.erasure.data_shards,
            config.erasure.parity_shards,
        )?);
        let coders = DashMap::new();
        coders.insert((coder.data_shards(), coder.parity_shards()), Arc::clone(&coder));
        let sharing = SharingConfig::new(config.sharing.threshold, config.sharing.total_shares)?;

        info!(
            data_shards = coder.data_shards(),
            parity_shards = coder.parity_shards(),
            threshold = sharing.threshold,
            key_shares = sharing.total_shares,
            backend = backend.name(),
            "record store ready"
        );

        Ok(Self {
            coder,
            coders,
            sharing,
            records: DashMap::new(),
            write_gates: DashMap::new(),
            state: RwLock::new(StateMachine::new(config.attack.fail_every)),
            backend,
            audit,
            changes,
        })
    }

    /// Coder used for new records.
    pub fn coder(&self) -> &ErasureCoder {
        &self.coder
    }

    /// Key split used for new records.
    pub fn sharing_config(&self) -> SharingConfig {
        self.sharing
    }

    // -- Store --------------------------------------------------------------

    /// Protect `payload` under `id`, replacing any previous record.
    ///
    /// Refused while RECOVERY and subject to the duty cycle while
    /// UNDER_ATTACK. Every store draws a fresh key; the previous key-share
    /// set is discarded with the previous shards.
    pub fn store(&self, user: &str, id: &str, payload: &[u8]) -> StoreResult<StoreReceipt> {
        let result = self.store_inner(user, id, payload);
        match &result {
            Ok(receipt) => self.audit(
                user,
                Action::Store,
                id,
                format!(
                    "created {} shards and {} key-shares (generation {})",
                    receipt.data_shards + receipt.parity_shards,
                    receipt.key_shares,
                    receipt.generation
                ),
                true,
            ),
            Err(e) => self.audit(user, Action::Store, id, e.to_string(), false),
        }
        result
    }

    fn store_inner(&self, user: &str, id: &str, payload: &[u8]) -> StoreResult<StoreReceipt> {
        validate_id(id)?;
        let state = self.state();
        if !state.accepts_writes() {
            return Err(StoreError::WritesSuspended { state });
        }
        self.admit("store")?;

        self.gated(id, || {
            let previous = self.lookup(id)?;
            let old_payload = previous.as_ref().and_then(|record| match self.open(record) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    debug!(id, error = %e, "previous payload not recoverable for change journal");
                    None
                }
            });

            let shards = self.coder.encode(payload)?;
            let key = generate_key(KEY_BITS);
            let key_shares = sharing::split(&key, &self.sharing)?;
            let record = ProtectedRecord {
                id: id.to_string(),
                shards,
                key_shares,
                key_digest: key_fingerprint(&key.to_bytes_be()),
                generation: previous.as_ref().map_or(1, |r| r.generation + 1),
                stored_at: Utc::now(),
            };
            let receipt = StoreReceipt::for_record(&record);
            self.commit(record)?;

            self.change(user, id, Action::Store, old_payload.as_deref(), Some(payload));
            info!(
                id,
                user,
                generation = receipt.generation,
                bytes = payload.len(),
                key = %receipt.key_fingerprint,
                "record stored"
            );
            Ok(receipt)
        })
    }

    // -- Retrieve -----------------------------------------------------------

    /// Reconstruct the payload stored under `id`.
    ///
    /// Subject to the duty cycle while UNDER_ATTACK.
    pub fn retrieve(&self, user: &str, id: &str) -> StoreResult<Vec<u8>> {
        let result = self.retrieve_inner(id);
        match &result {
            Ok(payload) => self.audit(
                user,
                Action::Retrieve,
                id,
                format!("{} bytes reconstructed", payload.len()),
                true,
            ),
            Err(e) => self.audit(user, Action::Retrieve, id, e.to_string(), false),
        }
        result
    }

    fn retrieve_inner(&self, id: &str) -> StoreResult<Vec<u8>> {
        self.admit("retrieve")?;
        let record = self.require(id)?;
        let payload = self.open(&record)?;
        info!(id, generation = record.generation, bytes = payload.len(), "record retrieved");
        Ok(payload)
    }

    /// Check quorums, decode the payload and verify the reconstructed key.
    fn open(&self, record: &ProtectedRecord) -> StoreResult<Vec<u8>> {
        self.check_quorums(record)?;
        let payload = self.coder_for(record)?.decode(&record.shards)?;
        self.verify_key(record)?;
        Ok(payload)
    }

    fn check_quorums(&self, record: &ProtectedRecord) -> StoreResult<()> {
        let corrupt = record.shards.corrupt_indices();
        if !corrupt.is_empty() {
            warn!(id = %record.id, ?corrupt, "corrupt shards detected");
        }

        let intact = record.shards.intact_count();
        if intact < record.shards.data_shards {
            warn!(
                id = %record.id,
                intact,
                required = record.shards.data_shards,
                "shard quorum not met"
            );
            return Err(StoreError::InsufficientShards {
                available: intact,
                required: record.shards.data_shards,
            });
        }
        let shares = record.key_shares.present_count();
        if shares < record.key_shares.threshold {
            warn!(
                id = %record.id,
                shares,
                required = record.key_shares.threshold,
                "key-share quorum not met"
            );
            return Err(StoreError::InsufficientShares {
                available: shares,
                required: record.key_shares.threshold,
            });
        }
        Ok(())
    }

    fn verify_key(&self, record: &ProtectedRecord) -> StoreResult<BigUint> {
        let key = record.key_shares.reconstruct()?;
        if !digests_match(&key_fingerprint(&key.to_bytes_be()), &record.key_digest) {
            error!(
                id = %record.id,
                expected = %short_hex(&record.key_digest),
                "reconstructed key does not match fingerprint"
            );
            return Err(StoreError::KeyMismatch(record.id.clone()));
        }
        Ok(key)
    }

    // -- Corruption ---------------------------------------------------------

    /// Destroy `count` randomly chosen present shards and `count` key-shares
    /// of `id` (each capped at what is present).
    pub fn inject_corruption(
        &self,
        user: &str,
        id: &str,
        count: usize,
    ) -> StoreResult<CorruptionReport> {
        let record = match self.require(id) {
            Ok(record) => record,
            Err(e) => {
                self.audit(user, Action::Corrupt, id, e.to_string(), false);
                return Err(e);
            }
        };
        let mut rng = rand::thread_rng();
        let present: Vec<usize> = record
            .shards
            .shards
            .iter()
            .filter(|s| s.is_present())
            .map(|s| s.index)
            .collect();
        let shard_indices: Vec<usize> = present.choose_multiple(&mut rng, count).copied().collect();
        let share_xs: Vec<u32> = record
            .key_shares
            .xs()
            .choose_multiple(&mut rng, count)
            .copied()
            .collect();
        self.inject_corruption_at(user, id, &shard_indices, &share_xs)
    }

    /// Destroy exactly the listed shards and key-shares of `id`.
    ///
    /// Fragments already missing are ignored. The damaged record is
    /// persisted so the loss survives a restart.
    pub fn inject_corruption_at(
        &self,
        user: &str,
        id: &str,
        shard_indices: &[usize],
        share_xs: &[u32],
    ) -> StoreResult<CorruptionReport> {
        let result = self.mutate(id, |record| {
            let total = record.shards.total_shards();
            if let Some(&index) = shard_indices.iter().find(|&&i| i >= total) {
                return Err(StoreError::InvalidShardIndex { index, total });
            }
            let issued = record.key_shares.total_shares;
            if let Some(&x) = share_xs.iter().find(|&&x| x == 0 || x as usize > issued) {
                return Err(StoreError::InvalidShareIndex { x, total: issued });
            }
            let mut removed_shards: Vec<usize> = shard_indices
                .iter()
                .copied()
                .filter(|&i| record.shards.mark_missing(i))
                .collect();
            removed_shards.sort_unstable();
            let mut removed_shares: Vec<u32> = share_xs
                .iter()
                .copied()
                .filter(|&x| record.key_shares.remove(x))
                .collect();
            removed_shares.sort_unstable();
            Ok(self.corruption_report(record, removed_shards, removed_shares, Vec::new()))
        });
        self.report_corruption(user, Action::Corrupt, id, result)
    }

    /// Alter the bytes of one shard in place without removing it.
    ///
    /// The shard still looks present, but no longer matches its digest and
    /// is excluded on the next read.
    pub fn tamper_shard(&self, user: &str, id: &str, index: usize) -> StoreResult<CorruptionReport> {
        let result = self.mutate(id, |record| {
            let total = record.shards.total_shards();
            let shard = record
                .shards
                .shards
                .get_mut(index)
                .ok_or(StoreError::InvalidShardIndex { index, total })?;
            let tampered = match shard.bytes.as_mut() {
                Some(bytes) if bytes.is_empty() => {
                    bytes.push(0xFF);
                    vec![index]
                }
                Some(bytes) => {
                    for b in bytes.iter_mut() {
                        *b ^= 0xFF;
                    }
                    vec![index]
                }
                None => Vec::new(),
            };
            Ok(self.corruption_report(record, Vec::new(), Vec::new(), tampered))
        });
        self.report_corruption(user, Action::Tamper, id, result)
    }

    fn report_corruption(
        &self,
        user: &str,
        action: Action,
        id: &str,
        result: StoreResult<CorruptionReport>,
    ) -> StoreResult<CorruptionReport> {
        match &result {
            Ok(report) => {
                warn!(
                    id,
                    user,
                    removed_shards = ?report.removed_shards,
                    removed_shares = ?report.removed_shares,
                    tampered_shards = ?report.tampered_shards,
                    remaining_shards = report.remaining_shards,
                    remaining_shares = report.remaining_shares,
                    recoverable = report.recoverable,
                    "record corrupted"
                );
                self.audit(
                    user,
                    action,
                    id,
                    format!(
                        "{} shards and {} key-shares destroyed, {} shards altered; recoverable={}",
                        report.removed_shards.len(),
                        report.removed_shares.len(),
                        report.tampered_shards.len(),
                        report.recoverable
                    ),
                    true,
                );
            }
            Err(e) => self.audit(user, action, id, e.to_string(), false),
        }
        result
    }

    // -- Repair -------------------------------------------------------------

    /// Regenerate every missing or corrupt shard of `id` and issue a fresh
    /// key-share set for the same key.
    ///
    /// Refused while UNDER_ATTACK. Needs a shard quorum and a key-share
    /// quorum, like a read.
    pub fn repair(&self, user: &str, id: &str) -> StoreResult<RepairReport> {
        let result = self.repair_inner(id);
        match &result {
            Ok(report) => self.audit(
                user,
                Action::Repair,
                id,
                format!(
                    "rebuilt shards {:?}, reissued {} key-shares",
                    report.rebuilt_shards, report.reissued_shares
                ),
                true,
            ),
            Err(e) => self.audit(user, Action::Repair, id, e.to_string(), false),
        }
        result
    }

    fn repair_inner(&self, id: &str) -> StoreResult<RepairReport> {
        let state = self.state();
        if state == SystemState::UnderAttack {
            return Err(StoreError::WritesSuspended { state });
        }
        self.mutate(id, |record| {
            let before = record.shards.intact_indices();
            self.check_quorums(record)?;
            let key = self.verify_key(record)?;

            let coder = self.coder_for(record)?;
            let rebuilt_bytes = coder.reconstruct_all(&record.shards.verified())?;
            let rebuilt_shards: Vec<usize> = (0..record.shards.total_shards())
                .filter(|i| !before.contains(i))
                .collect();
            record.shards.shards = rebuilt_bytes
                .into_iter()
                .enumerate()
                .map(|(index, bytes)| Shard::new(index, bytes))
                .collect();
            let split = SharingConfig::new(
                record.key_shares.threshold,
                record.key_shares.total_shares,
            )?;
            record.key_shares = sharing::split(&key, &split)?;

            info!(id = %record.id, ?rebuilt_shards, "record repaired");
            Ok(RepairReport {
                id: record.id.clone(),
                rebuilt_shards,
                reissued_shares: record.key_shares.total_shares,
            })
        })
    }

    // -- State --------------------------------------------------------------

    /// Current system state.
    pub fn state(&self) -> SystemState {
        self.state.read().state()
    }

    /// Administrative transition along NORMAL → UNDER_ATTACK → RECOVERY →
    /// NORMAL. Returns the previous state.
    pub fn set_state(&self, user: &str, to: SystemState) -> StoreResult<SystemState> {
        let result = self
            .state
            .write()
            .transition(to)
            .map_err(|(from, to)| StoreError::InvalidTransition { from, to });
        match &result {
            Ok(from) => {
                info!(user, %from, %to, "system state changed");
                self.audit(user, Action::SetState, SYSTEM_USER, format!("{from} -> {to}"), true);
            }
            Err(e) => {
                warn!(user, error = %e, "state change refused");
                self.audit(user, Action::SetState, SYSTEM_USER, e.to_string(), false);
            }
        }
        result
    }

    // -- Inspection ---------------------------------------------------------

    /// Every known id, sorted.
    pub fn list_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = self.backend.ids()?;
        ids.extend(self.records.iter().map(|entry| entry.key().clone()));
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Fragment counts for `id`. A record whose layout this build cannot
    /// decode is reported unrecoverable.
    pub fn health(&self, id: &str) -> StoreResult<RecordHealth> {
        let record = self.require(id)?;
        let mut health = record.health();
        if health.recoverable {
            if let Err(e) = self.coder_for(&record) {
                warn!(id, error = %e, "record layout cannot be decoded");
                health.recoverable = false;
            }
        }
        Ok(health)
    }

    /// The current snapshot of `id`, if any.
    pub fn snapshot(&self, id: &str) -> StoreResult<Option<Arc<ProtectedRecord>>> {
        self.lookup(id)
    }

    // -- Internals ----------------------------------------------------------

    fn admit(&self, operation: &'static str) -> StoreResult<()> {
        self.state.write().admit().map_err(|n| {
            warn!(operation, guarded_op = n, "simulated outage");
            StoreError::SimulatedOutage { operation: n }
        })
    }

    /// Coder for the layout the record was written with. Layouts other than
    /// the configured one are verified once and cached.
    fn coder_for(&self, record: &ProtectedRecord) -> StoreResult<Arc<ErasureCoder>> {
        let layout = (record.shards.data_shards, record.shards.parity_shards);
        if let Some(coder) = self.coders.get(&layout) {
            return Ok(Arc::clone(coder.value()));
        }
        let coder = Arc::new(ErasureCoder::new(layout.0, layout.1)?);
        debug!(
            data_shards = layout.0,
            parity_shards = layout.1,
            "coder built for stored layout"
        );
        Ok(Arc::clone(self.coders.entry(layout).or_insert(coder).value()))
    }

    /// Run `f` holding the write gate of `id`. The gate is dropped from the
    /// table once no other writer holds or waits on it.
    fn gated<T>(&self, id: &str, f: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
        let gate = Arc::clone(self.write_gates.entry(id.to_string()).or_default().value());
        let out = {
            let _guard = gate.lock();
            f()
        };
        drop(gate);
        self.write_gates
            .remove_if(id, |_, gate| Arc::strong_count(gate) == 1);
        out
    }

    /// Table first, then the backend. A record loaded from the backend is
    /// cached unless a writer committed a newer one meanwhile.
    fn lookup(&self, id: &str) -> StoreResult<Option<Arc<ProtectedRecord>>> {
        if let Some(record) = self.records.get(id).map(|entry| Arc::clone(entry.value())) {
            return Ok(Some(record));
        }
        match self.backend.load(id)? {
            Some(record) => {
                let record = Arc::new(record);
                let cached = self
                    .records
                    .entry(id.to_string())
                    .or_insert_with(|| Arc::clone(&record));
                Ok(Some(Arc::clone(cached.value())))
            }
            None => Ok(None),
        }
    }

    fn require(&self, id: &str) -> StoreResult<Arc<ProtectedRecord>> {
        self.lookup(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Apply `f` to a private copy of the record under the write gate and
    /// commit the result. Nothing is committed if `f` fails.
    fn mutate<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ProtectedRecord) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.require(id)?;
        self.gated(id, || {
            let current = self.require(id)?;
            let mut updated = (*current).clone();
            let out = f(&mut updated)?;
            self.commit(updated)?;
            Ok(out)
        })
    }

    /// Persist, then publish. Caller holds the id's write gate.
    fn commit(&self, record: ProtectedRecord) -> StoreResult<()> {
        if let Err(e) = self.backend.save(&record) {
            error!(id = %record.id, backend = self.backend.name(), error = %e, "persisting record failed");
            return Err(e.into());
        }
        self.records.insert(record.id.clone(), Arc::new(record));
        Ok(())
    }

    fn corruption_report(
        &self,
        record: &ProtectedRecord,
        removed_shards: Vec<usize>,
        removed_shares: Vec<u32>,
        tampered_shards: Vec<usize>,
    ) -> CorruptionReport {
        let remaining_shards = record.shards.intact_count();
        let remaining_shares = record.key_shares.present_count();
        CorruptionReport {
            id: record.id.clone(),
            removed_shards,
            removed_shares,
            tampered_shards,
            remaining_shards,
            remaining_shares,
            recoverable: remaining_shards >= record.shards.data_shards
                && remaining_shares >= record.key_shares.threshold
                && self.coder_for(record).is_ok(),
        }
    }

    fn audit(&self, user: &str, action: Action, id: &str, details: String, success: bool) {
        let entry = AuditEntry::new(user, action, id, details, success);
        if let Err(e) = self.audit.record(&entry) {
            warn!(error = %e, %action, id, "audit journal write failed");
        }
    }

    fn change(&self, user: &str, id: &str, action: Action, old: Option<&[u8]>, new: Option<&[u8]>) {
        let entry = ChangeEntry::new(user, id, action, old, new);
        if let Err(e) = self.changes.record(&entry) {
            warn!(error = %e, %action, id, "change journal write failed");
        }
    }
}

fn validate_id(id: &str) -> StoreResult<()> {
    if id.is_empty() || id.len() > MAX_RECORD_ID_LEN {
        return Err(StoreError::InvalidRecordId {
            max: MAX_RECORD_ID_LEN,
        });
    }
    Ok(())
}
