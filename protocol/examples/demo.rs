//! Scripted walkthrough of a ransomware attack on the RaSe record store.
//!
//! Shows the two engines on their own, then stores patient records, moves
//! the system through UNDER_ATTACK and RECOVERY while fragments are
//! destroyed and altered, repairs what survives, and prints the audit trail.
//! The output uses ANSI escape codes for colored, storytelling-style
//! terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release

use std::sync::Arc;
use std::time::Instant;

use num_bigint::BigUint;

use rase_protocol::config::StoreConfig;
use rase_protocol::digest::short_hex;
use rase_protocol::erasure::ErasureCoder;
use rase_protocol::journal::MemoryJournal;
use rase_protocol::persistence::SledBackend;
use rase_protocol::sharing::{self, SharingConfig};
use rase_protocol::{RecordStore, StoreError, SystemState};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_RED: &str = "\x1b[41m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_RED}{BOLD}{WHITE}                                                                    {RESET}");
    println!("{BG_RED}{BOLD}{WHITE}    RaSe  --  Ransomware-Resilient Record Store Demo                {RESET}");
    println!("{BG_RED}{BOLD}{WHITE}    GF(2^8) Vandermonde erasure coding + Shamir key sharing         {RESET}");
    println!("{BG_RED}{BOLD}{WHITE}                                                                    {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!("{CYAN}------------------------------------------------------------------------{RESET}");
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn failure(text: &str) {
    println!("{RED}  [!!] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn outcome<T>(label: &str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(value) => {
            success(label);
            Some(value)
        }
        Err(e) => {
            failure(&format!("{label}: {e} ({:?})", e.class()));
            None
        }
    }
}

fn health_row(store: &RecordStore, id: &str) {
    if let Ok(h) = store.health(id) {
        let color = if h.recoverable { GREEN } else { RED };
        println!(
            "  {color}{BOLD}{id:<6}{RESET}  shards {WHITE}{}/{}{RESET} intact {DIM}({} corrupt, {} missing){RESET}  key-shares {WHITE}{}/{}{RESET}",
            h.intact_shards,
            h.total_shards,
            h.corrupt_shards,
            h.missing_shards,
            h.present_shares,
            h.total_shares,
        );
    }
}

fn main() {
    let demo_start = Instant::now();

    banner();

    // -----------------------------------------------------------------------
    // Step 1: Erasure Coding
    // -----------------------------------------------------------------------

    section(1, "Erasure Coding over GF(2^8)");
    subsection("Encoding a payload into 4 data + 2 parity shards...");

    let coder = ErasureCoder::new(4, 2).expect("4+2 layout");
    let payload = b"Patient 0042: penicillin allergy, blood type AB+".to_vec();
    let t = Instant::now();
    let mut set = coder.encode(&payload).expect("encode");
    timing("encode", t.elapsed());

    for shard in &set.shards {
        let kind = if shard.index < coder.data_shards() { "data  " } else { "parity" };
        println!(
            "  {DIM}shard {}{RESET} {kind}  {DIM}digest {}{RESET}",
            shard.index,
            short_hex(&shard.digest)
        );
    }

    subsection("Dropping shards 0 and 5, then decoding from the other four...");
    set.mark_missing(0);
    set.mark_missing(5);
    let t = Instant::now();
    let decoded = coder.decode(&set).expect("decode");
    timing("reconstruct", t.elapsed());
    assert_eq!(decoded, payload);
    success("Payload rebuilt byte-for-byte from 4 of 6 shards");

    // -----------------------------------------------------------------------
    // Step 2: Threshold Key Sharing
    // -----------------------------------------------------------------------

    section(2, "Shamir Secret Sharing");
    subsection("Splitting 123456789 into 5 shares, any 3 of which recover it...");

    let secret = BigUint::from(123_456_789u64);
    let config = SharingConfig::new(3, 5).expect("3-of-5");
    let shares = sharing::split(&secret, &config).expect("split");
    info("Field prime", &shares.prime.to_string());
    for share in &shares.shares {
        println!("  {DIM}x = {}{RESET}  y = {WHITE}{}{RESET}", share.x, share.y);
    }

    let subset = &shares.shares[2..];
    let recovered = sharing::reconstruct(subset, &shares.prime, 3).expect("reconstruct");
    assert_eq!(recovered, secret);
    success("Shares x=3,4,5 reconstruct the secret");
    match sharing::reconstruct(&shares.shares[..2], &shares.prime, 3) {
        Err(e) => failure(&format!("Two shares are not enough: {e}")),
        Ok(_) => unreachable!("two shares reconstructed a 3-of-5 secret"),
    }

    // -----------------------------------------------------------------------
    // Step 3: Protected Records
    // -----------------------------------------------------------------------

    section(3, "Storing Patient Records");
    subsection("Opening a temporary sled database with an in-memory journal...");

    let journal = Arc::new(MemoryJournal::new());
    let backend = Arc::new(SledBackend::open_temporary().expect("temporary database"));
    let store = RecordStore::with_collaborators(
        &StoreConfig::default(),
        backend,
        journal.clone(),
        journal.clone(),
    )
    .expect("record store");

    let records = [
        ("p1", "Alice: type 2 diabetes, metformin 500mg"),
        ("p2", "Bob: fractured radius, cast until March"),
    ];
    for (id, data) in records {
        let t = Instant::now();
        let receipt = store.store("doctor", id, data.as_bytes()).expect("store");
        timing(&format!("store {id}"), t.elapsed());
        info(
            id,
            &format!(
                "{} bytes, {}x{} byte shards, key {}-of-{} over a {}-bit prime",
                receipt.payload_len,
                receipt.data_shards + receipt.parity_shards,
                receipt.shard_size,
                receipt.key_threshold,
                receipt.key_shares,
                receipt.prime_bits
            ),
        );
    }
    health_row(&store, "p1");
    health_row(&store, "p2");

    // -----------------------------------------------------------------------
    // Step 4: Under Attack
    // -----------------------------------------------------------------------

    section(4, "Ransomware Strikes");
    store.set_state("admin", SystemState::UnderAttack).expect("attack");
    info("System state", &store.state().to_string());

    subsection("Attacker deletes shard 1 and key-share 2 of p1, then alters shard 4...");
    store.inject_corruption_at("attacker", "p1", &[1], &[2]).expect("corrupt");
    store.tamper_shard("attacker", "p1", 4).expect("tamper");
    subsection("Attacker deletes shards 0, 2 and 3 of p2...");
    store.inject_corruption_at("attacker", "p2", &[0, 2, 3], &[]).expect("corrupt");
    health_row(&store, "p1");
    health_row(&store, "p2");

    subsection("Doctors keep reading while the attack is underway...");
    if let Some(bytes) = outcome("Read p1", store.retrieve("doctor", "p1")) {
        info("p1", &String::from_utf8_lossy(&bytes));
    }
    outcome("Read p1 again", store.retrieve("doctor", "p1"));
    outcome("Read p2", store.retrieve("doctor", "p2"));
    outcome("Repair p1", store.repair("admin", "p1"));

    // -----------------------------------------------------------------------
    // Step 5: Recovery
    // -----------------------------------------------------------------------

    section(5, "Recovery");
    store.set_state("admin", SystemState::Recovery).expect("recovery");
    info("System state", &store.state().to_string());

    outcome("New admissions", store.store("doctor", "p3", b"Carol: checkup"));
    if let Some(report) = outcome("Repair p1", store.repair("admin", "p1")) {
        info(
            "Rebuilt",
            &format!(
                "shards {:?}, {} fresh key-shares",
                report.rebuilt_shards, report.reissued_shares
            ),
        );
    }
    outcome("Repair p2", store.repair("admin", "p2"));
    health_row(&store, "p1");
    health_row(&store, "p2");

    store.set_state("admin", SystemState::Normal).expect("normal");
    info("System state", &store.state().to_string());
    let restored = store.retrieve("doctor", "p1").expect("retrieve");
    assert_eq!(restored, records[0].1.as_bytes());
    success("p1 is fully protected again");

    // -----------------------------------------------------------------------
    // Step 6: Audit Trail
    // -----------------------------------------------------------------------

    section(6, "Audit Trail");
    for entry in journal.audit_entries() {
        let color = if entry.success { WHITE } else { RED };
        println!("  {color}{entry}{RESET}");
    }

    println!();
    timing("total demo", demo_start.elapsed());
    println!();
}
