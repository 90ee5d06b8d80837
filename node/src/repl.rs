//! # Interactive Session
//!
//! A line-oriented console over one [`RecordStore`]. Users act on records,
//! the attacker destroys fragments, and the operator moves the system
//! between NORMAL, UNDER_ATTACK and RECOVERY:
//!
//! ```text
//! rase> doctor store p1 "blood type O negative"
//! rase> system setstate UNDER_ATTACK
//! rase> attacker corrupt p1 2
//! rase> admin retrieve p1
//! rase> system setstate RECOVERY
//! rase> admin repair p1
//! rase> audit viewlog
//! ```
//!
//! The system state only lives as long as the session.

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Result};
use rase_protocol::config::SYSTEM_USER;
use rase_protocol::journal::render_payload;
use rase_protocol::store::{CorruptionReport, RecordHealth};
use rase_protocol::{ErrorClass, RecordStore, StoreError, SystemState};

use crate::metrics::StoreMetrics;
use crate::setup::JournalView;

const PROMPT: &str = "rase> ";
const DEFAULT_CORRUPT_COUNT: usize = 2;

const HELP: &str = "\
Available commands:
  USER store ID DATA          protect DATA under ID (e.g. doctor store p1 \"flu\")
  USER retrieve ID            reconstruct and print a record
  USER repair ID              rebuild lost shards and reissue key-shares
  attacker corrupt ID [N]     destroy N shards and N key-shares (default 2)
  attacker tamper ID INDEX    alter the bytes of one shard
  health ID                   fragment counts for a record
  list                        stored record ids
  audit viewlog               print the audit journal
  audit changes               print the change journal
  system state                print the current state
  system setstate STATE       NORMAL | UNDER_ATTACK | RECOVERY
  metrics                     Prometheus counters
  help                        this text
  exit                        leave the session";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Store { user: String, id: String, data: String },
    Retrieve { user: String, id: String },
    Repair { user: String, id: String },
    Corrupt { user: String, id: String, count: usize },
    Tamper { user: String, id: String, index: usize },
    Health(String),
    List,
    AuditLog,
    ChangeLog,
    ShowState,
    SetState(SystemState),
    Metrics,
    Help,
    Exit,
    Empty,
}

/// Split off the first whitespace-delimited word.
fn next_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

/// Strip one pair of matching surrounding quotes.
fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn require_id(id: &str, usage: &str) -> Result<String> {
    if id.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(id.to_string())
}

/// Parse one console line.
pub fn parse_command(line: &str) -> Result<Command> {
    let (head, rest) = next_word(line);
    match head.to_ascii_lowercase().as_str() {
        "" => return Ok(Command::Empty),
        "exit" | "quit" => return Ok(Command::Exit),
        "help" => return Ok(Command::Help),
        "list" => return Ok(Command::List),
        "metrics" => return Ok(Command::Metrics),
        "health" => return Ok(Command::Health(require_id(rest.trim(), "health ID")?)),
        "audit" => {
            return match next_word(rest).0 {
                "viewlog" | "" => Ok(Command::AuditLog),
                "changes" => Ok(Command::ChangeLog),
                other => Err(anyhow!("unknown audit command '{other}'")),
            }
        }
        "system" => {
            let (action, arg) = next_word(rest);
            return match action {
                "state" | "" => Ok(Command::ShowState),
                "setstate" => Ok(Command::SetState(arg.trim().parse()?)),
                other => Err(anyhow!("unknown system command '{other}'")),
            };
        }
        _ => {}
    }

    let user = head.to_string();
    let (action, args) = next_word(rest);
    match action {
        "store" => {
            let (id, data) = next_word(args);
            let id = require_id(id, "USER store ID DATA")?;
            Ok(Command::Store {
                user,
                id,
                data: unquote(data).to_string(),
            })
        }
        "retrieve" => Ok(Command::Retrieve {
            user,
            id: require_id(args.trim(), "USER retrieve ID")?,
        }),
        "repair" => Ok(Command::Repair {
            user,
            id: require_id(args.trim(), "USER repair ID")?,
        }),
        "corrupt" => {
            let (id, count) = next_word(args);
            let id = require_id(id, "attacker corrupt ID [N]")?;
            let count = match count.trim() {
                "" => DEFAULT_CORRUPT_COUNT,
                n => n
                    .parse()
                    .map_err(|_| anyhow!("corrupt count must be a number, got '{n}'"))?,
            };
            Ok(Command::Corrupt { user, id, count })
        }
        "tamper" => {
            let (id, index) = next_word(args);
            let id = require_id(id, "attacker tamper ID INDEX")?;
            let index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("usage: attacker tamper ID INDEX"))?;
            Ok(Command::Tamper { user, id, index })
        }
        "" => Err(anyhow!("missing action after '{user}' (try 'help')")),
        other => Err(anyhow!("unknown action '{other}' (try 'help')")),
    }
}

/// A running console session.
pub struct Session {
    store: RecordStore,
    journals: JournalView,
    metrics: StoreMetrics,
}

impl Session {
    pub fn new(store: RecordStore, journals: JournalView, metrics: StoreMetrics) -> Self {
        metrics.set_state(store.state());
        Self {
            store,
            journals,
            metrics,
        }
    }

    /// Read commands from `input` until `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        writeln!(output, "=== RaSe record store ===")?;
        writeln!(output, "System state: {}", self.store.state())?;
        writeln!(output, "Type 'help' for commands.")?;

        let mut lines = input.lines();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;
            let Some(line) = lines.next() else { break };
            let line = line?;

            let command = match parse_command(&line) {
                Ok(Command::Exit) => break,
                Ok(command) => command,
                Err(e) => {
                    writeln!(output, "error: {e}")?;
                    continue;
                }
            };
            match self.execute(command) {
                Ok(text) if text.is_empty() => {}
                Ok(text) => writeln!(output, "{text}")?,
                Err(e) => writeln!(output, "{}", describe_error(&e))?,
            }
        }
        Ok(())
    }

    /// Run one command and return what to print.
    pub fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Store { user, id, data } => {
                let result = self.store.store(&user, &id, data.as_bytes());
                self.metrics.observe("store", &result);
                let r = result?;
                Ok(format!(
                    "stored {} (generation {}): {}+{} shards of {} bytes, key split {}-of-{}, fingerprint {}",
                    r.id,
                    r.generation,
                    r.data_shards,
                    r.parity_shards,
                    r.shard_size,
                    r.key_threshold,
                    r.key_shares,
                    r.key_fingerprint
                ))
            }
            Command::Retrieve { user, id } => {
                let timer = self.metrics.retrieve_latency_seconds.start_timer();
                let result = self.store.retrieve(&user, &id);
                timer.observe_duration();
                self.metrics.observe("retrieve", &result);
                Ok(format!("{id}: {}", render_payload(&result?)))
            }
            Command::Repair { user, id } => {
                let result = self.store.repair(&user, &id);
                self.metrics.observe("repair", &result);
                let report = result?;
                self.metrics.record_repair(&report);
                Ok(format!(
                    "repaired {}: rebuilt shards {:?}, reissued {} key-shares",
                    report.id, report.rebuilt_shards, report.reissued_shares
                ))
            }
            Command::Corrupt { user, id, count } => {
                let result = self.store.inject_corruption(&user, &id, count);
                self.metrics.observe("corrupt", &result);
                let report = result?;
                self.metrics.record_corruption(&report);
                Ok(describe_corruption(&report))
            }
            Command::Tamper { user, id, index } => {
                let result = self.store.tamper_shard(&user, &id, index);
                self.metrics.observe("tamper", &result);
                let report = result?;
                self.metrics.record_corruption(&report);
                Ok(describe_corruption(&report))
            }
            Command::Health(id) => Ok(describe_health(&self.store.health(&id)?)),
            Command::List => {
                let ids = self.store.list_ids()?;
                if ids.is_empty() {
                    Ok("(no records)".to_string())
                } else {
                    Ok(ids.join("\n"))
                }
            }
            Command::AuditLog => Ok(titled("AUDIT LOG", self.journals.audit_lines()?)),
            Command::ChangeLog => Ok(titled("CHANGE LOG", self.journals.change_lines()?)),
            Command::ShowState => Ok(format!("System state: {}", self.store.state())),
            Command::SetState(to) => {
                let result = self.store.set_state(SYSTEM_USER, to);
                self.metrics.observe("set_state", &result);
                let previous = result?;
                self.metrics.set_state(to);
                Ok(format!("System state: {previous} -> {to}"))
            }
            Command::Metrics => Ok(self.metrics.encode()?),
            Command::Help => Ok(HELP.to_string()),
            Command::Exit | Command::Empty => Ok(String::new()),
        }
    }
}

fn titled(title: &str, lines: Vec<String>) -> String {
    if lines.is_empty() {
        return format!("=== {title} ===\n(empty)");
    }
    format!("=== {title} ===\n{}", lines.join("\n"))
}

fn describe_corruption(report: &CorruptionReport) -> String {
    let mut text = format!("attack on {}:", report.id);
    if !report.removed_shards.is_empty() {
        text.push_str(&format!(" destroyed shards {:?}", report.removed_shards));
    }
    if !report.tampered_shards.is_empty() {
        text.push_str(&format!(" tampered shards {:?}", report.tampered_shards));
    }
    if !report.removed_shares.is_empty() {
        text.push_str(&format!(" destroyed key-shares {:?}", report.removed_shares));
    }
    text.push_str(&format!(
        "; {} shards and {} key-shares remain, record is {}",
        report.remaining_shards,
        report.remaining_shares,
        if report.recoverable {
            "recoverable"
        } else {
            "NOT recoverable"
        }
    ));
    text
}

/// Human-readable fragment summary.
pub fn describe_health(h: &RecordHealth) -> String {
    format!(
        "{} (generation {}): shards {}/{} intact ({} corrupt, {} missing, {} needed); \
         key-shares {}/{} ({} needed); {}",
        h.id,
        h.generation,
        h.intact_shards,
        h.total_shards,
        h.corrupt_shards,
        h.missing_shards,
        h.required_shards,
        h.present_shares,
        h.total_shares,
        h.required_shares,
        if h.recoverable {
            "recoverable"
        } else {
            "unrecoverable"
        }
    )
}

fn describe_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<StoreError>().map(StoreError::class) {
        Some(ErrorClass::InsufficientRedundancy) => format!("UNAVAILABLE: {e}"),
        Some(ErrorClass::Rejected) => format!("REFUSED: {e}"),
        _ => format!("ERROR: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::open_store;
    use rase_protocol::config::StoreConfig;

    fn session() -> Session {
        let (store, journals) = open_store(&StoreConfig::default()).unwrap();
        Session::new(store, journals, StoreMetrics::new().unwrap())
    }

    fn run_script(session: &Session, script: &str) -> String {
        let mut output = Vec::new();
        session.run(script.as_bytes(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn parses_store_with_quoted_data() {
        assert_eq!(
            parse_command(r#"doctor store p1 "blood type O negative""#).unwrap(),
            Command::Store {
                user: "doctor".into(),
                id: "p1".into(),
                data: "blood type O negative".into(),
            }
        );
        assert_eq!(
            parse_command("nurse   store p2 unquoted  text").unwrap(),
            Command::Store {
                user: "nurse".into(),
                id: "p2".into(),
                data: "unquoted  text".into(),
            }
        );
    }

    #[test]
    fn parses_attacker_commands() {
        assert_eq!(
            parse_command("attacker corrupt p1").unwrap(),
            Command::Corrupt {
                user: "attacker".into(),
                id: "p1".into(),
                count: 2,
            }
        );
        assert_eq!(
            parse_command("attacker tamper p1 3").unwrap(),
            Command::Tamper {
                user: "attacker".into(),
                id: "p1".into(),
                index: 3,
            }
        );
        assert!(parse_command("attacker corrupt p1 many").is_err());
        assert!(parse_command("attacker tamper p1").is_err());
    }

    #[test]
    fn parses_system_and_audit() {
        assert_eq!(
            parse_command("system setstate under_attack").unwrap(),
            Command::SetState(SystemState::UnderAttack)
        );
        assert_eq!(parse_command("system state").unwrap(), Command::ShowState);
        assert_eq!(parse_command("audit viewlog").unwrap(), Command::AuditLog);
        assert_eq!(parse_command("audit changes").unwrap(), Command::ChangeLog);
        assert_eq!(parse_command("  ").unwrap(), Command::Empty);
        assert_eq!(parse_command("EXIT").unwrap(), Command::Exit);
        assert!(parse_command("system setstate PANIC").is_err());
        assert!(parse_command("doctor").is_err());
        assert!(parse_command("doctor fly p1").is_err());
        assert!(parse_command("doctor retrieve").is_err());
    }

    #[test]
    fn session_walks_through_an_attack() {
        let session = session();
        let out = run_script(
            &session,
            "doctor store p1 \"blood type O negative\"\n\
             system setstate UNDER_ATTACK\n\
             attacker corrupt p1 2\n\
             admin retrieve p1\n\
             system setstate RECOVERY\n\
             admin repair p1\n\
             health p1\n\
             exit\n\
             admin retrieve p1\n",
        );
        assert!(out.contains("stored p1 (generation 1)"));
        assert!(out.contains("System state: NORMAL -> UNDER_ATTACK"));
        assert!(out.contains("record is recoverable"));
        assert!(out.contains("p1: blood type O negative"));
        assert!(out.contains("repaired p1"));
        assert!(out.contains("shards 6/6 intact"));
        assert_eq!(out.matches("p1: blood type O negative").count(), 1);
    }

    #[test]
    fn failures_are_classified() {
        let session = session();
        let out = run_script(
            &session,
            "doctor store p1 flu\n\
             attacker corrupt p1 3\n\
             admin retrieve p1\n\
             admin retrieve nobody\n\
             system setstate RECOVERY\n",
        );
        assert!(out.contains("UNAVAILABLE: insufficient shards"));
        assert!(out.contains("REFUSED: record not found: nobody"));
        assert!(out.contains("REFUSED: invalid state transition NORMAL -> RECOVERY"));
    }

    #[test]
    fn audit_log_lists_every_operation() {
        let session = session();
        run_script(&session, "doctor store p1 flu\nadmin retrieve p1\n");
        let log = session.execute(Command::AuditLog).unwrap();
        assert!(log.starts_with("=== AUDIT LOG ==="));
        assert!(log.contains("[doctor] [STORE] [SUCCESS] p1"));
        assert!(log.contains("[admin] [RETRIEVE] [SUCCESS] p1"));
        let changes = session.execute(Command::ChangeLog).unwrap();
        assert!(changes.contains("NULL -> flu"));
    }

    #[test]
    fn metrics_follow_the_session() {
        let session = session();
        run_script(&session, "doctor store p1 flu\nsystem setstate UNDER_ATTACK\n");
        let text = session.execute(Command::Metrics).unwrap();
        assert!(text.contains("rase_system_state 1"));
        assert!(text.contains(r#"rase_operations_total{operation="store",outcome="success"} 1"#));
    }
}
