//! # Configuration & Constants
//!
//! Every magic number in RaSe lives here, next to the serde-loadable
//! [`StoreConfig`] that groups the knobs an operator may actually turn.
//!
//! The defaults reproduce the deployment the system was designed around:
//! 4 data + 2 parity shards per record and a 3-of-5 key split. Changing the
//! erasure layout after records exist makes those records undecodable, so
//! treat it as fixed per data directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Erasure Coding
// ---------------------------------------------------------------------------

/// Data shards per record (`K`). Any `K` surviving shards rebuild the payload.
pub const DEFAULT_DATA_SHARDS: usize = 4;

/// Parity shards per record (`N - K`). The record survives this many losses.
pub const DEFAULT_PARITY_SHARDS: usize = 2;

/// Upper bound on `N`. The Vandermonde columns are `α^j` for `j < K`, and
/// there are only 255 distinct nonzero powers.
pub const MAX_TOTAL_SHARDS: usize = 255;

/// Largest number of parity-block minors the coder will check at
/// construction. A layout needing more is refused. The count is
/// `C(N, K) - 1`: 10+6 needs 8007, 12+8 needs 125969.
pub const MAX_LAYOUT_CHECK_MINORS: usize = 65_536;

// ---------------------------------------------------------------------------
// Secret Sharing
// ---------------------------------------------------------------------------

/// Key-shares required to reconstruct a record key.
pub const DEFAULT_KEY_THRESHOLD: usize = 3;

/// Key-shares issued per record key.
pub const DEFAULT_KEY_SHARES: usize = 5;

/// Size of a freshly generated record key, in bits.
pub const KEY_BITS: u64 = 256;

/// Random Miller-Rabin rounds run on top of the fixed small-prime bases.
/// Error probability is at most 4^-rounds per composite.
pub const MILLER_RABIN_ROUNDS: usize = 24;

// ---------------------------------------------------------------------------
// State Machine
// ---------------------------------------------------------------------------

/// While UNDER_ATTACK, every n-th guarded operation fails. 0 disables.
pub const DEFAULT_ATTACK_FAIL_EVERY: u64 = 2;

/// User name recorded for operations the system performs on its own behalf.
pub const SYSTEM_USER: &str = "system";

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`StoreConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Erasure layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErasureParams {
    /// `K`.
    pub data_shards: usize,
    /// `N - K`.
    pub parity_shards: usize,
}

impl Default for ErasureParams {
    fn default() -> Self {
        Self {
            data_shards: DEFAULT_DATA_SHARDS,
            parity_shards: DEFAULT_PARITY_SHARDS,
        }
    }
}

/// Key split parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingParams {
    /// Shares needed to reconstruct.
    pub threshold: usize,
    /// Shares issued.
    pub total_shares: usize,
}

impl Default for SharingParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_KEY_THRESHOLD,
            total_shares: DEFAULT_KEY_SHARES,
        }
    }
}

/// Injected-failure schedule while the system is UNDER_ATTACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Fail every n-th guarded operation; 0 never fails.
    pub fail_every: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            fail_every: DEFAULT_ATTACK_FAIL_EVERY,
        }
    }
}

/// Which persistence backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process memory only.
    #[default]
    Memory,
    /// sled database on disk.
    Sled,
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend selection.
    pub kind: BackendKind,
    /// Database directory; required for [`BackendKind::Sled`].
    pub path: Option<PathBuf>,
}

/// Journal file locations. `None` disables that journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Append-only audit log.
    pub audit_path: Option<PathBuf>,
    /// Append-only change log.
    pub changes_path: Option<PathBuf>,
}

/// Everything needed to stand up a record store.
///
/// Every section has defaults, so a config file only needs the fields it
/// overrides:
///
/// ```
/// use rase_protocol::config::{BackendKind, StoreConfig};
///
/// let cfg = StoreConfig::from_json(r#"{ "backend": { "kind": "sled", "path": "/tmp/rase" } }"#).unwrap();
/// assert_eq!(cfg.backend.kind, BackendKind::Sled);
/// assert_eq!(cfg.erasure.data_shards, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Erasure layout.
    pub erasure: ErasureParams,
    /// Key split.
    pub sharing: SharingParams,
    /// Duty cycle while under attack.
    pub attack: AttackConfig,
    /// Persistence.
    pub backend: BackendConfig,
    /// Audit and change journals.
    pub journal: JournalConfig,
}

impl StoreConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Range checks that do not need the engines. The erasure coder still
    /// runs its own recoverability check when the store is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.erasure;
        if e.data_shards == 0 || e.parity_shards == 0 {
            return Err(ConfigError::Invalid(
                "erasure layout needs at least one data and one parity shard".into(),
            ));
        }
        if e.data_shards + e.parity_shards > MAX_TOTAL_SHARDS {
            return Err(ConfigError::Invalid(format!(
                "at most {MAX_TOTAL_SHARDS} shards per record"
            )));
        }
        let s = &self.sharing;
        if s.threshold < 2 || s.total_shares < s.threshold {
            return Err(ConfigError::Invalid(format!(
                "key split {}-of-{} needs 2 <= threshold <= total",
                s.threshold, s.total_shares
            )));
        }
        if self.backend.kind == BackendKind::Sled && self.backend.path.is_none() {
            return Err(ConfigError::Invalid("sled backend requires a path".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_deployment() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.erasure.data_shards, 4);
        assert_eq!(cfg.erasure.parity_shards, 2);
        assert_eq!(cfg.sharing.threshold, 3);
        assert_eq!(cfg.sharing.total_shares, 5);
        assert_eq!(cfg.attack.fail_every, 2);
        assert_eq!(cfg.backend.kind, BackendKind::Memory);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_document_is_all_defaults() {
        assert_eq!(StoreConfig::from_json("{}").unwrap(), StoreConfig::default());
    }

    #[test]
    fn partial_sections_override_only_their_fields() {
        let cfg = StoreConfig::from_json(
            r#"{ "sharing": { "threshold": 2, "total_shares": 3 }, "attack": { "fail_every": 0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.sharing.threshold, 2);
        assert_eq!(cfg.attack.fail_every, 0);
        assert_eq!(cfg.erasure, ErasureParams::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(StoreConfig::from_json(r#"{ "sharing": { "threshold": 1, "total_shares": 3 } }"#).is_err());
        assert!(StoreConfig::from_json(r#"{ "sharing": { "threshold": 4, "total_shares": 3 } }"#).is_err());
        assert!(StoreConfig::from_json(r#"{ "erasure": { "data_shards": 0, "parity_shards": 2 } }"#).is_err());
        assert!(StoreConfig::from_json(r#"{ "backend": { "kind": "sled" } }"#).is_err());
        assert!(StoreConfig::from_json("not json").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rase.json");
        std::fs::write(&path, r#"{ "erasure": { "data_shards": 3, "parity_shards": 2 } }"#).unwrap();
        let cfg = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.erasure.data_shards, 3);
        assert!(matches!(
            StoreConfig::from_json_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
