//! Client tunables
// (c) 2025 Ross Younger
//!
//! Everything here has a sensible system default; a deployment only needs a
//! config file when its link timing is unusual (very slow radio links, or
//! remotes with slow storage). Values are read, in increasing priority, from
//! built-in defaults, then `linkftp.toml` in the working directory, then
//! `LINKFTP_`-prefixed environment variables.

use std::time::Duration;

use figment::providers::{Env, Format as _, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::protocol::packet::DATA_MAXSZ;

/// Default config file, looked for in the working directory
const CONFIG_FILE: &str = "linkftp.toml";
/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "LINKFTP_";

/// Per-operation deadlines, in milliseconds.
///
/// The defaults assume roughly a 57600-baud telemetry link, allowing four
/// times the airtime of a single frame per round trip.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Directory listings; remote directory scans can be large
    pub list_ms: u64,
    /// Single command/acknowledge round trips (open, close, remove, ...)
    pub ack_ms: u64,
    /// Allowance per transferred chunk of a read or write
    pub chunk_ms: u64,
    /// File truncation; the remote may have to rewrite the file
    pub truncate_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            list_ms: 5000,
            ack_ms: 200,
            chunk_ms: 200,
            truncate_ms: 25_000,
        }
    }
}

impl Timeouts {
    /// Reads the effective configuration from defaults, file and environment
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::figment().extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub(crate) fn list(&self) -> Duration {
        Duration::from_millis(self.list_ms)
    }

    pub(crate) fn ack(&self) -> Duration {
        Duration::from_millis(self.ack_ms)
    }

    pub(crate) fn truncate(&self) -> Duration {
        Duration::from_millis(self.truncate_ms)
    }

    /// Checksumming walks the whole file remotely; allow it a listing's worth
    pub(crate) fn checksum(&self) -> Duration {
        self.list()
    }

    /// Deadline for a read or write of `len` bytes, scaling with the number
    /// of chunk round trips it needs
    pub(crate) fn transfer(&self, len: usize) -> Duration {
        let chunks = u64::try_from(len.div_ceil(DATA_MAXSZ)).unwrap_or(u64::MAX);
        Duration::from_millis(self.chunk_ms.saturating_mul(chunks.saturating_add(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::Timeouts;
    use crate::protocol::packet::DATA_MAXSZ;
    use figment::providers::{Format as _, Serialized, Toml};
    use figment::Figment;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let t = Timeouts::default();
        assert_eq!(t.ack(), Duration::from_millis(200));
        assert_eq!(t.list(), Duration::from_millis(5000));
        assert_eq!(t.truncate(), Duration::from_millis(25_000));
    }

    #[test]
    fn transfer_deadline_scales_with_chunks() {
        let t = Timeouts::default();
        // 700 bytes is three chunks, plus one interval of slack
        assert_eq!(t.transfer(700), Duration::from_millis(800));
        assert_eq!(t.transfer(0), Duration::from_millis(200));
        assert_eq!(t.transfer(DATA_MAXSZ), Duration::from_millis(400));
    }

    #[test]
    fn file_overrides_defaults() {
        let fig = Figment::from(Serialized::defaults(Timeouts::default()))
            .merge(Toml::string("ack_ms = 750"));
        let t: Timeouts = fig.extract().unwrap();
        assert_eq!(t.ack_ms, 750);
        assert_eq!(t.list_ms, 5000);
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkftp.toml");
        std::fs::write(&path, "chunk_ms = 1000\n").unwrap();
        let fig = Figment::from(Serialized::defaults(Timeouts::default()))
            .merge(Toml::file(&path));
        let t: Timeouts = fig.extract().unwrap();
        assert_eq!(t.chunk_ms, 1000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let fig = Figment::from(Serialized::defaults(Timeouts::default()))
            .merge(Toml::string("no_such_knob = 1"));
        assert!(fig.extract::<Timeouts>().is_err());
    }
}
