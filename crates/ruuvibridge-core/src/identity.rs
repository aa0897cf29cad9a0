//! Sensor identity resolution.
//!
//! Maps raw beacon addresses to human-readable room labels. An unmapped
//! address is not an error: it gets a synthesized `Sensor-<address>` label,
//! one warning, and one line in the append-only unknown-sensor log so the
//! operator can add it to the configuration later.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use ruuvibridge_types::SensorIdentity;

/// Resolves beacon addresses to sensor identities.
///
/// Resolution is stable for the process lifetime: the first lookup of an
/// address fixes its identity (including a synthesized label), and repeated
/// lookups return the same result without re-logging.
pub struct IdentityResolver {
    /// Configured address-to-label mapping.
    mapping: HashMap<String, String>,
    /// Append-only log for addresses with no configured label.
    unknown_log: PathBuf,
    /// Identities already handed out this run.
    resolved: Mutex<HashMap<String, SensorIdentity>>,
}

impl IdentityResolver {
    /// Create a resolver from the configured mapping.
    pub fn new(mapping: HashMap<String, String>, unknown_log: impl Into<PathBuf>) -> Self {
        Self {
            mapping,
            unknown_log: unknown_log.into(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a raw beacon address to its identity.
    pub fn resolve(&self, raw_address: &str) -> SensorIdentity {
        if let Some(identity) = self
            .resolved
            .lock()
            .expect("identity map lock poisoned")
            .get(raw_address)
        {
            return identity.clone();
        }

        let identity = match self.mapping.get(raw_address) {
            Some(label) => {
                debug!("resolved {} to configured label {}", raw_address, label);
                SensorIdentity::mapped(raw_address, label)
            }
            None => {
                let label = format!("Sensor-{}", normalize_address(raw_address));
                warn!(
                    "no label configured for {}, using topic home/{}",
                    raw_address, label
                );
                record_unknown(&self.unknown_log, &label, raw_address);
                SensorIdentity::generated(raw_address, label)
            }
        };

        self.resolved
            .lock()
            .expect("identity map lock poisoned")
            .insert(raw_address.to_string(), identity.clone());
        identity
    }

    /// Number of distinct addresses resolved this run.
    pub fn resolved_count(&self) -> usize {
        self.resolved
            .lock()
            .expect("identity map lock poisoned")
            .len()
    }
}

/// Strip separator characters from a beacon address.
fn normalize_address(raw: &str) -> String {
    raw.chars().filter(|c| *c != ':' && *c != '-').collect()
}

/// Append `<isoTimestamp> <label> <rawAddress>` to the unknown-sensor log.
///
/// Fire-and-forget: an unwritable log costs a warning, never a reading.
fn record_unknown(path: &Path, label: &str, raw_address: &str) {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown-time"));

    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{timestamp} {label} {raw_address}"));

    if let Err(e) = result {
        warn!(
            "failed to record unknown sensor {} in {}: {}",
            raw_address,
            path.display(),
            e
        );
    }
}
