//! The reading pipeline.
//!
//! Orchestrates one incoming reading end to end: resolve the sensor
//! identity, give the resend scheduler its cooperative tick, publish
//! discovery metadata if the cache says it is missing, enrich the reading,
//! and fan it out to the brokers. Every failure on the way is per-reading:
//! logged, dropped, and the loop moves on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use ruuvibridge_types::{DiscoveryPayload, SensorIdentity, declared_fields};

use crate::discovery::DiscoveryCache;
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::publish::Publisher;
use crate::resend::ResendScheduler;

/// Field map of one reading, as decoded from the beacon.
pub type FieldMap = serde_json::Map<String, Value>;

/// Pipeline behavior knobs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Hostname of this gateway, used for the `client` field and the
    /// hostname-scoped signal-strength key.
    pub hostname: String,
    /// Prefix of the reading topic (`<prefix>/<label>`).
    pub reading_topic_prefix: String,
    /// Prefix of the discovery topic (`<prefix>/<label>_<field>/config`).
    pub discovery_topic_prefix: String,
    /// Additionally publish every field to `<label>/<field>`.
    pub single_values: bool,
}

impl PipelineOptions {
    /// Options with default topic prefixes for a gateway host.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            reading_topic_prefix: "home".to_string(),
            discovery_topic_prefix: "discovery".to_string(),
            single_values: false,
        }
    }

    /// Set the reading topic prefix.
    pub fn reading_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reading_topic_prefix = prefix.into();
        self
    }

    /// Set the discovery topic prefix.
    pub fn discovery_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.discovery_topic_prefix = prefix.into();
        self
    }

    /// Enable or disable per-field fan-out.
    pub fn single_values(mut self, enable: bool) -> Self {
        self.single_values = enable;
        self
    }
}

/// Last-reading bookkeeping for the silence watchdog.
struct LastSeen {
    any: Instant,
    per_address: HashMap<String, Instant>,
}

/// Processes readings one at a time.
///
/// The pipeline is the single consumer of the reading stream; cache and
/// scheduler state is shared with the broker event dispatch, which is why
/// those components carry their own short-lived locks. No lock is ever held
/// across a publish.
pub struct ReadingPipeline {
    resolver: IdentityResolver,
    cache: Arc<DiscoveryCache>,
    scheduler: Arc<ResendScheduler>,
    publisher: Arc<dyn Publisher>,
    options: PipelineOptions,
    last_seen: Mutex<LastSeen>,
}

impl ReadingPipeline {
    /// Wire up a pipeline from its collaborators.
    pub fn new(
        resolver: IdentityResolver,
        cache: Arc<DiscoveryCache>,
        scheduler: Arc<ResendScheduler>,
        publisher: Arc<dyn Publisher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver,
            cache,
            scheduler,
            publisher,
            options,
            last_seen: Mutex::new(LastSeen {
                any: Instant::now(),
                per_address: HashMap::new(),
            }),
        }
    }

    /// Process one reading. Never fails; per-reading errors are logged and
    /// the reading dropped.
    pub async fn process(&self, raw_address: &str, fields: FieldMap) {
        let identity = self.resolver.resolve(raw_address);
        self.scheduler.tick(Instant::now());

        if self.cache.should_publish(&identity.label) {
            match self.publish_discovery(&identity, &fields).await {
                Ok(()) => self.cache.mark_published(&identity.label),
                Err(e) => warn!("discovery publish for {} failed: {}", identity.label, e),
            }
        }

        let topic = format!("{}/{}", self.options.reading_topic_prefix, identity.label);
        let enriched = self.enrich(&identity, fields);

        match serde_json::to_vec(&enriched) {
            Ok(payload) => {
                debug!("publishing reading for {} to {}", identity.label, topic);
                if let Err(e) = self.publisher.publish(&topic, payload, false).await {
                    warn!("failed to publish reading for {}: {}", identity.label, e);
                }
            }
            Err(e) => {
                warn!("failed to serialize reading for {}: {}", identity.label, e);
                self.mark_seen(raw_address);
                return;
            }
        }

        if self.options.single_values {
            self.publish_single_values(&identity.label, &enriched).await;
        }

        self.mark_seen(raw_address);
    }

    /// Publish one retained discovery message per declared field class.
    ///
    /// Every field in the table is attempted before the caller may mark the
    /// label published; an endpoint refusing a single message is logged and
    /// does not stop the rest of the table.
    async fn publish_discovery(&self, identity: &SensorIdentity, fields: &FieldMap) -> Result<()> {
        let mac = fields
            .get("mac")
            .and_then(Value::as_str)
            .unwrap_or(&identity.raw_address);
        let state_topic = format!("{}/{}", self.options.reading_topic_prefix, identity.label);

        let table = declared_fields(&self.options.hostname);
        for field in &table {
            let payload = DiscoveryPayload::for_field(&identity.label, mac, &state_topic, field);
            let topic = format!(
                "{}/{}_{}/config",
                self.options.discovery_topic_prefix, identity.label, field.name
            );
            let body = serde_json::to_vec(&payload)?;
            if let Err(e) = self.publisher.publish(&topic, body, true).await {
                warn!("discovery publish to {} failed: {}", topic, e);
            }
        }

        info!(
            "published discovery metadata for {} ({} fields)",
            identity.label,
            table.len()
        );
        Ok(())
    }

    /// Enrich the raw field map with identity, host, and timestamp fields.
    ///
    /// Fields missing from the reading (including `rssi`) are simply absent
    /// from the output; enrichment never fails a reading.
    fn enrich(&self, identity: &SensorIdentity, mut fields: FieldMap) -> FieldMap {
        let now = OffsetDateTime::now_utc();

        fields.insert("room".to_string(), Value::from(identity.label.clone()));
        fields.insert(
            "client".to_string(),
            Value::from(self.options.hostname.clone()),
        );
        fields.insert("ts".to_string(), Value::from(unix_seconds(now)));
        if let Ok(iso) = now.format(&Rfc3339) {
            fields.insert("ts_iso".to_string(), Value::from(iso));
        }
        if let Some(rssi) = fields.get("rssi").cloned() {
            fields.insert(format!("rssi_{}", self.options.hostname), rssi);
        }

        fields
    }

    /// Publish every enriched field to its own `<label>/<field>` sub-topic.
    async fn publish_single_values(&self, label: &str, fields: &FieldMap) {
        for (key, value) in fields {
            let topic = format!("{label}/{key}");
            let payload = scalar_payload(value);
            if let Err(e) = self.publisher.publish(&topic, payload, false).await {
                warn!("failed to publish {} for {}: {}", key, label, e);
            }
        }
    }

    fn mark_seen(&self, raw_address: &str) {
        let now = Instant::now();
        let mut seen = self.last_seen.lock().expect("last-seen lock poisoned");
        seen.any = now;
        seen.per_address.insert(raw_address.to_string(), now);
    }

    /// Time since any reading was processed (since startup when none yet).
    pub fn last_reading_age(&self) -> Duration {
        self.last_seen
            .lock()
            .expect("last-seen lock poisoned")
            .any
            .elapsed()
    }

    /// Time since a specific sensor was last heard from.
    pub fn last_seen_for(&self, raw_address: &str) -> Option<Duration> {
        self.last_seen
            .lock()
            .expect("last-seen lock poisoned")
            .per_address
            .get(raw_address)
            .map(Instant::elapsed)
    }
}

fn unix_seconds(t: OffsetDateTime) -> f64 {
    t.unix_timestamp_nanos() as f64 / 1e9
}

/// Render one field value as a raw per-field payload.
///
/// Strings go out unquoted; everything else in its JSON form.
fn scalar_payload(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}
