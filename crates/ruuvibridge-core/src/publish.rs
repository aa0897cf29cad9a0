//! Publisher abstraction.
//!
//! The pipeline talks to the broker set through this trait so tests can run
//! against a recording mock while the service wires in the real MQTT fanout.

use async_trait::async_trait;

use crate::error::Result;

/// Something that can deliver a message to every connected broker endpoint.
///
/// Implementations must isolate per-endpoint failures: a publish succeeds as
/// long as at least one endpoint accepted it, and errors only when delivery
/// could not be handed to any endpoint at all.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic` to every connected endpoint.
    ///
    /// `retain` marks the message for retention on the broker so
    /// late-joining subscribers (a restarted hub) still see it.
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;
}
