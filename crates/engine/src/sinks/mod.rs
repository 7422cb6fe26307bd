//! Push-channel collaborator port and adapters.
//!
//! Stream steps publish context snapshots through a `ChannelSink`. Delivery
//! is best-effort: the runner logs and swallows publish errors, so sink
//! implementations are free to fail loudly.

pub mod memory;
pub mod stdout;
pub mod webhook;

pub use memory::RecordingSink;
pub use stdout::StdoutSink;
pub use webhook::WebhookSink;

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait ChannelSink: Send + Sync {
    fn name(&self) -> &str;

    /// Publish a payload to the named target channel.
    async fn publish(&self, target: &str, payload: &Value) -> Result<(), anyhow::Error>;
}
