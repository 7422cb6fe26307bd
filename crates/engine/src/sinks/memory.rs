//! Recording sink: a test double that captures published payloads and can
//! be flipped into a failing mode to exercise delivery-error handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::ChannelSink;

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, Value)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Everything published so far, as (target, payload) pairs.
    pub fn published(&self) -> Vec<(String, Value)> {
        self.events.lock().expect("recording sink lock").clone()
    }
}

#[async_trait]
impl ChannelSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, target: &str, payload: &Value) -> Result<(), anyhow::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("simulated delivery error"));
        }
        self.events
            .lock()
            .expect("recording sink lock")
            .push((target.to_string(), payload.clone()));
        Ok(())
    }
}
