//! Shared fixtures for directory flow integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use prospect_directory_flow::{
    AdditionalDetailsLookup, FinalPayload, FormSnapshot, LookupError, LookupRequest,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// One scripted lookup response.
pub struct Step {
    delay: Duration,
    outcome: Result<Value, String>,
}

impl Step {
    pub fn ok(payload: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(payload),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(message.to_string()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Lookup that replays scripted steps in call order and records requests.
/// Once the script runs out it answers immediately with `null`.
#[derive(Default)]
pub struct ScriptedLookup {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<LookupRequest>>,
}

impl ScriptedLookup {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<LookupRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AdditionalDetailsLookup for ScriptedLookup {
    async fn fetch(&self, request: &LookupRequest) -> Result<Value, LookupError> {
        self.calls.lock().unwrap().push(request.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::ok(Value::Null));

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.outcome.map_err(LookupError::Other)
    }
}

pub fn firm(name: &str) -> FormSnapshot {
    FormSnapshot::new("b1", "bank", "FIRM").with_field("FIRM", "firmName", name)
}

/// Wait (in paused time) for the next published payload.
pub async fn next_payload(rx: &mut broadcast::Receiver<FinalPayload>) -> FinalPayload {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for a final payload")
        .expect("final payload channel closed")
}

/// Let every pending debounce and scripted delay run out.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(30)).await;
}

/// Everything published so far that has not been received yet.
pub fn drain(rx: &mut broadcast::Receiver<FinalPayload>) -> Vec<FinalPayload> {
    let mut out = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        out.push(payload);
    }
    out
}
