//! The directory flow runtime.
//!
//! One driver task per [`DirectoryFlow`] owns every piece of pipeline state.
//! Callers and spawned lookups only talk to it through the event queue, so
//! nothing is shared and nothing needs a lock.
//!
//! Per epoch (one distinct debounced snapshot):
//!
//! ```text
//! Idle ──complete──► Resolving ──settled──► Resolved ──published──► Assembled
//!                                               │                      │
//!                                               └──manual edit──► Overridden
//! ```
//!
//! A new epoch may start from any phase and discards whatever the previous
//! one was still doing. There is no lookup timeout: a lookup that never
//! settles keeps the flow in `Resolving`.

use crate::combined::{AdditionalResult, CombinedAdditionalState};
use crate::config::FlowConfig;
use crate::errors::{FlowError, Result};
use crate::lookup::AdditionalDetailsLookup;
use crate::payload::FinalPayload;
use crate::snapshot::{FormSnapshot, RequestKey};
use chrono::Utc;
use prospect_async_utils::{CancelErr, Debounce, OrCancelExt, sleep_until_opt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where the current epoch stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochPhase {
    /// No complete snapshot to work with
    Idle,
    /// Lookup in flight
    Resolving,
    /// Lookup settled, payload not yet published
    Resolved,
    /// Payload published from resolved details
    Assembled,
    /// Manual edit owns the details until the next epoch
    Overridden,
}

enum FlowEvent {
    FormChanged(FormSnapshot),
    ManualEdit(Value),
    ResolveSettled {
        request_key: RequestKey,
        payload: Value,
    },
}

/// Handle to a running directory flow.
///
/// Must be created inside a tokio runtime. Call [`destroy`](Self::destroy)
/// when the owning feature goes away; dropping the handle does the same.
pub struct DirectoryFlow {
    events: Option<mpsc::UnboundedSender<FlowEvent>>,
    final_tx: Option<broadcast::Sender<FinalPayload>>,
    loading_rx: watch::Receiver<bool>,
    phase_rx: watch::Receiver<EpochPhase>,
    shutdown: CancellationToken,
}

impl DirectoryFlow {
    pub fn create(lookup: Arc<dyn AdditionalDetailsLookup>, config: &FlowConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (final_tx, _) = broadcast::channel(config.payload_channel_capacity.max(1));
        let (loading_tx, loading_rx) = watch::channel(false);
        let (phase_tx, phase_rx) = watch::channel(EpochPhase::Idle);
        let shutdown = CancellationToken::new();

        let driver = FlowDriver {
            lookup,
            events_tx: events_tx.clone(),
            final_tx: final_tx.clone(),
            loading_tx,
            phase_tx,
            shutdown: shutdown.clone(),
            form_debounce: Debounce::new(config.form_debounce()),
            assembly_debounce: Debounce::new(config.assembly_debounce()),
            current_form: None,
            target: None,
            combined: CombinedAdditionalState::default(),
            in_flight: None,
            last_published: None,
        };
        tokio::spawn(driver.run(events_rx));

        tracing::debug!(
            form_debounce_ms = config.form_debounce_ms,
            assembly_debounce_ms = config.assembly_debounce_ms,
            "directory flow created"
        );

        Self {
            events: Some(events_tx),
            final_tx: Some(final_tx),
            loading_rx,
            phase_rx,
            shutdown,
        }
    }

    /// Replace the current form snapshot.
    pub fn update_form_values(&self, snapshot: FormSnapshot) -> Result<()> {
        self.send(FlowEvent::FormChanged(snapshot))
    }

    /// Override the additional details for the current epoch.
    pub fn update_additional_manually(&self, payload: Value) -> Result<()> {
        self.send(FlowEvent::ManualEdit(payload))
    }

    pub fn subscribe_final_payloads(&self) -> Result<broadcast::Receiver<FinalPayload>> {
        self.final_tx
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(FlowError::Destroyed)
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading_rx.clone()
    }

    pub fn is_loading_additional(&self) -> bool {
        *self.loading_rx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<EpochPhase> {
        self.phase_rx.clone()
    }

    pub fn phase(&self) -> EpochPhase {
        *self.phase_rx.borrow()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the driver and drop every in-flight lookup. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.events = None;
        self.final_tx = None;
        tracing::debug!("directory flow destroyed");
    }

    fn send(&self, event: FlowEvent) -> Result<()> {
        let events = self.events.as_ref().ok_or(FlowError::Destroyed)?;
        events.send(event).map_err(|_| FlowError::Destroyed)
    }
}

impl Drop for DirectoryFlow {
    fn drop(&mut self) {
        self.destroy();
    }
}

struct AssemblyTarget {
    snapshot: FormSnapshot,
    request_key: RequestKey,
}

struct InFlight {
    request_key: RequestKey,
    token: CancellationToken,
}

struct FlowDriver {
    lookup: Arc<dyn AdditionalDetailsLookup>,
    events_tx: mpsc::UnboundedSender<FlowEvent>,
    final_tx: broadcast::Sender<FinalPayload>,
    loading_tx: watch::Sender<bool>,
    phase_tx: watch::Sender<EpochPhase>,
    shutdown: CancellationToken,

    form_debounce: Debounce<FormSnapshot>,
    assembly_debounce: Debounce<FinalPayload>,
    /// Last distinct debounced snapshot
    current_form: Option<FormSnapshot>,
    /// Complete snapshot the assembler is waiting to pair, if any
    target: Option<AssemblyTarget>,
    combined: CombinedAdditionalState,
    in_flight: Option<InFlight>,
    last_published: Option<FinalPayload>,
}

impl FlowDriver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<FlowEvent>) {
        loop {
            let form_deadline = self.form_debounce.deadline();
            let assembly_deadline = self.assembly_debounce.deadline();

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = sleep_until_opt(form_deadline) => {
                    if let Some(snapshot) = self.form_debounce.take_due(Instant::now()) {
                        self.on_form_settled(snapshot);
                    }
                }
                _ = sleep_until_opt(assembly_deadline) => self.publish_due(),
            }
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
        }
        tracing::debug!("directory flow driver stopped");
    }

    fn handle(&mut self, event: FlowEvent) {
        match event {
            FlowEvent::FormChanged(snapshot) => self.on_form_change(snapshot),
            FlowEvent::ManualEdit(payload) => self.on_manual_edit(payload),
            FlowEvent::ResolveSettled {
                request_key,
                payload,
            } => self.on_resolve_settled(request_key, payload),
        }
    }

    fn on_form_change(&mut self, snapshot: FormSnapshot) {
        self.form_debounce.push(snapshot, Instant::now());
    }

    /// A snapshot survived the form debounce.
    fn on_form_settled(&mut self, snapshot: FormSnapshot) {
        if self.current_form.as_ref() == Some(&snapshot) {
            tracing::debug!("form snapshot unchanged, skipping");
            return;
        }

        let request_key = snapshot.request_key();
        if self.assembly_debounce.clear().is_some() {
            tracing::debug!("new form epoch discarded a pending payload");
        }

        if snapshot.is_complete() {
            self.start_resolve(&snapshot, request_key.clone());
            self.target = Some(AssemblyTarget {
                snapshot: snapshot.clone(),
                request_key,
            });
        } else {
            // An in-flight lookup is left alone; it still settles the loading flag.
            tracing::debug!("form snapshot incomplete, not resolving");
            self.target = None;
            self.set_phase(EpochPhase::Idle);
        }

        self.current_form = Some(snapshot);
        self.try_assemble();
    }

    fn start_resolve(&mut self, snapshot: &FormSnapshot, request_key: RequestKey) {
        let Some(request) = snapshot.lookup_request() else {
            return;
        };

        if let Some(previous) = self.in_flight.take() {
            tracing::debug!("superseding in-flight additional details lookup");
            previous.token.cancel();
        }

        self.set_loading(true);
        self.set_phase(EpochPhase::Resolving);

        let token = self.shutdown.child_token();
        let lookup = Arc::clone(&self.lookup);
        let events = self.events_tx.clone();
        let settle_key = request_key.clone();
        let task_token = token.clone();

        tokio::spawn(async move {
            let payload = match lookup.fetch(&request).or_cancel(&task_token).await {
                Err(CancelErr::Cancelled) => return,
                Ok(Ok(payload)) => payload,
                Ok(Err(err)) => {
                    tracing::warn!(
                        error = %err,
                        entity_type = %request.entity_type,
                        "additional details lookup failed, continuing without details"
                    );
                    Value::Null
                }
            };
            let _ = events.send(FlowEvent::ResolveSettled {
                request_key: settle_key,
                payload,
            });
        });

        self.in_flight = Some(InFlight { request_key, token });
    }

    fn on_resolve_settled(&mut self, request_key: RequestKey, payload: Value) {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.request_key == request_key);
        if !current {
            tracing::debug!("dropping superseded additional details result");
            return;
        }
        self.in_flight = None;

        self.combined = std::mem::take(&mut self.combined).fold(AdditionalResult::Resolved {
            payload,
            request_key,
        });
        self.set_loading(false);
        if let Some(target) = &self.target {
            // A same-epoch edit made while loading keeps precedence.
            let phase = if self.combined.has_manual_override
                && self.combined.matches(&target.request_key)
            {
                EpochPhase::Overridden
            } else {
                EpochPhase::Resolved
            };
            self.set_phase(phase);
        }
        self.try_assemble();
    }

    fn on_manual_edit(&mut self, payload: Value) {
        self.combined =
            std::mem::take(&mut self.combined).fold(AdditionalResult::Manual { payload });
        if matches!(self.phase(), EpochPhase::Resolved | EpochPhase::Assembled) {
            self.set_phase(EpochPhase::Overridden);
        }
        self.try_assemble();
    }

    /// Queue a payload if the current snapshot can be paired with the
    /// combined details without mixing epochs.
    fn try_assemble(&mut self) {
        let Some(target) = &self.target else {
            return;
        };
        if self.loading() {
            return;
        }
        if !self.combined.matches(&target.request_key) {
            tracing::debug!("additional details belong to another epoch, waiting");
            return;
        }

        if let Some(payload) =
            FinalPayload::assemble(&target.snapshot, &self.combined.payload, Utc::now())
        {
            self.assembly_debounce.push(payload, Instant::now());
        }
    }

    fn publish_due(&mut self) {
        let Some(payload) = self.assembly_debounce.take_due(Instant::now()) else {
            return;
        };
        if self
            .last_published
            .as_ref()
            .is_some_and(|last| last.same_content(&payload))
        {
            tracing::debug!("final payload unchanged, not publishing");
            return;
        }

        // No subscribers is fine; the payload is still the latest one.
        let _ = self.final_tx.send(payload.clone());
        self.last_published = Some(payload);

        if self.phase() == EpochPhase::Resolved {
            self.set_phase(EpochPhase::Assembled);
        }
    }

    fn loading(&self) -> bool {
        *self.loading_tx.borrow()
    }

    fn phase(&self) -> EpochPhase {
        *self.phase_tx.borrow()
    }

    fn set_loading(&self, loading: bool) {
        self.loading_tx.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    fn set_phase(&self, phase: EpochPhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            tracing::trace!(from = ?current, to = ?phase, "epoch phase");
            *current = phase;
            true
        });
    }
}
