// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Repeated, cancellable device polling on top of [`TimedOperation`].
//!
//! A poll runs up to `max_attempts` attempts strictly one after another and
//! delivers a single [`PollReport`] through its [`PollHandle`]. Only one poll may
//! be active at a time. Cancellation is cooperative: it is sampled before each
//! attempt and again once an attempt has finished, so an attempt already in
//! flight runs to completion or to its deadline, and its result is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{validate_attempts, validate_deadline};
use crate::definitions::{AttemptResult, OperationOutcome, OperationPayload, OperationRequest, PollId, PollReport};
use crate::errors::BridgeError;
use crate::timed_operation::TimedOperation;

/// Lifecycle of the poll slot.
///
/// `Reporting` and `Cancelled` are passed through while the slot lock is held
/// and always end in `Idle`, so [`PollController::phase`] only ever returns
/// `Idle` or `Polling`. Their transitions show up in the debug log and as
/// [`PollEvent::Reported`] and [`PollEvent::Cancelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    #[default]
    Idle,
    Polling,
    Reporting,
    Cancelled,
}

/// Events broadcast by the [`PollController`] as polls progress.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A poll was accepted and its first attempt is about to start.
    Started { id: PollId, max_attempts: u32 },

    /// One attempt of a poll resolved.
    AttemptFinished { id: PollId, attempt: u32, result: AttemptResult<OperationPayload> },

    /// The final report was handed over to the poll caller.
    Reported { id: PollId, report: PollReport },

    /// The poll was cancelled; nothing is delivered to the poll caller.
    Cancelled { id: PollId },
}

struct ActivePoll {
    id: PollId,
    cancel: CancellationToken,
}

#[derive(Default)]
struct PollSlot {
    phase: PollPhase,
    active: Option<ActivePoll>,
}

type SharedSlot = Arc<Mutex<PollSlot>>;

fn set_phase(slot: &mut PollSlot, phase: PollPhase) {
    if slot.phase != phase {
        debug!("Poll phase {:?} -> {:?}", slot.phase, phase);
        slot.phase = phase;
    }
}

/// Caller side of an accepted poll.
pub struct PollHandle {
    id: PollId,
    outcome: oneshot::Receiver<PollReport>,
}

impl PollHandle {
    pub fn id(&self) -> PollId {
        self.id
    }

    /// Waits for the final report. Returns `None` when the poll was cancelled.
    pub async fn wait(self) -> Option<PollReport> {
        self.outcome.await.ok()
    }
}

/// Drives polls of a [`TimedOperation`], one poll at a time.
pub struct PollController {
    operation: TimedOperation,
    slot: SharedSlot,
    next_id: AtomicU64,
    event_sender: broadcast::Sender<PollEvent>,
}

impl PollController {
    pub fn new(operation: TimedOperation) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            operation,
            slot: Arc::new(Mutex::new(PollSlot::default())),
            next_id: AtomicU64::new(1),
            event_sender,
        }
    }

    /// Accepts a poll and spawns its attempt loop on the current tokio runtime.
    ///
    /// Fails without starting any timer when the parameters are invalid or when
    /// another poll is still active; the active poll is left untouched.
    pub fn start_poll(&self, request: OperationRequest, max_attempts: u32, per_attempt_timeout: Duration)
        -> Result<PollHandle, BridgeError> {
        validate_attempts(max_attempts)?;
        validate_deadline("per-attempt timeout", per_attempt_timeout)?;

        let (id, cancel) = {
            let mut slot = self.slot.lock().unwrap();
            if let Some(active) = &slot.active {
                warn!("Ignoring poll request, {} is still active", active.id);
                return Err(BridgeError::AlreadyPolling(active.id));
            }
            let id = PollId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let cancel = CancellationToken::new();
            slot.active = Some(ActivePoll { id, cancel: cancel.clone() });
            set_phase(&mut slot, PollPhase::Polling);
            (id, cancel)
        };

        info!("{} started: {} (up to {} attempts, {:?} each)", id, request, max_attempts, per_attempt_timeout);
        let _ = self.event_sender.send(PollEvent::Started { id, max_attempts });

        let (reply_tx, reply_rx) = oneshot::channel();
        let task = PollTask {
            id,
            request,
            max_attempts,
            per_attempt_timeout,
            operation: self.operation.clone(),
            cancel,
            slot: self.slot.clone(),
            event_sender: self.event_sender.clone(),
        };
        tokio::spawn(task.run(reply_tx));

        Ok(PollHandle { id, outcome: reply_rx })
    }

    /// Requests cancellation of poll `id`.
    ///
    /// The slot is released right away so that a new poll may start; the
    /// cancelled poll stops at its next attempt boundary.
    pub fn cancel(&self, id: PollId) -> Result<(), BridgeError> {
        let mut slot = self.slot.lock().unwrap();
        match &slot.active {
            Some(active) if active.id == id => {
                Self::cancel_locked(&mut slot);
                Ok(())
            }
            _ => Err(BridgeError::UnknownPoll(id)),
        }
    }

    /// Cancels whichever poll is active. Returns its id, if there was one.
    pub fn cancel_active(&self) -> Option<PollId> {
        let mut slot = self.slot.lock().unwrap();
        Self::cancel_locked(&mut slot)
    }

    fn cancel_locked(slot: &mut PollSlot) -> Option<PollId> {
        let active = slot.active.take()?;
        active.cancel.cancel();
        set_phase(slot, PollPhase::Cancelled);
        set_phase(slot, PollPhase::Idle);
        info!("{} cancellation requested", active.id);
        Some(active.id)
    }

    pub fn is_active(&self, id: PollId) -> bool {
        self.active_poll() == Some(id)
    }

    pub fn active_poll(&self) -> Option<PollId> {
        self.slot.lock().unwrap().active.as_ref().map(|active| active.id)
    }

    /// `Polling` while a poll owns the slot, `Idle` otherwise.
    pub fn phase(&self) -> PollPhase {
        self.slot.lock().unwrap().phase
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_sender.subscribe()
    }
}

struct PollTask {
    id: PollId,
    request: OperationRequest,
    max_attempts: u32,
    per_attempt_timeout: Duration,
    operation: TimedOperation,
    cancel: CancellationToken,
    slot: SharedSlot,
    event_sender: broadcast::Sender<PollEvent>,
}

impl PollTask {
    async fn run(self, reply: oneshot::Sender<PollReport>) {
        let started = Instant::now();
        let mut attempts_remaining = self.max_attempts;
        let mut attempts = 0u32;
        let mut timeouts = 0u32;

        let outcome = loop {
            // Cancellation wins over anything an attempt produced.
            if self.cancel.is_cancelled() {
                break None;
            }

            attempts_remaining -= 1;
            attempts += 1;
            debug!("{} attempt {}/{}", self.id, attempts, self.max_attempts);

            let result = match self.operation.run(&self.request, self.per_attempt_timeout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("{} attempt {} rejected: {}", self.id, attempts, e);
                    AttemptResult::Failed(e.to_string())
                }
            };
            if result.is_timed_out() {
                timeouts += 1;
            }
            let found = result.is_found();
            let _ = self.event_sender.send(PollEvent::AttemptFinished { id: self.id, attempt: attempts, result: result.clone() });

            if self.cancel.is_cancelled() {
                break None;
            }
            if found || attempts_remaining == 0 {
                break Some(result.into_outcome());
            }
        };

        match outcome {
            Some(outcome) => self.report(reply, outcome, attempts, timeouts, started.elapsed()),
            None => self.finish_cancelled(),
        }
    }

    fn report(&self, reply: oneshot::Sender<PollReport>, outcome: OperationOutcome, attempts: u32, timeouts: u32, elapsed: Duration) {
        let report = PollReport { outcome, attempts, timeouts, elapsed };
        {
            let mut slot = self.slot.lock().unwrap();
            // A cancel may have landed after the last check; it has priority.
            if self.cancel.is_cancelled() {
                drop(slot);
                self.finish_cancelled();
                return;
            }
            set_phase(&mut slot, PollPhase::Reporting);
            slot.active = None;
            set_phase(&mut slot, PollPhase::Idle);
        }

        info!("{} finished after {} attempt(s) ({} timed out): found={}", self.id, attempts, timeouts, report.outcome.is_found());
        let _ = self.event_sender.send(PollEvent::Reported { id: self.id, report: report.clone() });
        if reply.send(report).is_err() {
            debug!("{} caller went away before the report was delivered", self.id);
        }
    }

    fn finish_cancelled(&self) {
        {
            let mut slot = self.slot.lock().unwrap();
            if slot.active.as_ref().is_some_and(|active| active.id == self.id) {
                slot.active = None;
                set_phase(&mut slot, PollPhase::Cancelled);
                set_phase(&mut slot, PollPhase::Idle);
            }
        }
        info!("{} cancelled", self.id);
        let _ = self.event_sender.send(PollEvent::Cancelled { id: self.id });
    }
}
