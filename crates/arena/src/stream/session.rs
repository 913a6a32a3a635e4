use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use super::accumulator::AgentAccumulator;
use super::decoder::{ChunkDecoder, JsonObject};
use super::metadata::RoundMetadata;
use super::snapshot::{AgentSnapshot, Snapshot};
use super::update::StreamUpdate;
use crate::client::{ArenaClient, QuestionRequest};
use crate::errors::{ArenaError, ArenaResult};
use crate::slots::SlotLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Requesting,
    Streaming,
    Finalizing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A line with the turn flag set closed the round
    Finalized,
    /// The backend reported an error line
    BackendError(String),
    /// The caller cancelled the round
    Cancelled,
    /// The connection closed before any terminal line
    Incomplete,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub outcome: RoundOutcome,
    /// Number of snapshots handed to the callback
    pub delivered: usize,
    /// Last known state of every agent
    pub agents: Vec<AgentSnapshot>,
    pub metadata: RoundMetadata,
}

/// A round that reached its final line, as handed to persistence
#[derive(Debug, Clone)]
pub struct FinalizedRound {
    pub question: String,
    pub agents: Vec<AgentSnapshot>,
    pub metadata: RoundMetadata,
}

/// Stores a finalized round. Called at most once per round.
#[async_trait]
pub trait RoundPersistence: Send + Sync {
    async fn persist(&self, round: &FinalizedRound) -> ArenaResult<()>;
}

/// Folds decoded stream lines into per-agent state.
///
/// Synchronous and transport-free: every applicable line yields exactly one
/// snapshot of the whole round. Once a terminal line (final flag or backend
/// error) has been seen, later lines are ignored.
#[derive(Debug)]
pub struct RoundAssembler {
    layout: SlotLayout,
    accumulators: Vec<AgentAccumulator>,
    metadata: RoundMetadata,
    terminal: Option<RoundOutcome>,
    delivered: usize,
}

impl RoundAssembler {
    pub fn new(layout: SlotLayout) -> Self {
        RoundAssembler {
            layout,
            accumulators: layout.slots().map(|_| AgentAccumulator::new()).collect(),
            metadata: RoundMetadata::default(),
            terminal: None,
            delivered: 0,
        }
    }

    /// Merge one wire object. Returns the snapshot to deliver, if the line produces one.
    pub fn apply_object(&mut self, object: &JsonObject) -> Option<Snapshot> {
        if self.terminal.is_some() {
            tracing::debug!("Ignoring stream line after the round closed");
            return None;
        }

        let update = StreamUpdate::from_object(object, self.layout);

        if let Some(error) = update.error {
            tracing::warn!("Backend reported an error: {}", error);
            let snapshot =
                Snapshot::failure(self.layout, self.metadata.clone(), format!("Error: {}", error));
            self.terminal = Some(RoundOutcome::BackendError(error));
            self.delivered += 1;
            return Some(snapshot);
        }

        if update.heartbeat {
            tracing::debug!(timestamp = ?update.timestamp, "Received heartbeat");
            return None;
        }

        if let Some(metadata) = &update.metadata {
            tracing::debug!(?metadata, "Received round metadata");
            self.metadata.merge(metadata);
            self.metadata.restrict_to(self.layout);
        }

        let agents = self
            .layout
            .slots()
            .zip(self.accumulators.iter_mut())
            .map(|(slot, accumulator)| {
                let (touched, explicit) = match update.agent(slot) {
                    Some(agent) => (accumulator.apply(agent), agent.updated),
                    None => (false, None),
                };
                accumulator.snapshot(slot, self.metadata.passages(slot), explicit.unwrap_or(touched))
            })
            .collect();

        if update.is_final {
            self.terminal = Some(RoundOutcome::Finalized);
        }
        self.delivered += 1;

        Some(Snapshot {
            agents,
            metadata: self.metadata.clone(),
            is_final: update.is_final,
            message: None,
        })
    }

    pub fn terminal(&self) -> Option<&RoundOutcome> {
        self.terminal.as_ref()
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn metadata(&self) -> &RoundMetadata {
        &self.metadata
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.layout
            .slots()
            .zip(self.accumulators.iter())
            .map(|(slot, accumulator)| accumulator.snapshot(slot, self.metadata.passages(slot), false))
            .collect()
    }

    /// Count a snapshot delivered from outside the line path
    fn record_delivery(&mut self) {
        self.delivered += 1;
    }

    fn into_report(self, outcome: RoundOutcome) -> RoundReport {
        RoundReport {
            outcome,
            delivered: self.delivered,
            agents: self.agents(),
            metadata: self.metadata,
        }
    }
}

/// Runs question rounds against the backend, one at a time.
///
/// Phases go `Idle → Requesting → Streaming → Finalizing → Idle`. A second
/// round started while one is in flight is rejected with [`ArenaError::Busy`].
pub struct StreamingSession {
    client: ArenaClient,
    layout: SlotLayout,
    phase: Mutex<RoundPhase>,
    persistence: Option<Box<dyn RoundPersistence>>,
}

impl StreamingSession {
    pub fn new(client: ArenaClient, layout: SlotLayout) -> Self {
        StreamingSession {
            client,
            layout,
            phase: Mutex::new(RoundPhase::Idle),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: Box<dyn RoundPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn phase(&self) -> RoundPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: RoundPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn claim(&self) -> ArenaResult<PhaseGuard<'_>> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != RoundPhase::Idle {
            return Err(ArenaError::Busy);
        }
        *phase = RoundPhase::Requesting;
        Ok(PhaseGuard { phase: &self.phase })
    }

    /// Submit a question and stream the answers.
    ///
    /// `on_snapshot` is invoked synchronously once per applicable line, in
    /// arrival order. The round is persisted as soon as the final line has been
    /// delivered; the body is then drained until the backend closes it. A
    /// transport failure delivers one terminal error snapshot and is then
    /// returned as `Err`.
    pub async fn run_round<F>(
        &self,
        request: &QuestionRequest,
        cancel: CancellationToken,
        mut on_snapshot: F,
    ) -> ArenaResult<RoundReport>
    where
        F: FnMut(&Snapshot),
    {
        let _guard = self.claim()?;
        let mut assembler = RoundAssembler::new(self.layout);

        tracing::info!(slots = self.layout.len(), "Starting round");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Round cancelled before the backend answered");
                return Ok(assembler.into_report(RoundOutcome::Cancelled));
            }
            response = self.client.open_question_stream(request) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to open question stream: {}", e);
                self.deliver_failure(&mut assembler, &e, &mut on_snapshot);
                return Err(e);
            }
        };

        self.set_phase(RoundPhase::Streaming);
        let mut decoder = ChunkDecoder::new();
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(delivered = assembler.delivered(), "Round cancelled");
                    return Ok(assembler.into_report(RoundOutcome::Cancelled));
                }
                next = body.next() => next,
            };

            let fragment = match next {
                Some(Ok(fragment)) => fragment,
                Some(Err(e)) => {
                    let e = ArenaError::from(e);
                    if assembler.terminal().is_some() {
                        tracing::warn!("Stream read failed after the round closed: {}", e);
                        break;
                    }
                    tracing::error!("Stream read failed: {}", e);
                    self.deliver_failure(&mut assembler, &e, &mut on_snapshot);
                    return Err(e);
                }
                None => break,
            };

            for object in decoder.push(&fragment) {
                if cancel.is_cancelled() {
                    tracing::info!(delivered = assembler.delivered(), "Round cancelled");
                    return Ok(assembler.into_report(RoundOutcome::Cancelled));
                }
                let Some(snapshot) = assembler.apply_object(&object) else {
                    continue;
                };
                on_snapshot(&snapshot);

                // Lines after the terminal one yield no snapshot, so this runs once
                let finalized = snapshot.is_final
                    && assembler.terminal() == Some(&RoundOutcome::Finalized);
                if finalized && !cancel.is_cancelled() {
                    self.set_phase(RoundPhase::Finalizing);
                    self.persist(request, &assembler).await;
                }
            }
        }
        decoder.finish();

        let outcome = match assembler.terminal().cloned() {
            Some(outcome) => outcome,
            None => {
                tracing::warn!(
                    delivered = assembler.delivered(),
                    "Stream closed without a final line"
                );
                RoundOutcome::Incomplete
            }
        };

        tracing::info!(?outcome, delivered = assembler.delivered(), "Round finished");
        Ok(assembler.into_report(outcome))
    }

    fn deliver_failure<F>(&self, assembler: &mut RoundAssembler, error: &ArenaError, on_snapshot: &mut F)
    where
        F: FnMut(&Snapshot),
    {
        let snapshot = Snapshot::failure(
            assembler.layout(),
            assembler.metadata().clone(),
            error.pane_message(),
        );
        assembler.record_delivery();
        on_snapshot(&snapshot);
    }

    async fn persist(&self, request: &QuestionRequest, assembler: &RoundAssembler) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let round = FinalizedRound {
            question: request.question.clone(),
            agents: assembler.agents(),
            metadata: assembler.metadata().clone(),
        };
        if let Err(e) = persistence.persist(&round).await {
            tracing::error!("Failed to save conversation: {}", e);
        }
    }
}

/// Returns the controller to `Idle` however the round ends
struct PhaseGuard<'a> {
    phase: &'a Mutex<RoundPhase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = RoundPhase::Idle;
    }
}
