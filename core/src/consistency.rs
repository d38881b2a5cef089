use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{
    ActorId, EventLog, MessageProcessingEvent, MessageSentEvent, MessageTypeId, Timestamp,
};
use crate::progress::{
    percent, Analysis, CancellationToken, ConsistencyProgress, ProgressSink, Throttled,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Share of source-loop iterations whose transferred data was fully applied
/// before the target started its next iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum ConsistencyScore {
    /// Not checked yet, or a selector is missing.
    #[default]
    Unconfigured,
    /// Percentage in `[0, 100]`.
    Percent(f64),
}

impl ConsistencyScore {
    pub fn percent(self) -> Option<f64> {
        match self {
            ConsistencyScore::Unconfigured => None,
            ConsistencyScore::Percent(value) => Some(value),
        }
    }
}

impl fmt::Display for ConsistencyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyScore::Unconfigured => f.write_str("?"),
            ConsistencyScore::Percent(value) => write!(f, "{value:.1}%"),
        }
    }
}

/// One (source, target) actor pair under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyCheckEntry {
    pub source: ActorId,
    pub target: ActorId,
    /// Loop message processed by `source` once per iteration.
    pub source_loop: Option<MessageTypeId>,
    /// Message `source` sends to `target` to transfer its state.
    pub transfer: Option<MessageTypeId>,
    /// Loop message processed by `target` once per iteration.
    pub target_loop: Option<MessageTypeId>,
    #[serde(default)]
    pub consistency: ConsistencyScore,
}

impl ConsistencyCheckEntry {
    pub fn new(source: ActorId, target: ActorId) -> Self {
        Self {
            source,
            target,
            source_loop: None,
            transfer: None,
            target_loop: None,
            consistency: ConsistencyScore::Unconfigured,
        }
    }

    pub fn with_selectors(
        mut self,
        source_loop: MessageTypeId,
        transfer: MessageTypeId,
        target_loop: MessageTypeId,
    ) -> Self {
        self.source_loop = Some(source_loop);
        self.transfer = Some(transfer);
        self.target_loop = Some(target_loop);
        self
    }

    fn selectors(&self) -> Option<(MessageTypeId, MessageTypeId, MessageTypeId)> {
        Some((self.source_loop?, self.transfer?, self.target_loop?))
    }

    pub fn is_configured(&self) -> bool {
        self.selectors().is_some()
    }

    /// One unconfigured entry per pair of actors that communicated in `log`.
    pub fn candidates(log: &EventLog) -> Vec<Self> {
        log.communication_pairs()
            .into_iter()
            .filter(|(source, target)| {
                *source != log.unknown_actor() && *target != log.unknown_actor()
            })
            .map(|(source, target)| Self::new(source, target))
            .collect()
    }
}

/// Diagnostics of one [`ConsistencyChecker::check`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyRun {
    /// Entries that were scanned and scored.
    pub checked: usize,
    /// Entries left unscored because a selector was missing.
    pub unconfigured: usize,
    /// Source-loop iterations scanned over all entries.
    pub iterations: usize,
    /// Iterations flagged inconsistent over all entries.
    pub inconsistent_iterations: usize,
    /// Transfers skipped because their message was not processed exactly once.
    pub unsupported_transfers: usize,
}

/// Detects target loop iterations that start while transferred data is still being applied.
pub struct ConsistencyChecker<'a> {
    log: &'a EventLog,
    config: AnalysisConfig,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(log: &'a EventLog) -> Self {
        Self {
            log,
            config: AnalysisConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Score every configured entry in place.
    ///
    /// Cancellation is polled before each entry. Entries scored before the
    /// cancellation keep their score.
    pub fn check(
        &self,
        entries: &mut [ConsistencyCheckEntry],
        progress: &dyn ConsistencyProgress,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Analysis<ConsistencyRun>> {
        for entry in entries.iter() {
            self.validate(entry)?;
        }

        let total = entries.len();
        let mut run = ConsistencyRun::default();

        for (position, entry) in entries.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(checked = run.checked, total, "consistency check cancelled");
                return Ok(Analysis::Cancelled);
            }
            progress.entries(percent(position + 1, total));
            entry.consistency = ConsistencyScore::Unconfigured;

            let Some((source_loop, transfer, target_loop)) = entry.selectors() else {
                run.unconfigured += 1;
                continue;
            };
            let iteration_sink = IterationProgress(progress);
            let iteration_progress = Throttled::new(&iteration_sink, self.config.progress_step);
            iteration_progress.report(0);

            let source_iterations = self.loop_iterations(entry.source, source_loop);
            let transfers: Vec<&MessageSentEvent> = self
                .log
                .sent_by(entry.source)
                .filter(|sent| {
                    self.log.type_of(sent.message) == transfer && sent.receiver == entry.target
                })
                .collect();
            let target_iterations = self.loop_iterations(entry.target, target_loop);

            let mut inconsistent = 0;
            for (scanned, iteration) in source_iterations.iter().enumerate() {
                if let Some((lo, hi)) = self.envelope(iteration, &transfers, &mut run) {
                    let violated = target_iterations
                        .iter()
                        .any(|target| target.start > lo && target.start < hi);
                    if violated {
                        inconsistent += 1;
                    }
                }

                let scanned = scanned + 1;
                iteration_progress.report(percent(scanned, source_iterations.len()));
                entry.consistency = ConsistencyScore::Percent(
                    (scanned - inconsistent) as f64 * 100.0 / scanned as f64,
                );
            }

            run.checked += 1;
            run.iterations += source_iterations.len();
            run.inconsistent_iterations += inconsistent;

            tracing::debug!(
                source = %self.log.actor(entry.source).name,
                target = %self.log.actor(entry.target).name,
                iterations = source_iterations.len(),
                inconsistent,
                score = %entry.consistency,
                "consistency entry checked"
            );
        }

        tracing::info!(
            checked = run.checked,
            unconfigured = run.unconfigured,
            unsupported_transfers = run.unsupported_transfers,
            "consistency check finished"
        );

        Ok(Analysis::Completed(run))
    }

    fn validate(&self, entry: &ConsistencyCheckEntry) -> AnalysisResult<()> {
        for actor in [entry.source, entry.target] {
            if !self.log.contains_actor(actor) {
                return Err(AnalysisError::UnknownActor(actor.index()));
            }
        }
        for message_type in [entry.source_loop, entry.transfer, entry.target_loop]
            .into_iter()
            .flatten()
        {
            if !self.log.contains_message_type(message_type) {
                return Err(AnalysisError::UnknownMessageType(message_type.index()));
            }
        }
        Ok(())
    }

    fn loop_iterations(
        &self,
        actor: ActorId,
        loop_type: MessageTypeId,
    ) -> Vec<&'a MessageProcessingEvent> {
        self.log
            .processed_by(actor)
            .filter(|event| self.log.type_of(event.message) == loop_type)
            .collect()
    }

    /// Earliest start and latest end of the processing triggered by the
    /// transfers sent during `iteration`. `None` when nothing was transferred.
    fn envelope(
        &self,
        iteration: &MessageProcessingEvent,
        transfers: &[&MessageSentEvent],
        run: &mut ConsistencyRun,
    ) -> Option<(Timestamp, Timestamp)> {
        let mut envelope: Option<(Timestamp, Timestamp)> = None;

        for sent in transfers
            .iter()
            .filter(|sent| sent.timestamp >= iteration.start && sent.timestamp <= iteration.end)
        {
            let message = self.log.message(sent.message);
            let [processed] = message.processing_events() else {
                run.unsupported_transfers += 1;
                if self.config.log_skipped {
                    tracing::warn!(
                        message_type = %self.log.message_type(message.message_type).name,
                        message_id = message.message_id,
                        processed = message.processing_events().len(),
                        "transfer not processed exactly once, not supported"
                    );
                }
                continue;
            };
            let processed = self.log.processing_event(*processed);

            envelope = Some(match envelope {
                None => (processed.start, processed.end),
                Some((lo, hi)) => (lo.min(processed.start), hi.max(processed.end)),
            });
        }

        envelope
    }
}

struct IterationProgress<'a>(&'a dyn ConsistencyProgress);

impl ProgressSink for IterationProgress<'_> {
    fn report(&self, percent: u32) {
        self.0.iterations(percent)
    }
}

/// Convenience wrapper around [`ConsistencyChecker`] with the default configuration.
pub fn check_consistency(
    log: &EventLog,
    entries: &mut [ConsistencyCheckEntry],
    progress: &dyn ConsistencyProgress,
    cancel: &CancellationToken,
) -> AnalysisResult<Analysis<ConsistencyRun>> {
    ConsistencyChecker::new(log).check(entries, progress, cancel)
}
