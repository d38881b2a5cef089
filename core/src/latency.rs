use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{
    ActorId, Elapsed, EventLog, MessageProcessingEvent, MessageSentEvent, MessageTypeId, Timestamp,
};
use crate::progress::{percent, Analysis, CancellationToken, ProgressSink, Throttled};
use crate::stats::{DurationStats, Pair, Summary};
use crate::timespan::{
    validate_path, PathEdge, PathNode, SegmentReport, TimespanChain, TimespanKind,
};
use serde::{Deserialize, Serialize};

/// Occurrences of the head message that did not produce a series entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Message instances with zero or several recorded sends.
    pub ambiguous: usize,
    /// Walks that stopped because some segment found no qualifying event.
    pub unmatched: usize,
}

/// Result of one end-to-end latency analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyReport {
    series: Vec<Pair<Timestamp, Elapsed>>,
    chain: TimespanChain,
    overall: DurationStats,
    skipped: SkipCounts,
}

impl LatencyReport {
    fn new(series: Vec<Pair<Timestamp, Elapsed>>, chain: TimespanChain, skipped: SkipCounts) -> Self {
        let overall = series.iter().map(|pair| pair.b).collect();
        Self {
            series,
            chain,
            overall,
            skipped,
        }
    }

    /// (origin timestamp, end-to-end duration) for every completed walk, in head order.
    pub fn series(&self) -> &[Pair<Timestamp, Elapsed>] {
        &self.series
    }

    /// The chain whose segments carry the per-phase statistics.
    pub fn chain(&self) -> &TimespanChain {
        &self.chain
    }

    pub fn skipped(&self) -> SkipCounts {
        self.skipped
    }

    pub fn min(&self) -> Option<Elapsed> {
        self.overall.min()
    }

    pub fn max(&self) -> Option<Elapsed> {
        self.overall.max()
    }

    pub fn average(&self) -> Option<f64> {
        self.overall.average()
    }

    pub fn median(&self) -> Option<Elapsed> {
        self.overall.median()
    }

    pub fn summary(&self) -> Option<Summary> {
        self.overall.summary()
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            series: self.series.clone(),
            summary: self.summary(),
            segments: self.chain.reports(),
            skipped: self.skipped,
        }
    }
}

/// Serialisable form of a [`LatencyReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySnapshot {
    pub series: Vec<Pair<Timestamp, Elapsed>>,
    pub summary: Option<Summary>,
    pub segments: Vec<SegmentReport>,
    pub skipped: SkipCounts,
}

/// How candidate origins are found for the head segment.
#[derive(Debug, Clone, Copy)]
enum HeadStrategy {
    /// Loop iterations of the first actor that send the first hop's message.
    LoopIteration,
    /// Processing of the first hop's message by the second actor.
    Mailbox,
}

/// Matches a causal path against an event log.
pub struct LatencyCalculator<'a> {
    log: &'a EventLog,
    config: AnalysisConfig,
}

impl<'a> LatencyCalculator<'a> {
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

    /// Build the timespan chain for the path and walk every head occurrence.
    ///
    /// Matching takes the first event in log order that satisfies the type and
    /// ordering constraints of a segment. Cancellation is polled before each
    /// head-level occurrence.
    pub fn compute(
        &self,
        nodes: &[PathNode],
        edges: &[PathEdge],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> AnalysisResult<Analysis<LatencyReport>> {
        validate_path(nodes, edges)?;
        self.validate_ids(nodes, edges)?;

        let mut chain = TimespanChain::build(nodes, edges)?;
        let progress = Throttled::new(progress, self.config.progress_step);

        let head = chain.head();
        let (head_actor, head_type) = (head.actor, head.message_type);
        let strategy = match head.kind {
            TimespanKind::LoopToMailbox => HeadStrategy::LoopIteration,
            TimespanKind::MessageInMailbox => HeadStrategy::Mailbox,
            other => unreachable!("timespan chain cannot start with {other}"),
        };

        let total = self.log.processed_count(head_actor);
        let mut series = Vec::new();
        let mut skipped = SkipCounts::default();

        for (scanned, event) in self.log.processed_by(head_actor).enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(scanned, total, "latency discovery cancelled");
                return Ok(Analysis::Cancelled);
            }

            if self.log.type_of(event.message) == head_type {
                let walk = match strategy {
                    HeadStrategy::LoopIteration => self.walk_loop_iteration(&mut chain, event),
                    HeadStrategy::Mailbox => self.walk_mailbox(&mut chain, event, &mut skipped),
                };
                match walk {
                    Walk::Complete(pair) => series.push(pair),
                    Walk::Unmatched => skipped.unmatched += 1,
                    Walk::Ambiguous => {}
                }
            }

            progress.report(percent(scanned + 1, total));
        }
        progress.report(100);

        tracing::info!(
            segments = chain.len(),
            matched = series.len(),
            ambiguous = skipped.ambiguous,
            unmatched = skipped.unmatched,
            "latency discovery finished"
        );

        Ok(Analysis::Completed(LatencyReport::new(series, chain, skipped)))
    }

    fn validate_ids(&self, nodes: &[PathNode], edges: &[PathEdge]) -> AnalysisResult<()> {
        for node in nodes {
            if !self.log.contains_actor(node.actor) {
                return Err(AnalysisError::UnknownActor(node.actor.index()));
            }
            if let Some(loop_type) = node.loop_type {
                self.check_type(loop_type)?;
            }
        }
        for edge in edges {
            self.check_type(edge.message_type)?;
        }
        Ok(())
    }

    fn check_type(&self, message_type: MessageTypeId) -> AnalysisResult<()> {
        if self.log.contains_message_type(message_type) {
            Ok(())
        } else {
            Err(AnalysisError::UnknownMessageType(message_type.index()))
        }
    }

    fn walk_loop_iteration(&self, chain: &mut TimespanChain, iteration: &MessageProcessingEvent) -> Walk {
        let head = chain.head();
        let Some(next_index) = head.next() else {
            return Walk::Unmatched;
        };
        let next = chain.segment(next_index);
        let (target_actor, target_type) = (next.actor, next.message_type);

        let sent = self.log.sent_by(head.actor).find(|sent| {
            self.log.type_of(sent.message) == target_type
                && sent.timestamp >= iteration.start
                && sent.timestamp <= iteration.end
                && sent.receiver == target_actor
        });
        let Some(sent) = sent else {
            return Walk::Unmatched;
        };

        chain.record(0, sent.timestamp - iteration.start);
        match self.match_from(chain, next_index, sent.timestamp) {
            Some(end) => Walk::Complete(Pair::new(iteration.start, end - iteration.start)),
            None => Walk::Unmatched,
        }
    }

    fn walk_mailbox(
        &self,
        chain: &mut TimespanChain,
        processing: &MessageProcessingEvent,
        skipped: &mut SkipCounts,
    ) -> Walk {
        let sends = self.log.message(processing.message).sent_events();
        if sends.len() != 1 {
            skipped.ambiguous += 1;
            if self.config.log_skipped {
                let message = self.log.message(processing.message);
                tracing::warn!(
                    message_type = %self.log.message_type(message.message_type).name,
                    message_id = message.message_id,
                    sends = sends.len(),
                    "skipping message without a unique send event"
                );
            }
            return Walk::Ambiguous;
        }
        let sent = self.log.sent_event(sends[0]);

        chain.record(0, processing.start - sent.timestamp);
        let Some(next_index) = chain.head().next() else {
            return Walk::Unmatched;
        };
        match self.match_from(chain, next_index, processing.start) {
            Some(end) => Walk::Complete(Pair::new(sent.timestamp, end - sent.timestamp)),
            None => Walk::Unmatched,
        }
    }

    /// Walk the chain from `index`, each segment starting no earlier than the
    /// timestamp reached by its predecessor. Returns the terminal timestamp.
    fn match_from(
        &self,
        chain: &mut TimespanChain,
        mut index: usize,
        mut lower_bound: Timestamp,
    ) -> Option<Timestamp> {
        loop {
            let segment = chain.segment(index);
            let (kind, actor, message_type, next) =
                (segment.kind, segment.actor, segment.message_type, segment.next());

            let (elapsed, reached) = match kind {
                TimespanKind::MessageInMailbox | TimespanKind::ProcessingToLoop => {
                    let event = self.first_processing(actor, message_type, lower_bound)?;
                    (event.start - lower_bound, event.start)
                }
                TimespanKind::ProcessingToMailbox => {
                    let sent = self.first_sent(actor, message_type, lower_bound)?;
                    (sent.timestamp - lower_bound, sent.timestamp)
                }
                TimespanKind::LoopToMailbox => {
                    let next_type = chain.segment(next?).message_type;
                    let (loop_start, sent) =
                        self.first_loop_send(actor, message_type, next_type, lower_bound)?;
                    (sent.timestamp - loop_start, sent.timestamp)
                }
                TimespanKind::FinalProcessed | TimespanKind::FinalLoop => {
                    let event = self.first_processing(actor, message_type, lower_bound)?;
                    (event.end - lower_bound, event.end)
                }
            };

            chain.record(index, elapsed);

            match next {
                Some(following) => {
                    index = following;
                    lower_bound = reached;
                }
                None => return Some(reached),
            }
        }
    }

    fn first_processing(
        &self,
        actor: ActorId,
        message_type: MessageTypeId,
        not_before: Timestamp,
    ) -> Option<&'a MessageProcessingEvent> {
        self.log
            .processed_by(actor)
            .find(|event| self.log.type_of(event.message) == message_type && event.start >= not_before)
    }

    fn first_sent(
        &self,
        actor: ActorId,
        message_type: MessageTypeId,
        not_before: Timestamp,
    ) -> Option<&'a MessageSentEvent> {
        self.log
            .sent_by(actor)
            .find(|sent| self.log.type_of(sent.message) == message_type && sent.timestamp >= not_before)
    }

    // The first loop iteration starting at or after `not_before` that is
    // followed by a send of `sent_type`.
    fn first_loop_send(
        &self,
        actor: ActorId,
        loop_type: MessageTypeId,
        sent_type: MessageTypeId,
        not_before: Timestamp,
    ) -> Option<(Timestamp, &'a MessageSentEvent)> {
        self.log
            .processed_by(actor)
            .filter(|event| self.log.type_of(event.message) == loop_type && event.start >= not_before)
            .find_map(|iteration| {
                self.first_sent(actor, sent_type, iteration.start)
                    .map(|sent| (iteration.start, sent))
            })
    }
}

enum Walk {
    Complete(Pair<Timestamp, Elapsed>),
    Unmatched,
    Ambiguous,
}

/// Convenience wrapper around [`LatencyCalculator`] with the default configuration.
pub fn compute_latency(
    log: &EventLog,
    nodes: &[PathNode],
    edges: &[PathEdge],
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> AnalysisResult<Analysis<LatencyReport>> {
    LatencyCalculator::new(log).compute(nodes, edges, progress, cancel)
}
