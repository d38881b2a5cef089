use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{ActorId, Elapsed, MessageTypeId};
use crate::stats::{DurationStats, Summary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One actor on a causal path, optionally driven by a simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub actor: ActorId,
    /// Message type whose processing marks the start of one loop iteration.
    pub loop_type: Option<MessageTypeId>,
}

impl PathNode {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            loop_type: None,
        }
    }

    pub fn with_loop(actor: ActorId, loop_type: MessageTypeId) -> Self {
        Self {
            actor,
            loop_type: Some(loop_type),
        }
    }
}

/// The message type carried from path node `i` to node `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEdge {
    pub message_type: MessageTypeId,
}

impl PathEdge {
    pub fn new(message_type: MessageTypeId) -> Self {
        Self { message_type }
    }
}

/// Phase of elapsed time along a causal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimespanKind {
    /// Start of a simulation-loop iteration until the next hop's message is sent.
    LoopToMailbox,
    /// Send of a message until its processing starts.
    MessageInMailbox,
    /// Processing of a message until the actor's next simulation-loop iteration starts.
    ProcessingToLoop,
    /// Processing of a message until the next hop's message is sent.
    ProcessingToMailbox,
    /// Terminal phase ending when the last message has been processed.
    FinalProcessed,
    /// Terminal phase ending when the last simulation-loop iteration has been processed.
    FinalLoop,
}

impl TimespanKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimespanKind::FinalProcessed | TimespanKind::FinalLoop)
    }

    pub fn label(self) -> &'static str {
        match self {
            TimespanKind::LoopToMailbox => "loop to mailbox",
            TimespanKind::MessageInMailbox => "message in mailbox",
            TimespanKind::ProcessingToLoop => "processing to loop",
            TimespanKind::ProcessingToMailbox => "processing to mailbox",
            TimespanKind::FinalProcessed => "final processing",
            TimespanKind::FinalLoop => "final loop",
        }
    }
}

impl fmt::Display for TimespanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One phase of the chain together with the durations matched for it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimespanSegment {
    pub kind: TimespanKind,
    pub actor: ActorId,
    pub message_type: MessageTypeId,
    next: Option<usize>,
    stats: DurationStats,
}

impl TimespanSegment {
    fn new(kind: TimespanKind, actor: ActorId, message_type: MessageTypeId) -> Self {
        Self {
            kind,
            actor,
            message_type,
            next: None,
            stats: DurationStats::new(),
        }
    }

    /// Index of the following segment, `None` for the terminal one.
    pub fn next(&self) -> Option<usize> {
        self.next
    }

    pub fn stats(&self) -> &DurationStats {
        &self.stats
    }

    pub fn report(&self) -> SegmentReport {
        SegmentReport {
            kind: self.kind,
            actor: self.actor,
            message_type: self.message_type,
            summary: self.stats.summary(),
        }
    }
}

/// Serialisable view of a [`TimespanSegment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub kind: TimespanKind,
    pub actor: ActorId,
    pub message_type: MessageTypeId,
    pub summary: Option<Summary>,
}

/// Ordered sequence of phases describing one causal path.
///
/// Segments live in a vector; each one names the index of its successor. The
/// structure is fixed once [`TimespanChain::build`] returns, only the
/// statistics change while matches are recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct TimespanChain {
    segments: Vec<TimespanSegment>,
}

impl TimespanChain {
    /// Compile a path of `nodes` joined by `edges` into its phase chain.
    pub fn build(nodes: &[PathNode], edges: &[PathEdge]) -> AnalysisResult<Self> {
        validate_path(nodes, edges)?;

        let last = nodes.len() - 1;
        let mut segments = Vec::with_capacity(3 * nodes.len());

        let first = &nodes[0];
        if let Some(loop_type) = first.loop_type {
            segments.push(TimespanSegment::new(
                TimespanKind::LoopToMailbox,
                first.actor,
                loop_type,
            ));
        }
        segments.push(TimespanSegment::new(
            TimespanKind::MessageInMailbox,
            nodes[1].actor,
            edges[0].message_type,
        ));

        for (i, node) in nodes.iter().enumerate().skip(1) {
            if i != last {
                let outgoing = edges[i].message_type;
                match node.loop_type {
                    Some(loop_type) => {
                        segments.push(TimespanSegment::new(
                            TimespanKind::ProcessingToLoop,
                            node.actor,
                            loop_type,
                        ));
                        segments.push(TimespanSegment::new(
                            TimespanKind::LoopToMailbox,
                            node.actor,
                            loop_type,
                        ));
                    }
                    None => segments.push(TimespanSegment::new(
                        TimespanKind::ProcessingToMailbox,
                        node.actor,
                        outgoing,
                    )),
                }
                segments.push(TimespanSegment::new(
                    TimespanKind::MessageInMailbox,
                    nodes[i + 1].actor,
                    outgoing,
                ));
            } else {
                match node.loop_type {
                    Some(loop_type) => {
                        segments.push(TimespanSegment::new(
                            TimespanKind::ProcessingToLoop,
                            node.actor,
                            loop_type,
                        ));
                        segments.push(TimespanSegment::new(
                            TimespanKind::FinalLoop,
                            node.actor,
                            loop_type,
                        ));
                    }
                    None => segments.push(TimespanSegment::new(
                        TimespanKind::FinalProcessed,
                        node.actor,
                        edges[i - 1].message_type,
                    )),
                }
            }
        }

        let count = segments.len();
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.next = (i + 1 < count).then_some(i + 1);
        }

        tracing::debug!(nodes = nodes.len(), segments = count, "built timespan chain");

        Ok(Self { segments })
    }

    pub fn head(&self) -> &TimespanSegment {
        &self.segments[0]
    }

    pub fn segment(&self, index: usize) -> &TimespanSegment {
        &self.segments[index]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments from head to terminal.
    pub fn iter(&self) -> impl Iterator<Item = &TimespanSegment> {
        self.segments.iter()
    }

    pub fn kinds(&self) -> Vec<TimespanKind> {
        self.segments.iter().map(|s| s.kind).collect()
    }

    pub fn reports(&self) -> Vec<SegmentReport> {
        self.segments.iter().map(TimespanSegment::report).collect()
    }

    /// Add one observed duration to the segment at `index`.
    pub fn record(&mut self, index: usize, duration: Elapsed) {
        self.segments[index].stats.record(duration);
    }
}

pub(crate) fn validate_path(nodes: &[PathNode], edges: &[PathEdge]) -> AnalysisResult<()> {
    if nodes.is_empty() {
        return Err(AnalysisError::EmptyPath);
    }
    if nodes.len() < 2 {
        return Err(AnalysisError::PathTooShort(nodes.len()));
    }
    if edges.len() != nodes.len() - 1 {
        return Err(AnalysisError::EdgeCountMismatch {
            nodes: nodes.len(),
            edges: edges.len(),
            expected: nodes.len() - 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventLogBuilder;
    use TimespanKind::*;

    struct Ids {
        actors: Vec<ActorId>,
        tick: MessageTypeId,
        data: MessageTypeId,
    }

    fn ids(count: usize) -> Ids {
        let mut builder = EventLogBuilder::new();
        let actors = (0..count)
            .map(|i| builder.register_actor("Worker", &format!("w{i}"), None, None).unwrap())
            .collect();
        builder.register_processing(0, 1, "Tick", 1, "w0", "w0").unwrap();
        builder.register_processing(0, 1, "Data", 1, "w0", "w0").unwrap();
        let log = builder.build();
        Ids {
            actors,
            tick: log.message_type_by_name("Tick").unwrap(),
            data: log.message_type_by_name("Data").unwrap(),
        }
    }

    fn path(ids: &Ids, looping: bool) -> (Vec<PathNode>, Vec<PathEdge>) {
        let nodes = ids
            .actors
            .iter()
            .map(|actor| PathNode {
                actor: *actor,
                loop_type: looping.then_some(ids.tick),
            })
            .collect::<Vec<_>>();
        let edges = vec![PathEdge::new(ids.data); nodes.len() - 1];
        (nodes, edges)
    }

    #[test]
    fn looping_path_has_three_segments_per_hop_plus_one() {
        for n in 2..6 {
            let ids = ids(n);
            let (nodes, edges) = path(&ids, true);
            let chain = TimespanChain::build(&nodes, &edges).unwrap();
            assert_eq!(chain.len(), 3 * (n - 1) + 1);
            assert_eq!(chain.head().kind, LoopToMailbox);
            assert_eq!(chain.segment(chain.len() - 1).kind, FinalLoop);
        }
    }

    #[test]
    fn plain_path_alternates_mailbox_and_processing() {
        let ids = ids(3);
        let (nodes, edges) = path(&ids, false);
        let chain = TimespanChain::build(&nodes, &edges).unwrap();

        assert_eq!(
            chain.kinds(),
            vec![MessageInMailbox, ProcessingToMailbox, MessageInMailbox, FinalProcessed]
        );
        assert_eq!(chain.head().actor, ids.actors[1]);
        assert_eq!(chain.segment(1).actor, ids.actors[1]);
        assert_eq!(chain.segment(3).actor, ids.actors[2]);
    }

    #[test]
    fn two_node_plain_path_has_two_segments() {
        let ids = ids(2);
        let (nodes, edges) = path(&ids, false);
        let chain = TimespanChain::build(&nodes, &edges).unwrap();
        assert_eq!(chain.kinds(), vec![MessageInMailbox, FinalProcessed]);
    }

    #[test]
    fn mixed_path_follows_construction_rule() {
        let ids = ids(3);
        let nodes = vec![
            PathNode::with_loop(ids.actors[0], ids.tick),
            PathNode::new(ids.actors[1]),
            PathNode::with_loop(ids.actors[2], ids.tick),
        ];
        let edges = vec![PathEdge::new(ids.data), PathEdge::new(ids.data)];
        let chain = TimespanChain::build(&nodes, &edges).unwrap();

        assert_eq!(
            chain.kinds(),
            vec![
                LoopToMailbox,
                MessageInMailbox,
                ProcessingToMailbox,
                MessageInMailbox,
                ProcessingToLoop,
                FinalLoop
            ]
        );
    }

    #[test]
    fn chain_links_are_sequential_and_terminate() {
        let ids = ids(4);
        let (nodes, edges) = path(&ids, true);
        let chain = TimespanChain::build(&nodes, &edges).unwrap();

        let mut visited = 1;
        let mut cursor = chain.head().next();
        while let Some(index) = cursor {
            visited += 1;
            cursor = chain.segment(index).next();
        }
        assert_eq!(visited, chain.len());
        assert!(chain.segment(chain.len() - 1).kind.is_terminal());
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let ids = ids(2);
        assert_eq!(
            TimespanChain::build(&[], &[]),
            Err(AnalysisError::EmptyPath)
        );
        assert_eq!(
            TimespanChain::build(&[PathNode::new(ids.actors[0])], &[]),
            Err(AnalysisError::PathTooShort(1))
        );

        let (nodes, _) = path(&ids, false);
        assert_eq!(
            TimespanChain::build(&nodes, &[]),
            Err(AnalysisError::EdgeCountMismatch {
                nodes: 2,
                edges: 0,
                expected: 1
            })
        );
    }

    #[test]
    fn recorded_durations_stay_on_their_segment() {
        let ids = ids(2);
        let (nodes, edges) = path(&ids, false);
        let mut chain = TimespanChain::build(&nodes, &edges).unwrap();

        chain.record(1, 12);
        chain.record(1, 8);

        assert!(chain.head().stats().is_empty());
        let summary = chain.segment(1).report().summary.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.median, 8);
    }
}
