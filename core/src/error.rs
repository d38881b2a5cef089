use thiserror::Error;

/// Configuration problems that make an analysis call impossible.
///
/// These are reported before any event is scanned. Ambiguous correlations and
/// unmatched occurrences are not errors; they are counted on the result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("latency path must contain at least one node")]
    EmptyPath,

    #[error("latency path needs at least two nodes, got {0}")]
    PathTooShort(usize),

    #[error("latency path with {nodes} nodes needs {expected} edges, got {edges}")]
    EdgeCountMismatch {
        nodes: usize,
        edges: usize,
        expected: usize,
    },

    #[error("actor #{0} is not part of the event log")]
    UnknownActor(usize),

    #[error("message type #{0} is not part of the event log")]
    UnknownMessageType(usize),

    #[error("analysis worker failed: {0}")]
    Worker(String),
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
