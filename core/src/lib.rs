pub mod analysis;
pub mod config;
pub mod consistency;
pub mod error;
pub mod latency;
pub mod model;
pub mod progress;
pub mod stats;
pub mod timespan;

pub use analysis::AnalysisService;
pub use config::{AnalysisConfig, Config, LoggingConfig};
pub use consistency::{
    check_consistency, ConsistencyCheckEntry, ConsistencyChecker, ConsistencyRun,
    ConsistencyScore,
};
pub use error::{AnalysisError, AnalysisResult};
pub use latency::{compute_latency, LatencyCalculator, LatencyReport, LatencySnapshot, SkipCounts};
pub use model::{
    ActorId, ActorInstance, Elapsed, EventLog, EventLogBuilder, EventLogSnapshot, MessageType,
    MessageTypeId, Timestamp,
};
pub use progress::{Analysis, CancellationToken, ConsistencyProgress, ProgressSink, Throttled};
pub use stats::{DurationStats, Pair, Summary};
pub use timespan::{PathEdge, PathNode, TimespanChain, TimespanKind};
