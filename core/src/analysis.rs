use crate::config::AnalysisConfig;
use crate::consistency::{ConsistencyCheckEntry, ConsistencyChecker, ConsistencyRun};
use crate::error::{AnalysisError, AnalysisResult};
use crate::latency::{LatencyCalculator, LatencyReport};
use crate::model::EventLog;
use crate::progress::{Analysis, CancellationToken, ConsistencyProgress, ProgressSink};
use crate::timespan::{PathEdge, PathNode};
use std::sync::Arc;

/// AnalysisService runs analyses against one shared event log off the async runtime.
///
/// Every call gets its own worker, so several analyses can run over the same
/// log at once. The log itself is never mutated.
#[derive(Clone)]
pub struct AnalysisService {
    log: Arc<EventLog>,
    config: AnalysisConfig,
}

impl AnalysisService {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            config: AnalysisConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Compute the latency of a causal path on a blocking worker.
    pub async fn compute_latency(
        &self,
        nodes: Vec<PathNode>,
        edges: Vec<PathEdge>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> AnalysisResult<Analysis<LatencyReport>> {
        let log = Arc::clone(&self.log);
        let config = self.config;

        tracing::debug!(nodes = nodes.len(), "spawning latency worker");
        tokio::task::spawn_blocking(move || {
            LatencyCalculator::new(&log)
                .with_config(config)
                .compute(&nodes, &edges, progress.as_ref(), &cancel)
        })
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))?
    }

    /// Score consistency entries on a blocking worker.
    ///
    /// The entries are handed back with their scores updated, also when the
    /// check was cancelled part way.
    pub async fn check_consistency(
        &self,
        mut entries: Vec<ConsistencyCheckEntry>,
        progress: Arc<dyn ConsistencyProgress>,
        cancel: CancellationToken,
    ) -> AnalysisResult<(Vec<ConsistencyCheckEntry>, Analysis<ConsistencyRun>)> {
        let log = Arc::clone(&self.log);
        let config = self.config;

        tracing::debug!(entries = entries.len(), "spawning consistency worker");
        tokio::task::spawn_blocking(move || {
            let outcome = ConsistencyChecker::new(&log)
                .with_config(config)
                .check(&mut entries, progress.as_ref(), &cancel)?;
            Ok::<_, AnalysisError>((entries, outcome))
        })
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::ConsistencyScore;
    use crate::model::EventLogBuilder;

    fn shared_log() -> Arc<EventLog> {
        let mut builder = EventLogBuilder::new();
        builder.register_actor("Sim", "a", None, None).unwrap();
        builder.register_actor("Render", "b", None, None).unwrap();
        builder.register_processing(0, 10, "Tick", 1, "a", "a").unwrap();
        builder.register_sending(5, "a", "b", "State", 1).unwrap();
        builder.register_processing(20, 40, "State", 1, "a", "b").unwrap();
        builder.register_processing(25, 28, "Frame", 1, "b", "b").unwrap();
        Arc::new(builder.build())
    }

    #[tokio::test]
    async fn latency_and_consistency_share_one_log() {
        let log = shared_log();
        let service = AnalysisService::new(Arc::clone(&log));
        let a = log.actor_by_name("a").unwrap();
        let b = log.actor_by_name("b").unwrap();
        let tick = log.message_type_by_name("Tick").unwrap();
        let state = log.message_type_by_name("State").unwrap();
        let frame = log.message_type_by_name("Frame").unwrap();

        let latency = service.compute_latency(
            vec![PathNode::with_loop(a, tick), PathNode::new(b)],
            vec![PathEdge::new(state)],
            Arc::new(()),
            CancellationToken::new(),
        );
        let consistency = service.check_consistency(
            vec![ConsistencyCheckEntry::new(a, b).with_selectors(tick, state, frame)],
            Arc::new(()),
            CancellationToken::new(),
        );
        let (latency, consistency) = tokio::join!(latency, consistency);

        let report = latency.unwrap().completed().unwrap();
        assert_eq!(report.series().len(), 1);
        assert_eq!(report.max(), Some(40));

        let (entries, run) = consistency.unwrap();
        assert_eq!(run.completed().unwrap().inconsistent_iterations, 1);
        assert_eq!(entries[0].consistency, ConsistencyScore::Percent(0.0));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let log = shared_log();
        let service = AnalysisService::new(Arc::clone(&log));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = service
            .compute_latency(
                vec![
                    PathNode::new(log.actor_by_name("a").unwrap()),
                    PathNode::new(log.actor_by_name("b").unwrap()),
                ],
                vec![PathEdge::new(log.message_type_by_name("State").unwrap())],
                Arc::new(()),
                cancel,
            )
            .await
            .unwrap();

        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn configuration_errors_surface_from_worker() {
        let service = AnalysisService::new(shared_log());
        let err = service
            .compute_latency(Vec::new(), Vec::new(), Arc::new(()), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::EmptyPath);
    }
}
