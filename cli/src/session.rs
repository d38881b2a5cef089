use crate::request::{PairRequest, PathRequest};
use actorscope_core::{
    ActorId, Analysis, AnalysisService, CancellationToken, Config, ConsistencyCheckEntry,
    ConsistencyProgress, ConsistencyRun, EventLog, EventLogSnapshot, LatencyReport, ProgressSink,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// A loaded event log plus the service that analyses it.
pub struct Session {
    service: AnalysisService,
}

impl Session {
    pub fn new(config: Config, log: EventLog) -> Self {
        let service = AnalysisService::new(Arc::new(log)).with_config(config.analysis);
        Self { service }
    }

    /// Load a JSON event-log snapshot from disk.
    pub fn open(config: Config, log_path: &Path) -> Result<Self> {
        let log = EventLogSnapshot::from_file(log_path)?
            .into_log()
            .with_context(|| format!("Failed to ingest event log {:?}", log_path))?;

        tracing::info!(
            path = ?log_path,
            actors = log.actors().len(),
            message_types = log.message_types().len(),
            "event log loaded"
        );

        Ok(Self::new(config, log))
    }

    pub fn log(&self) -> &EventLog {
        self.service.log()
    }

    pub async fn latency(
        &self,
        request: &PathRequest,
        cancel: CancellationToken,
    ) -> Result<Analysis<LatencyReport>> {
        let (nodes, edges) = request.resolve(self.log())?;
        let progress: Arc<dyn ProgressSink> = Arc::new(|percent: u32| {
            tracing::debug!(percent, "latency progress");
        });

        let outcome = self
            .service
            .compute_latency(nodes, edges, progress, cancel)
            .await?;
        Ok(outcome)
    }

    /// Score the requested pairs. With `discover`, every communicating pair not
    /// listed in the request is added unconfigured.
    pub async fn consistency(
        &self,
        request: &PairRequest,
        discover: bool,
        cancel: CancellationToken,
    ) -> Result<(Vec<ConsistencyCheckEntry>, Analysis<ConsistencyRun>)> {
        let mut request = request.clone();
        if discover {
            request.discover(self.log());
        }
        let entries = request.resolve(self.log())?;

        let progress: Arc<dyn ConsistencyProgress> = Arc::new((
            |percent: u32| tracing::debug!(percent, "consistency progress"),
            |percent: u32| tracing::trace!(percent, "consistency entry progress"),
        ));

        let outcome = self
            .service
            .check_consistency(entries, progress, cancel)
            .await?;
        Ok(outcome)
    }

    /// Per-actor overview used to pick path nodes and consistency selectors.
    pub fn actors(&self) -> Vec<ActorSummary> {
        let log = self.log();
        log.actors()
            .iter()
            .filter(|actor| {
                actor.id != log.unknown_actor()
                    || log.processed_count(actor.id) + log.sent_count(actor.id) > 0
            })
            .map(|actor| ActorSummary::new(log, actor.id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSummary {
    pub name: String,
    pub type_name: String,
    pub processed: Vec<(String, usize)>,
    pub receivers: Vec<(String, Vec<(String, usize)>)>,
}

impl ActorSummary {
    fn new(log: &EventLog, actor: ActorId) -> Self {
        let instance = log.actor(actor);
        let processed = log
            .processed_types(actor)
            .into_iter()
            .map(|(message_type, count)| (log.message_type(message_type).name.clone(), count))
            .collect();
        let receivers = log
            .receivers_of(actor)
            .into_iter()
            .map(|(receiver, types)| {
                let types = types
                    .into_iter()
                    .map(|(message_type, count)| {
                        (log.message_type(message_type).name.clone(), count)
                    })
                    .collect();
                (log.actor(receiver).name.clone(), types)
            })
            .collect();

        Self {
            name: instance.name.clone(),
            type_name: instance.type_name.clone(),
            processed,
            receivers,
        }
    }
}
