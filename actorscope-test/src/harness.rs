use actorscope::{PairRequest, PathRequest, Session};
use actorscope_core::{
    Analysis, CancellationToken, Config, ConsistencyCheckEntry, ConsistencyRun, EventLogSnapshot,
    LatencyReport,
};
use anyhow::{Context, Result};

/// Drives a [`Session`] the way the CLI does, with requests given as JSON values.
pub struct TestApp {
    session: Session,
}

impl TestApp {
    pub fn new(mut config: Config, snapshot: EventLogSnapshot) -> Result<Self> {
        config.analysis.log_skipped = false;
        config.validate()?;

        let log = snapshot.into_log().context("fixture snapshot failed to ingest")?;
        Ok(Self {
            session: Session::new(config, log),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn latency(&self, path: serde_json::Value) -> Result<LatencyReport> {
        match self.latency_with(path, CancellationToken::new()).await? {
            Analysis::Completed(report) => Ok(report),
            Analysis::Cancelled => anyhow::bail!("latency discovery was cancelled"),
        }
    }

    pub async fn latency_with(
        &self,
        path: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<Analysis<LatencyReport>> {
        let request: PathRequest = serde_json::from_value(path)?;
        self.session.latency(&request, cancel).await
    }

    pub async fn consistency(
        &self,
        pairs: serde_json::Value,
        discover: bool,
    ) -> Result<(Vec<ConsistencyCheckEntry>, Option<ConsistencyRun>)> {
        let request: PairRequest = serde_json::from_value(pairs)?;
        let (entries, outcome) = self
            .session
            .consistency(&request, discover, CancellationToken::new())
            .await?;
        Ok((entries, outcome.completed()))
    }
}
