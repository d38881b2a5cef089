use actorscope_core::{
    ActorId, ConsistencyCheckEntry, EventLog, MessageTypeId, PathEdge, PathNode,
};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read a request file, picking the format from its extension (`.json`, anything else is TOML).
pub fn load_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {:?}", path))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
    } else {
        toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
    }
}

/// One actor on a causal path, named as it appears in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeSpec {
    pub actor: String,
    /// Loop message the actor processes once per iteration.
    #[serde(default)]
    pub loop_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EdgeSpec {
    pub message: String,
}

/// Causal path for the `latency` command.
///
/// ```toml
/// [[nodes]]
/// actor = "akka://app/user/physics"
/// loop_message = "sim.Tick"
///
/// [[nodes]]
/// actor = "akka://app/user/renderer"
///
/// [[edges]]
/// message = "sim.Update"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathRequest {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl PathRequest {
    /// Translate names into ids of `log`.
    pub fn resolve(&self, log: &EventLog) -> Result<(Vec<PathNode>, Vec<PathEdge>)> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let actor = actor(log, &node.actor)?;
                Ok(match &node.loop_message {
                    Some(name) => PathNode::with_loop(actor, message_type(log, name)?),
                    None => PathNode::new(actor),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let edges = self
            .edges
            .iter()
            .map(|edge| Ok(PathEdge::new(message_type(log, &edge.message)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok((nodes, edges))
    }
}

/// Actor pair for the `consistency` command. Missing selectors leave the entry unconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairSpec {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_loop: Option<String>,
    #[serde(default)]
    pub transfer: Option<String>,
    #[serde(default)]
    pub target_loop: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairRequest {
    #[serde(default)]
    pub pairs: Vec<PairSpec>,
}

impl PairRequest {
    pub fn resolve(&self, log: &EventLog) -> Result<Vec<ConsistencyCheckEntry>> {
        self.pairs
            .iter()
            .map(|pair| {
                let optional = |name: &Option<String>| -> Result<Option<MessageTypeId>> {
                    name.as_deref().map(|n| message_type(log, n)).transpose()
                };

                let mut entry =
                    ConsistencyCheckEntry::new(actor(log, &pair.source)?, actor(log, &pair.target)?);
                entry.source_loop = optional(&pair.source_loop)?;
                entry.transfer = optional(&pair.transfer)?;
                entry.target_loop = optional(&pair.target_loop)?;
                Ok(entry)
            })
            .collect()
    }

    /// Append one unconfigured pair for every communicating pair not already listed.
    pub fn discover(&mut self, log: &EventLog) {
        for candidate in ConsistencyCheckEntry::candidates(log) {
            let source = &log.actor(candidate.source).name;
            let target = &log.actor(candidate.target).name;
            let listed = self
                .pairs
                .iter()
                .any(|pair| &pair.source == source && &pair.target == target);
            if !listed {
                self.pairs.push(PairSpec {
                    source: source.clone(),
                    target: target.clone(),
                    source_loop: None,
                    transfer: None,
                    target_loop: None,
                });
            }
        }
    }
}

fn actor(log: &EventLog, name: &str) -> Result<ActorId> {
    log.actor_by_name(name)
        .ok_or_else(|| anyhow!("No actor named {:?} in the event log", name))
}

fn message_type(log: &EventLog, name: &str) -> Result<MessageTypeId> {
    log.message_type_by_name(name)
        .ok_or_else(|| anyhow!("No message type named {:?} in the event log", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actorscope_core::EventLogBuilder;

    fn log() -> EventLog {
        let mut builder = EventLogBuilder::new();
        builder.register_actor("Sim", "a", None, None).unwrap();
        builder.register_actor("Render", "b", None, None).unwrap();
        builder.register_processing(0, 10, "Tick", 1, "a", "a").unwrap();
        builder.register_sending(5, "a", "b", "State", 1).unwrap();
        builder.build()
    }

    #[test]
    fn path_request_parses_from_toml() {
        let request: PathRequest = toml::from_str(
            r#"
            [[nodes]]
            actor = "a"
            loop_message = "Tick"

            [[nodes]]
            actor = "b"

            [[edges]]
            message = "State"
            "#,
        )
        .unwrap();

        let log = log();
        let (nodes, edges) = request.resolve(&log).unwrap();

        assert_eq!(nodes[0].loop_type, log.message_type_by_name("Tick"));
        assert_eq!(nodes[1].actor, log.actor_by_name("b").unwrap());
        assert_eq!(edges[0].message_type, log.message_type_by_name("State").unwrap());
    }

    #[test]
    fn unknown_names_are_reported() {
        let request = PathRequest {
            nodes: vec![NodeSpec {
                actor: "nobody".into(),
                loop_message: None,
            }],
            edges: Vec::new(),
        };
        let err = request.resolve(&log()).unwrap_err();
        assert!(err.to_string().contains("nobody"));
    }

    #[test]
    fn discover_skips_listed_pairs() {
        let log = log();
        let mut request: PairRequest = serde_json::from_str(
            r#"{"pairs": [{"source": "a", "target": "b", "transfer": "State"}]}"#,
        )
        .unwrap();

        request.discover(&log);
        assert_eq!(request.pairs.len(), 1);

        let entries = request.resolve(&log).unwrap();
        assert!(!entries[0].is_configured());
        assert_eq!(entries[0].transfer, log.message_type_by_name("State"));
    }
}
