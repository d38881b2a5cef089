use anyhow::{bail, Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A point in time on the traced runtime's clock.
pub type Timestamp = i64;

/// Difference between two [`Timestamp`]s.
pub type Elapsed = i64;

/// Name given to the actor instance that absorbs references to unregistered actors.
pub const UNKNOWN_ACTOR: &str = "Unknown Instance";
const UNKNOWN_ACTOR_TYPE: &str = "Unknown Type";

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(usize);

        impl $name {
            /// Position of the referenced record inside the [`EventLog`].
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_index!(
    /// Identity of an actor instance.
    ActorId
);
arena_index!(
    /// Identity of a message type (one per distinct type name).
    MessageTypeId
);
arena_index!(
    /// Identity of a message instance, i.e. one (type, message id) pair.
    MessageInstanceId
);
arena_index!(SentEventId);
arena_index!(ProcessingEventId);

/// One actor in the traced run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorInstance {
    pub id: ActorId,
    /// Full actor path as recorded by the runtime.
    pub name: String,
    /// Last path segment of `name`.
    pub short_name: String,
    pub type_name: String,
    pub short_type_name: String,
    pub created: Option<Timestamp>,
    pub supervisor: Option<ActorId>,
    processed: Vec<ProcessingEventId>,
    sent: Vec<SentEventId>,
}

/// Static type of a message. Two messages share a type iff their type names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessageType {
    pub id: MessageTypeId,
    pub name: String,
    pub short_name: String,
}

/// One logical message occurrence, correlating its sends with its processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageInstance {
    pub id: MessageInstanceId,
    pub message_type: MessageTypeId,
    pub message_id: u64,
    sent: Vec<SentEventId>,
    processed: Vec<ProcessingEventId>,
}

impl MessageInstance {
    /// Sent events recorded for this message, in log order.
    pub fn sent_events(&self) -> &[SentEventId] {
        &self.sent
    }

    /// Processing events recorded for this message, in log order.
    pub fn processing_events(&self) -> &[ProcessingEventId] {
        &self.processed
    }
}

/// "Message was enqueued."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageSentEvent {
    pub sender: ActorId,
    pub receiver: ActorId,
    pub timestamp: Timestamp,
    pub message: MessageInstanceId,
}

/// "Message was executed" by `receiver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageProcessingEvent {
    pub sender: ActorId,
    pub receiver: ActorId,
    pub start: Timestamp,
    pub end: Timestamp,
    pub message: MessageInstanceId,
}

/// Immutable, fully loaded trace of one actor runtime execution.
///
/// The log is built once by [`EventLogBuilder`] and then only read; share it
/// between analyses through an `Arc<EventLog>`.
#[derive(Debug, Clone)]
pub struct EventLog {
    actors: Vec<ActorInstance>,
    message_types: Vec<MessageType>,
    messages: Vec<MessageInstance>,
    sent_events: Vec<MessageSentEvent>,
    processing_events: Vec<MessageProcessingEvent>,
    actor_index: HashMap<String, ActorId>,
    type_index: HashMap<String, MessageTypeId>,
    unknown_actor: ActorId,
}

impl EventLog {
    pub fn actors(&self) -> &[ActorInstance] {
        &self.actors
    }

    pub fn message_types(&self) -> &[MessageType] {
        &self.message_types
    }

    pub fn actor(&self, id: ActorId) -> &ActorInstance {
        &self.actors[id.0]
    }

    pub fn message_type(&self, id: MessageTypeId) -> &MessageType {
        &self.message_types[id.0]
    }

    pub fn message(&self, id: MessageInstanceId) -> &MessageInstance {
        &self.messages[id.0]
    }

    pub fn sent_event(&self, id: SentEventId) -> &MessageSentEvent {
        &self.sent_events[id.0]
    }

    pub fn processing_event(&self, id: ProcessingEventId) -> &MessageProcessingEvent {
        &self.processing_events[id.0]
    }

    pub fn contains_actor(&self, id: ActorId) -> bool {
        id.0 < self.actors.len()
    }

    pub fn contains_message_type(&self, id: MessageTypeId) -> bool {
        id.0 < self.message_types.len()
    }

    /// The shared instance that stands in for actors referenced but never registered.
    pub fn unknown_actor(&self) -> ActorId {
        self.unknown_actor
    }

    pub fn actor_by_name(&self, name: &str) -> Option<ActorId> {
        self.actor_index.get(name).copied()
    }

    /// Accepts the runtime's raw spelling ("class sim.Update") as well as the
    /// long name shown in listings ("sim.Update").
    pub fn message_type_by_name(&self, name: &str) -> Option<MessageTypeId> {
        self.type_index.get(long_type_name(name)).copied()
    }

    /// Type of the message carried by a sent or processing event.
    pub fn type_of(&self, message: MessageInstanceId) -> MessageTypeId {
        self.messages[message.0].message_type
    }

    /// Processing events executed by `actor`, in log order.
    pub fn processed_by(
        &self,
        actor: ActorId,
    ) -> impl Iterator<Item = &MessageProcessingEvent> + '_ {
        self.actors[actor.0]
            .processed
            .iter()
            .map(move |id| &self.processing_events[id.0])
    }

    /// Sent events issued by `actor`, in log order.
    pub fn sent_by(&self, actor: ActorId) -> impl Iterator<Item = &MessageSentEvent> + '_ {
        self.actors[actor.0]
            .sent
            .iter()
            .map(move |id| &self.sent_events[id.0])
    }

    pub fn processed_count(&self, actor: ActorId) -> usize {
        self.actors[actor.0].processed.len()
    }

    pub fn sent_count(&self, actor: ActorId) -> usize {
        self.actors[actor.0].sent.len()
    }

    /// Earliest and latest timestamp over actor creation, sends and processing.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let created = self.actors.iter().filter_map(|a| a.created);
        let sent = self.sent_events.iter().map(|e| e.timestamp);
        let processed = self
            .processing_events
            .iter()
            .flat_map(|e| [e.start, e.end]);

        created.chain(sent).chain(processed).fold(None, |acc, ts| match acc {
            None => Some((ts, ts)),
            Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
        })
    }

    /// Message types `actor` has processed, with how often each was processed.
    pub fn processed_types(&self, actor: ActorId) -> BTreeMap<MessageTypeId, usize> {
        let mut counts = BTreeMap::new();
        for event in self.processed_by(actor) {
            *counts.entry(self.type_of(event.message)).or_insert(0) += 1;
        }
        counts
    }

    /// Who `actor` sent messages to, broken down by message type.
    pub fn receivers_of(
        &self,
        actor: ActorId,
    ) -> BTreeMap<ActorId, BTreeMap<MessageTypeId, usize>> {
        let mut receivers: BTreeMap<ActorId, BTreeMap<MessageTypeId, usize>> = BTreeMap::new();
        for event in self.sent_by(actor) {
            *receivers
                .entry(event.receiver)
                .or_default()
                .entry(self.type_of(event.message))
                .or_insert(0) += 1;
        }
        receivers
    }

    /// Every ordered (sender, receiver) pair that exchanged at least one message.
    pub fn communication_pairs(&self) -> Vec<(ActorId, ActorId)> {
        self.sent_events
            .iter()
            .filter(|e| e.sender != e.receiver)
            .map(|e| (e.sender, e.receiver))
            .sorted()
            .dedup()
            .collect()
    }
}

/// Incrementally assembles an [`EventLog`] from ingested records.
///
/// Records may arrive in any order. Sends and processing events that name an
/// actor which was never registered are attributed to [`UNKNOWN_ACTOR`].
#[derive(Debug)]
pub struct EventLogBuilder {
    log: EventLog,
    message_index: HashMap<(MessageTypeId, u64), MessageInstanceId>,
}

impl Default for EventLogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLogBuilder {
    pub fn new() -> Self {
        let unknown = ActorInstance {
            id: ActorId(0),
            name: UNKNOWN_ACTOR.to_string(),
            short_name: UNKNOWN_ACTOR.to_string(),
            type_name: UNKNOWN_ACTOR_TYPE.to_string(),
            short_type_name: UNKNOWN_ACTOR_TYPE.to_string(),
            created: None,
            supervisor: None,
            processed: Vec::new(),
            sent: Vec::new(),
        };

        let mut actor_index = HashMap::new();
        actor_index.insert(UNKNOWN_ACTOR.to_string(), ActorId(0));

        Self {
            log: EventLog {
                actors: vec![unknown],
                message_types: Vec::new(),
                messages: Vec::new(),
                sent_events: Vec::new(),
                processing_events: Vec::new(),
                actor_index,
                type_index: HashMap::new(),
                unknown_actor: ActorId(0),
            },
            message_index: HashMap::new(),
        }
    }

    /// Register an actor instance. Registering the same id twice returns the first registration.
    pub fn register_actor(
        &mut self,
        type_name: &str,
        id: &str,
        created: Option<Timestamp>,
        supervisor: Option<&str>,
    ) -> Result<ActorId> {
        if id.is_empty() {
            bail!("actor id must not be empty");
        }
        if type_name.is_empty() {
            bail!("actor type name of {} must not be empty", id);
        }
        if let Some(existing) = self.log.actor_index.get(id) {
            return Ok(*existing);
        }

        let actor_id = ActorId(self.log.actors.len());
        let supervisor = supervisor.and_then(|name| self.log.actor_index.get(name).copied());

        self.log.actors.push(ActorInstance {
            id: actor_id,
            name: id.to_string(),
            short_name: last_segment(id, '/').to_string(),
            type_name: long_type_name(type_name).to_string(),
            short_type_name: last_segment(type_name, '.').to_string(),
            created,
            supervisor,
            processed: Vec::new(),
            sent: Vec::new(),
        });
        self.log.actor_index.insert(id.to_string(), actor_id);

        Ok(actor_id)
    }

    /// Record that `sender` enqueued message `message_id` of `message_type` for `receiver`.
    pub fn register_sending(
        &mut self,
        timestamp: Timestamp,
        sender: &str,
        receiver: &str,
        message_type: &str,
        message_id: u64,
    ) -> Result<SentEventId> {
        let message = self.message_instance(message_type, message_id)?;
        let sender = self.resolve_actor(sender);
        let receiver = self.resolve_actor(receiver);

        let event_id = SentEventId(self.log.sent_events.len());
        self.log.sent_events.push(MessageSentEvent {
            sender,
            receiver,
            timestamp,
            message,
        });
        self.log.messages[message.0].sent.push(event_id);
        self.log.actors[sender.0].sent.push(event_id);

        Ok(event_id)
    }

    /// Record that `receiver` executed message `message_id` of `message_type` during `[start, end]`.
    pub fn register_processing(
        &mut self,
        start: Timestamp,
        end: Timestamp,
        message_type: &str,
        message_id: u64,
        sender: &str,
        receiver: &str,
    ) -> Result<ProcessingEventId> {
        if end < start {
            bail!(
                "processing of {} #{} ends ({}) before it starts ({})",
                message_type,
                message_id,
                end,
                start
            );
        }

        let message = self.message_instance(message_type, message_id)?;
        let sender = self.resolve_actor(sender);
        let receiver = self.resolve_actor(receiver);

        let event_id = ProcessingEventId(self.log.processing_events.len());
        self.log.processing_events.push(MessageProcessingEvent {
            sender,
            receiver,
            start,
            end,
            message,
        });
        self.log.messages[message.0].processed.push(event_id);
        self.log.actors[receiver.0].processed.push(event_id);

        Ok(event_id)
    }

    pub fn build(self) -> EventLog {
        tracing::debug!(
            actors = self.log.actors.len(),
            message_types = self.log.message_types.len(),
            sends = self.log.sent_events.len(),
            processing = self.log.processing_events.len(),
            "event log built"
        );
        self.log
    }

    fn resolve_actor(&self, name: &str) -> ActorId {
        self.log
            .actor_index
            .get(name)
            .copied()
            .unwrap_or(self.log.unknown_actor)
    }

    fn message_type_id(&mut self, name: &str) -> Result<MessageTypeId> {
        let long_name = long_type_name(name);
        if long_name.is_empty() {
            bail!("message type name must not be empty");
        }
        if let Some(id) = self.log.type_index.get(long_name) {
            return Ok(*id);
        }

        let id = MessageTypeId(self.log.message_types.len());
        self.log.message_types.push(MessageType {
            id,
            name: long_name.to_string(),
            short_name: last_segment(long_name, '.').to_string(),
        });
        self.log.type_index.insert(long_name.to_string(), id);
        Ok(id)
    }

    fn message_instance(&mut self, message_type: &str, message_id: u64) -> Result<MessageInstanceId> {
        let type_id = self.message_type_id(message_type)?;
        let log = &mut self.log;
        let id = *self
            .message_index
            .entry((type_id, message_id))
            .or_insert_with(|| {
                let id = MessageInstanceId(log.messages.len());
                log.messages.push(MessageInstance {
                    id,
                    message_type: type_id,
                    message_id,
                    sent: Vec::new(),
                    processed: Vec::new(),
                });
                id
            });
        Ok(id)
    }
}

// "class foo.bar.Baz" -> "foo.bar.Baz"
fn long_type_name(raw: &str) -> &str {
    raw.rsplit(' ').next().unwrap_or(raw)
}

fn last_segment(raw: &str, separator: char) -> &str {
    raw.rsplit(separator).next().unwrap_or(raw)
}

/// Actor creation record of an [`EventLogSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub id: String,
    pub type_name: String,
    #[serde(default)]
    pub created: Option<Timestamp>,
    #[serde(default)]
    pub supervisor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRecord {
    pub timestamp: Timestamp,
    pub sender: String,
    pub receiver: String,
    pub message_type: String,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub start: Timestamp,
    pub end: Timestamp,
    pub message_type: String,
    pub message_id: u64,
    pub sender: String,
    pub receiver: String,
}

/// Serialisable hand-off form of an already ingested log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLogSnapshot {
    #[serde(default)]
    pub actors: Vec<ActorRecord>,
    #[serde(default)]
    pub sends: Vec<SendRecord>,
    #[serde(default)]
    pub processing: Vec<ProcessingRecord>,
}

impl EventLogSnapshot {
    /// Load a JSON snapshot from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read event log {:?}", path.as_ref()))?;
        serde_json::from_str(&contents).context("Failed to parse event log snapshot")
    }

    /// Replay the records through an [`EventLogBuilder`].
    ///
    /// Actors are registered first so that sends and processing events resolve
    /// regardless of record order.
    pub fn into_log(self) -> Result<EventLog> {
        let mut builder = EventLogBuilder::new();

        for actor in &self.actors {
            builder.register_actor(
                &actor.type_name,
                &actor.id,
                actor.created,
                actor.supervisor.as_deref(),
            )?;
        }
        for send in &self.sends {
            builder.register_sending(
                send.timestamp,
                &send.sender,
                &send.receiver,
                &send.message_type,
                send.message_id,
            )?;
        }
        for processing in &self.processing {
            builder.register_processing(
                processing.start,
                processing.end,
                &processing.message_type,
                processing.message_id,
                &processing.sender,
                &processing.receiver,
            )?;
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_actor_builder() -> EventLogBuilder {
        let mut builder = EventLogBuilder::new();
        builder
            .register_actor("class sim.Physics", "akka://app/user/physics", Some(0), None)
            .unwrap();
        builder
            .register_actor(
                "class sim.Renderer",
                "akka://app/user/renderer",
                Some(1),
                Some("akka://app/user/physics"),
            )
            .unwrap();
        builder
    }

    #[test]
    fn message_instances_correlate_sends_and_processing() {
        let mut builder = two_actor_builder();
        builder
            .register_sending(10, "akka://app/user/physics", "akka://app/user/renderer", "sim.Update", 7)
            .unwrap();
        builder
            .register_processing(15, 20, "sim.Update", 7, "akka://app/user/physics", "akka://app/user/renderer")
            .unwrap();
        let log = builder.build();

        let update = log.message_type_by_name("sim.Update").unwrap();
        let renderer = log.actor_by_name("akka://app/user/renderer").unwrap();
        let processed: Vec<_> = log.processed_by(renderer).collect();
        assert_eq!(processed.len(), 1);

        let message = log.message(processed[0].message);
        assert_eq!(message.message_type, update);
        assert_eq!(message.message_id, 7);
        assert_eq!(message.sent_events().len(), 1);
        assert_eq!(log.sent_event(message.sent_events()[0]).timestamp, 10);
    }

    #[test]
    fn unregistered_actors_resolve_to_unknown_instance() {
        let mut builder = EventLogBuilder::new();
        builder.register_sending(5, "ghost", "phantom", "Ping", 1).unwrap();
        let log = builder.build();

        let sends: Vec<_> = log.sent_by(log.unknown_actor()).collect();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].receiver, log.unknown_actor());
        assert!(log.actor_by_name("ghost").is_none());
    }

    #[test]
    fn names_are_shortened_like_the_runtime_prints_them() {
        let log = two_actor_builder().build();
        let renderer = log.actor(log.actor_by_name("akka://app/user/renderer").unwrap());

        assert_eq!(renderer.short_name, "renderer");
        assert_eq!(renderer.type_name, "sim.Renderer");
        assert_eq!(renderer.short_type_name, "Renderer");
        assert_eq!(renderer.supervisor, log.actor_by_name("akka://app/user/physics"));
    }

    #[test]
    fn message_types_are_keyed_by_long_name() {
        let mut builder = two_actor_builder();
        let physics = "akka://app/user/physics";
        let renderer = "akka://app/user/renderer";
        builder
            .register_sending(1, physics, renderer, "class sim.Update", 1)
            .unwrap();
        builder
            .register_processing(2, 3, "sim.Update", 1, physics, renderer)
            .unwrap();
        let log = builder.build();

        assert_eq!(log.message_types().len(), 1);
        let update = log.message_type_by_name("sim.Update").unwrap();
        assert_eq!(log.message_type_by_name("class sim.Update"), Some(update));
        assert_eq!(log.message_type(update).short_name, "Update");

        // Both spellings name the same message instance.
        let message = log.message(log.sent_event(SentEventId(0)).message);
        assert_eq!(message.processing_events().len(), 1);
    }

    #[test]
    fn processing_must_not_end_before_it_starts() {
        let mut builder = two_actor_builder();
        let result = builder.register_processing(
            20,
            10,
            "sim.Update",
            1,
            "akka://app/user/physics",
            "akka://app/user/renderer",
        );
        assert!(result.is_err());
    }

    #[test]
    fn communication_helpers_summarise_topology() {
        let mut builder = two_actor_builder();
        let physics = "akka://app/user/physics";
        let renderer = "akka://app/user/renderer";
        builder.register_sending(1, physics, renderer, "sim.Update", 1).unwrap();
        builder.register_sending(2, physics, renderer, "sim.Update", 2).unwrap();
        builder.register_sending(3, renderer, physics, "sim.Ack", 1).unwrap();
        builder.register_processing(0, 4, "sim.Tick", 1, physics, physics).unwrap();
        let log = builder.build();

        let physics = log.actor_by_name(physics).unwrap();
        let renderer = log.actor_by_name(renderer).unwrap();
        let update = log.message_type_by_name("sim.Update").unwrap();
        let tick = log.message_type_by_name("sim.Tick").unwrap();

        assert_eq!(log.receivers_of(physics)[&renderer][&update], 2);
        assert_eq!(log.processed_types(physics)[&tick], 1);
        assert_eq!(
            log.communication_pairs(),
            vec![(physics, renderer), (renderer, physics)]
        );
        assert_eq!(log.time_range(), Some((0, 4)));
    }

    #[test]
    fn snapshot_replays_into_log() {
        let json = r#"{
            "actors": [
                {"id": "a", "type_name": "A", "created": 0},
                {"id": "b", "type_name": "B"}
            ],
            "sends": [
                {"timestamp": 3, "sender": "a", "receiver": "b", "message_type": "M", "message_id": 1}
            ],
            "processing": [
                {"start": 4, "end": 9, "message_type": "M", "message_id": 1, "sender": "a", "receiver": "b"}
            ]
        }"#;

        let snapshot: EventLogSnapshot = serde_json::from_str(json).unwrap();
        let log = snapshot.into_log().unwrap();
        let b = log.actor_by_name("b").unwrap();

        assert_eq!(log.processed_count(b), 1);
        assert_eq!(log.sent_count(log.actor_by_name("a").unwrap()), 1);
    }
}
