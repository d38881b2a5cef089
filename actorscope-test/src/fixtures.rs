use actorscope_core::model::{ActorRecord, EventLogSnapshot, ProcessingRecord, SendRecord};
use serde::Serialize;
use serde_json::{json, Value};

pub const PHYSICS: &str = "akka://sim/user/physics";
pub const RENDERER: &str = "akka://sim/user/renderer";
pub const DISPLAY: &str = "akka://sim/user/display";

#[derive(Debug, Clone, Serialize)]
pub struct PipelineFixture {
    pub snapshot: EventLogSnapshot,
    pub iterations: usize,
    /// End-to-end latency of physics tick -> display, per iteration.
    pub expected_latencies: Vec<i64>,
    /// Share of physics ticks whose update was applied before the renderer's next frame.
    pub expected_consistency: f64,
}

/// Physics ticks every 100 units and pushes an update to the renderer, which
/// forwards a draw call to the display. The renderer's own frame loop starts in
/// the middle of applying every second update.
pub fn pipeline_fixture() -> PipelineFixture {
    let iterations = 4;
    let mut snapshot = EventLogSnapshot {
        actors: vec![
            actor(PHYSICS, "class sim.Physics", 0, None),
            actor(RENDERER, "class sim.Renderer", 1, Some(PHYSICS)),
            actor(DISPLAY, "class sim.Display", 2, Some(RENDERER)),
        ],
        ..Default::default()
    };

    for i in 0..iterations as i64 {
        let base = 100 * i;
        let id = i as u64;

        snapshot
            .processing
            .push(processing(base, base + 20, "sim.Tick", id, PHYSICS, PHYSICS));
        snapshot
            .sends
            .push(send(base + 10, PHYSICS, RENDERER, "sim.Update", id));
        snapshot.processing.push(processing(
            base + 15,
            base + 25,
            "sim.Update",
            id,
            PHYSICS,
            RENDERER,
        ));
        snapshot
            .sends
            .push(send(base + 22, RENDERER, DISPLAY, "sim.Draw", id));
        snapshot.processing.push(processing(
            base + 30,
            base + 34 + 2 * i,
            "sim.Draw",
            id,
            RENDERER,
            DISPLAY,
        ));

        let frame_start = if i % 2 == 0 { base + 40 } else { base + 20 };
        snapshot.processing.push(processing(
            frame_start,
            frame_start + 3,
            "sim.Frame",
            id,
            RENDERER,
            RENDERER,
        ));
    }

    PipelineFixture {
        snapshot,
        iterations,
        expected_latencies: vec![34, 36, 38, 40],
        expected_consistency: 50.0,
    }
}

/// physics (looping on ticks) -> renderer -> display.
pub fn pipeline_path() -> Value {
    json!({
        "nodes": [
            {"actor": PHYSICS, "loop_message": "sim.Tick"},
            {"actor": RENDERER},
            {"actor": DISPLAY}
        ],
        "edges": [
            {"message": "sim.Update"},
            {"message": "sim.Draw"}
        ]
    })
}

pub fn pipeline_pairs() -> Value {
    json!({
        "pairs": [{
            "source": PHYSICS,
            "target": RENDERER,
            "source_loop": "sim.Tick",
            "transfer": "sim.Update",
            "target_loop": "sim.Frame"
        }]
    })
}

fn actor(id: &str, type_name: &str, created: i64, supervisor: Option<&str>) -> ActorRecord {
    ActorRecord {
        id: id.into(),
        type_name: type_name.into(),
        created: Some(created),
        supervisor: supervisor.map(Into::into),
    }
}

fn send(timestamp: i64, sender: &str, receiver: &str, message_type: &str, id: u64) -> SendRecord {
    SendRecord {
        timestamp,
        sender: sender.into(),
        receiver: receiver.into(),
        message_type: message_type.into(),
        message_id: id,
    }
}

fn processing(
    start: i64,
    end: i64,
    message_type: &str,
    id: u64,
    sender: &str,
    receiver: &str,
) -> ProcessingRecord {
    ProcessingRecord {
        start,
        end,
        message_type: message_type.into(),
        message_id: id,
        sender: sender.into(),
        receiver: receiver.into(),
    }
}
