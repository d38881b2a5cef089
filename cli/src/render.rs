use crate::session::ActorSummary;
use actorscope_core::{
    ConsistencyCheckEntry, ConsistencyRun, EventLog, LatencyReport, Summary,
};
use itertools::Itertools;
use std::fmt::Write;

fn summary_line(summary: Option<Summary>) -> String {
    match summary {
        Some(s) => format!(
            "n={} min={} max={} avg={:.2} median={}",
            s.count, s.min, s.max, s.average, s.median
        ),
        None => "no samples".to_string(),
    }
}

/// Text rendering of a latency report: end-to-end summary, then one row per segment.
pub fn latency_table(log: &EventLog, report: &LatencyReport) -> String {
    let mut out = String::new();
    let skipped = report.skipped();

    let _ = writeln!(out, "End-to-end latency: {}", summary_line(report.summary()));
    let _ = writeln!(
        out,
        "Skipped occurrences: {} ambiguous, {} unmatched",
        skipped.ambiguous, skipped.unmatched
    );
    let _ = writeln!(
        out,
        "{:<4} {:<22} {:<28} {:<28} {}",
        "#", "PHASE", "ACTOR", "MESSAGE", "STATS"
    );

    for (index, segment) in report.chain().iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<4} {:<22} {:<28} {:<28} {}",
            index,
            segment.kind.label(),
            log.actor(segment.actor).short_name,
            log.message_type(segment.message_type).short_name,
            summary_line(segment.stats().summary())
        );
    }

    out
}

pub fn consistency_table(
    log: &EventLog,
    entries: &[ConsistencyCheckEntry],
    run: Option<&ConsistencyRun>,
) -> String {
    let mut out = String::new();
    let type_name = |id: Option<actorscope_core::MessageTypeId>| {
        id.map(|id| log.message_type(id).short_name.clone())
            .unwrap_or_else(|| "-".into())
    };

    let _ = writeln!(
        out,
        "{:<24} {:<24} {:<18} {:<18} {:<18} {:>8}",
        "SOURCE", "TARGET", "SOURCE LOOP", "TRANSFER", "TARGET LOOP", "SCORE"
    );
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<24} {:<24} {:<18} {:<18} {:<18} {:>8}",
            log.actor(entry.source).short_name,
            log.actor(entry.target).short_name,
            type_name(entry.source_loop),
            type_name(entry.transfer),
            type_name(entry.target_loop),
            entry.consistency.to_string()
        );
    }

    match run {
        Some(run) => {
            let _ = writeln!(
                out,
                "Checked {} entries ({} unconfigured): {} of {} iterations inconsistent, {} unsupported transfers",
                run.checked,
                run.unconfigured,
                run.inconsistent_iterations,
                run.iterations,
                run.unsupported_transfers
            );
        }
        None => {
            let _ = writeln!(out, "Check cancelled, scores above are partial");
        }
    }

    out
}

pub fn actors_table(actors: &[ActorSummary]) -> String {
    let mut out = String::new();

    for actor in actors {
        let _ = writeln!(out, "{} ({})", actor.name, actor.type_name);
        if !actor.processed.is_empty() {
            let processed = actor
                .processed
                .iter()
                .map(|(name, count)| format!("{name} x{count}"))
                .join(", ");
            let _ = writeln!(out, "  processes: {processed}");
        }
        for (receiver, types) in &actor.receivers {
            let sent = types
                .iter()
                .map(|(name, count)| format!("{name} x{count}"))
                .join(", ");
            let _ = writeln!(out, "  sends to {receiver}: {sent}");
        }
    }

    out
}
