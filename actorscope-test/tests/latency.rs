use actorscope_core::{CancellationToken, Config, Pair, TimespanKind};
use actorscope_test::fixtures::{pipeline_fixture, pipeline_path, DISPLAY, RENDERER};
use actorscope_test::harness::TestApp;
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loop_driven_path_end_to_end() -> anyhow::Result<()> {
    let fixture = pipeline_fixture();
    let app = TestApp::new(Config::default(), fixture.snapshot.clone())?;

    let report = app.latency(pipeline_path()).await?;

    let latencies: Vec<i64> = report.series().iter().map(|pair| pair.b).collect();
    assert_eq!(latencies, fixture.expected_latencies);
    assert_eq!(report.series()[1], Pair::new(100, 36));

    assert_eq!(report.min(), Some(34));
    assert_eq!(report.max(), Some(40));
    assert_eq!(report.median(), Some(36));
    assert!((report.average().unwrap() - 37.0).abs() < 1e-9);

    assert_eq!(
        report.chain().kinds(),
        vec![
            TimespanKind::LoopToMailbox,
            TimespanKind::MessageInMailbox,
            TimespanKind::ProcessingToMailbox,
            TimespanKind::MessageInMailbox,
            TimespanKind::FinalProcessed,
        ]
    );

    // Every phase saw one sample per tick, and the phases add up to the total.
    let medians: Vec<i64> = report
        .chain()
        .iter()
        .map(|segment| {
            assert_eq!(segment.stats().count(), fixture.iterations);
            segment.stats().median().unwrap()
        })
        .collect();
    assert_eq!(medians, vec![10, 5, 7, 8, 6]);

    let skipped = report.skipped();
    assert_eq!((skipped.ambiguous, skipped.unmatched), (0, 0));

    Ok(())
}

#[tokio::test]
async fn mailbox_headed_path_starts_at_the_send() -> anyhow::Result<()> {
    let fixture = pipeline_fixture();
    let app = TestApp::new(Config::default(), fixture.snapshot)?;

    let report = app
        .latency(json!({
            "nodes": [{"actor": RENDERER}, {"actor": DISPLAY}],
            "edges": [{"message": "sim.Draw"}]
        }))
        .await?;

    assert_eq!(
        report.series(),
        &[
            Pair::new(22, 12),
            Pair::new(122, 14),
            Pair::new(222, 16),
            Pair::new(322, 18)
        ]
    );
    assert_eq!(report.chain().head().stats().samples(), &[8, 8, 8, 8]);

    Ok(())
}

#[tokio::test]
async fn snapshot_serialises_for_json_output() -> anyhow::Result<()> {
    let app = TestApp::new(Config::default(), pipeline_fixture().snapshot)?;
    let report = app.latency(pipeline_path()).await?;

    let value = serde_json::to_value(report.snapshot())?;

    assert_eq!(value["summary"]["median"], 36);
    assert_eq!(value["segments"].as_array().map(Vec::len), Some(5));
    assert_eq!(value["segments"][0]["kind"], "LoopToMailbox");

    Ok(())
}

#[tokio::test]
async fn cancelled_before_start_reports_cancellation() -> anyhow::Result<()> {
    let app = TestApp::new(Config::default(), pipeline_fixture().snapshot)?;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = app.latency_with(pipeline_path(), cancel).await?;
    assert!(outcome.is_cancelled());

    Ok(())
}

#[tokio::test]
async fn unknown_names_fail_before_analysis() -> anyhow::Result<()> {
    let app = TestApp::new(Config::default(), pipeline_fixture().snapshot)?;

    let err = app
        .latency(json!({
            "nodes": [{"actor": RENDERER}, {"actor": DISPLAY}],
            "edges": [{"message": "sim.Missing"}]
        }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("sim.Missing"));

    let err = app
        .latency(json!({"nodes": [{"actor": RENDERER}], "edges": []}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("at least two nodes"));

    Ok(())
}
