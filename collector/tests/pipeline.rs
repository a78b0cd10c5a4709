mod common;

use bindstats_collector::{
    CarbonSink,
    CycleError,
    CycleState,
    DocumentFormat,
    EmitError,
    Emitter,
    FetchError,
    HttpFetcher,
    MetricKind,
    MetricValue,
    Pipeline,
    RateConverter,
    RawStatsDocument,
    Stage,
};
use bindstats_config::{
    Category,
    DeriveMode,
    FirstSample,
};
use common::*;
use pretty_assertions::assert_eq;
use std::{
    collections::HashMap,
    time::Duration,
};
use tokio::{
    io::{
        AsyncReadExt as _,
        AsyncWriteExt as _,
    },
    net::TcpListener,
};

const QUERY: &str = "stats.ns1.auth.opcode.query";

fn value_of(payload: &str, path: &str) -> Option<String> {
    payload.lines().find_map(|line| {
        let mut fields = line.split(' ');
        (fields.next() == Some(path)).then(|| fields.next().unwrap_or_default().to_string())
    })
}

#[tokio::test]
async fn first_cycle_emits_total_then_deltas() {
    let sink = RecordingSink::default();
    let fetch = ScriptedFetch::new(|n| Ok(opcode_xml(if n == 0 { 1000 } else { 1050 })));
    let mut pipeline = pipeline(fetch, sink.clone(), false);

    let first = pipeline.run_cycle().await.unwrap();
    assert_eq!(first.emit.lines, 1);
    pipeline.run_cycle().await.unwrap();

    let payloads = sink.payloads();
    assert_eq!(payloads.len(), 2);
    assert!(payloads[0].starts_with(&format!("{QUERY} 1000 ")), "{}", payloads[0]);
    assert!(payloads[0].ends_with('\n'));
    assert_eq!(value_of(&payloads[1], QUERY).as_deref(), Some("50"));
    assert_eq!(pipeline.state().previous(QUERY).map(|(v, _)| v), Some(1050));
}

/// Feeds `body` twice and checks the second cycle: every counter reports a
/// zero delta and every gauge repeats its reading.
async fn assert_repeat_is_idempotent(body: &'static str, format: DocumentFormat) {
    let document = RawStatsDocument::new(body, format);
    let kinds: HashMap<String, (MetricKind, u64)> = namer(Category::all())
        .name(&document.parse().unwrap(), 0)
        .into_iter()
        .map(|sample| (sample.path, (sample.kind, sample.value)))
        .collect();
    assert!(kinds.values().any(|(kind, _)| *kind == MetricKind::Gauge));

    let sink = RecordingSink::default();
    let mut pipeline = Pipeline::new(
        Box::new(ScriptedFetch::new(move |_| Ok(RawStatsDocument::new(body, format)))),
        namer(Category::all()),
        RateConverter::new(DeriveMode::Delta, FirstSample::Emit),
        Emitter::new(Box::new(sink.clone()), false),
    );

    pipeline.run_cycle().await.unwrap();
    let second = pipeline.run_cycle().await.unwrap();

    assert_eq!(second.datapoints.len(), kinds.len());
    for point in &second.datapoints {
        let (kind, raw) = kinds[&point.path];
        let expected = match kind {
            MetricKind::Counter => 0,
            MetricKind::Gauge => raw,
        };
        assert_eq!(point.value, MetricValue::Integer(expected), "{}", point.path);
    }
}

#[tokio::test]
async fn unchanged_xml_document_yields_zero_deltas() {
    assert_repeat_is_idempotent(FULL_XML, DocumentFormat::Xml).await;
}

#[tokio::test]
async fn unchanged_json_document_yields_zero_deltas() {
    assert_repeat_is_idempotent(FULL_JSON, DocumentFormat::Json).await;
}

#[tokio::test]
async fn carbon_going_away_keeps_the_last_delivered_counters() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let carbon = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).await.unwrap();
        received
    });

    let fetch = ScriptedFetch::new(|n| Ok(opcode_xml(if n == 0 { 1000 } else { 1050 })));
    let mut pipeline = Pipeline::new(
        Box::new(fetch),
        namer(vec![Category::Auth]),
        RateConverter::new(DeriveMode::Delta, FirstSample::Emit),
        Emitter::new(
            Box::new(CarbonSink::with_address(addr.to_string(), Duration::from_secs(5))),
            false,
        ),
    );

    pipeline.run_cycle().await.unwrap();
    // Carbon read the first batch and shut down, listener included.
    let received = carbon.await.unwrap();
    assert!(received.starts_with(&format!("{QUERY} 1000 ")), "{received}");

    let err = pipeline.run_cycle().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Emit);
    assert!(matches!(err, CycleError::Emit(EmitError::ConnectFailed { .. })), "{err}");
    assert_eq!(pipeline.state().previous(QUERY).map(|(v, _)| v), Some(1000));
}

#[tokio::test]
async fn http_error_skips_the_cycle_without_touching_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
    });

    let sink = RecordingSink::default();
    let fetcher = HttpFetcher::with_url(format!("http://{addr}/xml/v3"), Duration::from_secs(5)).unwrap();
    let mut pipeline = pipeline(fetcher, sink.clone(), false);

    let err = pipeline.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Fetch(FetchError::Http(500))), "{err}");
    assert_eq!(err.stage(), Stage::Fetch);
    assert!(sink.payloads().is_empty());
    assert!(pipeline.state().is_empty());
    assert_eq!(*pipeline.subscribe().borrow(), CycleState::Idle);
}

#[tokio::test]
async fn unparseable_document_is_a_parse_failure() {
    let sink = RecordingSink::default();
    let fetch = ScriptedFetch::new(|_| Ok(RawStatsDocument::new("<statistics version=\"3.11\"><server>", DocumentFormat::Xml)));
    let mut pipeline = pipeline(fetch, sink.clone(), false);

    let err = pipeline.run_cycle().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Parse);
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn json_with_unknown_sections_is_still_emitted() {
    let body = r#"{
        "json-stats-version": "1.7",
        "opcodes": {"QUERY": 42},
        "shiny-new-section": {"Thing": 1}
    }"#;
    let sink = RecordingSink::default();
    let fetch = ScriptedFetch::new(move |_| Ok(RawStatsDocument::new(body, DocumentFormat::Json)));
    let mut pipeline = pipeline(fetch, sink.clone(), false);

    let report = pipeline.run_cycle().await.unwrap();
    assert_eq!(report.datapoints.len(), 1);
    assert_eq!(value_of(&sink.payloads()[0], QUERY).as_deref(), Some("42"));
}

#[tokio::test]
async fn dry_run_writes_nothing_but_advances_state() {
    let sink = RecordingSink::default();
    let mut pipeline = pipeline(ScriptedFetch::new(|_| Ok(opcode_xml(1000))), sink.clone(), true);

    let report = pipeline.run_cycle().await.unwrap();
    assert!(report.emit.dry_run);
    assert_eq!(report.emit.lines, 1);
    assert!(sink.payloads().is_empty());
    assert_eq!(pipeline.state().len(), 1);
}

#[tokio::test]
async fn failed_emit_keeps_previous_counter_state() {
    let fetch = ScriptedFetch::new(|n| Ok(opcode_xml(if n == 0 { 1000 } else { 1050 })));
    let mut pipeline = Pipeline::new(
        Box::new(fetch),
        namer(vec![Category::Auth]),
        RateConverter::new(DeriveMode::Delta, FirstSample::Emit),
        Emitter::new(Box::new(BrokenSink), false),
    );

    let err = pipeline.run_cycle().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Emit);
    assert!(pipeline.state().is_empty());

    let err = pipeline.run_cycle().await.unwrap_err();
    assert_eq!(err.stage(), Stage::Emit);
    assert!(pipeline.state().previous(QUERY).is_none());
}

#[tokio::test]
async fn disabled_categories_are_not_emitted() {
    let sink = RecordingSink::default();
    let mut pipeline = Pipeline::new(
        Box::new(ScriptedFetch::new(|_| Ok(opcode_xml(7)))),
        namer(vec![Category::Memory]),
        RateConverter::new(DeriveMode::Delta, FirstSample::Emit),
        Emitter::new(Box::new(sink.clone()), false),
    );

    let report = pipeline.run_cycle().await.unwrap();
    assert_eq!(report.emit.lines, 0);
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn progress_walks_through_every_stage() {
    let sink = RecordingSink::default();
    let mut pipeline = pipeline(ScriptedFetch::new(|_| Ok(opcode_xml(1))), sink, false);
    let mut progress = pipeline.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            let state = *progress.borrow_and_update();
            seen.push(state);
            if state == CycleState::Idle {
                break;
            }
        }
        seen
    });

    pipeline.run_cycle().await.unwrap();
    let seen = watcher.await.unwrap();
    // The watch channel coalesces, so only the final state is guaranteed.
    assert_eq!(seen.last(), Some(&CycleState::Idle));
    assert_eq!(*pipeline.subscribe().borrow(), CycleState::Idle);
}
