//! Scripted fetchers and in-memory sinks shared by the integration tests.
#![allow(dead_code)]

use bindstats_collector::{
    DocumentFormat,
    EmitError,
    Emitter,
    Fetch,
    FetchError,
    Namer,
    Pipeline,
    RateConverter,
    RawStatsDocument,
    ServerIdentity,
    Sink,
};
use bindstats_config::{
    Category,
    DeriveMode,
    FirstSample,
};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
        Mutex,
    },
};

pub type Script = Box<dyn Fn(usize) -> Result<RawStatsDocument, FetchError> + Send + Sync>;

/// Answers call `n` with `script(n)`.
pub struct ScriptedFetch {
    script: Script,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedFetch {
    pub fn new(script: impl Fn(usize) -> Result<RawStatsDocument, FetchError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Fetch for ScriptedFetch {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<RawStatsDocument, FetchError>> + Send + '_>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.script)(n);
        Box::pin(async move { result })
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Keeps every payload it is handed.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub writes: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn payloads(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl Sink for RecordingSink {
    fn write_batch<'a>(
        &'a mut self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EmitError>> + Send + 'a>> {
        self.writes
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Box::pin(async { Ok(()) })
    }
}

/// Rejects every write.
pub struct BrokenSink;

impl Sink for BrokenSink {
    fn write_batch<'a>(
        &'a mut self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EmitError>> + Send + 'a>> {
        let total = payload.len();
        Box::pin(async move {
            Err(EmitError::WriteFailed {
                written: 0,
                total,
                reason: "broken pipe".to_string(),
            })
        })
    }
}

/// A v3 XML document carrying a single `QUERY` opcode counter.
pub fn opcode_xml(query: u64) -> RawStatsDocument {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<statistics version="3.11">
  <server>
    <counters type="opcode"><counter name="QUERY">{query}</counter></counters>
  </server>
</statistics>"#
    );
    RawStatsDocument::new(body, DocumentFormat::Xml)
}

pub fn namer(categories: Vec<Category>) -> Namer {
    Namer::new("stats", ServerIdentity::new("ns1").unwrap(), categories)
}

pub fn pipeline(fetch: impl Fetch + 'static, sink: impl Sink + 'static, dry_run: bool) -> Pipeline {
    Pipeline::new(
        Box::new(fetch),
        namer(vec![Category::Auth]),
        RateConverter::new(DeriveMode::Delta, FirstSample::Emit),
        Emitter::new(Box::new(sink), dry_run),
    )
}

/// A v3 XML document touching every section, including gauges and a
/// cache rrset pair that collides after normalization.
pub const FULL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<statistics version="3.11">
  <server>
    <counters type="opcode"><counter name="QUERY">1000</counter><counter name="NOTIFY">3</counter></counters>
    <counters type="qtype"><counter name="A">700</counter><counter name="AAAA">300</counter></counters>
    <counters type="rcode"><counter name="NOERROR">990</counter><counter name="NXDOMAIN">10</counter></counters>
    <counters type="nsstat"><counter name="Requestv4">1003</counter></counters>
    <counters type="zonestat"><counter name="NotifyOutv4">4</counter></counters>
    <counters type="resstat"><counter name="Mismatch">2</counter></counters>
    <counters type="sockstat"><counter name="UDP4Open">20</counter><counter name="UDP4Active">2</counter></counters>
  </server>
  <views>
    <view name="_default">
      <counters type="resqtype"><counter name="A">12</counter></counters>
      <counters type="resstats"><counter name="Queryv4">12</counter><counter name="NumFetch">1</counter></counters>
      <counters type="cachestats"><counter name="CacheHits">40</counter><counter name="TreeMemInUse">4096</counter></counters>
      <counters type="adbstat"><counter name="nentries">1021</counter></counters>
      <cache name="_default">
        <rrset><name>A</name><counter>8</counter></rrset>
        <rrset><name>!A</name><counter>1</counter></rrset>
        <rrset><name>#A</name><counter>2</counter></rrset>
      </cache>
    </view>
  </views>
  <memory>
    <summary><TotalUse>81273826</TotalUse><InUse>7387096</InUse></summary>
  </memory>
</statistics>"#;

/// The JSON counterpart of [`FULL_XML`].
pub const FULL_JSON: &str = r##"{
  "json-stats-version": "1.7",
  "opcodes": {"QUERY": 1000, "NOTIFY": 3},
  "qtypes": {"A": 700, "AAAA": 300},
  "rcodes": {"NOERROR": 990, "NXDOMAIN": 10},
  "nsstats": {"Requestv4": 1003},
  "zonestats": {"NotifyOutv4": 4},
  "resstats": {"Mismatch": 2},
  "sockstats": {"UDP4Open": 20, "UDP4Active": 2},
  "views": {
    "_default": {
      "resolver": {
        "qtypes": {"A": 12},
        "stats": {"Queryv4": 12, "NumFetch": 1},
        "cachestats": {"CacheHits": 40, "TreeMemInUse": 4096},
        "adb": {"nentries": 1021},
        "cache": {"A": 8, "!A": 1, "#A": 2}
      }
    }
  },
  "memory": {"TotalUse": 81273826, "InUse": 7387096}
}"##;
