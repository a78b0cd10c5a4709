use crate::{
    emitter::{
        CarbonSink,
        EmitResult,
        Emitter,
    },
    error::CycleError,
    fetcher::{
        Fetch,
        HttpFetcher,
    },
    metrics::{
        CounterState,
        Datapoint,
        Namer,
        RateConverter,
        ServerIdentity,
    },
};
use bindstats_config::Config;
use chrono::Utc;
use std::time::{
    Duration,
    Instant,
};
use tokio::sync::watch;

/// Where the collector currently is within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleState {
    #[default]
    Idle,
    Fetching,
    Processing,
    Emitting,
}

/// Summary of one successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: i64,
    pub fetch_elapsed: Duration,
    /// Named counters before conversion.
    pub samples: usize,
    pub datapoints: Vec<Datapoint>,
    pub emit: EmitResult,
}

/// One fetch, parse, name, convert, emit pass, plus the counter state that
/// survives between passes.
pub struct Pipeline {
    fetcher: Box<dyn Fetch>,
    namer: Namer,
    converter: RateConverter,
    emitter: Emitter,
    state: CounterState,
    progress: watch::Sender<CycleState>,
}

impl Pipeline {
    pub fn new(fetcher: Box<dyn Fetch>, namer: Namer, converter: RateConverter, emitter: Emitter) -> Self {
        let (progress, _) = watch::channel(CycleState::Idle);
        Self {
            fetcher,
            namer,
            converter,
            emitter,
            state: CounterState::new(),
            progress,
        }
    }

    /// Wires the HTTP fetcher and carbon sink described by `config`.
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let identity = ServerIdentity::resolve(config.server_name.as_deref())?;
        let namer = Namer::new(config.metric_root.clone(), identity, config.categories.clone());
        let converter = RateConverter::new(config.derive_mode, config.first_sample);
        let emitter = Emitter::new(Box::new(CarbonSink::new(&config.graphite)), !config.really_send);
        let fetcher = HttpFetcher::new(&config.bind)?;
        Ok(Self::new(Box::new(fetcher), namer, converter, emitter))
    }

    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn namer(&self) -> &Namer {
        &self.namer
    }

    pub fn fetcher(&self) -> &dyn Fetch {
        self.fetcher.as_ref()
    }

    pub(crate) fn mark_idle(&self) {
        self.progress.send_replace(CycleState::Idle);
    }

    /// Runs a cycle. Counter state only changes when the whole cycle succeeds.
    #[instrument(level = "debug", skip(self), fields(server = %self.namer.identity()))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let result = self.run_stages().await;
        self.mark_idle();
        result
    }

    async fn run_stages(&mut self) -> Result<CycleReport, CycleError> {
        self.progress.send_replace(CycleState::Fetching);
        let fetch_start = Instant::now();
        let raw = self.fetcher.fetch().await?;
        let fetch_elapsed = fetch_start.elapsed();
        let timestamp = Utc::now().timestamp();

        self.progress.send_replace(CycleState::Processing);
        let tree = raw.parse()?;
        drop(raw);
        let samples = self.namer.name(&tree, timestamp);
        let batch = self.converter.convert_all(&samples, &self.state);
        debug!(
            counters = tree.len(),
            samples = samples.len(),
            datapoints = batch.datapoints.len(),
            "Processed statistics"
        );

        self.progress.send_replace(CycleState::Emitting);
        let emit = self.emitter.emit(&batch.datapoints).await?;
        self.state.commit(batch.observations);

        Ok(CycleReport {
            timestamp,
            fetch_elapsed,
            samples: samples.len(),
            datapoints: batch.datapoints,
            emit,
        })
    }
}
