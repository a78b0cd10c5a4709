//! # BIND9 Statistics Collector
//!
//! Polls the statistics channel of a BIND9 name server and forwards the
//! counters to Graphite using the carbon plaintext protocol.
//!
//! ## Architecture
//!
//! Every tick runs one strictly sequential cycle:
//!
//! - **`fetcher`**: HTTP GET against the statistics channel, classified as XML or JSON
//! - **`stats`**: Normalizes either document format into a `StatsTree`
//! - **`metrics::naming`**: Flattens the tree into `<root>.<server>.<category>...` paths
//! - **`metrics::rate`**: Turns ever-increasing counters into deltas or per-second rates
//! - **`emitter`**: Writes `<path> <value> <timestamp>` lines to carbon, or logs them in dry-run mode
//! - **`scheduler`**: Fixed-rate ticks, at most one cycle in flight
//!
//! A failure at any stage only skips the current cycle.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run(config: bindstats_config::Config) -> eyre::Result<()> {
//! use bindstats_collector::{Pipeline, Scheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::from_config(&config)?;
//! let (_, summary) = Scheduler::new(pipeline, config.poll_interval())
//!     .run(CancellationToken::new())
//!     .await;
//! println!("{} cycles", summary.cycles);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod cycle;
pub mod emitter;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod scheduler;
pub mod stats;

pub use cycle::{
    CycleReport,
    CycleState,
    Pipeline,
};
pub use emitter::{
    CarbonSink,
    EmitResult,
    Emitter,
    Sink,
};
pub use error::{
    CycleError,
    EmitError,
    FetchError,
    ParseError,
    Stage,
};
pub use fetcher::{
    Fetch,
    HttpFetcher,
};
pub use metrics::*;
pub use scheduler::{
    Scheduler,
    SchedulerSummary,
    TickSchedule,
};
pub use stats::{
    DocumentFormat,
    RawStatsDocument,
    Section,
    StatsSource,
    StatsTree,
};
