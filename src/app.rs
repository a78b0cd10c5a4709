use bindstats_collector::{
    Pipeline,
    Scheduler,
};
use bindstats_config::Config;
use color_eyre::Result;
use std::{
    future::Future,
    io,
};
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
    pipeline: Pipeline,
}

impl App {
    /// Everything that can fail at startup happens here, before the first tick.
    pub fn new(config: Config) -> Result<Self> {
        let pipeline = Pipeline::from_config(&config)?;
        Ok(Self { config, pipeline })
    }

    pub async fn run(self) -> Result<()> {
        let Self { config, pipeline } = self;

        info!(
            server = %pipeline.namer().identity(),
            source = %config.bind.url(),
            sink = %config.graphite.address(),
            categories = ?config.categories,
            derive_mode = %config.derive_mode,
            dry_run = !config.really_send,
            "Starting bindstats-graphite"
        );
        if !config.really_send {
            warn!("Dry-run mode: metrics are logged, not sent. Pass --really-send to deliver them.");
        }

        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_on_signal(cancel.clone()));

        let (_, summary) = Scheduler::new(pipeline, config.poll_interval()).run(cancel).await;
        info!(
            cycles = summary.cycles,
            failures = summary.failures,
            skipped_ticks = summary.skipped_ticks,
            "Shut down"
        );
        Ok(())
    }
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    cancel_on_first_signal(cancel, tokio::signal::ctrl_c(), terminate).await;
}

/// A listener that cannot be installed never fires; the other one still does.
async fn cancel_on_first_signal(
    cancel: CancellationToken,
    interrupt: impl Future<Output = io::Result<()>>,
    terminate: impl Future<Output = ()>,
) {
    let interrupt = async {
        match interrupt.await {
            Ok(()) => info!("Received interrupt"),
            Err(err) => {
                error!("Cannot listen for Ctrl-C: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => info!("Received SIGTERM"),
    }
    cancel.cancel();
}
