use bindstats_config::Config;
use eyre::{
    Context as _,
    Result,
};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--debug`.
fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug { "debug" } else { "info" };
        EnvFilter::new(format!("bindstats_graphite={level},bindstats_collector={level},bindstats_config={level},warn"))
    })
}

/// Terminal output in the foreground, plain lines for a service manager otherwise.
pub fn init_logging(config: &Config) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_ansi(config.foreground)
        .with_target(config.debug);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter(config.debug)))
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
