use crate::{
    DeriveMode,
    FirstSample,
};
use clap::Parser;
use std::path::PathBuf;

/// Poll the BIND9 statistics channel and send the counters to Graphite.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Additional YAML config file, applied on top of the one in the config directory.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server name used in metric paths (default: first label of the host name).
    #[clap(short = 'n', long = "name", value_name = "NAME", env = "BINDSTATS_SERVER_NAME")]
    pub server_name: Option<String>,

    /// First component of every metric path.
    #[clap(long = "root", value_name = "PREFIX", env = "BINDSTATS_METRIC_ROOT")]
    pub metric_root: Option<String>,

    /// Polling interval in seconds.
    #[clap(short = 'i', long = "interval", value_name = "SECONDS", env = "BINDSTATS_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Comma separated metric categories: auth, res, bind, zone, memory, socket.
    #[clap(short = 'c', long, value_name = "LIST", env = "BINDSTATS_CATEGORIES")]
    pub categories: Option<String>,

    /// Host of the BIND9 statistics channel.
    #[clap(long, value_name = "HOST", env = "BIND9_HOST")]
    pub bind_host: Option<String>,

    /// Port of the BIND9 statistics channel.
    #[clap(long, value_name = "PORT", env = "BIND9_PORT")]
    pub bind_port: Option<u16>,

    /// Request path on the statistics channel, e.g. `/xml/v3` or `/json/v1`.
    #[clap(long, value_name = "PATH", env = "BIND9_PATH")]
    pub bind_path: Option<String>,

    /// Graphite (carbon plaintext) server address.
    #[clap(short = 's', long = "server", value_name = "HOST", env = "GRAPHITE_HOST")]
    pub graphite_host: Option<String>,

    /// Graphite (carbon plaintext) server port.
    #[clap(short = 'p', long = "port", value_name = "PORT", env = "GRAPHITE_PORT")]
    pub graphite_port: Option<u16>,

    /// Really send data to Graphite (default: dry-run, lines are only logged).
    #[clap(short = 'r', long = "really-send", action)]
    pub really_send: bool,

    /// How counters are converted: delta, rate or absolute.
    #[clap(long, value_name = "MODE")]
    pub derive_mode: Option<DeriveMode>,

    /// What to emit for the first sample of a counter: emit, zero or suppress.
    #[clap(long, value_name = "POLICY")]
    pub first_sample: Option<FirstSample>,

    /// Stay in the foreground and log for a terminal.
    #[clap(short = 'f', long, action)]
    pub foreground: bool,

    /// Enables diagnostic logging.
    #[clap(short = 'd', long, action)]
    pub debug: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(server_name) = &self.server_name {
                cache.insert("server_name".to_string(), server_name.clone().into());
            }
            if let Some(metric_root) = &self.metric_root {
                cache.insert("metric_root".to_string(), metric_root.clone().into());
            }
            if let Some(poll_interval) = self.poll_interval {
                cache.insert("poll_interval".to_string(), poll_interval.into());
            }
            if let Some(categories) = &self.categories {
                cache.insert("categories".to_string(), categories.clone().into());
            }
            if let Some(host) = &self.bind_host {
                cache.insert("bind.host".to_string(), host.clone().into());
            }
            if let Some(port) = self.bind_port {
                cache.insert("bind.port".to_string(), (port as u64).into());
            }
            if let Some(path) = &self.bind_path {
                cache.insert("bind.path".to_string(), path.clone().into());
            }
            if let Some(host) = &self.graphite_host {
                cache.insert("graphite.host".to_string(), host.clone().into());
            }
            if let Some(port) = self.graphite_port {
                cache.insert("graphite.port".to_string(), (port as u64).into());
            }
            if self.really_send {
                cache.insert("really_send".to_string(), true.into());
            }
            if let Some(mode) = self.derive_mode {
                cache.insert("derive_mode".to_string(), mode.to_string().into());
            }
            if let Some(policy) = self.first_sample {
                cache.insert("first_sample".to_string(), policy.to_string().into());
            }
            if self.foreground {
                cache.insert("foreground".to_string(), true.into());
            }
            if self.debug {
                cache.insert("debug".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let version = clap::crate_version!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "\
{version}

Config directory: {config_dir_path}"
    )
}
