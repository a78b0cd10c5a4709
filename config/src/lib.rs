#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod metric_config;

pub use app_config::get_config_dir;
pub use args::Args;
use eyre::{
    eyre,
    Result,
};
pub use metric_config::{
    Category,
    DeriveMode,
    FirstSample,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::Path,
    time::Duration,
};

/// Where the BIND9 statistics channel lives.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl BindEndpoint {
    pub fn url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.path.trim_start_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Where the carbon plaintext listener lives.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphiteEndpoint {
    pub host: String,
    pub port: u16,
    /// Connect and write timeout in seconds.
    pub timeout: u64,
}

impl GraphiteEndpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub metric_root: String,
    /// Seconds between two polls.
    pub poll_interval: u64,
    #[serde(deserialize_with = "metric_config::deserialize_categories")]
    pub categories: Vec<Category>,
    pub bind: BindEndpoint,
    pub graphite: GraphiteEndpoint,
    #[serde(default)]
    pub really_send: bool,
    #[serde(default)]
    pub derive_mode: DeriveMode,
    #[serde(default)]
    pub first_sample: FirstSample,
    #[serde(default)]
    pub foreground: bool,
    #[serde(default)]
    pub debug: bool,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Layer the built-in defaults, the config directory's `config.yaml`,
    /// the optional `--config` file and finally the command line.
    pub fn new(args: Args) -> Result<Self> {
        Self::load(args, &get_config_dir())
    }

    /// Like [`Config::new`], reading `config.yaml` from `config_dir`.
    pub fn load(args: Args, config_dir: &Path) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Yaml,
        ));

        let source = config::File::from(config_dir.join("config.yaml"))
            .format(config::FileFormat::Yaml)
            .required(false);
        builder = builder.add_source(source);

        if let Some(path) = &args.config {
            debug!(?path, "Loading config file");
            builder = builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml));
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval == 0 {
            return Err(eyre!("poll_interval must be at least one second"));
        }
        if self.categories.is_empty() {
            return Err(eyre!("at least one metric category must be enabled"));
        }
        if self.metric_root.trim().is_empty() || self.metric_root.contains(char::is_whitespace) {
            return Err(eyre!("metric_root must be a non-empty path without whitespace"));
        }
        if let Some(name) = &self.server_name {
            if name.trim().is_empty() {
                return Err(eyre!("server_name must not be empty"));
            }
        }
        if self.bind.host.trim().is_empty() || self.bind.port == 0 {
            return Err(eyre!("bind.host and bind.port must be set"));
        }
        if self.graphite.host.trim().is_empty() || self.graphite.port == 0 {
            return Err(eyre!("graphite.host and graphite.port must be set"));
        }
        if self.bind.timeout == 0 || self.graphite.timeout == 0 {
            return Err(eyre!("timeouts must be at least one second"));
        }
        Ok(())
    }
}
