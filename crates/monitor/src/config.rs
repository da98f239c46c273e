//! Exporter configuration
//!
//! Layered as: defaults, optional config file, `GPU_MONITOR_*` environment
//! variables, then command-line flags.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line flags
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "gpu-monitor", version, about = "Per-container GPU metrics exporter")]
pub struct CliArgs {
    /// Optional configuration file (YAML, TOML or JSON)
    #[arg(long, env = "GPU_MONITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Location of the kubelet's pod-resources socket
    #[arg(long)]
    pub socket: Option<String>,

    /// Port on which to listen
    #[arg(long)]
    pub port: Option<u16>,

    /// Endpoint to expose Prometheus metrics on
    #[arg(long, alias = "prometheus_endpoint")]
    pub metrics_path: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Kubelet pod-resources endpoint
    #[serde(default = "default_socket")]
    pub socket: String,

    /// HTTP port for metrics and health
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path serving Prometheus metrics
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Extended resource name identifying GPUs
    #[serde(default = "default_resource_name")]
    pub resource_name: String,

    /// Prefix of the exported GPU metric names
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,

    #[serde(default = "default_timeout_secs")]
    pub inventory_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub telemetry_timeout_secs: u64,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_socket() -> String {
    monitor_lib::inventory::DEFAULT_KUBELET_SOCKET.to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_resource_name() -> String {
    monitor_lib::NVIDIA_RESOURCE_NAME.to_string()
}

fn default_metric_prefix() -> String {
    monitor_lib::exposition::DEFAULT_METRIC_PREFIX.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            socket: default_socket(),
            port: default_port(),
            metrics_path: default_metrics_path(),
            resource_name: default_resource_name(),
            metric_prefix: default_metric_prefix(),
            inventory_timeout_secs: default_timeout_secs(),
            telemetry_timeout_secs: default_timeout_secs(),
            log_format: default_log_format(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, config::Environment::with_prefix("GPU_MONITOR"))
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Load, apply command-line overrides and validate
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = Self::load(args.config.as_deref())?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Flags take precedence over file and environment
    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(socket) = &args.socket {
            self.socket = socket.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(path) = &args.metrics_path {
            self.metrics_path = path.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') {
            bail!("metrics path {:?} must start with '/'", self.metrics_path);
        }
        if matches!(self.metrics_path.as_str(), "/healthz" | "/readyz") {
            bail!("metrics path {:?} collides with a health endpoint", self.metrics_path);
        }
        if self.resource_name.trim().is_empty() {
            bail!("resource name must not be empty");
        }
        if self.metric_prefix.trim().is_empty() {
            bail!("metric prefix must not be empty");
        }
        if self.inventory_timeout_secs == 0 || self.telemetry_timeout_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        monitor_lib::inventory::parse_socket_path(&self.socket)?;
        Ok(())
    }

    pub fn inventory_timeout(&self) -> Duration {
        Duration::from_secs(self.inventory_timeout_secs)
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_secs(self.telemetry_timeout_secs)
    }
}
