//! Hot-reload supervisor binary.
//!
//! ```text
//! reload-supervisor app/config.toml [more.toml ...]
//!     → app/lib/*.jar scanned into generation 0
//!     → context built and started
//!     → app/config.toml polled; a newer timestamp rebuilds everything
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use reload_supervisor::config::{ConfigResource, FailurePolicy, SupervisorSettings};
use reload_supervisor::lifecycle;
use reload_supervisor::observability::logging::{self, LogFormat};
use reload_supervisor::observability::metrics;
use reload_supervisor::supervisor::ReloadSupervisor;

#[derive(Debug, Parser)]
#[command(name = "reload-supervisor", version, about = "Rebuilds a runtime context whenever its configuration changes")]
struct Cli {
    /// Configuration resources, in layering order.
    #[arg(required = true)]
    configs: Vec<PathBuf>,

    /// Resource to watch. Defaults to the first configuration resource.
    #[arg(long)]
    monitor: Option<PathBuf>,

    /// Supervisor settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,

    /// Do not layer the built-in defaults beneath the configuration.
    #[arg(long)]
    no_defaults: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

impl Cli {
    fn supervisor_settings(&self) -> Result<SupervisorSettings, Box<dyn std::error::Error + Send + Sync>> {
        let mut settings = match &self.settings {
            Some(path) => SupervisorSettings::load(path)?,
            None => SupervisorSettings::default(),
        };
        if let Some(ms) = self.poll_interval_ms {
            settings.poll_interval_ms = ms;
        }
        if let Some(policy) = self.failure_policy {
            settings.failure_policy = policy;
        }
        if self.no_defaults {
            settings.use_default_resource = false;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format)?;

    tracing::info!("reload-supervisor v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = cli.supervisor_settings()?;
    tracing::info!(
        poll_interval_ms = settings.poll_interval_ms,
        library_dir_name = %settings.library_dir_name,
        artifact_extension = %settings.extension(),
        use_default_resource = settings.use_default_resource,
        failure_policy = ?settings.failure_policy,
        "Settings loaded"
    );

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let monitored = match &cli.monitor {
        Some(path) => path.clone(),
        None => cli.configs[0].clone(),
    };
    let resources = cli.configs.iter().map(ConfigResource::file).collect();

    let supervisor = ReloadSupervisor::new(settings)?;
    lifecycle::run(supervisor, resources, &monitored).await
}
