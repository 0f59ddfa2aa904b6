mod config;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use media::{MediaHosts, Rewriter};
use metrics_exporter_statsd::StatsdBuilder;
use site_api::config::InvalidatorConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const METRICS_PREFIX: &str = "sitegate";

#[derive(Parser)]
#[command(name = "sitegate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the site API and admin listeners
    Run {
        #[arg(long)]
        config: PathBuf,
    },
    /// Load and validate the configuration, then print a summary
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the local media path for each CMS reference
    Rewrite {
        #[arg(long)]
        config: PathBuf,
        references: Vec<String>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start metrics exporter: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    SiteApi(#[from] site_api::errors::SiteApiError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run { config } => run(&config),
        CliCommand::CheckConfig { config } => check_config(&config),
        CliCommand::Rewrite { config, references } => rewrite(&config, &references),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Config::load(path, |var| std::env::var(var).ok())
}

fn run(path: &Path) -> Result<(), CliError> {
    let config = load_config(path)?;

    let _sentry = init_logging(&config.common.logging);
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    tracing::info!(config = %path.display(), "Starting sitegate");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(site_api::run(config.site_api))?;
    Ok(())
}

fn check_config(path: &Path) -> Result<(), CliError> {
    let config = load_config(path)?;
    let site_api = &config.site_api;

    println!("config ok: {}", path.display());
    println!(
        "listener:          {}:{}",
        site_api.listener.host, site_api.listener.port
    );
    println!(
        "admin listener:    {}:{}",
        site_api.admin_listener.host, site_api.admin_listener.port
    );
    println!(
        "stock backend:     {}",
        describe(site_api.upstreams.stock_backend_url.as_ref())
    );
    println!("cms:               {}", describe(site_api.upstreams.cms_url.as_ref()));
    println!("media:             {}", describe(site_api.upstreams.media_url.as_ref()));
    println!("media prefix:      {}", site_api.media.normalized_prefix());
    println!(
        "revalidation:      secret {}, policy {:?}, invalidator {}",
        if site_api.revalidation.secret.is_some() { "set" } else { "not set" },
        site_api.revalidation.secret_policy,
        match &site_api.revalidation.invalidator {
            InvalidatorConfig::Log => "log".to_string(),
            InvalidatorConfig::Webhook { url, .. } => format!("webhook {url}"),
        },
    );
    Ok(())
}

fn describe<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "(not set)".to_string(), |v| v.to_string())
}

fn rewrite(path: &Path, references: &[String]) -> Result<(), CliError> {
    let config = load_config(path)?;
    let upstreams = &config.site_api.upstreams;
    let rewriter = Rewriter::new(
        MediaHosts::new(upstreams.cms_url.as_ref(), upstreams.media_url.as_ref()),
        config.site_api.media.normalized_prefix(),
        upstreams.cms_url.clone(),
    );

    for reference in references {
        let local = rewriter.to_local_media_url(Some(reference));
        println!("{reference} -> {}", local.as_deref().unwrap_or(""));
    }
    Ok(())
}

/// Installs the tracing subscriber, with a Sentry layer when a DSN is set.
/// The returned guard flushes Sentry on drop.
fn init_logging(logging: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let guard = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(metrics: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    for def in site_api::metrics_defs::ALL_METRICS {
        tracing::debug!(
            name = def.name,
            kind = def.metric_type.as_str(),
            "Registered metric"
        );
    }
    Ok(())
}
