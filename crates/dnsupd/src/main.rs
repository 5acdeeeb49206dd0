// # dnsupd - one-shot dynamic DNS updater
//
// Thin integration layer only: flag parsing, logging setup, config load,
// then one pass through the core pipeline. All address and dispatch logic
// lives in dnsup-core and the dnsup-dispatch-* crates.
//
// ## Usage
//
// ```bash
// dnsupd -4 eth0 -6 br0 --config /etc/dnsup.yml --log /var/log/dnsup.log
// ```
//
// The run resolves the interfaces' base addresses, merges them with the
// configured per-host partial addresses, and submits one update batch via
// the strategy named in the config file. Fatal errors exit non-zero after
// logging the cause; per-host provider-API failures only show up in the
// logs and the completion summary.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use dnsup_core::{
    DiscoveredAddresses, DnsupConfig, Error as CoreError, UpdateBatch, UpdateConfig,
    UpdateDispatcher,
};

/// Exit codes for different termination scenarios
///
/// - 0: run completed
/// - 1: configuration or startup error
/// - 2: runtime error (resolution, transport, authentication)
#[derive(Debug, Clone, Copy)]
enum DnsupExitCode {
    Completed = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DnsupExitCode> for ExitCode {
    fn from(code: DnsupExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// One-shot dynamic DNS updater
#[derive(Debug, Parser)]
#[command(name = "dnsupd", version, about)]
struct Args {
    /// Interface to pull the IPv4 address from
    #[arg(short = '4', long = "ipv4-from", value_name = "IFACE", default_value = "eth0")]
    ipv4_from: String,

    /// Interface to pull the IPv6 prefix from
    #[arg(short = '6', long = "ipv6-from", value_name = "IFACE", default_value = "br0")]
    ipv6_from: String,

    /// Config file (YAML)
    #[arg(short, long, value_name = "FILE", default_value = "dnsup.yml")]
    config: PathBuf,

    /// Log file; logs go to stderr when omitted
    #[arg(short, long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!("invalid log level: {other}");
            return DnsupExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_logging(level, args.log.as_ref()) {
        eprintln!("failed to initialize logging: {e:#}");
        return DnsupExitCode::ConfigError.into();
    }

    let config = match DnsupConfig::from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return DnsupExitCode::ConfigError.into();
        }
    };

    match run(&args, &config) {
        Ok(()) => DnsupExitCode::Completed.into(),
        Err(e) => {
            error!("run failed: {e:#}");
            exit_code_for(&e).into()
        }
    }
}

/// Classify a run failure for the process exit status.
///
/// Configuration-shaped errors keep exit code 1 even when they surface
/// after startup: dispatcher construction (endpoint resolution, key
/// decoding) happens inside the run but is still the operator's config.
fn exit_code_for(e: &anyhow::Error) -> DnsupExitCode {
    match e.downcast_ref::<CoreError>() {
        Some(CoreError::Config(_)) => DnsupExitCode::ConfigError,
        _ => DnsupExitCode::RuntimeError,
    }
}

/// Initialize tracing, to a log file or stderr.
///
/// The subscriber is shared by the provider path's concurrent tasks and
/// must stay safe for concurrent writes; FmtSubscriber is.
fn init_logging(level: Level, log_file: Option<&PathBuf>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

/// Resolve, plan, and dispatch one update batch.
fn run(args: &Args, config: &DnsupConfig) -> Result<()> {
    info!(
        zone = %config.zone,
        hosts = config.hosts.len(),
        strategy = config.update.strategy_name(),
        "starting update run"
    );

    let discovered = DiscoveredAddresses::discover(&args.ipv4_from, &args.ipv6_from)
        .context("failed to enumerate network interfaces")?;
    info!(
        ipv4 = ?discovered.ipv4,
        ipv6_prefix = ?discovered.ipv6_prefix,
        "discovered base addresses"
    );

    let batch = UpdateBatch::plan(&config.zone, config.ttl, &config.hosts, &discovered)?;
    let dispatcher = build_dispatcher(config)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    let report = rt.block_on(dispatcher.submit(&batch))?;

    info!(
        dispatcher = dispatcher.name(),
        succeeded = report.succeeded,
        failed = report.failed,
        "update run complete"
    );
    Ok(())
}

/// Construct the dispatcher named by the config's update strategy.
fn build_dispatcher(config: &DnsupConfig) -> Result<Box<dyn UpdateDispatcher>> {
    match &config.update {
        UpdateConfig::Rfc2136 { .. } => {
            #[cfg(feature = "rfc2136")]
            {
                Ok(Box::new(
                    dnsup_dispatch_rfc2136::Rfc2136Dispatcher::from_config(&config.update)?,
                ))
            }
            #[cfg(not(feature = "rfc2136"))]
            {
                anyhow::bail!("this build does not include the rfc2136 dispatcher")
            }
        }
        UpdateConfig::Azure { .. } => {
            #[cfg(feature = "azure")]
            {
                Ok(Box::new(dnsup_dispatch_azure::AzureDispatcher::from_config(
                    &config.update,
                )?))
            }
            #[cfg(not(feature = "azure"))]
            {
                anyhow::bail!("this build does not include the azure dispatcher")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn config_shaped_run_failures_exit_with_the_config_code() {
        let e = anyhow::Error::from(CoreError::config("cannot resolve server endpoint"));
        assert!(matches!(exit_code_for(&e), DnsupExitCode::ConfigError));

        // Context wrapping must not hide the classification.
        let e = anyhow::Error::from(CoreError::config("TSIG secret is not base64"))
            .context("building dispatcher");
        assert!(matches!(exit_code_for(&e), DnsupExitCode::ConfigError));
    }

    #[test]
    fn other_run_failures_exit_with_the_runtime_code() {
        let e = anyhow::Error::from(CoreError::transport("update exchange failed"));
        assert!(matches!(exit_code_for(&e), DnsupExitCode::RuntimeError));

        let e = anyhow::anyhow!("failed to create tokio runtime");
        assert!(matches!(exit_code_for(&e), DnsupExitCode::RuntimeError));
    }
}
