use anyhow::Context;
use clap::Parser;
use code_exec::ServiceConfig;
use code_exec_server::{create_app, run_server};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to listen on
    #[arg(short, long, env = "CODE_EXEC_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,

    /// TOML configuration file; flags below override its values
    #[arg(short, long, env = "CODE_EXEC_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of concurrent executions
    #[arg(short, long, env = "CODE_EXEC_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Default run timeout in seconds
    #[arg(long, env = "CODE_EXEC_TIMEOUT", value_parser = parse_seconds)]
    timeout: Option<Duration>,

    /// Hard ceiling on any requested run timeout, in seconds
    #[arg(long, env = "CODE_EXEC_MAX_TIMEOUT", value_parser = parse_seconds)]
    max_timeout: Option<Duration>,

    /// Default address-space limit in bytes
    #[arg(long, env = "CODE_EXEC_MEMORY_LIMIT")]
    memory_limit: Option<u64>,

    /// Bytes captured per output stream
    #[arg(long, env = "CODE_EXEC_OUTPUT_LIMIT")]
    output_limit: Option<usize>,

    /// Seconds between rate-limit sweeps
    #[arg(long, env = "CODE_EXEC_SWEEP_INTERVAL", value_parser = parse_seconds)]
    sweep_interval: Option<Duration>,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("invalid number of seconds: {}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent_executions = max_concurrent;
        }
        if let Some(timeout) = self.timeout {
            config.engine.default_timeout = timeout;
        }
        if let Some(max_timeout) = self.max_timeout {
            config.engine.max_timeout = max_timeout;
        }
        if let Some(memory_limit) = self.memory_limit {
            config.engine.memory_limit = memory_limit;
        }
        if let Some(output_limit) = self.output_limit {
            config.engine.output_limit = output_limit;
        }
        if let Some(sweep_interval) = self.sweep_interval {
            config.rate_limits.sweep_interval = sweep_interval;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let addr = args.addr;
    let config = args.into_config()?;
    info!(
        max_concurrent = config.max_concurrent_executions,
        default_timeout = ?config.engine.default_timeout,
        max_timeout = ?config.engine.max_timeout,
        "Loaded configuration"
    );

    let app = create_app(config)?;
    run_server(app, addr).await?;

    Ok(())
}
