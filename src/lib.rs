//! # IDBuilder Core
//!
//! Embeddable distributed id generation with four coexisting strategies:
//!
//! - **Snowflake**: 64-bit time-ordered integers, no coordination beyond a
//!   unique node id
//! - **ULID**: monotonic 128-bit ids, optionally striped across independent
//!   generators to cut lock contention
//! - **Segment**: durable per-scope sequential longs reserved in blocks from
//!   a file, Redis, `PostgreSQL` or `MySQL` counter
//! - **Public ids**: `{prefix}_{ulid}` strings safe to expose externally
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            IdService                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────────┐  ┌──────────┐  ┌─────────────┐ │
//! │  │ Snowflake │  │ Monotonic /   │  │ Segment  │→ │ Segment     │ │
//! │  │           │  │ Striped ULID  │  │          │  │ repository  │ │
//! │  └───────────┘  └───────┬───────┘  └──────────┘  └─────────────┘ │
//! │                         └→ PublicIdFactory                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod storage;

use std::io;

use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use crate::cli::{CliArgs, execute};
use crate::config::{AppConfig, ObservabilityConfig};
use crate::service::IdService;

/// Run the `idbuilder` command line.
///
/// This function:
/// 1. Loads `.env`, configuration files and environment
/// 2. Initializes logging and, if enabled, the metrics recorder
/// 3. Builds the [`IdService`] against the configured segment repository
/// 4. Executes the requested command
///
/// # Errors
///
/// Returns an error if:
/// - Arguments or configuration are invalid
/// - The segment repository cannot be reached
/// - The command itself fails
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = AppConfig::load()?;

    init_logging(&config.observability);
    if config.observability.metrics_enabled {
        init_metrics()?;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.storage.backend,
        "Starting IDBuilder"
    );

    let service = IdService::from_config(&config).await?;
    let stdout = io::stdout();
    execute(&service, args.command, &mut stdout.lock()).await
}

/// Initialize logging based on configuration.
///
/// Logs go to stderr so command output on stdout stays clean. Calling this
/// again after a subscriber is installed has no effect.
pub fn init_logging(config: &ObservabilityConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = if config.log_format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
    };

    if result.is_err() {
        warn!("Logging already initialized");
    }
}

/// Install a Prometheus recorder behind the `metrics` facade.
///
/// No HTTP listener is started; render the returned handle wherever the host
/// application exposes metrics.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        let config = ObservabilityConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
