//! Configuration loading: CLI env, plaintext config TOML, secrets TOML,
//! and the assembled runtime context.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::{Address, B256};
use clap::Parser;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::Level;
use url::Url;

use crate::orchestrator::{DeployableMode, OrchestratorConfig};

/// Rebalance cycles fire every six hours unless configured otherwise.
const DEFAULT_REBALANCE_INTERVAL_SECS: u64 = 6 * 60 * 60;

const DEFAULT_SETTLE_DELAY_SECS: u64 = 10;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 180;
const DEFAULT_OPTIMIZE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TOKEN_DECIMALS: u8 = 6;

#[derive(Parser, Debug)]
pub struct Env {
    /// Path to plaintext TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
    /// Path to TOML secrets file
    #[clap(long)]
    pub secrets: PathBuf,
}

/// Non-secret settings deserialized from the plaintext config TOML.
#[derive(Deserialize)]
struct Config {
    rpc_url: Url,
    log_level: Option<LogLevel>,
    vault: Address,
    token: Address,
    token_decimals: Option<u8>,
    rebalance_interval_secs: Option<u64>,
    settle_delay_secs: Option<u64>,
    operation_timeout_secs: Option<u64>,
    optimize_timeout_secs: Option<u64>,
    deployable: Option<DeployableMode>,
    report_after_cycle: Option<bool>,
    #[serde(default)]
    strategies: StrategiesConfig,
}

/// Per-strategy toggles. Registration order is the declaration order
/// of the enabled entries below and is load-bearing: the optimizer's
/// budget walk gives earlier strategies priority.
#[derive(Deserialize, Default)]
struct StrategiesConfig {
    #[serde(rename = "aave-v3-usdc")]
    aave_v3_usdc: Option<StrategyToggle>,
}

#[derive(Deserialize)]
struct StrategyToggle {
    enabled: bool,
    min_debt: f64,
    max_debt: f64,
}

/// Secret credentials deserialized from the secrets TOML.
#[derive(Deserialize)]
struct Secrets {
    agent_key: B256,
}

#[derive(Debug, thiserror::Error)]
pub enum CtxError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Combined runtime context assembled from config and secrets.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub log_level: LogLevel,
    pub rpc_url: Url,
    pub vault: Address,
    pub token: Address,
    pub token_decimals: u8,
    pub rebalance_interval: Duration,
    pub orchestrator: OrchestratorConfig,
    pub strategies: Vec<StrategyCtx>,
    pub agent_key: B256,
}

/// An enabled strategy, in registration order.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyCtx {
    AaveV3Usdc { min_debt: f64, max_debt: f64 },
}

impl Env {
    pub fn into_ctx(self) -> Result<Ctx, CtxError> {
        let config: Config = read_toml(&self.config)?;
        let secrets: Secrets = read_toml(&self.secrets)?;

        Ok(assemble(config, secrets))
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, CtxError> {
    let raw = fs::read_to_string(path).map_err(|source| CtxError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| CtxError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn assemble(config: Config, secrets: Secrets) -> Ctx {
    let mut strategies = Vec::new();

    if let Some(toggle) = &config.strategies.aave_v3_usdc
        && toggle.enabled
    {
        strategies.push(StrategyCtx::AaveV3Usdc {
            min_debt: toggle.min_debt,
            max_debt: toggle.max_debt,
        });
    }

    Ctx {
        log_level: config.log_level.unwrap_or_default(),
        rpc_url: config.rpc_url,
        vault: config.vault,
        token: config.token,
        token_decimals: config.token_decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
        rebalance_interval: Duration::from_secs(
            config
                .rebalance_interval_secs
                .unwrap_or(DEFAULT_REBALANCE_INTERVAL_SECS),
        ),
        orchestrator: OrchestratorConfig {
            settle_delay: Duration::from_secs(
                config.settle_delay_secs.unwrap_or(DEFAULT_SETTLE_DELAY_SECS),
            ),
            operation_timeout: Duration::from_secs(
                config
                    .operation_timeout_secs
                    .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
            ),
            optimize_timeout: Duration::from_secs(
                config
                    .optimize_timeout_secs
                    .unwrap_or(DEFAULT_OPTIMIZE_TIMEOUT_SECS),
            ),
            deployable: config.deployable.unwrap_or_default(),
            report_after_cycle: config.report_after_cycle.unwrap_or(false),
        },
        strategies,
        agent_key: secrets.agent_key,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<&LogLevel> for Level {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

pub fn setup_tracing(log_level: &LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("yield_router={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
