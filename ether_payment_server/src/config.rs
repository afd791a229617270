//! Server configuration
//!
//! Every setting is read from an `EPG_*` environment variable. Invalid values are reported and replaced by the default;
//! they never stop the server from starting. The one setting without a default is the wallet mnemonic.
use std::{env, fmt::Display, num::NonZeroU64, str::FromStr, time::Duration};

use epg_common::{helpers::parse_optional, Secret};
use ether_payment_engine::{pipeline::DEFAULT_MAX_IN_FLIGHT, CreditPolicy, PipelineConfig};
use log::*;

const DEFAULT_EPG_HOST: &str = "127.0.0.1";
const DEFAULT_EPG_PORT: u16 = 8360;
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_RECEIPT_POLL_INTERVAL_MS: NonZeroU64 = match NonZeroU64::new(500) {
    Some(ms) => ms,
    None => unreachable!(),
};
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CHAIN_POLL_INTERVAL_MS: NonZeroU64 = match NonZeroU64::new(2_000) {
    Some(ms) => ms,
    None => unreachable!(),
};
const DEFAULT_MAX_CONSECUTIVE_RPC_FAILURES: u32 = 5;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The JSON-RPC endpoint of the Ethereum node.
    pub rpc_url: String,
    /// The mnemonic for the wallet that owns every invoice address.
    pub mnemonic: Secret<String>,
    /// Credit policy, concurrency limit and receipt polling settings for the ingestion pipeline.
    pub pipeline: PipelineConfig,
    /// How often the node is polled for new blocks or pending transactions.
    pub chain_poll_interval: Duration,
    /// The chain subscription is considered dead after this many consecutive failed polls.
    pub max_consecutive_rpc_failures: u32,
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_EPG_HOST.to_string(),
            port: DEFAULT_EPG_PORT,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            mnemonic: Secret::default(),
            pipeline: PipelineConfig::default(),
            chain_poll_interval: Duration::from_millis(DEFAULT_CHAIN_POLL_INTERVAL_MS.get()),
            max_consecutive_rpc_failures: DEFAULT_MAX_CONSECUTIVE_RPC_FAILURES,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("EPG_HOST").ok().unwrap_or_else(|| DEFAULT_EPG_HOST.into());
        let port = env_or_default("EPG_PORT", DEFAULT_EPG_PORT);
        let rpc_url = env::var("EPG_RPC_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ EPG_RPC_URL is not set. Using {DEFAULT_RPC_URL}.");
            DEFAULT_RPC_URL.into()
        });
        let mnemonic = env::var("EPG_MNEMONIC").ok().map(Secret::new).unwrap_or_else(|| {
            error!("🪛️ EPG_MNEMONIC is not set. Please set it to the mnemonic of the wallet that receives payments.");
            Secret::default()
        });
        let policy = env_or_default("EPG_CREDIT_POLICY", CreditPolicy::default());
        let max_in_flight = env_or_default("EPG_MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT);
        let receipt_poll_interval = env_or_default("EPG_RECEIPT_POLL_INTERVAL_MS", DEFAULT_RECEIPT_POLL_INTERVAL_MS);
        let receipt_timeout = env_or_default("EPG_RECEIPT_TIMEOUT_SECS", DEFAULT_RECEIPT_TIMEOUT_SECS);
        let pipeline = PipelineConfig {
            policy,
            max_in_flight,
            receipt_poll_interval: Duration::from_millis(receipt_poll_interval.get()),
            receipt_timeout: Duration::from_secs(receipt_timeout),
        };
        let chain_poll_interval = env_or_default("EPG_CHAIN_POLL_INTERVAL_MS", DEFAULT_CHAIN_POLL_INTERVAL_MS);
        let max_consecutive_rpc_failures =
            env_or_default("EPG_MAX_CONSECUTIVE_RPC_FAILURES", DEFAULT_MAX_CONSECUTIVE_RPC_FAILURES);
        let event_buffer_size = env_or_default("EPG_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        Self {
            host,
            port,
            rpc_url,
            mnemonic,
            pipeline,
            chain_poll_interval: Duration::from_millis(chain_poll_interval.get()),
            max_consecutive_rpc_failures,
            event_buffer_size,
        }
    }
}

fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match parse_optional::<T>(env::var(name).ok()) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            error!("🪛️ {e} Using the default for {name}, {default}, instead.");
            default
        },
    }
}
