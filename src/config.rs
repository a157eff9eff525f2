//! Configuration management for the bridge orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::chain::tracker::recommended_confirmations;

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: HashMap<String, ChainConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub instance_id: String,
    /// Receipt polling interval of the pending-transaction tracker
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
    pub confirmation_blocks: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ChainConfig {
    /// Configured confirmation depth, or the recommended one for the chain
    pub fn confirmations(&self) -> u64 {
        self.confirmation_blocks
            .unwrap_or_else(|| recommended_confirmations(self.chain_id))
    }
}

/// Vault contracts deployed for one source -> destination pair
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RouteConfig {
    pub src_chain_id: u64,
    pub dest_chain_id: u64,
    pub erc721_vault_address: Address,
    pub erc1155_vault_address: Address,
}

impl Settings {
    /// Load settings from the file named by `NFT_BRIDGE_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("NFT_BRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_path(&config_path)
    }

    /// Load settings from a specific file
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        for (name, chain) in &self.chains {
            if chain.enabled {
                if chain.rpc_urls.is_empty() {
                    anyhow::bail!("Chain {} has no RPC URLs configured", name);
                }
                if chain.explorer_url.is_empty() {
                    anyhow::bail!("Chain {} has no explorer URL configured", name);
                }
            }
        }

        for route in &self.routes {
            for chain_id in [route.src_chain_id, route.dest_chain_id] {
                match self.get_chain_by_id(chain_id) {
                    None => anyhow::bail!(
                        "Route {} -> {} references unknown chain {}",
                        route.src_chain_id,
                        route.dest_chain_id,
                        chain_id
                    ),
                    // Vault queries need a provider on both ends
                    Some(chain) if !chain.enabled => anyhow::bail!(
                        "Route {} -> {} references disabled chain {}",
                        route.src_chain_id,
                        route.dest_chain_id,
                        chain_id
                    ),
                    Some(_) => {}
                }
            }
            if route.src_chain_id == route.dest_chain_id {
                anyhow::bail!("Route source and destination are both {}", route.src_chain_id);
            }
        }

        if self.routes.is_empty() {
            tracing::warn!("No bridge routes configured - every transfer will be rejected");
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.chain_id == chain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
