//! The server config file.

use anyhow::{bail, Context, Result};
use ont_core::{Address, Currency};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub block_wait_seconds: u32,
    #[serde(default)]
    pub oep4_tokens: Vec<TokenConfig>,
    pub port: u32,
}

#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    pub contract: String,
    pub decimals: i32,
    pub symbol: String,
    #[serde(default)]
    pub wasm: bool,
}

impl ServerConfig {
    /// Loads and validates the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut cfg: ServerConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        if cfg.block_wait_seconds == 0 {
            cfg.block_wait_seconds = 1;
        }
        if cfg.port > 65535 {
            bail!("invalid port {} specified in {}", cfg.port, path.display());
        }
        for (idx, token) in cfg.oep4_tokens.iter().enumerate() {
            if token.contract.is_empty() {
                bail!(
                    "missing \"contract\" field for OEP4 token at offset {idx} in {}",
                    path.display()
                );
            }
            Address::from_hex_string(&token.contract).with_context(|| {
                format!(
                    "invalid OEP4 contract address {:?} found in {}",
                    token.contract,
                    path.display()
                )
            })?;
            if token.decimals < 0 {
                bail!(
                    "invalid \"decimals\" value for OEP4 token at offset {idx} in {}: {}",
                    path.display(),
                    token.decimals
                );
            }
            if token.symbol.is_empty() {
                bail!(
                    "missing \"symbol\" field for OEP4 token {:?} in {}",
                    token.contract,
                    path.display()
                );
            }
        }
        Ok(cfg)
    }

    /// The sleep between indexer polling cycles.
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.block_wait_seconds as u64)
    }

    /// The configured OEP4 tokens as currency records.
    pub fn currencies(&self) -> Result<Vec<Currency>> {
        self.oep4_tokens
            .iter()
            .map(|token| {
                Ok(Currency {
                    contract: Address::from_hex_string(&token.contract)?,
                    symbol: token.symbol.clone(),
                    decimals: token.decimals,
                    wasm: token.wasm,
                })
            })
            .collect()
    }
}
