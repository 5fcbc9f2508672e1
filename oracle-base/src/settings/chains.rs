use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use eyre::{bail, ensure, Context, Result};
use serde::Deserialize;
use url::Url;

use oracle_core::utils::address_bytes_from_bech32;
use oracle_core::{
    Chain, CosmosClient, EthereumClient, MailboxContract, MintControllerContract, WarpIsmContract,
    H160,
};
use oracle_cosmos::{CosmosMultisigConfig, CosmosProvider};
use oracle_ethereum::{
    build_http_provider, EthereumMailbox, EthereumMintController, EthereumProvider, EthereumWarpIsm,
};

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_interval_ms() -> u64 {
    10_000
}

/// Scheduling of one runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Whether the runner runs at all
    #[serde(default)]
    pub enabled: bool,
    /// Pause between two ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_interval_ms(),
        }
    }
}

impl ServiceConfig {
    /// Pause between two ticks
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn validate(&self, name: &str) -> Result<()> {
        ensure!(
            !self.enabled || self.interval_ms > 0,
            "{name} is enabled with a zero interval"
        );
        Ok(())
    }
}

/// An EVM network served by this node
#[derive(Debug, Clone, Deserialize)]
pub struct EthereumNetworkConfig {
    /// Numeric chain id, also the chain domain
    pub chain_id: u32,
    /// Name used in logs and runner names
    pub chain_name: String,
    /// JSON-RPC endpoint
    pub rpc_url: Url,
    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Where to start scanning when nothing was persisted
    #[serde(default)]
    pub start_block_height: u64,
    /// Blocks required on top of a transaction
    pub confirmations: u64,
    /// Mailbox contract
    pub mailbox_address: H160,
    /// MintController contract
    pub mint_controller_address: H160,
    /// WarpISM contract
    pub warp_ism_address: H160,
    /// Every validator of the WarpISM
    #[serde(default)]
    pub oracle_addresses: Vec<H160>,
    /// Monitor scheduling
    #[serde(default)]
    pub message_monitor: ServiceConfig,
    /// Signer scheduling
    #[serde(default)]
    pub message_signer: ServiceConfig,
    /// Relayer scheduling
    #[serde(default)]
    pub message_relayer: ServiceConfig,
}

impl EthereumNetworkConfig {
    /// The configured chain
    pub fn chain(&self) -> Result<Chain> {
        ensure!(self.chain_id != 0, "{}: chain id must be non-zero", self.chain_name);
        Ok(Chain::ethereum(self.chain_id, &self.chain_name))
    }

    /// Check the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.chain_name.is_empty(), "Ethereum network without a name");
        ensure!(
            !self.rpc_url.as_str().is_empty(),
            "{}: empty rpc url",
            self.chain_name
        );
        for (name, address) in [
            ("mailbox", self.mailbox_address),
            ("mint controller", self.mint_controller_address),
            ("warp ism", self.warp_ism_address),
        ] {
            ensure!(!address.is_zero(), "{}: zero {name} address", self.chain_name);
        }
        self.message_monitor.validate("message monitor")?;
        self.message_signer.validate("message signer")?;
        self.message_relayer.validate("message relayer")?;
        self.chain()?;
        Ok(())
    }

    /// Connect to the node and bind the three contracts.
    pub fn build_connection(&self) -> Result<EthereumConnection> {
        let chain = self.chain()?;
        let provider = build_http_provider(&self.rpc_url, Duration::from_millis(self.timeout_ms))
            .with_context(|| format!("Connecting to {chain}"))?;
        Ok(EthereumConnection {
            client: Arc::new(EthereumProvider::new(
                chain,
                provider.clone(),
                self.confirmations,
            )),
            mailbox: Arc::new(EthereumMailbox::new(provider.clone(), self.mailbox_address)),
            mint_controller: Arc::new(EthereumMintController::new(
                provider.clone(),
                self.mint_controller_address,
            )),
            warp_ism: Arc::new(EthereumWarpIsm::new(provider, self.warp_ism_address)),
        })
    }
}

/// Client and contract handles for one EVM network
#[derive(Clone)]
pub struct EthereumConnection {
    /// Node client
    pub client: Arc<dyn EthereumClient>,
    /// Mailbox
    pub mailbox: Arc<dyn MailboxContract>,
    /// MintController
    pub mint_controller: Arc<dyn MintControllerContract>,
    /// WarpISM
    pub warp_ism: Arc<dyn WarpIsmContract>,
}

impl Debug for EthereumConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthereumConnection {{ chain: {} }}", self.client.chain())
    }
}

/// The Cosmos network deposits come from
#[derive(Debug, Clone, Deserialize)]
pub struct CosmosNetworkConfig {
    /// String chain id
    pub chain_id: String,
    /// Name used in logs
    pub chain_name: String,
    /// Tendermint RPC endpoint
    pub rpc_url: Url,
    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Where to start scanning when nothing was persisted
    #[serde(default)]
    pub start_block_height: u64,
    /// Blocks required on top of a transaction
    pub confirmations: u64,
    /// Fee kept by the bridge on every deposit
    pub tx_fee: u64,
    /// Account address prefix
    pub bech32_prefix: String,
    /// Bridged coin denomination
    pub coin_denom: String,
    /// Multisig account deposits are sent to
    pub multisig_address: String,
    /// Public keys of the multisig members
    #[serde(default)]
    pub multisig_public_keys: Vec<String>,
    /// Signatures required by the multisig
    #[serde(default)]
    pub multisig_threshold: u64,
    /// Deposit monitor scheduling
    #[serde(default)]
    pub message_monitor: ServiceConfig,
}

impl CosmosNetworkConfig {
    /// The configured chain; its domain is derived from the chain id.
    pub fn chain(&self) -> Chain {
        Chain::cosmos(&self.chain_id, &self.chain_name)
    }

    /// Check the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.chain_id.is_empty(), "Cosmos network without a chain id");
        ensure!(
            !self.rpc_url.as_str().is_empty(),
            "{}: empty rpc url",
            self.chain_name
        );
        ensure!(!self.coin_denom.is_empty(), "{}: empty coin denom", self.chain_name);
        address_bytes_from_bech32(&self.bech32_prefix, &self.multisig_address)
            .with_context(|| format!("{}: multisig address", self.chain_name))?;
        self.message_monitor.validate("cosmos message monitor")?;
        if !self.multisig_public_keys.is_empty() {
            let keys = self.multisig_public_keys.len() as u64;
            if self.multisig_threshold == 0 || self.multisig_threshold > keys {
                bail!(
                    "{}: multisig threshold {} out of range for {keys} keys",
                    self.chain_name,
                    self.multisig_threshold
                );
            }
        }
        Ok(())
    }

    /// Parameters of the deposit check
    pub fn multisig_config(&self) -> CosmosMultisigConfig {
        CosmosMultisigConfig {
            confirmations: self.confirmations,
            tx_fee: self.tx_fee.into(),
            bech32_prefix: self.bech32_prefix.clone(),
            coin_denom: self.coin_denom.clone(),
            multisig_address: self.multisig_address.clone(),
        }
    }

    /// Connect to the node.
    pub fn build_client(&self) -> Result<Arc<dyn CosmosClient>> {
        let client = CosmosProvider::new(
            self.chain(),
            &self.rpc_url,
            Duration::from_millis(self.timeout_ms),
            self.confirmations,
        )
        .with_context(|| format!("Connecting to {}", self.chain()))?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ethereum_json() -> serde_json::Value {
        serde_json::json!({
            "chain_id": 11155111,
            "chain_name": "sepolia",
            "rpc_url": "http://localhost:8545",
            "confirmations": 2,
            "mailbox_address": "0x1111111111111111111111111111111111111111",
            "mint_controller_address": "0x2222222222222222222222222222222222222222",
            "warp_ism_address": "0x3333333333333333333333333333333333333333",
            "oracle_addresses": ["0x4444444444444444444444444444444444444444"],
            "message_monitor": { "enabled": true, "interval_ms": 5000 }
        })
    }

    #[test]
    fn ethereum_network_defaults() {
        let config: EthereumNetworkConfig = serde_json::from_value(ethereum_json()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.chain().unwrap().chain_domain, 11155111);
        assert_eq!(config.timeout_ms, 10_000);
        assert!(config.message_monitor.enabled);
        assert!(!config.message_signer.enabled);
        assert_eq!(config.message_monitor.interval(), Duration::from_secs(5));
    }

    #[test]
    fn enabled_service_needs_an_interval() {
        let mut json = ethereum_json();
        json["message_relayer"] = serde_json::json!({ "enabled": true, "interval_ms": 0 });
        let config: EthereumNetworkConfig = serde_json::from_value(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_address_is_rejected() {
        let mut json = ethereum_json();
        json["mailbox_address"] = serde_json::json!("0x1234");
        assert!(serde_json::from_value::<EthereumNetworkConfig>(json).is_err());
    }

    #[test]
    fn cosmos_multisig_must_match_prefix() {
        let multisig = oracle_core::utils::bech32_from_bytes("pokt", &[9u8; 20]).unwrap();
        let json = serde_json::json!({
            "chain_id": "poktroll",
            "chain_name": "Poktroll",
            "rpc_url": "http://localhost:26657",
            "confirmations": 1,
            "tx_fee": 10000,
            "bech32_prefix": "pokt",
            "coin_denom": "upokt",
            "multisig_address": multisig,
        });
        let config: CosmosNetworkConfig = serde_json::from_value(json.clone()).unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.chain().chain_domain,
            oracle_core::cosmos_chain_domain("poktroll")
        );
        assert!(!config.message_monitor.enabled);

        let mut wrong = json;
        wrong["bech32_prefix"] = serde_json::json!("cosmos");
        let config: CosmosNetworkConfig = serde_json::from_value(wrong).unwrap();
        assert!(config.validate().is_err());
    }
}
