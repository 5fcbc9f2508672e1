use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use oracle_base::settings::{EthereumConnection, EthereumNetworkConfig, ServiceConfig, Settings};
use oracle_base::{
    BaseAgent, EmptyRunnable, Runnable, RunnerService, RunnerStatusReader,
};
use oracle_core::utils::{address_bytes_from_bech32, address_from_bytes};
use oracle_core::{
    Chain, ChainServiceHealth, CosmosClient, OracleSigner, OracleStore, RunnerServiceStatus, H160,
};
use oracle_cosmos::CosmosMultisigConfig;

use crate::cosmos_monitor::CosmosMessageMonitor;
use crate::monitor::MessageMonitor;
use crate::relayer::MessageRelayer;
use crate::settings::OracleSettings;
use crate::signer::{CosmosOriginValidator, EthereumOriginValidator, MessageSigner};
use crate::tx::ReceiptTransactionValidator;

/// The runners of one EVM chain.
#[derive(Debug)]
pub struct ChainService {
    chain: Chain,
    monitor: RunnerService,
    signer: RunnerService,
    relayer: RunnerService,
}

/// Reads the latest status of every runner of a chain.
#[derive(Debug, Clone)]
pub struct ChainHealthReader {
    chain: Chain,
    monitor: RunnerStatusReader,
    signer: RunnerStatusReader,
    relayer: RunnerStatusReader,
}

impl ChainHealthReader {
    /// Disabled runners, and runners that have not ticked yet, are `None`.
    pub fn health(&self) -> ChainServiceHealth {
        ChainServiceHealth {
            chain: self.chain.clone(),
            message_monitor: self.monitor.get(),
            message_signer: self.signer.get(),
            message_relayer: self.relayer.get(),
        }
    }
}

impl ChainService {
    /// Handle to the health of this chain's runners
    pub fn health_reader(&self) -> ChainHealthReader {
        ChainHealthReader {
            chain: self.chain.clone(),
            monitor: self.monitor.status_reader(),
            signer: self.signer.status_reader(),
            relayer: self.relayer.status_reader(),
        }
    }

    /// Start all three runners concurrently, returning once they stopped.
    pub async fn start(self) {
        futures::join!(self.monitor.start(), self.signer.start(), self.relayer.start());
        info!("Chain service stopped");
    }
}

/// A node of the oracle: monitor, signer and relayer for every configured
/// EVM chain, plus the deposit monitor of the Cosmos chain.
pub struct Oracle {
    store: Arc<dyn OracleStore>,
    chains: Vec<ChainService>,
    cosmos_monitor: Option<RunnerService>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Debug for Oracle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let chains: Vec<_> = self.chains.iter().map(|c| c.chain.to_string()).collect();
        write!(f, "Oracle {{ chains: {chains:?} }}")
    }
}

/// Client and deposit parameters of the Cosmos chain
#[derive(Debug, Clone)]
struct CosmosConnection {
    client: Arc<dyn CosmosClient>,
    config: CosmosMultisigConfig,
}

impl CosmosConnection {
    /// Deposits signed on `chain` must name it in their memo.
    fn validator_for(&self, chain: &Chain) -> CosmosOriginValidator {
        CosmosOriginValidator::new(
            self.client.clone(),
            self.config.clone(),
            HashSet::from([chain.chain_domain]),
        )
    }
}

fn runner_name(chain: &Chain, service: &str) -> String {
    format!("{}_{service}", chain.chain_name)
}

impl Oracle {
    /// Handles to the health of every chain
    pub fn health_readers(&self) -> Vec<ChainHealthReader> {
        self.chains.iter().map(ChainService::health_reader).collect()
    }

    fn runner(
        &self,
        name: String,
        config: ServiceConfig,
        runnable: Option<Box<dyn Runnable>>,
    ) -> RunnerService {
        let runnable = runnable.unwrap_or_else(|| Box::new(EmptyRunnable));
        RunnerService::new(
            name,
            runnable,
            config,
            self.store.clone(),
            self.shutdown.subscribe(),
        )
    }

    async fn last_status(&self, name: &str) -> Option<RunnerServiceStatus> {
        match self.store.get_runner_status(name).await {
            Ok(status) => status,
            Err(err) => {
                warn!(runner = name, ?err, "Failed to load runner status");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_chain_service(
        &self,
        network: &EthereumNetworkConfig,
        connection: &EthereumConnection,
        mint_controllers: &Arc<HashMap<u32, H160>>,
        signer: &Arc<dyn OracleSigner>,
        connections: &[EthereumConnection],
        cosmos: &Option<CosmosConnection>,
    ) -> Result<ChainService> {
        let chain = network.chain()?;
        let store = self.store.clone();
        let tx_validator = Arc::new(ReceiptTransactionValidator::new(connection.client.clone()));

        let name = runner_name(&chain, "Monitor");
        let monitor: Option<Box<dyn Runnable>> = if network.message_monitor.enabled {
            let last = self.last_status(&name).await;
            let monitor = MessageMonitor::new(
                connection,
                mint_controllers.clone(),
                tx_validator.clone(),
                store.clone(),
                network.start_block_height,
                last.as_ref(),
            )
            .await
            .with_context(|| format!("Starting {name}"))?;
            Some(Box::new(monitor))
        } else {
            None
        };
        let monitor = self.runner(name, network.message_monitor, monitor);

        let name = runner_name(&chain, "Signer");
        let message_signer: Option<Box<dyn Runnable>> = if network.message_signer.enabled {
            let message_signer = MessageSigner::new(
                connection,
                &network.oracle_addresses,
                signer.clone(),
                EthereumOriginValidator::new(connections),
                cosmos.as_ref().map(|cosmos| cosmos.validator_for(&chain)),
                store.clone(),
            )
            .await
            .with_context(|| format!("Starting {name}"))?;
            Some(Box::new(message_signer))
        } else {
            None
        };
        let message_signer = self.runner(name, network.message_signer, message_signer);

        let name = runner_name(&chain, "Relayer");
        let relayer: Option<Box<dyn Runnable>> = if network.message_relayer.enabled {
            let last = self.last_status(&name).await;
            let relayer = MessageRelayer::new(
                connection,
                tx_validator,
                store,
                network.start_block_height,
                last.as_ref(),
            )
            .await
            .with_context(|| format!("Starting {name}"))?;
            Some(Box::new(relayer))
        } else {
            None
        };
        let relayer = self.runner(name, network.message_relayer, relayer);

        Ok(ChainService {
            chain,
            monitor,
            signer: message_signer,
            relayer,
        })
    }
}

#[async_trait]
impl BaseAgent for Oracle {
    const AGENT_NAME: &'static str = "oracle";

    type Settings = OracleSettings;

    async fn from_settings(settings: Self::Settings) -> Result<Self>
    where
        Self: Sized,
    {
        let base: &Settings = settings.as_ref();
        let signer: Arc<dyn OracleSigner> = Arc::new(settings.signer()?);
        let (shutdown, _) = watch::channel(false);
        let mut oracle = Self {
            store: base.store.open().context("Opening store")?,
            chains: vec![],
            cosmos_monitor: None,
            shutdown: Arc::new(shutdown),
        };

        let connections = base
            .ethereum_networks
            .iter()
            .map(EthereumNetworkConfig::build_connection)
            .collect::<Result<Vec<_>>>()?;

        let mut mint_controllers: HashMap<u32, H160> = base
            .ethereum_networks
            .iter()
            .map(|network| -> Result<(u32, H160)> {
                Ok((network.chain()?.chain_domain, network.mint_controller_address))
            })
            .collect::<Result<_>>()?;

        let cosmos = match &base.cosmos_network {
            Some(cosmos) => {
                let multisig =
                    address_bytes_from_bech32(&cosmos.bech32_prefix, &cosmos.multisig_address)
                        .and_then(|bytes| address_from_bytes(&bytes))
                        .context("Cosmos multisig address")?;
                mint_controllers.insert(cosmos.chain().chain_domain, multisig);
                Some(CosmosConnection {
                    client: cosmos.build_client()?,
                    config: cosmos.multisig_config(),
                })
            }
            None => None,
        };
        let mint_controllers = Arc::new(mint_controllers);

        let mut chains = vec![];
        for (network, connection) in base.ethereum_networks.iter().zip(&connections) {
            let service = oracle
                .build_chain_service(
                    network,
                    connection,
                    &mint_controllers,
                    &signer,
                    &connections,
                    &cosmos,
                )
                .await?;
            chains.push(service);
        }
        oracle.chains = chains;

        if let (Some(network), Some(cosmos)) = (&base.cosmos_network, &cosmos) {
            let name = runner_name(&network.chain(), "Monitor");
            let monitor: Option<Box<dyn Runnable>> = if network.message_monitor.enabled {
                let last = oracle.last_status(&name).await;
                let supported_domains = connections
                    .iter()
                    .map(|connection| connection.client.chain().chain_domain)
                    .collect();
                let monitor = CosmosMessageMonitor::new(
                    cosmos.client.clone(),
                    cosmos.config.clone(),
                    supported_domains,
                    mint_controllers.clone(),
                    oracle.store.clone(),
                    network.start_block_height,
                    last.as_ref(),
                )
                .await
                .with_context(|| format!("Starting {name}"))?;
                Some(Box::new(monitor))
            } else {
                None
            };
            oracle.cosmos_monitor = Some(oracle.runner(name, network.message_monitor, monitor));
        }
        Ok(oracle)
    }

    async fn run(self) {
        let health = self.health_readers();
        let shutdown = self.shutdown.clone();
        let ctrl_c: JoinHandle<()> = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    let _ = shutdown.send(true);
                }
                Err(err) => warn!(?err, "Failed to listen for shutdown signal"),
            }
        });

        let mut tasks: Vec<JoinHandle<()>> = self
            .chains
            .into_iter()
            .map(|service| {
                let span = info_span!("ChainService", chain = %service.chain);
                tokio::spawn(service.start().instrument(span))
            })
            .collect();
        if let Some(monitor) = self.cosmos_monitor {
            tasks.push(tokio::spawn(
                monitor.start().instrument(info_span!("CosmosMonitor")),
            ));
        }
        for result in join_all(tasks).await {
            if let Err(err) = result {
                warn!(?err, "Chain service task failed");
            }
        }
        ctrl_c.abort();

        for reader in health {
            info!(health = ?reader.health(), "Final runner status");
        }
    }
}
