//! Validates pending messages bound for this chain against their origin
//! and adds this node's signature.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{ensure, Result};
use tracing::{debug, info, instrument, warn};

use oracle_base::settings::EthereumConnection;
use oracle_base::Runnable;
use oracle_core::{
    merge_signature, message_resource, with_write_lock, Chain, ChainCommunicationError,
    ChainResult, DomainData, EthereumClient, MessageRecord, MessageStatus, MessageUpdate,
    MintControllerContract, OracleSigner, OracleSignerError, OracleSignerExt, OracleStore,
    StoreError, WarpIsmContract, H160, U256,
};

pub use cosmos::CosmosOriginValidator;
pub use ethereum::EthereumOriginValidator;
pub use origin::{OriginCheck, OriginValidator};

mod cosmos;
mod ethereum;
mod origin;

/// Failure to add a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// Store unavailable, lock contention or missing document
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The key could not sign
    #[error(transparent)]
    Signer(#[from] OracleSignerError),
}

/// WarpISM and MintController values signing depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerParams {
    /// Registered validators
    pub num_signers: u64,
    /// Signatures needed for a message to count as signed
    pub signer_threshold: u64,
    /// Largest amount the mint controller releases per message
    pub max_mint_limit: U256,
    /// Typed-data domain of the WarpISM
    pub domain: DomainData,
}

/// Signs messages bound for one EVM chain.
#[derive(Debug)]
pub struct MessageSigner {
    chain: Chain,
    signer: Arc<dyn OracleSigner>,
    signer_address: String,
    client: Arc<dyn EthereumClient>,
    mint_controller: Arc<dyn MintControllerContract>,
    warp_ism: Arc<dyn WarpIsmContract>,
    ethereum_origins: EthereumOriginValidator,
    cosmos_origin: Option<CosmosOriginValidator>,
    store: Arc<dyn OracleStore>,
    params: SignerParams,
    current_height: u64,
    cosmos_height: u64,
}

impl MessageSigner {
    /// Read the WarpISM and refuse to start when it does not match the
    /// configured validator set or chain.
    pub async fn new(
        connection: &EthereumConnection,
        oracle_addresses: &[H160],
        signer: Arc<dyn OracleSigner>,
        ethereum_origins: EthereumOriginValidator,
        cosmos_origin: Option<CosmosOriginValidator>,
        store: Arc<dyn OracleStore>,
    ) -> Result<Self> {
        let chain = connection.client.chain();
        let warp_ism = connection.warp_ism.clone();

        let (num_signers, signer_threshold) = read_signer_set(warp_ism.as_ref()).await?;
        ensure!(
            num_signers == oracle_addresses.len() as u64,
            "{chain}: WarpISM has {num_signers} validators but {} oracle addresses are configured",
            oracle_addresses.len()
        );
        ensure!(
            signer_threshold >= 1 && signer_threshold <= num_signers,
            "{chain}: signer threshold {signer_threshold} out of range for {num_signers} validators"
        );

        let domain = warp_ism.eip712_domain().await?;
        ensure!(
            domain.chain_id == U256::from(chain.chain_domain),
            "{chain}: WarpISM domain is for chain {}",
            domain.chain_id
        );
        ensure!(
            domain.verifying_contract == warp_ism.address(),
            "{chain}: WarpISM domain verifies {:?}, expected {:?}",
            domain.verifying_contract,
            warp_ism.address()
        );

        if !oracle_addresses.contains(&signer.eth_address()) {
            warn!(%chain, signer = %signer.signer_address(), "Signer is not among the configured oracle addresses");
        }

        let max_mint_limit = connection.mint_controller.max_mint_limit().await?;
        let current_height = connection.client.get_block_height().await?;
        info!(%chain, num_signers, signer_threshold, %max_mint_limit, "Signer ready");

        Ok(Self {
            chain,
            signer_address: signer.signer_address(),
            signer,
            client: connection.client.clone(),
            mint_controller: connection.mint_controller.clone(),
            warp_ism,
            ethereum_origins,
            cosmos_origin,
            store,
            params: SignerParams {
                num_signers,
                signer_threshold,
                max_mint_limit,
                domain,
            },
            current_height,
            cosmos_height: 0,
        })
    }

    /// Current signing parameters
    pub fn params(&self) -> &SignerParams {
        &self.params
    }

    /// Refresh the heads of this chain and of the Cosmos chain. A failed
    /// read keeps the previous height.
    pub async fn update_block_heights(&mut self) {
        match self.client.get_block_height().await {
            Ok(height) => self.current_height = height,
            Err(err) => warn!(?err, "Failed to fetch block height"),
        }
        if let Some(cosmos) = &self.cosmos_origin {
            match cosmos.get_block_height().await {
                Ok(height) => self.cosmos_height = height,
                Err(err) => warn!(?err, "Failed to fetch cosmos block height"),
            }
        }
    }

    /// Re-read the validator set, domain and mint limit. Values that fail
    /// to load, or load inconsistent, keep their cached value.
    pub async fn update_params(&mut self) {
        match read_signer_set(self.warp_ism.as_ref()).await {
            Ok((num_signers, threshold)) if threshold >= 1 && threshold <= num_signers => {
                self.params.num_signers = num_signers;
                self.params.signer_threshold = threshold;
            }
            Ok((num_signers, threshold)) => {
                warn!(num_signers, threshold, "Ignoring inconsistent signer set")
            }
            Err(err) => warn!(?err, "Failed to read signer set"),
        }
        match self.warp_ism.eip712_domain().await {
            Ok(domain) => self.params.domain = domain,
            Err(err) => warn!(?err, "Failed to read eip712 domain"),
        }
        match self.mint_controller.max_mint_limit().await {
            Ok(limit) => self.params.max_mint_limit = limit,
            Err(err) => warn!(?err, "Failed to read max mint limit"),
        }
    }

    fn origin_validator(&self, message: &MessageRecord) -> OriginValidator<'_> {
        OriginValidator::select(
            message.content.origin_domain,
            self.cosmos_origin.as_ref(),
            self.cosmos_height,
            &self.ethereum_origins,
        )
    }

    /// Add this node's signature to `message` under its write lock. The
    /// message is re-read inside the lock and left alone if it was closed
    /// meanwhile or is already signed by us.
    pub async fn sign_message(&self, message: &MessageRecord) -> Result<MessageStatus, SignError> {
        let resource = message_resource(message.id);
        with_write_lock(self.store.as_ref(), &resource, self.sign_locked(message)).await?
    }

    async fn current_message(&self, message: &MessageRecord) -> Result<MessageRecord, StoreError> {
        self.store
            .get_message(message.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("message {}", message.id)))
    }

    async fn sign_locked(&self, message: &MessageRecord) -> Result<MessageStatus, SignError> {
        let current = self.current_message(message).await?;
        if !current.status.is_open() || current.is_signed_by(&self.signer_address) {
            return Ok(current.status);
        }

        let signature = self
            .signer
            .sign_content(&self.params.domain, &current.content)
            .await?;
        let signatures = merge_signature(&current.signatures, signature);
        let status = if signatures.len() as u64 >= self.params.signer_threshold {
            MessageStatus::Signed
        } else {
            MessageStatus::Pending
        };
        let update = MessageUpdate {
            status: Some(status),
            signatures: Some(signatures),
            ..Default::default()
        };
        self.store.update_message(message.id, update).await?;
        Ok(status)
    }

    /// Mark `message` invalid under its write lock, unless it was closed
    /// meanwhile.
    pub async fn invalidate_message(&self, message: &MessageRecord) -> Result<MessageStatus, StoreError> {
        let resource = message_resource(message.id);
        with_write_lock(self.store.as_ref(), &resource, async {
            let current = self.current_message(message).await?;
            if !current.status.is_open() {
                return Ok(current.status);
            }
            let update = MessageUpdate {
                status: Some(MessageStatus::Invalid),
                ..Default::default()
            };
            self.store.update_message(message.id, update).await?;
            Ok(MessageStatus::Invalid)
        })
        .await?
    }

    /// Validate `message` against its origin and sign it once final.
    #[instrument(skip_all, fields(message_id = ?message.message_id, nonce = message.content.nonce))]
    pub async fn validate_and_sign(&self, message: &MessageRecord) -> bool {
        if message.content.destination_domain != self.chain.chain_domain {
            warn!(destination = message.content.destination_domain, "Message is not bound for this chain");
            return false;
        }
        if message.content.message_body.amount > self.params.max_mint_limit {
            warn!(
                amount = %message.content.message_body.amount,
                max_mint_limit = %self.params.max_mint_limit,
                "Amount exceeds the max mint limit"
            );
        }

        let check = match self.origin_validator(message).validate(message).await {
            Ok(check) => check,
            Err(err @ ChainCommunicationError::UnknownDomain(_)) => {
                warn!(%err, "No origin configured for message");
                return false;
            }
            Err(err) => {
                warn!(?err, "Failed to validate message origin");
                return false;
            }
        };

        match check {
            OriginCheck::Confirmed => match self.sign_message(message).await {
                Ok(status) => {
                    info!(?status, "Signed message");
                    true
                }
                Err(err) => {
                    warn!(?err, "Failed to sign message");
                    false
                }
            },
            OriginCheck::Pending => {
                debug!("Origin not final yet");
                true
            }
            OriginCheck::Invalid(reason) => {
                warn!(%reason, "Marking message invalid");
                match self.invalidate_message(message).await {
                    Ok(status) => {
                        debug!(?status, "Invalidation done");
                        true
                    }
                    Err(err) => {
                        warn!(?err, "Failed to mark message invalid");
                        false
                    }
                }
            }
        }
    }

    /// Sign every pending message bound for this chain that lacks our
    /// signature, in nonce order.
    pub async fn sign_messages(&self) -> bool {
        let messages = match self
            .store
            .get_pending_messages(&self.signer_address, &self.chain)
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                warn!(?err, "Failed to load pending messages");
                return false;
            }
        };
        let mut success = true;
        for message in &messages {
            success &= self.validate_and_sign(message).await;
        }
        success
    }
}

async fn read_signer_set(warp_ism: &dyn WarpIsmContract) -> ChainResult<(u64, u64)> {
    let count = warp_ism.validator_count().await?;
    let threshold = warp_ism.signer_threshold().await?;
    Ok((to_u64("validator count", count)?, to_u64("signer threshold", threshold)?))
}

fn to_u64(name: &str, value: U256) -> ChainResult<u64> {
    u64::try_from(value).map_err(|_| {
        ChainCommunicationError::from_other_str(&format!("{name} {value} does not fit in u64"))
    })
}

#[async_trait]
impl Runnable for MessageSigner {
    #[instrument(skip(self), fields(chain = %self.chain))]
    async fn run(&mut self) {
        self.update_block_heights().await;
        self.update_params().await;
        let signed = self.sign_messages().await;
        debug!(signed, height = self.current_height, "Signer tick done");
    }

    fn height(&self) -> u64 {
        self.current_height
    }
}
