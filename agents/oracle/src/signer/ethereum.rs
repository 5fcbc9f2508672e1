use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use tracing::debug;

use oracle_base::settings::EthereumConnection;
use oracle_core::{
    ChainCommunicationError, ChainResult, EthereumClient, MailboxContract, MessageRecord,
    TransactionStatus,
};

use crate::tx::confirmation_status;

use super::origin::OriginCheck;

struct Origin {
    client: Arc<dyn EthereumClient>,
    mailbox: Arc<dyn MailboxContract>,
}

/// Checks messages dispatched through the mailbox of any configured EVM
/// chain.
#[derive(Default)]
pub struct EthereumOriginValidator {
    origins: HashMap<u32, Origin>,
}

impl Debug for EthereumOriginValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut domains: Vec<_> = self.origins.keys().collect();
        domains.sort();
        write!(f, "EthereumOriginValidator {{ domains: {domains:?} }}")
    }
}

impl EthereumOriginValidator {
    /// Validator over every given network.
    pub fn new<'a>(connections: impl IntoIterator<Item = &'a EthereumConnection>) -> Self {
        let origins = connections
            .into_iter()
            .map(|connection| {
                (
                    connection.client.chain().chain_domain,
                    Origin {
                        client: connection.client.clone(),
                        mailbox: connection.mailbox.clone(),
                    },
                )
            })
            .collect();
        Self { origins }
    }

    /// The origin transaction must have succeeded and carry a `DispatchId`
    /// for exactly this message at the origin mailbox. Depth is judged by
    /// the origin chain's own head and confirmation requirement.
    pub async fn validate(&self, message: &MessageRecord) -> ChainResult<OriginCheck> {
        let domain = message.content.origin_domain;
        let origin = self
            .origins
            .get(&domain)
            .ok_or(ChainCommunicationError::UnknownDomain(domain))?;
        let hash = message.origin_transaction_hash;

        let receipt = match origin.client.get_transaction_receipt(hash).await? {
            Some(receipt) if receipt.success => receipt,
            Some(_) => return Ok(OriginCheck::Invalid("origin transaction reverted".to_owned())),
            None => return Ok(OriginCheck::Invalid("origin receipt not found".to_owned())),
        };

        let mailbox = origin.mailbox.address();
        let dispatched = receipt
            .logs_at(mailbox)
            .filter_map(|log| origin.mailbox.parse_dispatch_id(log).ok())
            .any(|event| event.message_id == message.message_id);
        if !dispatched {
            return Ok(OriginCheck::Invalid(format!(
                "no DispatchId for {:?} in {:?}",
                message.message_id, hash
            )));
        }

        let height = origin.client.get_block_height().await?;
        let (confirmations, status) =
            confirmation_status(height, receipt.block_number, origin.client.confirmations());
        debug!(tx_hash = ?hash, confirmations, "Origin dispatch found");
        Ok(match status {
            TransactionStatus::Confirmed => OriginCheck::Confirmed,
            _ => OriginCheck::Pending,
        })
    }
}
