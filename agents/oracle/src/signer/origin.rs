use oracle_core::{ChainResult, MessageRecord};

use super::cosmos::CosmosOriginValidator;
use super::ethereum::EthereumOriginValidator;

/// Verdict on the origin of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginCheck {
    /// The origin event is final: sign
    Confirmed,
    /// The origin event exists but is not deep enough yet
    Pending,
    /// The message is not backed by its origin chain
    Invalid(String),
}

/// How a message is checked against the chain it came from, chosen once
/// per message from its origin domain.
#[derive(Debug, Clone, Copy)]
pub enum OriginValidator<'a> {
    /// Deposit into the bridge multisig on the Cosmos chain
    CosmosOrigin {
        /// Deposit checks
        validator: &'a CosmosOriginValidator,
        /// Cosmos chain head as of this tick
        current_height: u64,
    },
    /// Dispatch through an EVM mailbox
    EthereumOrigin(&'a EthereumOriginValidator),
}

impl<'a> OriginValidator<'a> {
    /// Pick the validator for a message originating on `origin_domain`.
    pub fn select(
        origin_domain: u32,
        cosmos: Option<&'a CosmosOriginValidator>,
        cosmos_height: u64,
        ethereum: &'a EthereumOriginValidator,
    ) -> Self {
        match cosmos {
            Some(validator) if validator.domain() == origin_domain => Self::CosmosOrigin {
                validator,
                current_height: cosmos_height,
            },
            _ => Self::EthereumOrigin(ethereum),
        }
    }

    /// Check `message` against its origin chain. Errors are transient or
    /// configuration faults, never a verdict on the message.
    pub async fn validate(&self, message: &MessageRecord) -> ChainResult<OriginCheck> {
        match self {
            Self::CosmosOrigin {
                validator,
                current_height,
            } => validator.validate(message, *current_height).await,
            Self::EthereumOrigin(validator) => validator.validate(message).await,
        }
    }
}
