use std::any::Any;
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

use ethers_contract::ContractError;
use ethers_core::types::SignatureError;
use ethers_providers::{Middleware, ProviderError};
use ethers_signers::WalletError;

use crate::{RecordId, H256};

/// The result of interacting with a chain.
pub type ChainResult<T> = Result<T, ChainCommunicationError>;

/// The result of interacting with the shared store.
pub type StoreResult<T> = Result<T, StoreError>;

/// An "Any"-typed error.
pub trait OracleCustomError: StdError + Send + Sync + Any {}

impl<E: StdError + Send + Sync + Any> OracleCustomError for E {}

/// Thin wrapper around a boxed OracleCustomError; required to satisfy
/// AsDynError implementations. Basically a trait-object adaptor.
#[repr(transparent)]
pub struct OracleCustomErrorWrapper(Box<dyn OracleCustomError>);

impl Debug for OracleCustomErrorWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", AsRef::<dyn OracleCustomError>::as_ref(&self))
    }
}

impl Display for OracleCustomErrorWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", AsRef::<dyn OracleCustomError>::as_ref(&self))
    }
}

impl StdError for OracleCustomErrorWrapper {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl AsRef<dyn OracleCustomError> for OracleCustomErrorWrapper {
    fn as_ref(&self) -> &dyn OracleCustomError {
        self.0.as_ref()
    }
}

impl Deref for OracleCustomErrorWrapper {
    type Target = Box<dyn OracleCustomError>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
#[repr(transparent)]
struct StringError(String);

impl Display for StringError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for StringError {}

/// ChainCommunicationError contains errors returned when attempting to
/// query a chain or one of its contracts
#[derive(Debug, thiserror::Error)]
pub enum ChainCommunicationError {
    /// Oracle protocol error
    #[error(transparent)]
    OracleProtocolError(#[from] OracleProtocolError),
    /// An error with a contract call
    #[error(transparent)]
    ContractError(OracleCustomErrorWrapper),
    /// Provider Error
    #[error(transparent)]
    ProviderError(#[from] ProviderError),
    /// The requested transaction is unknown to the node
    #[error("Transaction not found {0:?}")]
    TransactionNotFound(H256),
    /// The requested transaction has not been mined yet
    #[error("Transaction is pending {0:?}")]
    TransactionPending(H256),
    /// The transaction was mined but reverted
    #[error("Transaction failed {0:?}")]
    TransactionFailed(H256),
    /// No client or contract is configured for a domain
    #[error("No chain configured for domain {0}")]
    UnknownDomain(u32),
    /// Any other error; does not implement `From` to prevent
    /// conflicting/absorbing other errors.
    #[error(transparent)]
    Other(OracleCustomErrorWrapper),
}

impl ChainCommunicationError {
    /// Create a chain communication error from any other existing error
    pub fn from_other<E: OracleCustomError>(err: E) -> Self {
        Self::Other(OracleCustomErrorWrapper(Box::new(err)))
    }

    /// Creates a chain communication error of the other error variant from a string
    pub fn from_other_str(err: &str) -> Self {
        Self::from_other(StringError(err.to_owned()))
    }

    /// Creates a chain communication error of the contract error variant from any other existing
    /// error
    pub fn from_contract_error<E>(err: E) -> Self
    where
        E: OracleCustomError,
    {
        Self::ContractError(OracleCustomErrorWrapper(Box::new(err)))
    }

    /// Creates a chain communication error of the contract error variant from a string
    pub fn from_contract_error_str(err: &str) -> Self {
        Self::from_contract_error(StringError(err.to_owned()))
    }
}

impl<M> From<ContractError<M>> for ChainCommunicationError
where
    M: Middleware + 'static,
{
    fn from(e: ContractError<M>) -> Self {
        Self::ContractError(OracleCustomErrorWrapper(Box::new(e)))
    }
}

impl From<WalletError> for ChainCommunicationError {
    fn from(e: WalletError) -> Self {
        Self::from_other(e)
    }
}

/// Error types for the oracle wire protocol and its encodings
#[derive(Debug, thiserror::Error)]
pub enum OracleProtocolError {
    /// Signature Error pasthrough
    #[error(transparent)]
    SignatureError(#[from] SignatureError),
    /// IO error from Read/Write usage
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// A buffer did not have the fixed size of its encoding
    #[error("Invalid encoded length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Length of a well-formed encoding
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
    /// Bytes left over after decoding a fixed-size structure
    #[error("Unexpected trailing data ({0} bytes)")]
    TrailingData(usize),
    /// Hex string could not be decoded
    #[error(transparent)]
    InvalidHex(#[from] hex::FromHexError),
    /// An address was not 20 bytes long
    #[error("Invalid address length: {0}")]
    InvalidAddressLength(usize),
    /// Bech32 decoding failed
    #[error("Invalid bech32 address: {0}")]
    InvalidBech32(String),
    /// A JSON payload could not be parsed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A mint memo parsed but names an unusable recipient or chain
    #[error("Invalid memo: {0}")]
    InvalidMemo(String),
}

/// Errors returned by the shared store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document with the given key
    #[error("Document not found: {0}")]
    NotFound(String),
    /// Another holder owns an unexpired lease on the resource
    #[error("Resource {0} is locked")]
    LockContention(String),
    /// Unlock was called with an unknown or expired lock id
    #[error("Lock {0} is not held")]
    LockNotHeld(String),
    /// The document cannot be stored as given
    #[error("Invalid document {id}: {reason}")]
    InvalidDocument {
        /// Identifier of the offending document
        id: RecordId,
        /// What was wrong with it
        reason: String,
    },
    /// Any other backend error
    #[error(transparent)]
    Other(OracleCustomErrorWrapper),
}

impl StoreError {
    /// Create a store error from any other existing error
    pub fn from_other<E: OracleCustomError>(err: E) -> Self {
        Self::Other(OracleCustomErrorWrapper(Box::new(err)))
    }
}
