use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;
use ethers_core::types::Signature as EthersSignature;
use ethers_signers::{LocalWallet, Signer};

use crate::utils::{fmt_address, hex_from_bytes};
use crate::{sort_signatures, DomainData, MessageContent, OracleProtocolError, Signature, H160, H256};

/// An error incurred by a signer
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct OracleSignerError(#[from] Box<dyn std::error::Error + Send + Sync>);

/// Signs message digests with this node's validator key.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait OracleSigner: Send + Sync + Debug {
    /// The signer's address
    fn eth_address(&self) -> H160;

    /// Sign a raw 32-byte digest. No EIP-191 prefix is applied and `v` is
    /// 27 or 28.
    async fn sign_hash(&self, hash: &H256) -> Result<EthersSignature, OracleSignerError>;
}

#[async_trait]
impl OracleSigner for LocalWallet {
    fn eth_address(&self) -> H160 {
        Signer::address(self)
    }

    async fn sign_hash(&self, hash: &H256) -> Result<EthersSignature, OracleSignerError> {
        LocalWallet::sign_hash(self, *hash).map_err(|e| OracleSignerError(Box::new(e)))
    }
}

/// Auto-implemented extension trait for OracleSigner.
#[async_trait]
pub trait OracleSignerExt {
    /// Lower-case `0x` address, the form stored in signature lists
    fn signer_address(&self) -> String;

    /// Sign `content` under `domain`.
    async fn sign_content(
        &self,
        domain: &DomainData,
        content: &MessageContent,
    ) -> Result<Signature, OracleSignerError>;
}

#[async_trait]
impl<S: OracleSigner> OracleSignerExt for S {
    fn signer_address(&self) -> String {
        fmt_address(&self.eth_address())
    }

    async fn sign_content(
        &self,
        domain: &DomainData,
        content: &MessageContent,
    ) -> Result<Signature, OracleSignerError> {
        let digest = domain.signing_hash(content);
        let signature = self.sign_hash(&digest).await?;
        Ok(Signature {
            signer: self.signer_address(),
            signature: hex_from_bytes(signature.to_vec()),
        })
    }
}

/// Merge `signature` into `existing`: any previous entry by the same signer
/// is replaced, and the result is sorted by signer address.
pub fn merge_signature(existing: &[Signature], signature: Signature) -> Vec<Signature> {
    let mut merged: Vec<Signature> = existing
        .iter()
        .filter(|s| !s.signer.eq_ignore_ascii_case(&signature.signer))
        .cloned()
        .collect();
    merged.push(signature);
    sort_signatures(&mut merged);
    merged
}

/// Recover the address that produced `signature` over `content` under
/// `domain`.
pub fn recover_signer(
    domain: &DomainData,
    content: &MessageContent,
    signature: &Signature,
) -> Result<H160, OracleProtocolError> {
    let bytes = crate::utils::bytes_from_hex(&signature.signature)?;
    let signature = EthersSignature::try_from(bytes.as_slice())?;
    Ok(signature.recover(domain.signing_hash(content))?)
}
