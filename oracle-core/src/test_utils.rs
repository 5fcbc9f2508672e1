use ethers_signers::LocalWallet;

use crate::{DomainData, H160, H256, MessageBody, MessageContent, U256};

/// A deterministic wallet; `seed` must be non-zero.
pub fn test_wallet(seed: u8) -> LocalWallet {
    // a repeated non-zero byte is always below the curve order
    LocalWallet::from_bytes(&[seed; 32]).expect("valid secp256k1 key")
}

/// A domain as a WarpISM on `chain_id` at `verifying_contract` would report.
pub fn dummy_domain(chain_id: u32, verifying_contract: H160) -> DomainData {
    DomainData {
        name: "WarpISM".to_owned(),
        version: "1".to_owned(),
        chain_id: U256::from(chain_id),
        verifying_contract,
        salt: H256::zero(),
        extensions: vec![],
    }
}

/// Content of a transfer of `amount` from `origin` to `destination` sent by
/// the `sender` contract to the `recipient` contract.
pub fn dummy_content(
    nonce: u32,
    origin: u32,
    sender: H160,
    destination: u32,
    recipient: H160,
    amount: u64,
) -> MessageContent {
    MessageContent::new(
        nonce,
        origin,
        sender,
        destination,
        recipient,
        MessageBody::new(H160::repeat_byte(0xaa), U256::from(amount), H160::repeat_byte(0xbb)),
    )
}
