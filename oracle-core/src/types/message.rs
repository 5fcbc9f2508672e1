use std::fmt::{Debug, Display, Formatter};

use derive_new::new;
use ethers_core::types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

use crate::utils::{fmt_address, keccak256};
use crate::{Decode, Encode, OracleProtocolError, HYPERLANE_VERSION};

/// Size of an encoded [`MessageBody`].
pub const MESSAGE_BODY_LENGTH: usize = 32 + 32 + 32;

/// Size of an encoded [`MessageContent`].
pub const MESSAGE_CONTENT_LENGTH: usize = 1 + 4 + 4 + 32 + 4 + 32 + MESSAGE_BODY_LENGTH;

/// A message ID that has been dispatched by an origin mailbox.
pub type MessageId = H256;

/// Token transfer carried by a message.
#[derive(new, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageBody {
    /// Who receives the minted/released funds on the destination chain
    pub recipient_address: H160,
    /// Amount in the destination token's base unit
    pub amount: U256,
    /// Who sent the funds on the origin chain
    pub sender_address: H160,
}

impl Debug for MessageBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MessageBody {{ recipient: {}, amount: {}, sender: {} }}",
            fmt_address(&self.recipient_address),
            self.amount,
            fmt_address(&self.sender_address),
        )
    }
}

impl Encode for MessageBody {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = self.recipient_address.write_to(writer)?;
        written += self.amount.write_to(writer)?;
        written += self.sender_address.write_to(writer)?;
        Ok(written)
    }
}

impl Decode for MessageBody {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
    {
        Ok(Self {
            recipient_address: H160::read_from(reader)?,
            amount: U256::read_from(reader)?,
            sender_address: H160::read_from(reader)?,
        })
    }
}

impl MessageBody {
    /// Decode exactly [`MESSAGE_BODY_LENGTH`] bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, OracleProtocolError> {
        if data.len() != MESSAGE_BODY_LENGTH {
            return Err(OracleProtocolError::InvalidLength {
                expected: MESSAGE_BODY_LENGTH,
                actual: data.len(),
            });
        }
        Self::read_from(&mut &data[..])
    }
}

/// The wire payload a mailbox dispatches and a destination verifies.
///
/// The encoding is fixed width, big-endian:
///
/// | field              | bytes |
/// |--------------------|-------|
/// | version            | 1     |
/// | nonce              | 4     |
/// | origin domain      | 4     |
/// | sender             | 32    |
/// | destination domain | 4     |
/// | recipient          | 32    |
/// | body               | 96    |
///
/// Addresses are left-padded to 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageContent {
    /// Protocol version
    pub version: u8,
    /// Per-origin sequence number
    pub nonce: u32,
    /// Domain of the chain the message was dispatched on
    pub origin_domain: u32,
    /// Contract that dispatched the message
    pub sender: H160,
    /// Domain of the chain the message is bound for
    pub destination_domain: u32,
    /// Contract that will execute the message
    pub recipient: H160,
    /// Transfer details
    pub message_body: MessageBody,
}

impl Debug for MessageContent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MessageContent {{ id: {:?}, nonce: {}, origin: {}, sender: {}, destination: {}, recipient: {}, body: {:?} }}",
            self.id(),
            self.nonce,
            self.origin_domain,
            fmt_address(&self.sender),
            self.destination_domain,
            fmt_address(&self.recipient),
            self.message_body,
        )
    }
}

impl Display for MessageContent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageContent {{ id: {:?} }}", self.id())
    }
}

impl Encode for MessageContent {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = self.version.write_to(writer)?;
        written += self.nonce.write_to(writer)?;
        written += self.origin_domain.write_to(writer)?;
        written += self.sender.write_to(writer)?;
        written += self.destination_domain.write_to(writer)?;
        written += self.recipient.write_to(writer)?;
        written += self.message_body.write_to(writer)?;
        Ok(written)
    }
}

impl Decode for MessageContent {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
    {
        Ok(Self {
            version: u8::read_from(reader)?,
            nonce: u32::read_from(reader)?,
            origin_domain: u32::read_from(reader)?,
            sender: H160::read_from(reader)?,
            destination_domain: u32::read_from(reader)?,
            recipient: H160::read_from(reader)?,
            message_body: MessageBody::read_from(reader)?,
        })
    }
}

impl MessageContent {
    /// New content at the current protocol version.
    pub fn new(
        nonce: u32,
        origin_domain: u32,
        sender: H160,
        destination_domain: u32,
        recipient: H160,
        message_body: MessageBody,
    ) -> Self {
        Self {
            version: HYPERLANE_VERSION,
            nonce,
            origin_domain,
            sender,
            destination_domain,
            recipient,
            message_body,
        }
    }

    /// Decode exactly [`MESSAGE_CONTENT_LENGTH`] bytes. Short or long buffers
    /// are rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self, OracleProtocolError> {
        if data.len() != MESSAGE_CONTENT_LENGTH {
            return Err(OracleProtocolError::InvalidLength {
                expected: MESSAGE_CONTENT_LENGTH,
                actual: data.len(),
            });
        }
        let mut reader = data;
        let content = Self::read_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(OracleProtocolError::TrailingData(reader.len()));
        }
        Ok(content)
    }

    /// The message ID: keccak256 of the encoded content.
    pub fn id(&self) -> MessageId {
        keccak256(self.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::hex_from_bytes;

    fn content() -> MessageContent {
        MessageContent::new(
            7,
            1,
            H160::repeat_byte(0x11),
            2,
            H160::repeat_byte(0x22),
            MessageBody::new(H160::repeat_byte(0x33), U256::from(1_000_000u64), H160::repeat_byte(0x44)),
        )
    }

    #[test]
    fn encoding_has_fixed_layout() {
        let bytes = content().to_vec();
        assert_eq!(bytes.len(), MESSAGE_CONTENT_LENGTH);
        assert_eq!(bytes[0], HYPERLANE_VERSION);
        assert_eq!(&bytes[1..5], &7u32.to_be_bytes());
        assert_eq!(&bytes[5..9], &1u32.to_be_bytes());
        assert_eq!(&bytes[9..21], &[0u8; 12]);
        assert_eq!(&bytes[21..41], &[0x11; 20]);
        assert_eq!(&bytes[41..45], &2u32.to_be_bytes());
        assert_eq!(&bytes[57..77], &[0x22; 20]);
        assert_eq!(&bytes[89..109], &[0x33; 20]);
        assert_eq!(&bytes[137..141], &1_000_000u32.to_be_bytes());
        assert_eq!(&bytes[153..173], &[0x44; 20]);
    }

    #[test]
    fn decode_inverts_encode() {
        let original = content();
        let decoded = MessageContent::from_bytes(&original.to_vec()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.id(), original.id());
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        let mut bytes = content().to_vec();
        bytes.push(0);
        assert!(matches!(
            MessageContent::from_bytes(&bytes),
            Err(OracleProtocolError::InvalidLength { expected: 173, actual: 174 })
        ));
        assert!(MessageContent::from_bytes(&bytes[..172]).is_err());
        assert!(MessageContent::from_bytes(&[]).is_err());
        assert!(MessageBody::from_bytes(&[0u8; 95]).is_err());
    }

    #[test]
    fn identical_fields_give_identical_ids() {
        let a = content();
        let b = content();
        assert_eq!(a.to_vec(), b.to_vec());
        assert_eq!(hex_from_bytes(a.id()), hex_from_bytes(b.id()));

        let mut c = content();
        c.nonce += 1;
        assert_ne!(a.id(), c.id());
    }
}
