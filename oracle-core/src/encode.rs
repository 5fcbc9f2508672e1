use ethers_core::types::{H160, H256, U256};

use crate::OracleProtocolError;

/// Simple trait for types with a canonical encoding
pub trait Encode {
    /// Write the canonical encoding to the writer
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write;

    /// Serialize to a vec
    fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![];
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }
}

/// Simple trait for types with a canonical encoding
pub trait Decode {
    /// Try to read from some source
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
        Self: Sized;
}

impl Encode for u8 {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(&[*self])?;
        Ok(1)
    }
}

impl Decode for u8 {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
        Self: Sized,
    {
        let mut buf = [0; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl Encode for u32 {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(&self.to_be_bytes())?;
        Ok(4)
    }
}

impl Decode for u32 {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
        Self: Sized,
    {
        let mut buf = [0; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }
}

impl Encode for H256 {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(self.as_ref())?;
        Ok(32)
    }
}

impl Decode for H256 {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
        Self: Sized,
    {
        let mut digest = H256::default();
        reader.read_exact(digest.as_mut())?;
        Ok(digest)
    }
}

/// Addresses travel as 32-byte words, left-padded with zeroes. Decoding keeps
/// the low 20 bytes.
impl Encode for H160 {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        H256::from(*self).write_to(writer)
    }
}

impl Decode for H160 {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
        Self: Sized,
    {
        Ok(H160::from(H256::read_from(reader)?))
    }
}

impl Encode for U256 {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut buf = [0; 32];
        self.to_big_endian(&mut buf);
        writer.write_all(&buf)?;
        Ok(32)
    }
}

impl Decode for U256 {
    fn read_from<R>(reader: &mut R) -> Result<Self, OracleProtocolError>
    where
        R: std::io::Read,
        Self: Sized,
    {
        let mut buf = [0; 32];
        reader.read_exact(&mut buf)?;
        Ok(U256::from_big_endian(&buf))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_is_left_padded_and_truncated_back() {
        let address = H160::repeat_byte(0xab);
        let encoded = address.to_vec();
        assert_eq!(encoded.len(), 32);
        assert!(encoded[..12].iter().all(|b| *b == 0));
        assert_eq!(&encoded[12..], address.as_bytes());

        let mut dirty = encoded.clone();
        dirty[0] = 0xff;
        let decoded = H160::read_from(&mut dirty.as_slice()).unwrap();
        assert_eq!(decoded, address);
    }

    #[test]
    fn u256_is_big_endian() {
        let encoded = U256::from(1000u64).to_vec();
        assert_eq!(&encoded[30..], &[0x03, 0xe8]);
        assert!(encoded[..30].iter().all(|b| *b == 0));
    }
}
