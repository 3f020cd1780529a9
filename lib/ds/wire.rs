//! Wire format of data-server file handles.

use super::error::DsError;
use crate::cache::fileinfo::Inode;

/// The opaque handle a client presents to the data server: a 32-bit inode, in the byte order
/// the handle was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataServerWire {
    inode: u32,
}

impl DataServerWire {
    /// Encoded length in bytes.
    pub const LEN: usize = 4;

    /// A wire handle for `inode`.
    ///
    /// # Errors
    ///
    /// Inode 0 is never a valid file and yields [`DsError::BadHandle`].
    pub fn new(inode: u32) -> Result<Self, DsError> {
        if inode == 0 {
            return Err(DsError::BadHandle("inode 0"));
        }
        Ok(Self { inode })
    }

    /// Decode a handle. `big_endian` is the byte-order flag carried alongside it.
    ///
    /// # Errors
    ///
    /// Returns [`DsError::BadHandle`] if `bytes` is not exactly [`Self::LEN`] long or names
    /// inode 0.
    pub fn decode(bytes: &[u8], big_endian: bool) -> Result<Self, DsError> {
        let raw: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| DsError::BadHandle("unexpected handle length"))?;
        let inode = if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        };
        Self::new(inode)
    }

    /// Encode the handle in the requested byte order.
    #[must_use]
    pub fn encode(self, big_endian: bool) -> [u8; Self::LEN] {
        if big_endian {
            self.inode.to_be_bytes()
        } else {
            self.inode.to_le_bytes()
        }
    }

    /// The inode named by this handle.
    #[must_use]
    pub fn inode(self) -> Inode {
        Inode::from(self.inode)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn honours_byte_order_flag() {
        let bytes = [0x00, 0x00, 0x01, 0x02];
        assert_eq!(DataServerWire::decode(&bytes, true).unwrap().inode(), 0x0102);
        assert_eq!(
            DataServerWire::decode(&bytes, false).unwrap().inode(),
            0x0201_0000
        );
    }

    #[test]
    fn rejects_wrong_length_and_inode_zero() {
        assert!(matches!(
            DataServerWire::decode(&[1, 2, 3], false),
            Err(DsError::BadHandle(_))
        ));
        assert!(matches!(
            DataServerWire::decode(&[1, 2, 3, 4, 5], false),
            Err(DsError::BadHandle(_))
        ));
        assert!(matches!(
            DataServerWire::decode(&[0; 4], true),
            Err(DsError::BadHandle(_))
        ));
    }

    #[test]
    fn encode_matches_decode() {
        let wire = DataServerWire::new(77).unwrap();
        for big_endian in [true, false] {
            let bytes = wire.encode(big_endian);
            assert_eq!(DataServerWire::decode(&bytes, big_endian).unwrap(), wire);
        }
    }
}
