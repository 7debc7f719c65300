//! Tx envelope as it sits in blocks and the mempool.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use heimdall_primitives::{buf::TxHash, hash};

use crate::{errors::CodecError, msg::Msg};

/// A Heimdall tx carrying one message.  Signing and fee handling are done by
/// the broadcasting client and the application respectively, so only the
/// message is modelled here.
#[derive(Clone, Debug, Eq, PartialEq, Arbitrary, BorshSerialize, BorshDeserialize)]
pub struct Tx {
    pub msg: Msg,
    pub memo: String,
}

impl Tx {
    pub fn new(msg: Msg) -> Self {
        Self {
            msg,
            memo: String::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("tx: borsh encode")
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(borsh::from_slice(buf)?)
    }

    /// Hash of the encoded tx, which is the key side-tx votes refer to.
    pub fn compute_hash(&self) -> TxHash {
        hash::raw(&self.encode())
    }
}

/// Computes the hash of an already encoded tx.
pub fn hash_tx_bytes(raw: &[u8]) -> TxHash {
    hash::raw(raw)
}

#[cfg(test)]
mod tests {
    use heimdall_test_utils::ArbitraryGenerator;

    use super::*;

    #[test]
    fn test_hash_matches_encoded_bytes() {
        let tx: Tx = ArbitraryGenerator::new().generate();
        let raw = tx.encode();
        assert_eq!(tx.compute_hash(), hash_tx_bytes(&raw));
        assert_eq!(Tx::decode(&raw).unwrap(), tx);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Tx::decode(&[0xff, 0xff, 0xff]).is_err());
    }
}
