//! Common wrapper around whatever we choose our native hash function to be.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use crate::buf::Buf32;

/// Direct untagged hash.
pub fn raw(buf: &[u8]) -> Buf32 {
    Buf32::from(<[u8; 32]>::from(Sha256::digest(buf)))
}

/// Hashes a sequence of byte slices as if they were concatenated.
pub fn raw_concat<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Buf32 {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    Buf32::from(<[u8; 32]>::from(hasher.finalize()))
}

pub fn compute_borsh_hash<T: BorshSerialize>(v: &T) -> Buf32 {
    let mut hasher = Sha256::new();
    v.serialize(&mut hasher).expect("hash: borsh serialize into hasher");
    Buf32::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Computes a binary merkle root over already-hashed leaves.  An odd node at
/// any level is paired with itself.  The root of an empty list is zero.
pub fn merkle_root(leaves: &[Buf32]) -> Buf32 {
    if leaves.is_empty() {
        return Buf32::zero();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                raw_concat([left.as_slice(), right.as_slice()])
            })
            .collect();
    }

    level[0]
}
