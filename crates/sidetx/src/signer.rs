//! Schnorr signing of vote extensions.

use heimdall_primitives::{
    buf::{Address, Buf32, Buf64},
    hash,
};
use heimdall_state::{stake::signer_address, vote::VoteExtension};
use secp256k1::{schnorr::Signature, Keypair, Message, XOnlyPublicKey, SECP256K1};

use crate::errors::SideTxError;

/// Signs this validator's vote extensions.
pub struct ExtensionSigner {
    keypair: Keypair,
    pubkey: Buf32,
}

impl ExtensionSigner {
    pub fn new(secret: &Buf32) -> Result<Self, SideTxError> {
        let keypair = Keypair::from_seckey_slice(SECP256K1, secret.as_slice())
            .map_err(|_| SideTxError::InvalidKey)?;
        let (xonly, _) = keypair.x_only_public_key();
        Ok(Self {
            keypair,
            pubkey: Buf32::from(xonly.serialize()),
        })
    }

    pub fn pubkey(&self) -> Buf32 {
        self.pubkey
    }

    pub fn address(&self) -> Address {
        signer_address(&self.pubkey)
    }

    /// Signs `sha256(bytes)`.
    pub fn sign(&self, bytes: &[u8]) -> Buf64 {
        let msg = Message::from_digest(hash::raw(bytes).into_inner());
        let sig = SECP256K1.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        Buf64::from(sig.serialize())
    }

    /// Returns the signature over the encoded extension and the one over its
    /// non-rp payload.
    pub fn sign_extension(&self, ext: &VoteExtension) -> (Buf64, Buf64) {
        (
            self.sign(&ext.encode()),
            self.sign(&ext.non_rp_vote_extension),
        )
    }
}

/// Checks a signature made by [`ExtensionSigner::sign`].  Malformed keys or
/// signatures just fail verification.
pub fn verify_signature(pubkey: &Buf32, bytes: &[u8], sig: &Buf64) -> bool {
    let Ok(pk) = XOnlyPublicKey::from_slice(pubkey.as_slice()) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(sig.as_slice()) else {
        return false;
    };
    let msg = Message::from_digest(hash::raw(bytes).into_inner());
    SECP256K1.verify_schnorr(&sig, &msg, &pk).is_ok()
}
