//! Deterministic validator key fixtures.

use heimdall_primitives::{
    buf::{Buf20, Buf32},
    hash,
};
use secp256k1::{Keypair, SECP256K1};

/// Signing key material for a test validator.
#[derive(Clone, Debug)]
pub struct TestValidatorKey {
    pub secret: Buf32,
    pub pubkey: Buf32,
    pub address: Buf20,
}

impl TestValidatorKey {
    /// Builds a key from a small seed.  Seed 0 is remapped since the zero
    /// scalar is not a valid secret key.
    pub fn from_seed(seed: u8) -> Self {
        let mut secret = [seed.max(1); 32];
        secret[0] = 0x11;
        let kp = Keypair::from_seckey_slice(SECP256K1, &secret).expect("test: valid seckey");
        let (xonly, _) = kp.x_only_public_key();
        let pubkey = Buf32::from(xonly.serialize());

        // Same derivation as the staking module's signer address.
        let h = hash::raw(pubkey.as_slice());
        let mut address = [0; 20];
        address.copy_from_slice(&h.as_slice()[12..]);

        Self {
            secret: Buf32::from(secret),
            pubkey,
            address: Buf20::from(address),
        }
    }
}

/// Generates `n` distinct validator keys.
pub fn gen_validator_keys(n: u8) -> Vec<TestValidatorKey> {
    (1..=n).map(TestValidatorKey::from_seed).collect()
}
