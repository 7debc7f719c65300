//! Non-replay-protected vote extension payloads.
//!
//! Byte 0 is a marker.  [`DUMMY_MARKER`] is followed by a sentinel that any
//! validator can rebuild from the height and chain id, [`CHECKPOINT_MARKER`]
//! by the packed sign bytes of the checkpoint the validator is signing for
//! the rootchain.

use heimdall_primitives::{
    buf::{Buf32, Buf64},
    hash,
};
use heimdall_state::checkpoint::MsgCheckpoint;

use crate::{errors::NonRpError, signer::verify_signature};

pub const DUMMY_MARKER: u8 = 0x00;
pub const CHECKPOINT_MARKER: u8 = 0x01;

const DUMMY_TAG: &[u8] = b"heimdall/dummy-non-rp-vote-extension";

/// Decoded non-rp payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NonRpPayload {
    /// No checkpoint signed in this vote.
    Dummy,

    /// Checkpoint the validator signed, with its sign bytes.
    Checkpoint {
        checkpoint: MsgCheckpoint,
        sign_bytes: Vec<u8>,
    },
}

fn dummy_body(height: u64, chain_id: &str) -> Buf32 {
    hash::raw_concat([
        DUMMY_TAG,
        height.to_be_bytes().as_slice(),
        chain_id.as_bytes(),
    ])
}

/// Builds the payload carried when no checkpoint is signed.
pub fn make_dummy(height: u64, chain_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + Buf32::LEN);
    buf.push(DUMMY_MARKER);
    buf.extend_from_slice(dummy_body(height, chain_id).as_slice());
    buf
}

/// Builds the payload for signing a checkpoint.
pub fn make_checkpoint(msg: &MsgCheckpoint) -> Vec<u8> {
    let sign_bytes = msg.sign_bytes();
    let mut buf = Vec::with_capacity(1 + sign_bytes.len());
    buf.push(CHECKPOINT_MARKER);
    buf.extend_from_slice(&sign_bytes);
    buf
}

/// Decodes a payload.  Does not check the signature.
pub fn decode(payload: &[u8], height: u64, chain_id: &str) -> Result<NonRpPayload, NonRpError> {
    let (&marker, body) = payload.split_first().ok_or(NonRpError::Empty)?;
    match marker {
        DUMMY_MARKER => {
            if body != dummy_body(height, chain_id).as_slice() {
                return Err(NonRpError::DummyMismatch);
            }
            Ok(NonRpPayload::Dummy)
        }
        CHECKPOINT_MARKER => {
            let checkpoint = MsgCheckpoint::from_sign_bytes(body)?;
            Ok(NonRpPayload::Checkpoint {
                checkpoint,
                sign_bytes: body.to_vec(),
            })
        }
        other => Err(NonRpError::UnknownMarker(other)),
    }
}

/// Decodes a payload and checks the validator's signature over it.
pub fn decode_verified(
    payload: &[u8],
    signature: &Buf64,
    pubkey: &Buf32,
    height: u64,
    chain_id: &str,
) -> Result<NonRpPayload, NonRpError> {
    let decoded = decode(payload, height, chain_id)?;
    if !verify_signature(pubkey, payload, signature) {
        return Err(NonRpError::BadSignature);
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use heimdall_primitives::buf::Buf20;
    use heimdall_test_utils::keys::TestValidatorKey;

    use super::*;
    use crate::signer::ExtensionSigner;

    fn checkpoint() -> MsgCheckpoint {
        MsgCheckpoint {
            proposer: Buf20::from([1; 20]),
            start_block: 0,
            end_block: 255,
            root_hash: Buf32::from([2; 32]),
            account_root_hash: Buf32::from([3; 32]),
            bor_chain_id: "137".to_string(),
        }
    }

    #[test]
    fn test_dummy_is_bound_to_height_and_chain() {
        let payload = make_dummy(10, "heimdall-137");
        assert_eq!(payload[0], DUMMY_MARKER);
        assert_eq!(
            decode(&payload, 10, "heimdall-137").unwrap(),
            NonRpPayload::Dummy
        );
        assert!(matches!(
            decode(&payload, 11, "heimdall-137"),
            Err(NonRpError::DummyMismatch)
        ));
        assert!(matches!(
            decode(&payload, 10, "heimdall-80002"),
            Err(NonRpError::DummyMismatch)
        ));
    }

    #[test]
    fn test_checkpoint_payload() {
        let payload = make_checkpoint(&checkpoint());
        match decode(&payload, 10, "heimdall-137").unwrap() {
            NonRpPayload::Checkpoint {
                checkpoint: cp,
                sign_bytes,
            } => {
                assert_eq!(cp, checkpoint());
                assert_eq!(sign_bytes, checkpoint().sign_bytes());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(decode(&[], 1, "c"), Err(NonRpError::Empty)));
        assert!(matches!(
            decode(&[0x07, 1, 2], 1, "c"),
            Err(NonRpError::UnknownMarker(0x07))
        ));
        assert!(matches!(
            decode(&[CHECKPOINT_MARKER, 1, 2, 3], 1, "c"),
            Err(NonRpError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_decode_verified_checks_signature() {
        let key = TestValidatorKey::from_seed(1);
        let signer = ExtensionSigner::new(&key.secret).unwrap();
        let payload = make_checkpoint(&checkpoint());
        let sig = signer.sign(&payload);

        assert!(decode_verified(&payload, &sig, &key.pubkey, 5, "c").is_ok());

        let other = TestValidatorKey::from_seed(2);
        assert!(matches!(
            decode_verified(&payload, &sig, &other.pubkey, 5, "c"),
            Err(NonRpError::BadSignature)
        ));
    }
}
