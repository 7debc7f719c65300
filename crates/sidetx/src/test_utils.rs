use heimdall_primitives::buf::Buf32;
use heimdall_state::{
    checkpoint::MsgCheckpoint,
    vote::{ExtendedVote, SideTxResponse, VoteExtension, VoteValidator},
};
use heimdall_test_utils::keys::TestValidatorKey;

use crate::{context::BlockContext, non_rp, signer::ExtensionSigner};

pub(crate) fn test_ctx() -> BlockContext {
    BlockContext::new(100, 1_700_000_000, "heimdall-137", Buf32::from([0xbb; 32]))
}

/// Builds a vote from validator `seed`, signed with its test key.
pub(crate) fn signed_vote(
    ctx: &BlockContext,
    seed: u8,
    power: u64,
    responses: Vec<SideTxResponse>,
    checkpoint: Option<&MsgCheckpoint>,
) -> ExtendedVote {
    let key = TestValidatorKey::from_seed(seed);
    let signer = ExtensionSigner::new(&key.secret).expect("test: signer");

    let non_rp_vote_extension = match checkpoint {
        Some(cp) => non_rp::make_checkpoint(cp),
        None => non_rp::make_dummy(ctx.height, &ctx.chain_id),
    };
    let extension = VoteExtension {
        block_hash: ctx.block_hash,
        height: ctx.height,
        side_tx_responses: responses,
        milestone_proposition: None,
        non_rp_vote_extension,
    };
    let (extension_signature, non_rp_extension_signature) = signer.sign_extension(&extension);

    ExtendedVote {
        validator: VoteValidator {
            address: key.address,
            pubkey: key.pubkey,
            power,
        },
        extension,
        extension_signature,
        non_rp_extension_signature,
    }
}
