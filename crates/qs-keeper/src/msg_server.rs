//! `MsgSubmitClaim` handling.
//!
//! Every proof must be taken at the source chain's last epoch height and
//! verify against the light client before the claim submodule interprets
//! it. The first failing proof rejects the whole message; nothing is
//! written unless every step succeeds.

use qs_claims::{ClaimContext, ClaimError, ClaimSubmodule, Submodule};
use qs_proofs::{verify_proof_ops, verify_self_proof_ops};
use qs_protocoldata::claims::{set_claim, ClaimNamespace};
use qs_protocoldata::records::ConnectionProtocolData;
use qs_protocoldata::store;
use qs_store::KvStore;
use qs_types::address::address_from_bech32;
use qs_types::claims::{PROOF_TYPE_CONTRACT, PROOF_TYPE_FARM, PROOF_TYPE_POSITION};
use qs_types::{Claim, MsgSubmitClaim, Proof};

use crate::{Host, Keeper, KeeperError, Result};

/// Self-consensus state key claims on the local chain are verified against.
pub const SELF_CONSENSUS_KEY: &str = "epoch";

/// Remote module store a proof of `proof_type` was read from.
///
/// Proof types that name a position kind rather than a store map to the
/// store holding those positions; the rest name their store directly.
pub fn store_key_for(proof_type: &str) -> &str {
    match proof_type {
        PROOF_TYPE_POSITION => "concentratedliquidity",
        PROOF_TYPE_FARM => "lpfarm",
        PROOF_TYPE_CONTRACT => "wasm",
        other => other,
    }
}

impl<S: KvStore> Keeper<S> {
    /// Verify and record a claim, overwriting any earlier claim for the
    /// same `(user, zone, claim type, source chain)`.
    ///
    /// # Errors
    ///
    /// - [`KeeperError::ClaimsDisabled`] while claims are switched off
    /// - [`KeeperError::Validation`] for a malformed message
    /// - [`KeeperError::ZoneNotFound`] / [`KeeperError::ConnectionNotFound`]
    /// - [`KeeperError::ProofHeight`] / [`KeeperError::Proof`] naming the
    ///   first failing proof
    /// - [`KeeperError::ProofRejected`] naming the proof the submodule
    ///   rejected, or [`KeeperError::ClaimValidation`] when it rejects the
    ///   claim as a whole
    pub fn submit_claim(&mut self, host: &Host<'_>, msg: &MsgSubmitClaim) -> Result<Claim> {
        if !self.params()?.claims_enabled {
            return Err(KeeperError::ClaimsDisabled);
        }
        msg.validate_basic()?;
        address_from_bech32(&msg.user_address, Some(&self.config.bech32_prefix))?;

        let zone = host
            .ics
            .get_zone(&msg.zone)
            .ok_or_else(|| KeeperError::ZoneNotFound(msg.zone.clone()))?;
        let submodule = Submodule::for_claim_type(msg.claim_type)?;
        let connection = store::get_record::<ConnectionProtocolData>(&self.store, &msg.src_zone)?
            .ok_or_else(|| KeeperError::ConnectionNotFound(msg.src_zone.clone()))?;

        for (index, proof) in msg.proofs.iter().enumerate() {
            self.verify_claim_proof(host, msg, &connection, index, proof)?;
        }

        let ctx = ClaimContext {
            store: &self.store,
            ics: &*host.ics,
        };
        let amount = submodule.validate_claim(&ctx, msg).map_err(|err| match err {
            ClaimError::AtProof { index, source } => KeeperError::ProofRejected {
                index,
                source: *source,
            },
            other => KeeperError::ClaimValidation(other),
        })?;

        let claim = Claim {
            user_address: msg.user_address.clone(),
            chain_id: zone.chain_id,
            module: msg.claim_type,
            source_chain_id: msg.src_zone.clone(),
            amount,
        };
        set_claim(&mut self.store, ClaimNamespace::Live, &claim)?;
        tracing::info!(
            user = %claim.user_address,
            zone = %claim.chain_id,
            claim_type = %claim.module,
            src_zone = %claim.source_chain_id,
            amount,
            "claim recorded"
        );
        Ok(claim)
    }

    fn verify_claim_proof(
        &self,
        host: &Host<'_>,
        msg: &MsgSubmitClaim,
        connection: &ConnectionProtocolData,
        index: usize,
        proof: &Proof,
    ) -> Result<()> {
        if proof.height != connection.last_epoch {
            return Err(KeeperError::ProofHeight {
                index,
                expected: connection.last_epoch,
                got: proof.height,
            });
        }
        let store_key = store_key_for(&proof.proof_type);
        let verified = if msg.src_zone == self.config.chain_id {
            verify_self_proof_ops(
                host.client,
                SELF_CONSENSUS_KEY,
                store_key,
                &proof.key,
                &proof.data,
                proof.proof_ops.as_ref(),
            )
        } else {
            verify_proof_ops(
                host.client,
                &connection.connection_id,
                &connection.chain_id,
                proof.height,
                store_key,
                &proof.key,
                &proof.data,
                proof.proof_ops.as_ref(),
            )
        };
        verified.map_err(|source| KeeperError::Proof { index, source })
    }
}
