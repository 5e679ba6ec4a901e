//! Chained Merkle proof verification.
//!
//! `ProofOps` hold one ics23 commitment proof per store level, innermost
//! first: the module's IAVL store, then the multistore. Each level proves
//! that the previous level's root is stored under the next path segment.

use ics23::commitment_proof::Proof as ProofKind;
use ics23::{CommitmentProof, ExistenceProof, HostFunctionsManager, ProofSpec};
use prost::Message as _;
use qs_types::ProofOps;

use crate::client::{parse_chain_revision, sdk_specs, Height, LightClient};
use crate::path::MerklePath;
use crate::{ProofError, Result};

/// Verify a claim proof against the light client of a remote chain.
///
/// Non-empty `data` is checked for inclusion at `[store_key, key]`; empty
/// `data` is checked for absence.
///
/// # Errors
///
/// Returns the [`ProofError`] variant naming the stage that failed.
#[allow(clippy::too_many_arguments)]
pub fn verify_proof_ops(
    client: &dyn LightClient,
    connection_id: &str,
    chain_id: &str,
    height: i64,
    store_key: &str,
    key: &[u8],
    data: &[u8],
    proof_ops: Option<&ProofOps>,
) -> Result<()> {
    let proof_ops = proof_ops.ok_or(ProofError::NoProof)?;

    let client_id = client
        .connection_client_id(connection_id)
        .ok_or_else(|| ProofError::ConnectionNotFound(connection_id.to_string()))?;

    let next_height = u64::try_from(height)
        .ok()
        .and_then(|h| h.checked_add(1))
        .ok_or_else(|| ProofError::ProofConversion(format!("invalid proof height {height}")))?;
    let cs_height = Height::new(parse_chain_revision(chain_id), next_height);

    let root = client
        .consensus_root(&client_id, cs_height)
        .ok_or_else(|| ProofError::ConsensusStateNotFound {
            client_id: client_id.clone(),
            height: cs_height,
        })?;

    let specs = client
        .proof_specs(&client_id)
        .ok_or_else(|| ProofError::ClientStateNotFound(client_id.clone()))?;

    tracing::debug!(
        chain_id,
        client_id = %client_id,
        height = %cs_height,
        store_key,
        key = %hex::encode(key),
        "verifying proof"
    );

    verify_against_root(&specs, &root, store_key, key, data, proof_ops)
}

/// Verify a proof of the local chain's own state against a recorded
/// self-consensus root, using the SDK proof specs.
///
/// # Errors
///
/// Returns the [`ProofError`] variant naming the stage that failed.
pub fn verify_self_proof_ops(
    client: &dyn LightClient,
    consensus_state_key: &str,
    store_key: &str,
    key: &[u8],
    data: &[u8],
    proof_ops: Option<&ProofOps>,
) -> Result<()> {
    let proof_ops = proof_ops.ok_or(ProofError::NoProof)?;
    let root = client
        .self_consensus_root(consensus_state_key)
        .ok_or_else(|| ProofError::SelfConsensusStateNotFound(consensus_state_key.to_string()))?;
    verify_against_root(&sdk_specs(), &root, store_key, key, data, proof_ops)
}

fn verify_against_root(
    specs: &[ProofSpec],
    root: &[u8],
    store_key: &str,
    key: &[u8],
    data: &[u8],
    proof_ops: &ProofOps,
) -> Result<()> {
    let proofs = convert_proofs(proof_ops)?;
    let path = MerklePath::new(store_key, key);
    if data.is_empty() {
        verify_non_membership(&proofs, specs, root, &path)
    } else {
        verify_membership(&proofs, specs, root, &path, data)
    }
}

/// Decode each op's data as an ics23 commitment proof.
///
/// # Errors
///
/// Returns [`ProofError::ProofConversion`] for empty ops or undecodable data.
pub fn convert_proofs(proof_ops: &ProofOps) -> Result<Vec<CommitmentProof>> {
    if proof_ops.ops.is_empty() {
        return Err(ProofError::ProofConversion("proof ops are empty".to_string()));
    }
    proof_ops
        .ops
        .iter()
        .enumerate()
        .map(|(i, op)| {
            CommitmentProof::decode(op.data.as_slice())
                .map_err(|e| ProofError::ProofConversion(format!("op {i} ({}): {e}", op.op_type)))
        })
        .collect()
}

fn check_lengths(proofs: &[CommitmentProof], specs: &[ProofSpec], path: &MerklePath) -> Result<()> {
    if proofs.len() != specs.len() {
        return Err(ProofError::ProofConversion(format!(
            "length of specs: {} not equal to length of proof: {}",
            specs.len(),
            proofs.len()
        )));
    }
    if proofs.len() != path.len() {
        return Err(ProofError::ProofConversion(format!(
            "length of path: {} not equal to length of proof: {}",
            path.len(),
            proofs.len()
        )));
    }
    Ok(())
}

fn existence(proof: &CommitmentProof, index: usize) -> Result<&ExistenceProof> {
    match proof.proof.as_ref() {
        Some(ProofKind::Exist(exist)) => Ok(exist),
        _ => Err(ProofError::MembershipFailed(format!(
            "proof at index {index} is not an existence proof"
        ))),
    }
}

fn existence_root(exist: &ExistenceProof) -> std::result::Result<Vec<u8>, String> {
    ics23::calculate_existence_root::<HostFunctionsManager>(exist).map_err(|e| e.to_string())
}

/// Verify `proofs[from..]` as a chain of existence proofs starting from
/// `value`, ending at `root`.
fn verify_chained_membership(
    proofs: &[CommitmentProof],
    specs: &[ProofSpec],
    root: &[u8],
    path: &MerklePath,
    mut value: Vec<u8>,
    from: usize,
) -> Result<()> {
    let mut subroot = value.clone();
    for (i, (proof, spec)) in proofs.iter().zip(specs).enumerate().skip(from) {
        let exist = existence(proof, i)?;
        subroot = existence_root(exist)
            .map_err(|e| ProofError::MembershipFailed(format!("could not calculate root for proof index {i}: {e}")))?;
        let key = path.key(path.len() - 1 - i)?;
        if !ics23::verify_membership::<HostFunctionsManager>(proof, spec, &subroot, &key, &value) {
            return Err(ProofError::MembershipFailed(format!(
                "chained membership proof failed to verify membership of value {} in subroot {} at index {i}",
                hex::encode(&value),
                hex::encode(&subroot)
            )));
        }
        value = subroot.clone();
    }
    if subroot != root {
        return Err(ProofError::MembershipFailed(format!(
            "proof did not commit to expected root: {}, got: {}",
            hex::encode(root),
            hex::encode(&subroot)
        )));
    }
    Ok(())
}

fn verify_membership(
    proofs: &[CommitmentProof],
    specs: &[ProofSpec],
    root: &[u8],
    path: &MerklePath,
    value: &[u8],
) -> Result<()> {
    check_lengths(proofs, specs, path)?;
    verify_chained_membership(proofs, specs, root, path, value.to_vec(), 0)
}

fn verify_non_membership(
    proofs: &[CommitmentProof],
    specs: &[ProofSpec],
    root: &[u8],
    path: &MerklePath,
) -> Result<()> {
    check_lengths(proofs, specs, path)?;

    let nonexist = match proofs[0].proof.as_ref() {
        Some(ProofKind::Nonexist(nonexist)) => nonexist,
        _ => {
            return Err(ProofError::NonMembershipFailed(
                "commitment proof must be non-existence proof for verifying non-membership".to_string(),
            ))
        }
    };
    let neighbour = nonexist
        .left
        .as_ref()
        .or(nonexist.right.as_ref())
        .ok_or_else(|| ProofError::NonMembershipFailed("non-existence proof has no neighbours".to_string()))?;
    let subroot = existence_root(neighbour)
        .map_err(|e| ProofError::NonMembershipFailed(format!("could not calculate root for proof index 0: {e}")))?;

    let key = path.key(path.len() - 1)?;
    if !ics23::verify_non_membership::<HostFunctionsManager>(&proofs[0], &specs[0], &subroot, &key) {
        return Err(ProofError::NonMembershipFailed(format!(
            "could not verify absence of key {}",
            hex::encode(&key)
        )));
    }

    verify_chained_membership(proofs, specs, root, path, subroot, 1)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ics23::{HashOp, LeafOp, LengthOp, NonExistenceProof};
    use qs_types::ProofOp;

    use super::*;

    fn leaf() -> LeafOp {
        LeafOp {
            hash: HashOp::Sha256.into(),
            prehash_key: HashOp::NoHash.into(),
            prehash_value: HashOp::Sha256.into(),
            length: LengthOp::VarProto.into(),
            prefix: vec![0],
        }
    }

    fn exist(key: &[u8], value: &[u8]) -> ExistenceProof {
        ExistenceProof {
            key: key.to_vec(),
            value: value.to_vec(),
            leaf: Some(leaf()),
            path: vec![],
        }
    }

    fn op(proof: ProofKind) -> ProofOp {
        ProofOp {
            op_type: "ics23:simple".into(),
            key: vec![],
            data: CommitmentProof { proof: Some(proof) }.encode_to_vec(),
        }
    }

    /// Helper: ops proving `key = value` in store `bank`, and the app hash.
    fn membership_fixture(key: &[u8], value: &[u8]) -> (ProofOps, Vec<u8>) {
        let inner = exist(key, value);
        let store_root = existence_root(&inner).expect("inner root");
        let outer = exist(b"bank", &store_root);
        let app_hash = existence_root(&outer).expect("outer root");
        let ops = ProofOps {
            ops: vec![op(ProofKind::Exist(inner)), op(ProofKind::Exist(outer))],
        };
        (ops, app_hash)
    }

    /// Helper: ops proving `key` is absent next to neighbour `right`.
    fn non_membership_fixture(key: &[u8], right: &[u8]) -> (ProofOps, Vec<u8>) {
        let neighbour = exist(right, b"1");
        let store_root = existence_root(&neighbour).expect("store root");
        let outer = exist(b"bank", &store_root);
        let app_hash = existence_root(&outer).expect("outer root");
        let nonexist = NonExistenceProof {
            key: key.to_vec(),
            left: None,
            right: Some(neighbour),
        };
        let ops = ProofOps {
            ops: vec![op(ProofKind::Nonexist(nonexist)), op(ProofKind::Exist(outer))],
        };
        (ops, app_hash)
    }

    #[derive(Default)]
    struct MockClient {
        connections: HashMap<String, String>,
        roots: HashMap<(String, Height), Vec<u8>>,
        specs: HashMap<String, Vec<ProofSpec>>,
        self_roots: HashMap<String, Vec<u8>>,
    }

    impl MockClient {
        fn with_root(height: Height, root: Vec<u8>) -> Self {
            let mut c = Self::default();
            c.connections.insert("connection-0".into(), "07-tendermint-0".into());
            c.roots.insert(("07-tendermint-0".into(), height), root);
            c.specs
                .insert("07-tendermint-0".into(), vec![ics23::tendermint_spec(), ics23::tendermint_spec()]);
            c
        }
    }

    impl LightClient for MockClient {
        fn connection_client_id(&self, connection_id: &str) -> Option<String> {
            self.connections.get(connection_id).cloned()
        }

        fn consensus_root(&self, client_id: &str, height: Height) -> Option<Vec<u8>> {
            self.roots.get(&(client_id.to_string(), height)).cloned()
        }

        fn proof_specs(&self, client_id: &str) -> Option<Vec<ProofSpec>> {
            self.specs.get(client_id).cloned()
        }

        fn self_consensus_root(&self, key: &str) -> Option<Vec<u8>> {
            self.self_roots.get(key).cloned()
        }
    }

    const KEY: &[u8] = &[0x02, 0x03, 0xaa, 0xbb, 0xcc, b'u', b'a', b't', b'o', b'm'];

    #[test]
    fn test_membership_verifies_at_next_height() {
        let (ops, app_hash) = membership_fixture(KEY, b"24307");
        let client = MockClient::with_root(Height::new(4, 101), app_hash);
        verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"24307", Some(&ops))
            .expect("valid proof");
    }

    #[test]
    fn test_membership_wrong_value() {
        let (ops, app_hash) = membership_fixture(KEY, b"24307");
        let client = MockClient::with_root(Height::new(4, 101), app_hash);
        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"99999", Some(&ops))
            .expect_err("tampered value");
        assert!(matches!(err, ProofError::MembershipFailed(_)));
    }

    #[test]
    fn test_membership_wrong_root() {
        let (ops, _) = membership_fixture(KEY, b"24307");
        let client = MockClient::with_root(Height::new(4, 101), vec![0u8; 32]);
        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"24307", Some(&ops))
            .expect_err("wrong root");
        assert!(matches!(err, ProofError::MembershipFailed(_)));
    }

    #[test]
    fn test_membership_wrong_store() {
        let (ops, app_hash) = membership_fixture(KEY, b"24307");
        let client = MockClient::with_root(Height::new(4, 101), app_hash);
        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "lockup", KEY, b"24307", Some(&ops))
            .expect_err("wrong store");
        assert!(matches!(err, ProofError::MembershipFailed(_)));
    }

    #[test]
    fn test_non_membership() {
        let (ops, app_hash) = non_membership_fixture(b"a", b"b");
        let client = MockClient::with_root(Height::new(1, 11), app_hash);
        verify_proof_ops(&client, "connection-0", "osmosis-1", 10, "bank", b"a", &[], Some(&ops))
            .expect("absence proven");

        let err = verify_proof_ops(&client, "connection-0", "osmosis-1", 10, "bank", b"c", &[], Some(&ops))
            .expect_err("key beyond neighbour");
        assert!(matches!(err, ProofError::NonMembershipFailed(_)));
    }

    #[test]
    fn test_existence_proof_used_for_absence() {
        let (ops, app_hash) = membership_fixture(KEY, b"1");
        let client = MockClient::with_root(Height::new(4, 101), app_hash);
        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, &[], Some(&ops))
            .expect_err("existence proof for absence");
        assert!(matches!(err, ProofError::NonMembershipFailed(_)));
    }

    #[test]
    fn test_distinct_lookup_failures() {
        let (ops, app_hash) = membership_fixture(KEY, b"1");
        let client = MockClient::with_root(Height::new(4, 101), app_hash);

        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"1", None)
            .expect_err("no proof");
        assert!(matches!(err, ProofError::NoProof));

        let err = verify_proof_ops(&client, "connection-9", "cosmoshub-4", 100, "bank", KEY, b"1", Some(&ops))
            .expect_err("unknown connection");
        assert!(matches!(err, ProofError::ConnectionNotFound(_)));

        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 101, "bank", KEY, b"1", Some(&ops))
            .expect_err("no consensus state");
        assert!(matches!(err, ProofError::ConsensusStateNotFound { .. }));

        let mut no_specs = MockClient::with_root(Height::new(4, 101), vec![1]);
        no_specs.specs.clear();
        let err = verify_proof_ops(&no_specs, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"1", Some(&ops))
            .expect_err("no client state");
        assert!(matches!(err, ProofError::ClientStateNotFound(_)));

        let err = verify_proof_ops(
            &client,
            "connection-0",
            "cosmoshub-4",
            100,
            "bank",
            KEY,
            b"1",
            Some(&ProofOps::default()),
        )
        .expect_err("empty ops");
        assert!(matches!(err, ProofError::ProofConversion(_)));

        let garbage = ProofOps {
            ops: vec![ProofOp {
                op_type: "ics23:iavl".into(),
                key: vec![],
                data: vec![0xff, 0xff],
            }],
        };
        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"1", Some(&garbage))
            .expect_err("garbage ops");
        assert!(matches!(err, ProofError::ProofConversion(_)));
    }

    #[test]
    fn test_spec_count_mismatch() {
        let (mut ops, app_hash) = membership_fixture(KEY, b"1");
        ops.ops.truncate(1);
        let client = MockClient::with_root(Height::new(4, 101), app_hash);
        let err = verify_proof_ops(&client, "connection-0", "cosmoshub-4", 100, "bank", KEY, b"1", Some(&ops))
            .expect_err("one proof, two specs");
        assert!(matches!(err, ProofError::ProofConversion(_)));
    }

    #[test]
    fn test_self_proof() {
        // IAVL leaves carry height, size and version in their prefix.
        let inner = ExistenceProof {
            leaf: Some(LeafOp {
                prefix: vec![0x00, 0x02, 0x02],
                ..leaf()
            }),
            ..exist(KEY, b"5")
        };
        let store_root = existence_root(&inner).expect("inner root");
        let outer = exist(b"bank", &store_root);
        let app_hash = existence_root(&outer).expect("outer root");
        let ops = ProofOps {
            ops: vec![op(ProofKind::Exist(inner)), op(ProofKind::Exist(outer))],
        };

        let mut client = MockClient::default();
        let err = verify_self_proof_ops(&client, "10", "bank", KEY, b"5", Some(&ops)).expect_err("no self state");
        assert!(matches!(err, ProofError::SelfConsensusStateNotFound(_)));

        client.self_roots.insert("10".into(), app_hash);
        verify_self_proof_ops(&client, "10", "bank", KEY, b"5", Some(&ops)).expect("self proof");

        let err = verify_self_proof_ops(&client, "10", "bank", KEY, b"6", Some(&ops)).expect_err("wrong value");
        assert!(matches!(err, ProofError::MembershipFailed(_)));
    }
}
