use std::collections::BTreeMap;

use qs_protocoldata::records::{ConnectionProtocolData, LiquidAllowedDenomProtocolData};
use qs_protocoldata::store;
use qs_protocoldata::types::ProtocolDataRecord;
use qs_store::KvStore;
use qs_types::keepers::{
    ExternalError, ExternalResult, IcqRequest, InterchainQueryKeeper, InterchainStakingKeeper, TxMsg,
};
use qs_types::{ClaimType, DelegatorIntent, MsgSubmitClaim, Proof, ProofOps, Validator, Zone};

#[derive(Default)]
pub struct TestIcs {
    pub zones: BTreeMap<String, Zone>,
    pub address_map: BTreeMap<(Vec<u8>, String), Vec<u8>>,
}

impl TestIcs {
    pub fn with_zone(zone: Zone) -> Self {
        let mut ics = Self::default();
        ics.zones.insert(zone.chain_id.clone(), zone);
        ics
    }

    pub fn map_address(&mut self, local: &[u8], chain_id: &str, remote: &[u8]) {
        self.address_map
            .insert((local.to_vec(), chain_id.to_string()), remote.to_vec());
    }
}

impl InterchainStakingKeeper for TestIcs {
    fn get_zone(&self, chain_id: &str) -> Option<Zone> {
        self.zones.get(chain_id).cloned()
    }

    fn set_zone(&mut self, zone: Zone) {
        self.zones.insert(zone.chain_id.clone(), zone);
    }

    fn zones(&self) -> Vec<Zone> {
        self.zones.values().cloned().collect()
    }

    fn validators(&self, _chain_id: &str) -> Vec<Validator> {
        Vec::new()
    }

    fn set_validator(&mut self, chain_id: &str, _validator: Validator) -> ExternalResult<()> {
        Err(ExternalError::new(format!("no validators for {chain_id}")))
    }

    fn delegator_intents(&self, _chain_id: &str, _snapshot: bool) -> Vec<DelegatorIntent> {
        Vec::new()
    }

    fn set_delegator_intent(&mut self, _chain_id: &str, _intent: DelegatorIntent, _snapshot: bool) {}

    fn local_address_map(&self, local: &[u8], chain_id: &str) -> Option<Vec<u8>> {
        self.address_map
            .get(&(local.to_vec(), chain_id.to_string()))
            .cloned()
    }

    fn delegated_amount(&self, _chain_id: &str) -> u128 {
        0
    }

    fn delegations_in_process(&self, _chain_id: &str) -> u128 {
        0
    }

    fn submit_tx(
        &mut self,
        _chain_id: &str,
        _msgs: Vec<TxMsg>,
        _account: &str,
        _memo: &str,
        _messages_per_tx: u32,
    ) -> ExternalResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct TestIcq {
    pub requests: Vec<IcqRequest>,
}

impl InterchainQueryKeeper for TestIcq {
    fn make_request(&mut self, request: IcqRequest) -> ExternalResult<()> {
        self.requests.push(request);
        Ok(())
    }
}

pub fn zone_atom() -> Zone {
    Zone::new("cosmoshub-4", "connection-77001", "cosmos", "uqatom", "uatom")
}

pub fn proof(key: &[u8], data: &[u8]) -> Proof {
    proof_of_type(key, data, "bank")
}

pub fn proof_of_type(key: &[u8], data: &[u8], proof_type: &str) -> Proof {
    Proof {
        key: key.to_vec(),
        data: data.to_vec(),
        proof_ops: Some(ProofOps::default()),
        height: 10,
        proof_type: proof_type.to_string(),
    }
}

pub fn msg(user: &str, src_zone: &str, claim_type: ClaimType, proofs: Vec<Proof>) -> MsgSubmitClaim {
    MsgSubmitClaim {
        user_address: user.to_string(),
        zone: "cosmoshub-4".to_string(),
        src_zone: src_zone.to_string(),
        claim_type,
        proofs,
    }
}

pub fn set_record<T: ProtocolDataRecord>(store: &mut dyn KvStore, record: &T) {
    store::set_record(store, record).expect("set record");
}

pub fn allow(store: &mut dyn KvStore, chain_id: &str, ibc_denom: &str, qasset_denom: &str) {
    set_record(
        store,
        &LiquidAllowedDenomProtocolData {
            chain_id: chain_id.into(),
            registered_zone_chain_id: "cosmoshub-4".into(),
            ibc_denom: ibc_denom.into(),
            qasset_denom: qasset_denom.into(),
        },
    );
}

pub fn connection(store: &mut dyn KvStore, chain_id: &str, connection_id: &str, prefix: &str) {
    set_record(
        store,
        &ConnectionProtocolData {
            connection_id: connection_id.into(),
            chain_id: chain_id.into(),
            last_epoch: 100,
            prefix: prefix.into(),
            transfer_channel: "channel-0".into(),
        },
    );
}
