//! In-memory collaborators.
//!
//! Deterministic stand-ins for the bank, account, staking, interchain query,
//! interchain staking, light client and channel modules. Used by the
//! simulation daemon and by tests across the workspace.

use std::collections::BTreeMap;

use ics23::commitment_proof::Proof as ProofKind;
use ics23::{CommitmentProof, ExistenceProof, HashOp, HostFunctionsManager, InnerOp, LeafOp, LengthOp, ProofSpec};
use prost::Message as _;
use sha2::{Digest, Sha256};

use qs_proofs::client::parse_chain_revision;
use qs_proofs::{Height, LightClient};
use qs_types::address::encode_bech32;
use qs_types::keepers::{
    AccountKeeper, BankKeeper, ChannelKeeper, ExternalError, ExternalResult, IcqRequest, InterchainQueryKeeper,
    InterchainStakingKeeper, StakingKeeper, TxMsg,
};
use qs_types::keys::balance_key;
use qs_types::{Coin, Dec, DelegatorIntent, MathError, Proof, ProofOp, ProofOps, Validator, Zone, MODULE_NAME};

use crate::{BlockInfo, Host, Result};

/// Address of a module account: the first 20 bytes of `sha256(name)`.
///
/// # Errors
///
/// Returns [`crate::KeeperError::Types`] for an invalid prefix.
pub fn module_account_address(prefix: &str, module: &str) -> Result<String> {
    let digest = Sha256::digest(module.as_bytes());
    Ok(encode_bech32(prefix, &digest[..20])?)
}

#[derive(Debug, Clone, Default)]
pub struct SimAccounts {
    prefix: String,
    modules: BTreeMap<String, String>,
}

impl SimAccounts {
    /// Accounts with the rewards module and fee collector registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KeeperError::Types`] for an invalid prefix.
    pub fn new(prefix: &str) -> Result<Self> {
        let mut accounts = Self {
            prefix: prefix.to_string(),
            modules: BTreeMap::new(),
        };
        accounts.register(MODULE_NAME)?;
        accounts.register("fee_collector")?;
        Ok(accounts)
    }

    /// # Errors
    ///
    /// Returns [`crate::KeeperError::Types`] for an invalid prefix.
    pub fn register(&mut self, module: &str) -> Result<String> {
        let address = module_account_address(&self.prefix, module)?;
        self.modules.insert(module.to_string(), address.clone());
        Ok(address)
    }

    pub fn modules(&self) -> &BTreeMap<String, String> {
        &self.modules
    }
}

impl AccountKeeper for SimAccounts {
    fn module_address(&self, module: &str) -> String {
        self.modules.get(module).cloned().unwrap_or_default()
    }
}

/// Balances keyed by `(address, denom)`; supply is the sum over holders.
#[derive(Debug, Clone, Default)]
pub struct SimBank {
    balances: BTreeMap<(String, String), u128>,
    modules: BTreeMap<String, String>,
}

impl SimBank {
    pub fn new(modules: BTreeMap<String, String>) -> Self {
        Self {
            balances: BTreeMap::new(),
            modules,
        }
    }

    pub fn mint(&mut self, address: &str, coin: &Coin) {
        let entry = self
            .balances
            .entry((address.to_string(), coin.denom.clone()))
            .or_default();
        *entry = entry.saturating_add(coin.amount);
    }

    /// Mint into a registered module account.
    ///
    /// # Errors
    ///
    /// Fails for an unknown module.
    pub fn mint_to_module(&mut self, module: &str, coin: &Coin) -> ExternalResult<()> {
        let address = self.module(module)?;
        self.mint(&address, coin);
        Ok(())
    }

    pub fn balance(&self, address: &str, denom: &str) -> u128 {
        self.balances
            .get(&(address.to_string(), denom.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Non-zero balances, ordered by address then denom.
    pub fn all_balances(&self) -> Vec<(String, Coin)> {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|((address, denom), amount)| (address.clone(), Coin::new(denom.clone(), *amount)))
            .collect()
    }

    fn module(&self, module: &str) -> ExternalResult<String> {
        self.modules
            .get(module)
            .cloned()
            .ok_or_else(|| ExternalError::new(format!("module account {module} does not exist")))
    }

    fn transfer(&mut self, from: &str, to: &str, coins: &[Coin]) -> ExternalResult<()> {
        for coin in coins {
            let available = self.balance(from, &coin.denom);
            if available < coin.amount {
                return Err(ExternalError::new(format!(
                    "insufficient funds: {available}{} is smaller than {}{}",
                    coin.denom, coin.amount, coin.denom
                )));
            }
        }
        for coin in coins {
            self.balances
                .insert((from.to_string(), coin.denom.clone()), self.balance(from, &coin.denom) - coin.amount);
            self.mint(to, coin);
        }
        Ok(())
    }
}

impl BankKeeper for SimBank {
    fn get_balance(&self, address: &str, denom: &str) -> Coin {
        Coin::new(denom, self.balance(address, denom))
    }

    fn get_supply(&self, denom: &str) -> Coin {
        let total = self
            .balances
            .iter()
            .filter(|((_, d), _)| d == denom)
            .fold(0u128, |acc, (_, amount)| acc.saturating_add(*amount));
        Coin::new(denom, total)
    }

    fn get_all_balances(&self, address: &str) -> Vec<Coin> {
        self.balances
            .iter()
            .filter(|((holder, _), amount)| holder == address && **amount > 0)
            .map(|((_, denom), amount)| Coin::new(denom.clone(), *amount))
            .collect()
    }

    fn send_coins(&mut self, from: &str, to: &str, coins: &[Coin]) -> ExternalResult<()> {
        if to.is_empty() {
            return Err(ExternalError::new("empty recipient address"));
        }
        self.transfer(from, to, coins)
    }

    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        recipient: &str,
        coins: &[Coin],
    ) -> ExternalResult<()> {
        if recipient.is_empty() {
            return Err(ExternalError::new("empty recipient address"));
        }
        let from = self.module(module)?;
        self.transfer(&from, recipient, coins)
    }

    fn send_coins_from_module_to_module(
        &mut self,
        from_module: &str,
        to_module: &str,
        coins: &[Coin],
    ) -> ExternalResult<()> {
        let from = self.module(from_module)?;
        let to = self.module(to_module)?;
        self.transfer(&from, &to, coins)
    }
}

#[derive(Debug, Clone)]
pub struct SimStaking {
    pub bond_denom: String,
}

impl StakingKeeper for SimStaking {
    fn bond_denom(&self) -> String {
        self.bond_denom.clone()
    }
}

/// Records every scheduled query.
#[derive(Debug, Clone, Default)]
pub struct SimIcq {
    pub requests: Vec<IcqRequest>,
}

impl SimIcq {
    /// Drain the queries scheduled so far.
    pub fn take_requests(&mut self) -> Vec<IcqRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl InterchainQueryKeeper for SimIcq {
    fn make_request(&mut self, request: IcqRequest) -> ExternalResult<()> {
        self.requests.push(request);
        Ok(())
    }
}

/// A transaction submitted through a zone's interchain account.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedTx {
    pub chain_id: String,
    pub msgs: Vec<TxMsg>,
    pub account: String,
    pub memo: String,
    pub messages_per_tx: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimIcs {
    pub zones: BTreeMap<String, Zone>,
    pub validators: BTreeMap<String, Vec<Validator>>,
    /// `(chain_id, snapshot)` to intents by delegator.
    pub intents: BTreeMap<(String, bool), BTreeMap<String, DelegatorIntent>>,
    pub address_map: BTreeMap<(Vec<u8>, String), Vec<u8>>,
    pub delegated: BTreeMap<String, u128>,
    pub in_process: BTreeMap<String, u128>,
    pub txs: Vec<SubmittedTx>,
}

impl SimIcs {
    pub fn add_validator(&mut self, chain_id: &str, validator: Validator) {
        self.validators.entry(chain_id.to_string()).or_default().push(validator);
    }

    pub fn map_address(&mut self, local: &[u8], chain_id: &str, remote: &[u8]) {
        self.address_map
            .insert((local.to_vec(), chain_id.to_string()), remote.to_vec());
    }

    pub fn set_delegated(&mut self, chain_id: &str, delegated: u128, in_process: u128) {
        self.delegated.insert(chain_id.to_string(), delegated);
        self.in_process.insert(chain_id.to_string(), in_process);
    }
}

impl InterchainStakingKeeper for SimIcs {
    fn get_zone(&self, chain_id: &str) -> Option<Zone> {
        self.zones.get(chain_id).cloned()
    }

    fn set_zone(&mut self, zone: Zone) {
        self.zones.insert(zone.chain_id.clone(), zone);
    }

    fn zones(&self) -> Vec<Zone> {
        self.zones.values().cloned().collect()
    }

    fn validators(&self, chain_id: &str) -> Vec<Validator> {
        self.validators.get(chain_id).cloned().unwrap_or_default()
    }

    fn set_validator(&mut self, chain_id: &str, validator: Validator) -> ExternalResult<()> {
        let existing = self
            .validators
            .get_mut(chain_id)
            .and_then(|vals| vals.iter_mut().find(|v| v.valoper_address == validator.valoper_address))
            .ok_or_else(|| {
                ExternalError::new(format!("validator {} not found on {chain_id}", validator.valoper_address))
            })?;
        *existing = validator;
        Ok(())
    }

    fn delegator_intents(&self, chain_id: &str, snapshot: bool) -> Vec<DelegatorIntent> {
        self.intents
            .get(&(chain_id.to_string(), snapshot))
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn set_delegator_intent(&mut self, chain_id: &str, intent: DelegatorIntent, snapshot: bool) {
        self.intents
            .entry((chain_id.to_string(), snapshot))
            .or_default()
            .insert(intent.delegator.clone(), intent);
    }

    fn local_address_map(&self, local: &[u8], chain_id: &str) -> Option<Vec<u8>> {
        self.address_map
            .get(&(local.to_vec(), chain_id.to_string()))
            .cloned()
    }

    fn delegated_amount(&self, chain_id: &str) -> u128 {
        self.delegated.get(chain_id).copied().unwrap_or(0)
    }

    fn delegations_in_process(&self, chain_id: &str) -> u128 {
        self.in_process.get(chain_id).copied().unwrap_or(0)
    }

    fn submit_tx(
        &mut self,
        chain_id: &str,
        msgs: Vec<TxMsg>,
        account: &str,
        memo: &str,
        messages_per_tx: u32,
    ) -> ExternalResult<()> {
        if !self.zones.contains_key(chain_id) {
            return Err(ExternalError::new(format!("no zone {chain_id}")));
        }
        self.txs.push(SubmittedTx {
            chain_id: chain_id.to_string(),
            msgs,
            account: account.to_string(),
            memo: memo.to_string(),
            messages_per_tx,
        });
        Ok(())
    }
}

/// Trusted roots per client, and self-consensus roots by key.
#[derive(Debug, Clone, Default)]
pub struct SimLightClient {
    pub connections: BTreeMap<String, String>,
    pub roots: BTreeMap<(String, Height), Vec<u8>>,
    pub specs: BTreeMap<String, Vec<ProofSpec>>,
    pub self_roots: BTreeMap<String, Vec<u8>>,
}

impl SimLightClient {
    /// Register a connection backed by a client using two simple-Merkle
    /// proof levels (the layout produced by [`proof_fixture`]).
    pub fn add_connection(&mut self, connection_id: &str, client_id: &str) {
        self.connections
            .insert(connection_id.to_string(), client_id.to_string());
        self.specs.insert(
            client_id.to_string(),
            vec![ics23::tendermint_spec(), ics23::tendermint_spec()],
        );
    }

    pub fn set_root(&mut self, client_id: &str, height: Height, root: Vec<u8>) {
        self.roots.insert((client_id.to_string(), height), root);
    }
}

impl LightClient for SimLightClient {
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

/// Counterparty channel IDs by local `(port, channel)`.
#[derive(Debug, Clone, Default)]
pub struct SimChannels {
    pub counterparties: BTreeMap<(String, String), String>,
}

impl SimChannels {
    pub fn connect(&mut self, port: &str, channel: &str, counterparty: &str) {
        self.counterparties
            .insert((port.to_string(), channel.to_string()), counterparty.to_string());
    }
}

impl ChannelKeeper for SimChannels {
    fn counterparty_channel(&self, port: &str, channel: &str) -> Option<String> {
        self.counterparties
            .get(&(port.to_string(), channel.to_string()))
            .cloned()
    }
}

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

fn op(exist: ExistenceProof) -> ProofOp {
    ProofOp {
        op_type: "ics23:simple".to_string(),
        key: exist.key.clone(),
        data: CommitmentProof {
            proof: Some(ProofKind::Exist(exist)),
        }
        .encode_to_vec(),
    }
}

fn root_of(exist: &ExistenceProof) -> ExternalResult<Vec<u8>> {
    ics23::calculate_existence_root::<HostFunctionsManager>(exist).map_err(|e| ExternalError::new(e.to_string()))
}

/// Proof ops showing `key = value` in the module store `store_key` of a
/// single-entry chain, and that chain's app hash.
///
/// # Errors
///
/// Returns [`crate::KeeperError::External`] if a root cannot be computed.
pub fn proof_fixture(store_key: &str, key: &[u8], value: &[u8]) -> Result<(ProofOps, Vec<u8>)> {
    let inner = exist(key, value);
    let store_root = root_of(&inner)?;
    let outer = exist(store_key.as_bytes(), &store_root);
    let app_hash = root_of(&outer)?;
    Ok((
        ProofOps {
            ops: vec![op(inner), op(outer)],
        },
        app_hash,
    ))
}

/// Proof ops for both entries of a two-entry module store `store_key`,
/// and that chain's app hash.
///
/// # Errors
///
/// Returns [`crate::KeeperError::External`] if a root cannot be computed.
pub fn proof_fixture_pair(
    store_key: &str,
    left: (&[u8], &[u8]),
    right: (&[u8], &[u8]),
) -> Result<([ProofOps; 2], Vec<u8>)> {
    let mut left = exist(left.0, left.1);
    let mut right = exist(right.0, right.1);
    let left_hash = root_of(&left)?;
    let right_hash = root_of(&right)?;
    left.path.push(InnerOp {
        hash: HashOp::Sha256.into(),
        prefix: vec![1],
        suffix: right_hash,
    });
    right.path.push(InnerOp {
        hash: HashOp::Sha256.into(),
        prefix: [vec![1], left_hash].concat(),
        suffix: vec![],
    });
    let store_root = root_of(&left)?;
    let outer = exist(store_key.as_bytes(), &store_root);
    let app_hash = root_of(&outer)?;
    Ok((
        [
            ProofOps {
                ops: vec![op(left), op(outer.clone())],
            },
            ProofOps {
                ops: vec![op(right), op(outer)],
            },
        ],
        app_hash,
    ))
}

/// Every collaborator of one simulated chain.
#[derive(Debug, Clone)]
pub struct SimChain {
    pub accounts: SimAccounts,
    pub bank: SimBank,
    pub staking: SimStaking,
    pub icq: SimIcq,
    pub ics: SimIcs,
    pub client: SimLightClient,
    pub channels: SimChannels,
}

impl SimChain {
    /// # Errors
    ///
    /// Returns [`crate::KeeperError::Types`] for an invalid prefix.
    pub fn new(prefix: &str, bond_denom: &str) -> Result<Self> {
        let accounts = SimAccounts::new(prefix)?;
        let bank = SimBank::new(accounts.modules().clone());
        Ok(Self {
            accounts,
            bank,
            staking: SimStaking {
                bond_denom: bond_denom.to_string(),
            },
            icq: SimIcq::default(),
            ics: SimIcs::default(),
            client: SimLightClient::default(),
            channels: SimChannels::default(),
        })
    }

    pub fn module_address(&self, module: &str) -> String {
        self.accounts.module_address(module)
    }

    /// A bank balance proof of `amount` of `denom` held by `address` on
    /// `chain_id`, taken at `height`, with its root installed on
    /// `client_id` where the keeper will look for it. Each call replaces
    /// that root, so submit the proof before building the next one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KeeperError::Math`] for a negative height, or key
    /// and proof construction errors.
    pub fn bank_balance_proof(
        &mut self,
        client_id: &str,
        chain_id: &str,
        address: &[u8],
        denom: &str,
        amount: u128,
        height: i64,
    ) -> Result<Proof> {
        let key = balance_key(address, denom)?;
        let data = amount.to_string().into_bytes();
        let (ops, root) = proof_fixture("bank", &key, &data)?;
        let root_height = height
            .checked_add(1)
            .and_then(|h| u64::try_from(h).ok())
            .ok_or(MathError::Negative(Dec::from(height)))?;
        self.client
            .set_root(client_id, Height::new(parse_chain_revision(chain_id), root_height), root);
        Ok(Proof {
            key,
            data,
            proof_ops: Some(ops),
            height,
            proof_type: "bank".into(),
        })
    }

    pub fn host(&mut self, block: BlockInfo) -> Host<'_> {
        Host {
            block,
            bank: &mut self.bank,
            accounts: &self.accounts,
            staking: &self.staking,
            icq: &mut self.icq,
            ics: &mut self.ics,
            client: &self.client,
            channels: &self.channels,
        }
    }
}
