//! Integration test crate for the participation rewards workspace.
//!
//! Holds only the shared [`Harness`]; the tests under `tests/` drive
//! claims, epochs, callbacks, governance and genesis end to end across the
//! keeper, the protocol data store and the simulated collaborators.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p qs-integration-tests
//! ```

use prost::Message as _;
use serde_json::json;

use qs_keeper::callbacks::Callback;
use qs_keeper::hooks::TRANSFER_PORT;
use qs_keeper::sim::SimChain;
use qs_keeper::{AddProtocolDataProposal, BlockInfo, EpochOutcome, Keeper, KeeperError, ModuleConfig, Params};
use qs_protocoldata::records::{ConnectionProtocolData, LiquidAllowedDenomProtocolData, OsmosisParamsProtocolData};
use qs_protocoldata::store;
use qs_store::{KvStore, MemStore};
use qs_types::address::address_from_bech32;
use qs_types::keepers::{IcqRequest, InterchainStakingKeeper};
use qs_types::proto::{Block, GetLatestBlockResponse, Header};
use qs_types::{Claim, ClaimType, Coin, MsgSubmitClaim, Zone, MODULE_NAME};

pub const ALICE: &str = "quick1jc24kwznud9m3mwqmcz3xw33ndjuufngu5m0y6";
pub const BOB: &str = "quick16qqhmsqcs4j6mfa92flnz4n8tj2s53jwdhy7an";
pub const CAROL: &str = "quick1fsndjp6vylvfahjeyuxq4s2tw8s8rv2jfz2agr";
pub const DAVE: &str = "quick1v84qsqlcs56j8dmh6s22eccnpn2d87fdqfwnv6";
/// Holds the qAsset float so holders stay under the holdings cap.
pub const WHALE: &str = "quick1w6n7ydxu2n5uvpdjej0a7uf8j5np2r05cekcj0";
pub const PERFORMANCE: &str = "cosmos1fgvfsutw7emedlxgp36zd38cwmfe3h380xfdwd";

pub const OSMOSIS: &str = "osmosis-1";
pub const BOND_DENOM: &str = "uqck";

/// Route test logs through the test writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A keeper wired to a simulated chain with an Osmosis connection.
pub struct Harness<S> {
    pub keeper: Keeper<S>,
    pub chain: SimChain,
    pub block: BlockInfo,
}

impl Harness<MemStore> {
    /// # Errors
    ///
    /// See [`Harness::with_store`].
    pub fn new() -> qs_keeper::Result<Self> {
        Self::with_store(MemStore::new())
    }
}

impl<S: KvStore> Harness<S> {
    /// Claims enabled, Osmosis params priced in `uatom`, and the Osmosis
    /// connection added by governance.
    ///
    /// # Errors
    ///
    /// Returns keeper errors from params or the connection proposal.
    pub fn with_store(store: S) -> qs_keeper::Result<Self> {
        init_tracing();
        let mut keeper = Keeper::new(store, ModuleConfig::default());
        keeper.set_params(&Params {
            claims_enabled: true,
            ..Params::default()
        })?;
        store::set_record(
            keeper.store_mut(),
            &OsmosisParamsProtocolData {
                chain_id: OSMOSIS.into(),
                base_denom: "uatom".into(),
                base_chain: "cosmoshub-4".into(),
            },
        )?;
        keeper.add_protocol_data(&AddProtocolDataProposal {
            title: "Add osmosis connection".into(),
            description: "Osmosis connection data".into(),
            data_type: "ProtocolDataTypeConnection".into(),
            key: OSMOSIS.into(),
            data: json!({
                "ConnectionID": "connection-2",
                "ChainID": OSMOSIS,
                "LastEpoch": 0,
                "Prefix": "osmo",
                "TransferChannel": "channel-2"
            }),
        })?;

        let mut chain = SimChain::new("quick", BOND_DENOM)?;
        chain.client.add_connection("connection-2", "07-tendermint-2");
        chain.channels.connect(TRANSFER_PORT, "channel-2", "channel-200");
        Ok(Self {
            keeper,
            chain,
            block: BlockInfo {
                height: 1000,
                time: 1_700_000_000,
            },
        })
    }

    /// Register a zone whose qAsset is `local_denom`, staking `uatom` with
    /// `delegated` tokens, and a float of `float` qAssets held by [`WHALE`].
    ///
    /// # Errors
    ///
    /// See [`Keeper::after_zone_created`].
    pub fn add_zone(
        &mut self,
        chain_id: &str,
        index: u32,
        local_denom: &str,
        delegated: u128,
        float: u128,
    ) -> qs_keeper::Result<Zone> {
        let connection_id = format!("connection-{index}");
        let transfer_channel = format!("channel-{index}");
        let mut zone = Zone::new(chain_id, &connection_id, "cosmos", local_denom, "uatom");
        zone.transfer_channel = transfer_channel.clone();
        zone.performance_address = Some(PERFORMANCE.into());

        self.chain.client.add_connection(&connection_id, &format!("07-tendermint-{index}"));
        self.chain
            .channels
            .connect(TRANSFER_PORT, &transfer_channel, &format!("channel-{}", index + 100));
        self.chain.ics.set_zone(zone.clone());
        self.chain.ics.set_delegated(chain_id, delegated, 0);
        self.chain.bank.mint(WHALE, &Coin::new(local_denom, float));

        let host = self.chain.host(self.block);
        self.keeper.after_zone_created(&host, &zone)?;
        Ok(zone)
    }

    /// Mint `amount` of the bond denom into the rewards module account.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::External`] if the module account is missing.
    pub fn fund(&mut self, amount: u128) -> qs_keeper::Result<()> {
        self.chain
            .bank
            .mint_to_module(MODULE_NAME, &Coin::new(BOND_DENOM, amount))?;
        Ok(())
    }

    /// Answer an epoch block query for `chain_id` with `height`.
    ///
    /// # Errors
    ///
    /// See [`Keeper::handle_callback`].
    pub fn set_epoch_block(&mut self, chain_id: &str, height: i64) -> qs_keeper::Result<()> {
        let response = GetLatestBlockResponse {
            block: None,
            sdk_block: Some(Block {
                header: Some(Header {
                    chain_id: chain_id.into(),
                    height,
                }),
            }),
        }
        .encode_to_vec();
        self.callback(Callback::EpochBlock, chain_id, &response)
    }

    /// Deliver `response` to `callback` as if answering a query on
    /// `chain_id`.
    ///
    /// # Errors
    ///
    /// See [`Keeper::handle_callback`].
    pub fn callback(&mut self, callback: Callback, chain_id: &str, response: &[u8]) -> qs_keeper::Result<()> {
        let query = IcqRequest {
            connection_id: String::new(),
            chain_id: chain_id.into(),
            query_type: String::new(),
            request: vec![],
            period: -1,
            module: MODULE_NAME.into(),
            callback_id: callback.id().into(),
            ttl: 0,
        };
        let mut host = self.chain.host(self.block);
        self.keeper.handle_callback(&mut host, callback.id(), response, &query)
    }

    /// Prove that `user` holds `amount` of `zone`'s qAsset on `src_zone` at
    /// its last epoch block, and submit the claim.
    ///
    /// # Errors
    ///
    /// See [`Keeper::submit_claim`]; [`KeeperError::ConnectionNotFound`]
    /// when `src_zone` is unknown.
    pub fn claim(&mut self, user: &str, zone: &str, src_zone: &str, amount: u128) -> qs_keeper::Result<Claim> {
        let connection = store::get_record::<ConnectionProtocolData>(self.keeper.store(), src_zone)?
            .ok_or_else(|| KeeperError::ConnectionNotFound(src_zone.into()))?;
        let denom = store::records::<LiquidAllowedDenomProtocolData>(self.keeper.store())?
            .into_iter()
            .map(|(_, r)| r)
            .find(|r| r.chain_id == src_zone && r.registered_zone_chain_id == zone)
            .map(|r| r.ibc_denom)
            .unwrap_or_default();
        let client_id = self
            .chain
            .client
            .connections
            .get(&connection.connection_id)
            .cloned()
            .unwrap_or_default();

        let user_bytes = address_from_bech32(user, None)?;
        let proof = self.chain.bank_balance_proof(
            &client_id,
            src_zone,
            &user_bytes,
            &denom,
            amount,
            connection.last_epoch,
        )?;
        let msg = MsgSubmitClaim {
            user_address: user.into(),
            zone: zone.into(),
            src_zone: src_zone.into(),
            claim_type: ClaimType::LiquidToken,
            proofs: vec![proof],
        };
        let host = self.chain.host(self.block);
        self.keeper.submit_claim(&host, &msg)
    }

    /// Advance one epoch's worth of blocks and end epoch `epoch_number`.
    ///
    /// # Errors
    ///
    /// See [`Keeper::after_epoch_end`].
    pub fn end_epoch(&mut self, epoch_number: i64) -> qs_keeper::Result<EpochOutcome> {
        self.block.height += 100;
        self.block.time += 6 * 60 * 60;
        let identifier = self.keeper.config().epoch_identifier.clone();
        let mut host = self.chain.host(self.block);
        self.keeper.after_epoch_end(&mut host, &identifier, epoch_number)
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.chain.bank.balance(address, BOND_DENOM)
    }
}
