//! Token values from Osmosis pool prices.
//!
//! Every two-asset Osmosis pool (AMM or concentrated) is an edge between
//! the native denoms of its assets, weighted by spot price in both
//! directions. Several pools for one pair average their prices. Values are
//! then propagated depth-first from the base denom (valued at 1), visiting
//! neighbours in denom order so the result is deterministic. Denoms not
//! reachable from the base denom are absent from the result.

use std::collections::{BTreeMap, BTreeSet};

use qs_protocoldata::osmosis::{DenomWithZone, OsmosisClPoolProtocolData, OsmosisPoolProtocolData};
use qs_protocoldata::records::{OsmosisParamsProtocolData, OSMOSIS_PARAMS_KEY};
use qs_protocoldata::{store, ProtocolDataError};
use qs_store::KvStore;
use qs_types::math::{add, mul, quo};
use qs_types::{Dec, MathError};

use crate::{Result, RewardsError};

/// Value of one unit of each denom, in units of the base denom.
pub type TokenValues = BTreeMap<String, Dec>;

type PriceSamples = BTreeMap<String, BTreeMap<String, Vec<Dec>>>;
type AssetGraph = BTreeMap<String, BTreeMap<String, Dec>>;

/// Outcome of pricing one pool.
enum Priced {
    Edge { quote: String, base: String, price: Dec },
    Skip(String),
}

/// Pools that cannot be priced: empty reserves, malformed pairs, and
/// reserves beyond the decimal range.
fn is_skippable(err: &ProtocolDataError) -> bool {
    matches!(
        err,
        ProtocolDataError::Math(MathError::DivisionByZero | MathError::Overflow) | ProtocolDataError::InvalidPool(_)
    )
}

/// Price the pool's pair as `(pretty quote, pretty base, price)` where
/// `price` is the amount of quote per unit of base.
fn price_pair<F>(pool_id: u64, denoms: &BTreeMap<String, DenomWithZone>, spot_price: F) -> Result<Priced>
where
    F: Fn(&str, &str) -> std::result::Result<Dec, ProtocolDataError>,
{
    let mut keys = denoms.keys();
    let (Some(d0), Some(d1)) = (keys.next(), keys.next()) else {
        return Ok(Priced::Skip(format!("pool {pool_id} is not a pair")));
    };
    let (quote, base) = match (denoms.get(d0), denoms.get(d1)) {
        (Some(q), Some(b)) => (q.denom.clone(), b.denom.clone()),
        _ => return Ok(Priced::Skip(format!("pool {pool_id} has no denom mapping"))),
    };
    match spot_price(d0, d1) {
        Ok(price) if price.is_zero() => Ok(Priced::Skip(format!("pool {pool_id} has a zero price"))),
        Ok(price) => Ok(Priced::Edge { quote, base, price }),
        Err(e) if is_skippable(&e) => Ok(Priced::Skip(format!("pool {pool_id}: {e}"))),
        Err(e) => Err(e.into()),
    }
}

fn record_edge(samples: &mut PriceSamples, priced: Priced) -> Result<()> {
    match priced {
        Priced::Edge { quote, base, price } => {
            let inverse = match quo(Dec::ONE, price) {
                Ok(inverse) => inverse,
                Err(e) => {
                    tracing::warn!(%quote, %base, %price, error = %e, "pool price cannot be inverted, skipped");
                    return Ok(());
                }
            };
            samples.entry(quote.clone()).or_default().entry(base.clone()).or_default().push(price);
            samples.entry(base).or_default().entry(quote).or_default().push(inverse);
        }
        Priced::Skip(reason) => tracing::warn!(%reason, "pool skipped for token values"),
    }
    Ok(())
}

fn average(samples: PriceSamples) -> Result<AssetGraph> {
    let mut graph = AssetGraph::new();
    for (from, edges) in samples {
        let mut averaged = BTreeMap::new();
        for (to, prices) in edges {
            let mut sum = Dec::ZERO;
            for p in &prices {
                sum = add(sum, *p)?;
            }
            averaged.insert(to, quo(sum, Dec::from(prices.len() as u64))?);
        }
        graph.insert(from, averaged);
    }
    Ok(graph)
}

fn depth_first(
    graph: &AssetGraph,
    visited: &mut BTreeSet<String>,
    asset: &str,
    value: Dec,
    out: &mut TokenValues,
) -> Result<()> {
    visited.insert(asset.to_string());
    out.insert(asset.to_string(), value);
    if let Some(edges) = graph.get(asset) {
        for (neighbour, price) in edges {
            if visited.contains(neighbour) {
                continue;
            }
            match mul(*price, value) {
                Ok(next) => depth_first(graph, visited, neighbour, next, out)?,
                Err(e) => {
                    tracing::warn!(from = asset, to = %neighbour, error = %e, "token value out of range, skipped");
                }
            }
        }
    }
    Ok(())
}

/// Build the asset graph from stored pool records.
///
/// Pools awaiting their first update, pools that are not pairs, and pools
/// with zero or out-of-range reserves are skipped with a warning. Undecodable pool
/// documents are collected and reported together.
///
/// # Errors
///
/// Returns [`RewardsError::TokenValues`] listing every undecodable pool, or
/// a store error.
fn build_graph(store: &dyn KvStore) -> Result<AssetGraph> {
    let mut samples = PriceSamples::new();
    let mut errors = Vec::new();

    for (key, record) in store::records::<OsmosisPoolProtocolData>(store)? {
        match record.pool() {
            Ok(Some(pool)) => {
                let priced = price_pair(record.pool_id, &record.denoms, |q, b| pool.spot_price(q, b))?;
                record_edge(&mut samples, priced)?;
            }
            Ok(None) => tracing::warn!(pool = %key, "pool data is nil, awaiting pool update callback"),
            Err(e) => errors.push(format!("osmosis pool {key}: {e}")),
        }
    }

    for (key, record) in store::records::<OsmosisClPoolProtocolData>(store)? {
        match record.pool() {
            Ok(Some(pool)) => {
                let priced = price_pair(record.pool_id, &record.denoms, |q, b| pool.spot_price(q, b))?;
                record_edge(&mut samples, priced)?;
            }
            Ok(None) => tracing::warn!(pool = %key, "cl pool data is nil, awaiting pool update callback"),
            Err(e) => errors.push(format!("osmosis cl pool {key}: {e}")),
        }
    }

    if !errors.is_empty() {
        return Err(RewardsError::TokenValues(errors));
    }
    average(samples)
}

/// Compute token values relative to the Osmosis params base denom.
///
/// # Errors
///
/// - [`RewardsError::MissingProtocolData`] without Osmosis params
/// - [`RewardsError::TokenValues`] when pool documents fail to decode
pub fn calc_token_values(store: &dyn KvStore) -> Result<TokenValues> {
    let params: OsmosisParamsProtocolData = store::get_record(store, OSMOSIS_PARAMS_KEY)?
        .ok_or(RewardsError::MissingProtocolData("osmosis params"))?;

    let graph = build_graph(store)?;
    let mut values = TokenValues::new();
    let mut visited = BTreeSet::new();
    depth_first(&graph, &mut visited, &params.base_denom, Dec::ONE, &mut values)?;

    for denom in graph.keys().filter(|d| !values.contains_key(*d)) {
        tracing::warn!(%denom, "denom unreachable from base denom");
    }
    tracing::info!(base = %params.base_denom, count = values.len(), "token values calculated");
    Ok(values)
}
