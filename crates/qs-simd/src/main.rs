//! qs-simd: participation rewards simulation daemon.
//!
//! Drives the rewards keeper's epoch hook on a timer against in-memory
//! collaborators seeded from a scenario file, persisting the module store
//! in SQLite, then prints every account balance.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info};

use qs_keeper::{GenesisState, Keeper};
use qs_simd::scenario::DEFAULT_GENESIS;
use qs_simd::{Scenario, SimdConfig, Simulation};
use qs_store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("qs-simd.toml"));
    let config = SimdConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("qs={}", config.log_level).parse()?),
        )
        .init();

    info!(epochs = config.epochs, interval_ms = config.epoch_interval_ms, "qs-simd starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open the module store
    let db_path = data_dir.join("qs.db");
    let store = SqliteStore::open(&db_path)?;
    info!(path = %db_path.display(), "module store opened");

    // 3. Import genesis
    let genesis = if config.genesis_file.is_empty() {
        serde_json::from_str::<GenesisState>(DEFAULT_GENESIS)?
    } else {
        GenesisState::load(&PathBuf::from(&config.genesis_file))?
    };
    let mut keeper = Keeper::new(store, config.keeper.clone());
    keeper.init_genesis(&genesis)?;

    // 4. Seed the simulated chain
    let scenario = Scenario::load(&config.scenario_file)?;
    let mut sim = Simulation::new(keeper, scenario)?;

    // 5. Run epochs until done or interrupted
    let mut ticker = tokio::time::interval(Duration::from_millis(config.epoch_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sim.run_epoch() {
                    Ok(outcome) => info!(
                        epoch = sim.epoch(),
                        deferred = outcome.deferred,
                        failed_zones = outcome.failed_zones.len(),
                        lockup = outcome.lockup_paid,
                        "epoch ended"
                    ),
                    Err(e) => error!(epoch = sim.epoch(), error = %e, "epoch failed"),
                }
                if config.epochs > 0 && u64::try_from(sim.epoch()).unwrap_or(u64::MAX) >= config.epochs {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    // 6. Report
    println!("balances after {} epochs:", sim.epoch());
    for (account, coin) in sim.balances() {
        println!("  {account}: {coin}");
    }

    info!("qs-simd stopped");
    Ok(())
}
