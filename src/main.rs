//! Atlas Deposit Relayer - Launcher
//!
//! Run modes:
//!   atlas-relayer api       - Start the REST API (retry endpoint, lookups)
//!   atlas-relayer scanner   - Start the Bitcoin deposit scanner (background)
//!   atlas-relayer all       - Run both in one process

use std::env;
use std::sync::Arc;
use tracing::error;

use atlas_relayer::api::{self, AppState};
use atlas_relayer::config::RelayerConfig;
use atlas_relayer::ledger::{HttpLedgerClient, LedgerClient};
use atlas_relayer::params::{GlobalParamsCache, UnstakingPeriodResolver};
use atlas_relayer::relay::{
    BitcoinScanner, DepositRetryService, EsploraBtcClient, MessageSignatureVerifier,
    ScannerConfig, SignatureVerifier,
};
use atlas_relayer::storage::{CursorStore, SqliteCursorStore};
use atlas_relayer::{logging, RelayerError};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("help");

    if matches!(mode, "help" | "--help" | "-h") {
        print_usage();
        return;
    }

    let config = match RelayerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.log_level, config.log_json) {
        eprintln!("logging init failed: {}", e);
    }

    let result = match mode {
        "api" => run(config, true, false).await,
        "scanner" => run(config, false, true).await,
        "all" => run(config, true, true).await,
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(e) = result {
        error!(error = %e, "relayer terminated");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Atlas Deposit Relayer");
    println!();
    println!("Usage:");
    println!("  atlas-relayer api        Start REST API server");
    println!("  atlas-relayer scanner    Start Bitcoin deposit scanner");
    println!("  atlas-relayer all        Run API and scanner together");
    println!();
    println!("Required Environment Variables:");
    println!("  ATLAS_LEDGER_API        Ledger-chain gateway base URL");
    println!("  ATLAS_VAULT_ADDRESS     Bitcoin vault address to watch");
    println!();
    println!("See src/config.rs for the full list of settings.");
}

async fn run(config: RelayerConfig, with_api: bool, with_scanner: bool) -> Result<(), RelayerError> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(HttpLedgerClient::new(&config.ledger_api));

    let params = Arc::new(GlobalParamsCache::new(Arc::clone(&ledger)));
    if let Err(e) = params.refresh().await {
        // The refresh loop will keep trying; start with the default snapshot.
        tracing::warn!(error = %e, "initial params refresh failed");
    }
    params.spawn_refresh_loop(std::time::Duration::from_secs(config.params_refresh_secs));

    let mut scanner_task = None;
    if with_scanner {
        let cursors: Arc<dyn CursorStore> = Arc::new(SqliteCursorStore::new(&config.cursor_db_path)?);
        let btc = Arc::new(EsploraBtcClient::new(&config.bitcoin_api));

        let scanner = BitcoinScanner::new(
            btc,
            Arc::clone(&ledger),
            cursors,
            Arc::clone(&params),
            ScannerConfig {
                vault_address: config.vault_address.clone(),
                required_confirmations: config.required_confirmations,
                height_cursor_key: config.height_cursor_key(),
                confirmed_time_cursor_key: config.confirmed_time_cursor_key(),
                confirmed_time_default: config.last_confirmed_time_default,
                poll_interval_secs: config.scan_interval_secs,
            },
        );

        scanner_task = Some(tokio::spawn(async move { scanner.run().await }));
    }

    if with_api {
        let verifier: Arc<dyn SignatureVerifier> = Arc::new(MessageSignatureVerifier::new(
            config.btc_network.bitcoin_network(),
        ));

        let state = Arc::new(AppState {
            retry: DepositRetryService::new(
                Arc::clone(&ledger),
                verifier,
                Arc::clone(&params),
            ),
            ledger: Arc::clone(&ledger),
            params: Arc::clone(&params),
            unstaking: UnstakingPeriodResolver::new(Arc::clone(&ledger), config.environment),
        });

        api::start_server(state, config.api_port).await?;
    } else if let Some(task) = scanner_task {
        // Scanner-only mode: block on the scan loop
        task.await.ok();
    }

    Ok(())
}
