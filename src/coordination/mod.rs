pub mod coordinator;

pub use coordinator::*;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::agent::{AgentConfig, MiningAgent};
use crate::cli::Cli;
use crate::config::FleetConfig;
use crate::credentials::{CredentialEntry, load_credentials};
use crate::identity::resolve_identity;
use crate::persistence::SessionStore;
use crate::remote::HttpAccountingService;
use crate::retry::RetryPolicy;
use crate::transport;
use crate::types::MinerStats;

/// Build the fleet from CLI arguments, run it until a termination signal
/// arrives, then drive the coordinated shutdown.
///
/// Exit codes: 0 for a clean shutdown; 1 for fatal startup (no usable
/// credentials), a deadline-exceeded shutdown, or a forced exit.
pub async fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);

    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(SessionStore::default_state_dir);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| FleetConfig::config_path(&state_dir));
    let config = match FleetConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Unusable config at {}: {e:#}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    let entries = load_credentials(&cli.secrets, cli.proxies.as_deref());
    if entries.is_empty() {
        error!(
            "No usable credentials in {}; nothing to run",
            cli.secrets.display()
        );
        return ExitCode::FAILURE;
    }

    let agents = build_agents(&entries, &config, &state_dir, cli.verbose);
    if agents.is_empty() {
        error!("No credential resolved to a wallet identity; nothing to run");
        return ExitCode::FAILURE;
    }

    let mut coordinator = Coordinator::new(agents, config.shutdown_deadline());
    coordinator.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the termination signal: {e}");
        return ExitCode::FAILURE;
    }
    info!("Termination signal received; stopping all sessions");

    // A second signal during shutdown warns; a third abandons in-flight
    // stops and exits immediately.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown already in progress; one more signal forces an immediate exit");
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(1);
            }
        }
    });

    match coordinator.shutdown().await {
        Ok(total) => {
            info!("All sessions accounted for; total paid {total:.8}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Forced exit: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,minefleet=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Construct one agent per resolvable credential, skipping the rest with a
/// logged 1-based index.
fn build_agents(
    entries: &[CredentialEntry],
    config: &FleetConfig,
    state_dir: &Path,
    verbose: bool,
) -> Vec<Arc<MiningAgent>> {
    let agent_config = AgentConfig {
        report_interval: config.report_interval(),
        failure_cooldown: config.failure_cooldown(),
        retry: RetryPolicy::new(config.retry_attempts, config.retry_backoff()),
        earnings_rate: config.earnings_rate,
    };

    let mut agents = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let identity = match resolve_identity(&entry.secret) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Skipping credential {}: {e}", index + 1);
                continue;
            }
        };
        let client = transport::build_client(config.request_timeout(), entry.proxy.as_deref());
        let service = Arc::new(HttpAccountingService::new(
            client,
            config.api_base_url.clone(),
            verbose,
        ));
        agents.push(Arc::new(MiningAgent::new(
            identity,
            entry.proxy.clone(),
            MinerStats::simulated(config.hashrate_min_mhs, config.hashrate_max_mhs),
            agent_config.clone(),
            service,
            SessionStore::new(state_dir),
        )));
    }
    agents
}
