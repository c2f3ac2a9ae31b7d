//! SCOUT: streaming player-market trading agent.
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the feeds to the analysis pipeline, and runs until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use scout::config;
use scout::engine::executor::OrderSubmitter;
use scout::engine::orchestrator::Orchestrator;
use scout::engine::pipeline::Pipeline;
use scout::engine::trigger::AnalysisTrigger;
use scout::llm::{self, AdvisoryClient};
use scout::platforms::exchange::HttpOrderGateway;
use scout::state::EntityStateStore;
use scout::strategy::KeywordParser;

const BANNER: &str = r#"
 ____   ____ ___  _   _ _____
/ ___| / ___/ _ \| | | |_   _|
\___ \| |  | | | | | | | | |
 ___) | |__| |_| | |_| | | |
|____/ \____\___/ \___/  |_|

  Streaming player-market agent
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Config loading logs, so the subscriber goes first.
    init_logging();

    let cfg = config::AppConfig::load_or_default("config.toml")?;

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        username = %cfg.agent.username,
        market_feed = %cfg.feeds.market_url,
        event_feed = %cfg.feeds.events_url,
        order_endpoint = %cfg.orders.endpoint,
        "SCOUT starting up"
    );

    // -- Initialise components -------------------------------------------

    let store = Arc::new(EntityStateStore::new());

    let provider = llm::build_provider(&cfg.advisory, cfg.advisory_api_key())?;
    let advisory = AdvisoryClient::new(provider, cfg.advisory.cooldown());

    let gateway = Arc::new(HttpOrderGateway::new(&cfg.orders.endpoint, cfg.orders.timeout())?);
    if cfg.orders.dry_run {
        warn!("Dry-run mode: orders are logged, not sent");
    }
    let submitter = OrderSubmitter::new(gateway, store.clone(), &cfg.agent.username, cfg.orders.cooldown())
        .dry_run(cfg.orders.dry_run);

    let pipeline = Arc::new(Pipeline::new(
        store,
        AnalysisTrigger::from(&cfg.analysis),
        advisory,
        Box::new(KeywordParser::new()),
        submitter,
        cfg.analysis.overlap_policy,
    ));

    let orchestrator = Orchestrator::from_config(&cfg.feeds, pipeline.clone());

    // -- Run -------------------------------------------------------------

    info!(
        decode_error_policy = ?cfg.feeds.decode_error_policy,
        overlap_policy = ?cfg.analysis.overlap_policy,
        "Entering main loop. Press Ctrl+C to stop."
    );

    tokio::select! {
        result = orchestrator.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    let stats = pipeline.stats();
    info!(
        entities = pipeline.store().entity_count(),
        triggers = stats.triggers,
        orders_accepted = stats.orders_accepted,
        orders_rejected = stats.orders_rejected,
        advisory_failures = stats.advisory_failures,
        "SCOUT shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scout=info"));

    let json_logging = std::env::var("SCOUT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
