//! Feed supervision.
//!
//! Runs every `StreamConnection` as its own tokio task for the lifetime of
//! the process. A connection's own loop handles disconnects; the supervisor
//! only steps in when a task dies outright (a panic in the handler), and
//! restarts it after the reconnect delay. Feeds never affect one another.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::FeedsConfig;
use crate::feed::stream::{StreamConnection, StreamSettings};
use crate::feed::{FeedKind, MessageHandler};

pub struct Orchestrator {
    feeds: Vec<Arc<StreamConnection>>,
    handler: Arc<dyn MessageHandler>,
}

impl Orchestrator {
    pub fn new(feeds: Vec<StreamConnection>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            feeds: feeds.into_iter().map(Arc::new).collect(),
            handler,
        }
    }

    /// The market and player-event feeds, both delivering to `handler`.
    pub fn from_config(cfg: &FeedsConfig, handler: Arc<dyn MessageHandler>) -> Self {
        let settings = StreamSettings::from(cfg);
        Self::new(
            vec![
                StreamConnection::new("market", &cfg.market_url, FeedKind::Market, settings),
                StreamConnection::new("events", &cfg.events_url, FeedKind::Events, settings),
            ],
            handler,
        )
    }

    pub fn feeds(&self) -> &[Arc<StreamConnection>] {
        &self.feeds
    }

    /// Start every feed and supervise them. Only returns if all supervisors
    /// have been cancelled.
    pub async fn run(&self) -> Result<()> {
        let mut supervisors = JoinSet::new();
        for feed in &self.feeds {
            info!(feed = %feed.name(), url = %feed.url(), kind = %feed.kind(), "Starting feed");
            supervisors.spawn(supervise(feed.clone(), self.handler.clone()));
        }

        while let Some(joined) = supervisors.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Feed supervisor stopped");
            }
        }

        anyhow::bail!("all feeds stopped")
    }
}

/// Keep one feed task alive, restarting it whenever it dies.
async fn supervise(feed: Arc<StreamConnection>, handler: Arc<dyn MessageHandler>) {
    loop {
        // Held in a set so the feed task is aborted along with its supervisor.
        let mut task = JoinSet::new();
        {
            let feed = feed.clone();
            let handler = handler.clone();
            task.spawn(async move { feed.run(handler.as_ref()).await });
        }

        match task.join_next().await {
            Some(Ok(())) => warn!(feed = %feed.name(), "Feed task returned"),
            Some(Err(e)) if e.is_panic() => error!(feed = %feed.name(), "Feed task panicked"),
            Some(Err(_)) | None => {
                info!(feed = %feed.name(), "Feed task cancelled");
                return;
            }
        }

        tokio::time::sleep(feed.settings().reconnect_delay).await;
        info!(feed = %feed.name(), "Restarting feed task");
    }
}
