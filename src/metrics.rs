use axum::{Router, routing::get};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::MetricsConfig;

#[derive(Default)]
pub struct Metrics {
    pub interactions_received: AtomicU64,
    pub commands_handled: AtomicU64,
    pub rate_limits_hit: AtomicU64,
    pub lookups_not_found: AtomicU64,
    pub private_replies: AtomicU64,
    pub failed_deletes: AtomicU64,
    pub pages_rendered: AtomicU64,
    pub sessions_expired: AtomicU64,
}

/// Point-in-time copy of the counters, served on `/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub interactions_received: u64,
    pub commands_handled: u64,
    pub rate_limits_hit: u64,
    pub lookups_not_found: u64,
    pub private_replies: u64,
    pub failed_deletes: u64,
    pub pages_rendered: u64,
    pub sessions_expired: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_interactions(&self) {
        self.interactions_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands(&self) {
        self.commands_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limits(&self) {
        self.rate_limits_hit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_not_found(&self) {
        self.lookups_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_private_replies(&self) {
        self.private_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed_deletes(&self) {
        self.failed_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pages(&self) {
        self.pages_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_expired(&self, count: u64) {
        self.sessions_expired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            interactions_received: self.interactions_received.load(Ordering::Relaxed),
            commands_handled: self.commands_handled.load(Ordering::Relaxed),
            rate_limits_hit: self.rate_limits_hit.load(Ordering::Relaxed),
            lookups_not_found: self.lookups_not_found.load(Ordering::Relaxed),
            private_replies: self.private_replies.load(Ordering::Relaxed),
            failed_deletes: self.failed_deletes.load(Ordering::Relaxed),
            pages_rendered: self.pages_rendered.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
        }
    }

    pub fn format_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            "# HELP blueprint_bot_interactions_received Total interactions received\n\
             # TYPE blueprint_bot_interactions_received counter\n\
             blueprint_bot_interactions_received {}\n\
             # HELP blueprint_bot_commands_handled Slash commands handled\n\
             # TYPE blueprint_bot_commands_handled counter\n\
             blueprint_bot_commands_handled {}\n\
             # HELP blueprint_bot_rate_limits_hit Rate limits triggered\n\
             # TYPE blueprint_bot_rate_limits_hit counter\n\
             blueprint_bot_rate_limits_hit {}\n\
             # HELP blueprint_bot_lookups_not_found Lookups with no matching blueprint\n\
             # TYPE blueprint_bot_lookups_not_found counter\n\
             blueprint_bot_lookups_not_found {}\n\
             # HELP blueprint_bot_private_replies Private replies sent\n\
             # TYPE blueprint_bot_private_replies counter\n\
             blueprint_bot_private_replies {}\n\
             # HELP blueprint_bot_failed_deletes Message deletes that could not be performed\n\
             # TYPE blueprint_bot_failed_deletes counter\n\
             blueprint_bot_failed_deletes {}\n\
             # HELP blueprint_bot_pages_rendered Pages rendered for paginated lists\n\
             # TYPE blueprint_bot_pages_rendered counter\n\
             blueprint_bot_pages_rendered {}\n\
             # HELP blueprint_bot_sessions_expired Pagination sessions expired\n\
             # TYPE blueprint_bot_sessions_expired counter\n\
             blueprint_bot_sessions_expired {}\n",
            s.interactions_received,
            s.commands_handled,
            s.rate_limits_hit,
            s.lookups_not_found,
            s.private_replies,
            s.failed_deletes,
            s.pages_rendered,
            s.sessions_expired,
        )
    }
}

pub async fn run_metrics_server(config: MetricsConfig, metrics: Arc<Metrics>) {
    if !config.enable {
        return;
    }

    let path = config.path.clone();
    let app = Router::new()
        .route(&path, get(move || {
            let m = metrics.clone();
            async move { m.format_prometheus() }
        }));

    let addr: std::net::SocketAddr = match config.bind_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid metrics bind address: {}", e);
            return;
        }
    };

    info!("Metrics server listening on {}{}", addr, path);

    match TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Metrics server stopped: {}", e);
            }
        }
        Err(e) => tracing::error!("Could not bind metrics server on {}: {}", addr, e),
    }
}
