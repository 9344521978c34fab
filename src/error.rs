use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Failures raised while handling a single interaction. Every variant is
/// caught at the dispatch boundary and turned into a private notice.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("blueprint not found: {0}")]
    NotFound(String),

    #[error("selected blueprint not found: {0}")]
    SelectionNotFound(String),

    #[error("no blueprints in pool {pool} for {category}")]
    EmptyPool { pool: String, category: String },

    #[error("rate limit exceeded, retry in {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        max_count: u32,
        window: Duration,
    },

    #[error("interaction not allowed in this channel")]
    AccessDenied,

    #[error("invalid interaction: {0}")]
    InvalidInteraction(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl BotError {
    /// Text shown to the invoking user.
    pub fn user_message(&self) -> String {
        match self {
            BotError::NotFound(_) => "❌ Blueprint not found.".into(),
            BotError::SelectionNotFound(_) => {
                "❌ Could not find details for the selected blueprint.".into()
            }
            BotError::EmptyPool { .. } => "❌ No blueprints found for that pool/type.".into(),
            BotError::RateLimited { retry_after, max_count, window } => format!(
                "Slow down! You can send only {} embeds every {} seconds. Try again in {:.1} seconds.",
                max_count,
                window.as_secs(),
                retry_after.as_secs_f64()
            ),
            BotError::AccessDenied => "⛔ This bot is not enabled for you in this channel.".into(),
            BotError::InvalidInteraction(_) => "❌ That request could not be understood.".into(),
            BotError::Transport(_) => "❌ Something went wrong while sending the reply.".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weapon {weapon} has unknown category {category:?}")]
    UnknownCategory { weapon: String, category: String },
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("access store encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
