use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::access::AccessStore;
use crate::action::{ComponentAction, Direction};
use crate::catalog::{Blueprint, Catalog};
use crate::commands::{self, Command};
use crate::config::{LimitsConfig, PaginationConfig};
use crate::error::BotError;
use crate::metrics::Metrics;
use crate::pagination::{NavigationOutcome, PageItem, PaginationRegistry, MAX_VALUE_CHARS};
use crate::protocol::{Interaction, InteractionKind, InteractionResponse, MessagePayload};
use crate::ratelimit::{Admission, RateLimiter};
use crate::render;
use crate::session::EphemeralSessionTracker;
use crate::transport::{
    defer_update, send_message, DeleteOutcome, InteractionCtx, MessageHandle, Transport, TransportError,
};

const EXPIRED_NOTICE: &str = "This list has expired. Run /pool again to browse it.";

/// Routes every interaction to its handler and owns the shared bot state.
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    tracker: EphemeralSessionTracker,
    pages: Arc<PaginationRegistry>,
    access: AccessStore,
    metrics: Arc<Metrics>,
    public_delete_after: Duration,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        transport: Arc<dyn Transport>,
        access: AccessStore,
        metrics: Arc<Metrics>,
        limits: &LimitsConfig,
        pagination: &PaginationConfig,
    ) -> Self {
        Self {
            catalog,
            limiter: RateLimiter::new(limits.max_embeds_per_period, limits.period_seconds),
            tracker: EphemeralSessionTracker::new(transport.clone(), metrics.clone()),
            pages: Arc::new(PaginationRegistry::new(pagination.page_size, pagination.idle_timeout())),
            transport,
            access,
            metrics,
            public_delete_after: pagination.public_delete_after(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.pages.active_count()
    }

    pub fn tracked_users(&self) -> usize {
        self.tracker.tracked_users()
    }

    /// Handles a command or component interaction to completion. Failures
    /// end up as a private notice to the invoking user.
    pub async fn dispatch(&self, interaction: Interaction) {
        self.metrics.inc_interactions();

        let Some(ctx) = InteractionCtx::from_interaction(&interaction) else {
            warn!("Interaction {} carries no user, ignoring", interaction.id);
            return;
        };

        if let Err(e) = self.route(&ctx, &interaction).await {
            self.report(&ctx, e).await;
        }
    }

    /// Answers an autocomplete request inline.
    pub fn autocomplete(&self, interaction: &Interaction) -> InteractionResponse {
        self.metrics.inc_interactions();
        let current = interaction
            .data
            .as_ref()
            .and_then(|d| d.focused())
            .and_then(|o| o.as_text())
            .unwrap_or_default();
        InteractionResponse::autocomplete(commands::weapontype_choices(&current))
    }

    async fn route(&self, ctx: &InteractionCtx, interaction: &Interaction) -> Result<(), BotError> {
        if !self
            .access
            .is_allowed(ctx.guild_id.as_deref(), ctx.channel_id.as_deref(), &ctx.roles)
        {
            return Err(BotError::AccessDenied);
        }

        let data = interaction
            .data
            .as_ref()
            .ok_or_else(|| BotError::InvalidInteraction("interaction without data".into()))?;

        match interaction.kind {
            InteractionKind::ApplicationCommand => self.handle_command(ctx, Command::parse(data)?).await,
            InteractionKind::MessageComponent => {
                let custom_id = data.custom_id.as_deref().unwrap_or_default();
                let action = ComponentAction::parse(custom_id, &data.values).ok_or_else(|| {
                    BotError::InvalidInteraction(format!("unknown component {:?}", custom_id))
                })?;
                self.handle_component(ctx, action).await
            }
            other => Err(BotError::InvalidInteraction(format!(
                "{:?} cannot be dispatched",
                other
            ))),
        }
    }

    async fn report(&self, ctx: &InteractionCtx, err: BotError) {
        match &err {
            BotError::Transport(e) => error!("Interaction {} failed: {}", ctx.interaction_id, e),
            BotError::InvalidInteraction(reason) => {
                warn!("Rejected interaction {}: {}", ctx.interaction_id, reason)
            }
            other => debug!("Interaction {} for {}: {}", ctx.interaction_id, ctx.user_id, other),
        }

        let notice = MessagePayload::text(err.user_message());
        if let Err(e) = self.tracker.send_private(ctx, notice).await {
            error!("Could not deliver notice to user {}: {}", ctx.user_id, e);
        }
    }

    fn admit(&self) -> Result<(), BotError> {
        match self.limiter.admit() {
            Admission::Allowed => Ok(()),
            Admission::Limited { retry_after } => {
                self.metrics.inc_rate_limits();
                Err(BotError::RateLimited {
                    retry_after,
                    max_count: self.limiter.max_count(),
                    window: self.limiter.window(),
                })
            }
        }
    }

    async fn handle_command(&self, ctx: &InteractionCtx, command: Command) -> Result<(), BotError> {
        self.metrics.inc_commands();
        if command.is_rate_limited() {
            self.admit()?;
        }

        match command {
            Command::Blueprint { nameid } => {
                let bp = self.catalog.find(&nameid).ok_or_else(|| {
                    self.metrics.inc_not_found();
                    BotError::NotFound(nameid.clone())
                })?;
                self.send_blueprint(ctx, bp, true).await
            }
            Command::Pool { number, weapontype } => self.open_pool(ctx, &number, &weapontype).await,
            Command::Website => {
                self.tracker.send_private(ctx, render::website_message()).await?;
                Ok(())
            }
            Command::HowTo { gamemode } => {
                self.tracker.send_private(ctx, render::howto_message(gamemode)).await?;
                Ok(())
            }
        }
    }

    async fn handle_component(&self, ctx: &InteractionCtx, action: ComponentAction) -> Result<(), BotError> {
        match action {
            ComponentAction::Navigate { session, direction } => self.navigate(ctx, session, direction).await,
            ComponentAction::PageIndicator { .. } => {
                defer_update(self.transport.as_ref(), ctx).await?;
                Ok(())
            }
            ComponentAction::SelectItem { key } => {
                self.admit()?;
                let bp = self
                    .catalog
                    .find(&key)
                    .or_else(|| {
                        (key.chars().count() == MAX_VALUE_CHARS)
                            .then(|| self.catalog.find_by_key_prefix(&key))
                            .flatten()
                    })
                    .ok_or_else(|| {
                        self.metrics.inc_not_found();
                        BotError::SelectionNotFound(key.clone())
                    })?;
                self.send_blueprint(ctx, bp, false).await
            }
            ComponentAction::ViewPool { pool, weapon } => {
                self.admit()?;
                let filter = self
                    .catalog
                    .category_of_weapon(&weapon)
                    .map_or("all", |c| c.name());
                self.open_pool(ctx, &pool, filter).await
            }
            ComponentAction::ViewAllPool { pool } => {
                self.admit()?;
                self.open_pool(ctx, &pool, "all").await
            }
        }
    }

    async fn send_blueprint(&self, ctx: &InteractionCtx, bp: &Blueprint, pool_buttons: bool) -> Result<(), BotError> {
        let image = self.catalog.resolve_image(bp);
        let message = render::blueprint_message(bp, image.as_deref(), pool_buttons);
        self.tracker.send_private(ctx, message).await?;
        Ok(())
    }

    /// Posts a public paginated pool listing that deletes itself after the
    /// configured delay.
    async fn open_pool(&self, ctx: &InteractionCtx, pool: &str, filter: &str) -> Result<(), BotError> {
        let items: Vec<PageItem> = self
            .catalog
            .list_by_pool(pool, filter)
            .into_iter()
            .map(|summary| PageItem {
                label: summary.label,
                value: summary.key,
            })
            .collect();
        if items.is_empty() {
            return Err(BotError::EmptyPool {
                pool: pool.to_string(),
                category: filter.to_string(),
            });
        }

        let count = items.len();
        let note = render::public_delete_note(self.public_delete_after.as_secs());
        let (id, first_page) = self
            .pages
            .open(render::pool_title(pool, filter), render::random_color(), items, Some(note));
        self.metrics.inc_pages();

        let handle = match send_message(self.transport.as_ref(), ctx, first_page).await {
            Ok(handle) => handle,
            Err(e) => {
                self.pages.expire(&id);
                return Err(e.into());
            }
        };
        info!("Pool {} ({}) listed with {} blueprint(s), session {}", pool, filter, count, id);

        self.pages.attach_message(&id, handle.clone());
        self.schedule_delete(id, handle);
        Ok(())
    }

    fn schedule_delete(&self, id: Uuid, handle: MessageHandle) {
        let transport = self.transport.clone();
        let pages = self.pages.clone();
        let metrics = self.metrics.clone();
        let delay = self.public_delete_after;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match transport.delete_message(&handle).await {
                DeleteOutcome::Deleted => debug!("Deleted public listing {}", id),
                DeleteOutcome::NotFound => debug!("Public listing {} already gone", id),
                DeleteOutcome::Denied => {
                    metrics.inc_failed_deletes();
                    warn!("Missing permission to delete public listing {}", id);
                }
                DeleteOutcome::Failed(reason) => {
                    metrics.inc_failed_deletes();
                    warn!("Deleting public listing {} failed: {}", id, reason);
                }
            }
            if pages.expire(&id).is_some() {
                metrics.add_expired(1);
            }
        });
    }

    async fn navigate(&self, ctx: &InteractionCtx, session: Uuid, direction: Direction) -> Result<(), BotError> {
        defer_update(self.transport.as_ref(), ctx).await?;

        match self.pages.navigate(&session, direction, Instant::now()) {
            NavigationOutcome::Moved(page) => {
                self.metrics.inc_pages();
                match self
                    .transport
                    .edit_message(&MessageHandle::original(&ctx.token), &page)
                    .await
                {
                    Ok(()) => {}
                    Err(TransportError::NotFound) => {
                        debug!("Listing {} is gone, dropping its session", session);
                        if self.pages.expire(&session).is_some() {
                            self.metrics.add_expired(1);
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            NavigationOutcome::AtBoundary(boundary) => {
                let notice = MessagePayload::text(boundary.notice()).ephemeral();
                send_message(self.transport.as_ref(), ctx, notice).await?;
            }
            NavigationOutcome::Expired => {
                let notice = MessagePayload::text(EXPIRED_NOTICE).ephemeral();
                send_message(self.transport.as_ref(), ctx, notice).await?;
            }
        }
        Ok(())
    }

    /// Expires idle listings and disables the controls on their messages.
    pub async fn reap_idle(&self, now: Instant) -> usize {
        let expired = self.pages.reap_idle(now);
        let transport = self.transport.as_ref();
        let edits = expired.iter().filter_map(|session| {
            let handle = session.message()?;
            Some(async move {
                let page = session.render();
                match transport.edit_message(handle, &page).await {
                    Ok(()) => {}
                    Err(TransportError::NotFound) => debug!("Listing {} was already deleted", session.id),
                    Err(e) => warn!("Could not disable controls on listing {}: {}", session.id, e),
                }
            })
        });
        join_all(edits).await;
        if !expired.is_empty() {
            self.metrics.add_expired(expired.len() as u64);
            info!("Expired {} idle listing(s)", expired.len());
        }
        expired.len()
    }
}
