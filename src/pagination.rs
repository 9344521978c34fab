use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::action::{ComponentAction, Direction};
use crate::protocol::{ButtonStyle, Component, Embed, EmbedFooter, MessagePayload, SelectOption};
use crate::transport::MessageHandle;

/// Select menus and option labels are capped by the chat platform.
pub const MAX_PAGE_SIZE: usize = 25;
const MAX_LABEL_CHARS: usize = 100;
/// Option values share the label cap. Longer values are cut to a prefix.
pub const MAX_VALUE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Active(usize),
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    First,
    Last,
}

impl Boundary {
    pub fn notice(&self) -> &'static str {
        match self {
            Boundary::First => "You are already on the first page.",
            Boundary::Last => "You are already on the last page.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView<'a> {
    pub items: &'a [PageItem],
    pub page_index: usize,
    pub total_pages: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PageTurn<'a> {
    Moved(PageView<'a>),
    AtBoundary(Boundary),
    Expired,
}

/// A paged, selectable result list attached to one rendered message.
#[derive(Debug)]
pub struct PaginationSession {
    pub id: Uuid,
    title: String,
    color: u32,
    note: Option<String>,
    items: Vec<PageItem>,
    page_size: usize,
    state: PageState,
    last_page: usize,
    last_activity: Instant,
    message: Option<MessageHandle>,
}

impl PaginationSession {
    pub fn new(title: impl Into<String>, color: u32, items: Vec<PageItem>, page_size: usize, now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            color,
            note: None,
            items,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            state: PageState::Active(0),
            last_page: 0,
            last_activity: now,
            message: None,
        }
    }

    /// Italic line appended below every page.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn message(&self) -> Option<&MessageHandle> {
        self.message.as_ref()
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size).max(1)
    }

    pub fn current_page(&self) -> Option<PageView<'_>> {
        match self.state {
            PageState::Active(page_index) => Some(self.view(page_index)),
            PageState::Expired => None,
        }
    }

    pub fn next(&mut self, now: Instant) -> PageTurn<'_> {
        self.turn(Direction::Next, now)
    }

    pub fn previous(&mut self, now: Instant) -> PageTurn<'_> {
        self.turn(Direction::Previous, now)
    }

    pub fn turn(&mut self, direction: Direction, now: Instant) -> PageTurn<'_> {
        let PageState::Active(page_index) = self.state else {
            return PageTurn::Expired;
        };
        self.last_activity = now;

        let target = match direction {
            Direction::Previous if page_index == 0 => return PageTurn::AtBoundary(Boundary::First),
            Direction::Next if page_index + 1 >= self.total_pages() => {
                return PageTurn::AtBoundary(Boundary::Last)
            }
            Direction::Previous => page_index - 1,
            Direction::Next => page_index + 1,
        };

        self.state = PageState::Active(target);
        self.last_page = target;
        PageTurn::Moved(self.view(target))
    }

    pub fn expire(&mut self) {
        self.state = PageState::Expired;
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    fn view(&self, page_index: usize) -> PageView<'_> {
        let start = (page_index * self.page_size).min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        PageView {
            items: &self.items[start..end],
            page_index,
            total_pages: self.total_pages(),
        }
    }

    /// Embed plus select menu and navigation row for the current page. An
    /// expired session renders its last page with every control disabled.
    pub fn render(&self) -> MessagePayload {
        let expired = self.state == PageState::Expired;
        let page = self.current_page().unwrap_or_else(|| self.view(self.last_page));
        let page_index = page.page_index;
        let offset = page_index * self.page_size;

        let mut description = if page.items.is_empty() {
            "No blueprints found on this page.".to_string()
        } else {
            page.items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("**{}.** {}", offset + i + 1, item.label))
                .collect::<Vec<_>>()
                .join("\n")
        };
        if page.total_pages > 1 {
            description.push_str(&format!("\n\n(Page {}/{})", page_index + 1, page.total_pages));
        }
        if let Some(note) = &self.note {
            description.push_str(&format!("\n\n*{}*", note));
        }

        let embed = Embed {
            title: Some(self.title.clone()),
            description: Some(description),
            color: self.color,
            footer: expired.then(|| EmbedFooter {
                text: "This list has expired.".into(),
            }),
            ..Embed::default()
        };

        let mut components = Vec::new();
        if !page.items.is_empty() {
            let options = page
                .items
                .iter()
                .map(|item| SelectOption {
                    label: truncate(&item.label, MAX_LABEL_CHARS),
                    value: item.value.chars().take(MAX_VALUE_CHARS).collect(),
                })
                .collect();
            components.push(Component::row(vec![Component::select(
                ComponentAction::select_custom_id(),
                "Select a blueprint to view details...",
                options,
            )
            .disabled(expired)]));
        }

        let session = self.id;
        components.push(Component::row(vec![
            Component::button(
                ComponentAction::Navigate { session, direction: Direction::Previous }.custom_id(),
                "◀️ Previous Page",
                ButtonStyle::Secondary,
            )
            .disabled(expired || page_index == 0),
            Component::button(
                ComponentAction::PageIndicator { session }.custom_id(),
                format!("Page {}/{}", page_index + 1, page.total_pages),
                ButtonStyle::Secondary,
            )
            .disabled(true),
            Component::button(
                ComponentAction::Navigate { session, direction: Direction::Next }.custom_id(),
                "Next Page ▶️",
                ButtonStyle::Secondary,
            )
            .disabled(expired || page_index + 1 >= page.total_pages),
        ]));

        MessagePayload::embed(embed).with_components(components)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Owned result of a navigation request against the registry.
#[derive(Debug)]
pub enum NavigationOutcome {
    Moved(MessagePayload),
    AtBoundary(Boundary),
    Expired,
}

/// Live pagination sessions keyed by the id embedded in their controls.
pub struct PaginationRegistry {
    sessions: DashMap<Uuid, PaginationSession>,
    page_size: usize,
    idle_timeout: Duration,
}

impl PaginationRegistry {
    pub fn new(page_size: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            page_size,
            idle_timeout,
        }
    }

    /// Starts a session on page 0 and returns its id with the first render.
    pub fn open(
        &self,
        title: impl Into<String>,
        color: u32,
        items: Vec<PageItem>,
        note: Option<String>,
    ) -> (Uuid, MessagePayload) {
        let mut session = PaginationSession::new(title, color, items, self.page_size, Instant::now());
        if let Some(note) = note {
            session = session.with_note(note);
        }
        let id = session.id;
        let rendered = session.render();
        self.sessions.insert(id, session);
        (id, rendered)
    }

    pub fn attach_message(&self, id: &Uuid, handle: MessageHandle) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.message = Some(handle);
        }
    }

    pub fn navigate(&self, id: &Uuid, direction: Direction, now: Instant) -> NavigationOutcome {
        let Some(mut session) = self.sessions.get_mut(id) else {
            return NavigationOutcome::Expired;
        };
        if session.is_idle(now, self.idle_timeout) {
            session.expire();
        }
        let turned = match direction {
            Direction::Next => session.next(now),
            Direction::Previous => session.previous(now),
        };
        let rejected = match turned {
            PageTurn::Moved(_) => None,
            PageTurn::AtBoundary(boundary) => Some(NavigationOutcome::AtBoundary(boundary)),
            PageTurn::Expired => Some(NavigationOutcome::Expired),
        };
        rejected.unwrap_or_else(|| NavigationOutcome::Moved(session.render()))
    }

    /// Removes a session whose message is gone. Returns it in the expired state.
    pub fn expire(&self, id: &Uuid) -> Option<PaginationSession> {
        self.sessions.remove(id).map(|(_, mut session)| {
            session.expire();
            session
        })
    }

    /// Removes every session idle for at least the configured timeout.
    pub fn reap_idle(&self, now: Instant) -> Vec<PaginationSession> {
        let candidates: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_idle(now, self.idle_timeout))
            .map(|entry| *entry.key())
            .collect();

        candidates
            .into_iter()
            .filter_map(|id| {
                self.sessions
                    .remove_if(&id, |_, session| session.is_idle(now, self.idle_timeout))
            })
            .map(|(_, mut session)| {
                session.expire();
                session
            })
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
