use crate::views::{
    DashboardView, DebugView, IntegrationsView, MemoryView, NotesView, VoiceView,
};
use alex_core::topics::{self, commands};
use alex_core::{BusClient, ConnectionState};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const FAST_REFRESH: Duration = Duration::from_secs(1);
const SLOW_REFRESH: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Page {
    Dashboard,
    Notes,
    Memory,
    Integrations,
    Voice,
    Debug,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Dashboard,
        Page::Notes,
        Page::Memory,
        Page::Integrations,
        Page::Voice,
        Page::Debug,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Notes => "Notes",
            Page::Memory => "Memory",
            Page::Integrations => "Integrations",
            Page::Voice => "Voice",
            Page::Debug => "Debug",
        }
    }

    pub fn index(self) -> usize {
        Page::ALL
            .iter()
            .position(|page| *page == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Self {
        Page::ALL[(self.index() + 1) % Page::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Page::ALL[(self.index() + Page::ALL.len() - 1) % Page::ALL.len()]
    }

    pub fn refresh_interval(self) -> Duration {
        match self {
            Page::Memory => SLOW_REFRESH,
            _ => FAST_REFRESH,
        }
    }

    /// Requests sent the first time a page is shown on a live connection.
    pub fn initial_requests(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Page::Dashboard => &[
                (topics::DASHBOARD_REQUEST, commands::GET),
                (topics::DASHBOARD_STATE_REQUEST, commands::ONE),
                (topics::BATTERY_REQUEST, commands::ONE),
            ],
            Page::Memory => &[
                (topics::MEMORY_BASE_REQUEST, commands::ONE),
                (topics::MEMORY_ACTIVITY_SEARCH, commands::SEARCH_ALL),
                (topics::HISTORY, commands::GET),
            ],
            Page::Voice => &[(topics::VOICE_LIST_REQUEST, commands::GET)],
            Page::Notes | Page::Integrations | Page::Debug => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PageView {
    Dashboard(DashboardView),
    Notes(NotesView),
    Memory(MemoryView),
    Integrations(IntegrationsView),
    Voice(VoiceView),
    Debug(DebugView),
}

pub struct App {
    pub client: Arc<BusClient>,
    pub page: Page,
    pub view: PageView,
    pub connection: ConnectionState,
    pub status_note: Option<String>,
    pub help_open: bool,
    pub scroll: u16,
    pub selected_integration: usize,
    pub selected_voice: usize,
    requested: HashSet<Page>,
    last_refresh: Option<Instant>,
    quit: bool,
}

impl App {
    pub fn new(client: Arc<BusClient>) -> Self {
        let view = build_view(&client, Page::Dashboard);
        let connection = client.state();
        Self {
            client,
            page: Page::Dashboard,
            view,
            connection,
            status_note: None,
            help_open: false,
            scroll: 0,
            selected_integration: 0,
            selected_voice: 0,
            requested: HashSet::new(),
            last_refresh: None,
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Polls connection state, sends pending page requests, and rebuilds the
    /// current view once its refresh interval has elapsed.
    pub fn on_tick(&mut self, now: Instant) {
        let connection = self.client.state();
        if connection != self.connection {
            info!(event = "dashboard_connection", state = %connection);
            if connection.is_connected() {
                self.requested.clear();
                self.status_note = Some("broker connected".to_string());
            } else {
                self.status_note = Some("broker offline; showing last known data".to_string());
            }
            self.connection = connection;
        }
        self.send_initial_requests();

        let due = self
            .last_refresh
            .map(|at| now.saturating_duration_since(at) >= self.page.refresh_interval())
            .unwrap_or(true);
        if due {
            self.refresh(now);
        }
    }

    pub fn refresh(&mut self, now: Instant) {
        self.view = build_view(&self.client, self.page);
        self.last_refresh = Some(now);
        self.clamp_selection();
    }

    fn send_initial_requests(&mut self) {
        if !self.connection.is_connected() || self.requested.contains(&self.page) {
            return;
        }
        let mut accepted = true;
        for (topic, payload) in self.page.initial_requests() {
            accepted &= self.client.publish(topic, *payload);
        }
        if accepted {
            self.requested.insert(self.page);
        }
    }

    pub fn show_page(&mut self, page: Page) {
        if self.page == page {
            return;
        }
        self.page = page;
        self.scroll = 0;
        self.last_refresh = None;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return;
        }
        if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1)) {
            self.help_open = !self.help_open;
            return;
        }
        if self.help_open {
            if key.code == KeyCode::Esc {
                self.help_open = false;
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.show_page(self.page.next()),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                self.show_page(self.page.prev())
            }
            KeyCode::Char(digit @ '1'..='6') => {
                let index = digit as usize - '1' as usize;
                self.show_page(Page::ALL[index]);
            }
            KeyCode::Char('r') => {
                self.requested.remove(&self.page);
                self.last_refresh = None;
                self.status_note = Some(format!("{} refresh requested", self.page.title()));
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            code => self.handle_page_key(code),
        }
    }

    fn handle_page_key(&mut self, code: KeyCode) {
        match (self.page, code) {
            (Page::Dashboard, KeyCode::Char('s')) => {
                self.send(topics::AGENT_CONTROL, commands::AGENT_ON, "AGENTON")
            }
            (Page::Dashboard, KeyCode::Char('x')) => {
                self.send(topics::AGENT_CONTROL, commands::AGENT_OFF, "AGENTOFF")
            }
            (Page::Notes, KeyCode::Char('s')) => {
                self.send(topics::NOTE_CONTROL, commands::NOTE_ON, "recording start")
            }
            (Page::Notes, KeyCode::Char('x')) => {
                self.send(topics::NOTE_CONTROL, commands::NOTE_OFF, "recording stop")
            }
            (Page::Integrations, KeyCode::Enter) => {
                let integration = topics::INTEGRATIONS[self.selected_integration];
                let label = format!("{} auth", integration.name);
                self.send(topics::AUTH_REQUEST, integration.command, &label);
            }
            (Page::Voice, KeyCode::Enter) => {
                let PageView::Voice(view) = &self.view else {
                    return;
                };
                let Some(voice) = view.voices.get(self.selected_voice).cloned() else {
                    self.status_note = Some("no voices loaded".to_string());
                    return;
                };
                let label = format!("voice {voice}");
                self.send(topics::VOICE_SET, &voice, &label);
            }
            _ => {}
        }
    }

    fn send(&mut self, topic: &str, payload: &str, label: &str) {
        let note = if self.client.publish(topic, payload) {
            format!("{label} sent")
        } else {
            format!("offline; {label} dropped")
        };
        self.status_note = Some(note);
    }

    fn move_selection(&mut self, delta: i32) {
        match self.page {
            Page::Integrations => {
                self.selected_integration =
                    step(self.selected_integration, delta, topics::INTEGRATIONS.len());
            }
            Page::Voice => {
                let len = match &self.view {
                    PageView::Voice(view) => view.voices.len(),
                    _ => 0,
                };
                self.selected_voice = step(self.selected_voice, delta, len);
            }
            _ => {
                self.scroll = if delta < 0 {
                    self.scroll.saturating_sub(1)
                } else {
                    self.scroll.saturating_add(1)
                };
            }
        }
    }

    fn clamp_selection(&mut self) {
        if let PageView::Voice(view) = &self.view {
            if self.selected_voice >= view.voices.len() {
                self.selected_voice = view.voices.len().saturating_sub(1);
            }
        }
    }
}

fn step(current: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as i64 + i64::from(delta);
    next.clamp(0, len as i64 - 1) as usize
}

fn build_view(client: &BusClient, page: Page) -> PageView {
    let cache = client.cache();
    match page {
        Page::Dashboard => PageView::Dashboard(DashboardView::from_cache(cache)),
        Page::Notes => PageView::Notes(NotesView::from_cache(cache)),
        Page::Memory => PageView::Memory(MemoryView::from_cache(cache)),
        Page::Integrations => PageView::Integrations(IntegrationsView::from_cache(cache)),
        Page::Voice => PageView::Voice(VoiceView::from_cache(cache)),
        Page::Debug => PageView::Debug(DebugView::from_cache(cache, Utc::now())),
    }
}
