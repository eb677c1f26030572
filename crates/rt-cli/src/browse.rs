//! Episode browser: the `rt browse` terminal UI.
//!
//! - A blocking task forwards terminal events into an `AppMessage` channel.
//! - Fetches run as spawned tasks and report back over the same channel.
//! - Player operations are awaited inline; their notifications arrive as
//!   toasts through a `ChannelNotifier`.
//! - A 50 ms UI tick drives the search debounce and toast expiry.

use std::io;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use rt_proto::protocol::Episode;
use rt_proto::state::{PlaybackState, PlayingType, Storage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::bridge::Bridge;
use crate::notify::{ChannelNotifier, Notification, Severity};
use crate::player::Player;
use crate::search::{Debouncer, EpisodeFeed, EpisodeRow, FeedKind, FetchRequest, EPISODE_LIMIT, SEARCH_DEBOUNCE};
use crate::theme::{self, C_ACCENT, C_LOADING, C_OFFSET};
use crate::widgets::episode_list::EpisodeList;
use crate::widgets::filter_input::{SearchAction, SearchInput};
use crate::widgets::toast::ToastManager;

const UI_TICK: Duration = Duration::from_millis(50);

pub enum AppMessage {
    Event(Event),
    Fetched(FetchRequest, Result<Vec<Episode>, String>),
}

pub struct Browser<B, S> {
    player: Player<B, S, ChannelNotifier>,
    api: ApiClient,
    state: PlaybackState,
    feed: EpisodeFeed,
    debouncer: Debouncer<String>,
    search: SearchInput,
    list: EpisodeList,
    toast: ToastManager,
    status_line: Option<String>,
    clipboard: Option<arboard::Clipboard>,
    opener: fn(&str) -> io::Result<()>,
    list_height: usize,
    should_quit: bool,
}

fn open_in_browser(url: &str) -> io::Result<()> {
    open::that_detached(url)
}

/// Run the browser until the user quits.
pub async fn run<B: Bridge, S: Storage>(bridge: B, store: S, api: ApiClient, live_url: String) -> anyhow::Result<()> {
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let player = Player::new(
        bridge,
        store,
        ChannelNotifier::new(notice_tx),
        crate::notify::Launch::UserInitiated,
        live_url,
    );
    Browser::new(player, api).run(notice_rx).await
}

impl<B: Bridge, S: Storage> Browser<B, S> {
    pub fn new(player: Player<B, S, ChannelNotifier>, api: ApiClient) -> Self {
        let state = player.load_state();
        Self {
            player,
            api,
            state,
            feed: EpisodeFeed::new(),
            debouncer: Debouncer::with_initial(SEARCH_DEBOUNCE, String::new()),
            search: SearchInput::new("search episodes"),
            list: EpisodeList::new(),
            toast: ToastManager::new(),
            status_line: None,
            clipboard: None,
            opener: open_in_browser,
            list_height: EPISODE_LIMIT,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self, mut notice_rx: mpsc::UnboundedReceiver<Notification>) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("browse: terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while !event_tx.is_closed() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        let initial = self.feed.set_query("");
        self.request(initial, &tx);

        let mut ui_tick = tokio::time::interval(UI_TICK);
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        let result = loop {
            if needs_redraw {
                if let Err(e) = terminal.draw(|f| self.draw(f)) {
                    break Err(e.into());
                }
            }
            needs_redraw = false;

            if self.should_quit {
                break Ok(());
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg, &tx).await;
                }
                Some(notice) = notice_rx.recv() => {
                    self.on_notice(notice);
                    needs_redraw = true;
                }
                _ = ui_tick.tick() => {
                    needs_redraw = self.tick(Instant::now(), &tx);
                }
            }
        };

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    /// Debounce and toast upkeep.  Returns whether to redraw.
    fn tick(&mut self, now: Instant, tx: &mpsc::Sender<AppMessage>) -> bool {
        let had_toasts = !self.toast.is_empty();
        self.toast.tick(now);
        let mut redraw = had_toasts;
        if let Some(query) = self.debouncer.poll(now) {
            debug!("browse: settled query {:?}", query);
            let request = self.feed.set_query(&query);
            self.request(request, tx);
            self.sync_list();
            redraw = true;
        }
        redraw
    }

    fn request(&self, request: FetchRequest, tx: &mpsc::Sender<AppMessage>) {
        let api = self.api.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = match request.kind {
                FeedKind::Latest => api.latest_episodes(EPISODE_LIMIT).await,
                FeedKind::Search => api.search_episodes(&request.query, EPISODE_LIMIT).await,
            };
            let result = result.map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::Fetched(request, result)).await;
        });
    }

    fn on_notice(&mut self, notice: Notification) {
        if notice.hud {
            self.status_line = Some(notice.message);
        } else {
            self.toast.push(notice.message, notice.severity);
        }
    }

    fn sync_list(&mut self) {
        let episodes = self.feed.displayed();
        self.list.sync(episodes.iter().map(|e| e.file_name.as_str()));
    }

    fn selected_episode(&self) -> Option<&Episode> {
        self.feed.displayed().get(self.list.selected_index()?)
    }

    pub async fn handle_message(&mut self, msg: AppMessage, tx: &mpsc::Sender<AppMessage>) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key, tx).await;
                true
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Fetched(request, Ok(episodes)) => {
                debug!("browse: {:?} {:?} -> {} episodes", request.kind, request.query, episodes.len());
                if self.feed.apply(&request, episodes) {
                    self.sync_list();
                }
                true
            }
            AppMessage::Fetched(request, Err(e)) => {
                warn!("browse: fetch {:?} failed: {}", request.kind, e);
                self.feed.fail(&request);
                self.toast.push("Failed to load episodes", Severity::Failure);
                true
            }
        }
    }

    async fn handle_key(&mut self, key: KeyEvent, tx: &mpsc::Sender<AppMessage>) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.search.is_active() {
            match self.search.handle_key(key) {
                SearchAction::Changed(text) => self.debouncer.push(text, Instant::now()),
                SearchAction::Confirmed | SearchAction::Closed | SearchAction::None => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('/') => self.search.activate(),
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(1),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
            KeyCode::Char('r') => {
                let request = self.feed.set_query(self.search.text());
                self.request(request, tx);
            }
            KeyCode::Enter => self.play_selected().await,
            KeyCode::Char(' ') => {
                self.player.toggle(&mut self.state).await;
            }
            KeyCode::Char('s') => {
                let had_stream = self.state.stream_id.is_some();
                self.player.stop(&mut self.state).await;
                if had_stream {
                    self.toast.push("Stopped playing", Severity::Success);
                }
            }
            KeyCode::Char('y') => self.copy_selected_url(),
            KeyCode::Char('o') => self.open_selected_url(),
            _ => {}
        }
    }

    async fn play_selected(&mut self) {
        let Some(episode) = self.selected_episode().cloned() else {
            return;
        };
        if self.player.stream_episode(&mut self.state, &episode).await.is_some() {
            info!("browse: playing {}", episode.title);
            self.toast.push(format!("Playing {}", episode.title), Severity::Success);
        }
    }

    fn copy_selected_url(&mut self) {
        let Some(url) = self.selected_episode().map(|e| e.url.clone()) else {
            return;
        };
        if self.clipboard.is_none() {
            match arboard::Clipboard::new() {
                Ok(cb) => self.clipboard = Some(cb),
                Err(e) => {
                    warn!("browse: clipboard unavailable: {}", e);
                    self.toast.push("Clipboard unavailable", Severity::Failure);
                    return;
                }
            }
        }
        let copied = self.clipboard.as_mut().map(|cb| cb.set_text(url.clone()));
        match copied {
            Some(Ok(())) => self.toast.push("Copied episode URL", Severity::Success),
            Some(Err(e)) => {
                warn!("browse: copy failed: {}", e);
                self.toast.push("Failed to copy URL", Severity::Failure);
            }
            None => {}
        }
    }

    fn open_selected_url(&mut self) {
        let Some(url) = self.selected_episode().map(|e| e.url.clone()) else {
            return;
        };
        if url.is_empty() {
            self.toast.push("Episode has no page", Severity::Failure);
            return;
        }
        if let Err(e) = (self.opener)(&url) {
            warn!("browse: open {} failed: {}", url, e);
            self.toast.push("Failed to open browser", Severity::Failure);
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(rows[1]);

        self.search.draw(frame, rows[0]);
        self.draw_list(frame, panes[0]);
        self.draw_detail(frame, panes[1]);
        self.draw_status(frame, rows[2]);
        self.toast.draw(frame, area);
    }

    fn list_title(&self) -> Line<'static> {
        let mut spans = vec![Span::styled(
            match self.feed.mode() {
                FeedKind::Latest => " Latest episodes ".to_string(),
                FeedKind::Search => format!(" Search: {} ", self.feed.query()),
            },
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        )];
        if self.feed.is_loading() || self.debouncer.is_pending() {
            spans.push(Span::styled("loading… ", Style::default().fg(C_LOADING)));
        }
        Line::from(spans)
    }

    fn is_current(&self, episode: &Episode) -> bool {
        self.state.playing_type == PlayingType::Episode
            && self
                .state
                .episode
                .as_ref()
                .is_some_and(|e| e.file_name == episode.file_name)
    }

    fn draw_list(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::style_border(!self.search.is_active()))
            .title(self.list_title());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        self.list_height = inner.height as usize;
        self.list.ensure_visible(self.list_height);

        let episodes = self.feed.displayed();
        if episodes.is_empty() {
            let msg = if self.feed.is_loading() { "" } else { "No episodes found" };
            frame.render_widget(Paragraph::new(msg).style(theme::style_muted()), inner);
            return;
        }

        let lines: Vec<Line> = self
            .list
            .visible_range(self.list_height)
            .filter_map(|i| episodes.get(i).map(|e| (i, e)))
            .map(|(i, e)| {
                let row = EpisodeRow::from(e);
                let marker = if self.is_current(e) {
                    if self.state.is_playing {
                        "▶ "
                    } else {
                        "⏸ "
                    }
                } else {
                    "  "
                };
                let style = if Some(i) == self.list.selected_index() {
                    theme::style_selected()
                } else {
                    theme::style_default()
                };
                Line::from(vec![
                    Span::styled(marker, theme::style_playing()),
                    Span::styled(row.title, style),
                    Span::styled(format!("  {}", row.date), theme::style_secondary()),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_detail(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::style_border(false))
            .title(" Topics ");
        let Some(episode) = self.selected_episode() else {
            frame.render_widget(block, area);
            return;
        };
        let row = EpisodeRow::from(episode);

        let mut lines = vec![
            Line::from(Span::styled(
                row.title.clone(),
                theme::style_default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(row.date.clone(), theme::style_secondary())),
            Line::default(),
        ];
        lines.extend(row.topics.iter().map(|t| {
            Line::from(vec![
                Span::styled(format!("{}  ", t.offset), Style::default().fg(C_OFFSET)),
                Span::styled(t.title.clone(), theme::style_default()),
            ])
        }));
        if !episode.url.is_empty() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(episode.url.clone(), theme::style_muted())));
        }
        frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let now_playing = self.state.describe();
        let mut spans = vec![Span::styled(
            format!(" {} ", now_playing),
            if self.state.is_playing {
                theme::style_playing()
            } else {
                theme::style_secondary()
            },
        )];
        if let Some(msg) = &self.status_line {
            spans.push(Span::styled(format!("│ {} ", msg), theme::style_default()));
        }
        spans.push(Span::styled(
            "│ / search  ⏎ play  ␣ pause  s stop  o open  y copy  q quit",
            theme::style_muted(),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::config_for;
    use crate::bridge::fake::{Call, FakeBridge};
    use ratatui::backend::TestBackend;
    use rt_proto::state::MemoryStore;

    type TestBrowser = Browser<FakeBridge, MemoryStore>;

    fn browser() -> (TestBrowser, mpsc::UnboundedReceiver<Notification>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let player = Player::new(
            FakeBridge::new(),
            MemoryStore::new(),
            ChannelNotifier::new(notice_tx),
            crate::notify::Launch::UserInitiated,
            "https://stream.radio-t.com",
        );
        // never contacted by these tests
        let api = ApiClient::new(&config_for("http://127.0.0.1:9")).unwrap();
        (Browser::new(player, api), notice_rx)
    }

    fn episode(n: u32) -> Episode {
        Episode {
            title: format!("Радио-Т {n}"),
            file_name: format!("rt_podcast{n}"),
            url: format!("https://radio-t.com/p/podcast-{n}/"),
            audio_url: format!("https://cdn.radio-t.com/rt_podcast{n}.mp3"),
            date: "2026-10-17T12:00:00Z".to_string(),
            ..Episode::default()
        }
    }

    fn key(code: KeyCode) -> AppMessage {
        AppMessage::Event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    async fn load_latest(b: &mut TestBrowser, tx: &mpsc::Sender<AppMessage>) {
        let request = b.feed.set_query("");
        b.handle_message(AppMessage::Fetched(request, Ok(vec![episode(903), episode(902)])), tx)
            .await;
    }

    #[tokio::test]
    async fn test_enter_streams_selected_episode() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        load_latest(&mut b, &tx).await;

        b.handle_message(key(KeyCode::Down), &tx).await;
        b.handle_message(key(KeyCode::Enter), &tx).await;

        assert_eq!(b.state.playing_type, PlayingType::Episode);
        assert_eq!(
            b.state.episode.as_ref().map(|e| e.file_name.as_str()),
            Some("rt_podcast902")
        );
        assert!(b.player.bridge().calls().contains(&Call::Start {
            url: episode(902).audio_url,
            label: format!("Radio-T: {}", episode(902).audio_url),
        }));
    }

    #[tokio::test]
    async fn test_space_toggles_and_s_stops() {
        let (mut b, mut notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        load_latest(&mut b, &tx).await;
        b.handle_message(key(KeyCode::Enter), &tx).await;

        b.handle_message(key(KeyCode::Char(' ')), &tx).await;
        assert!(!b.state.is_playing);
        assert_eq!(notices.try_recv().unwrap().message, "Playback paused");

        b.handle_message(key(KeyCode::Char('s')), &tx).await;
        assert_eq!(b.state, PlaybackState::default());
        assert_eq!(b.player.load_state(), PlaybackState::default());
    }

    #[tokio::test]
    async fn test_typing_searches_after_debounce() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        load_latest(&mut b, &tx).await;

        b.handle_message(key(KeyCode::Char('/')), &tx).await;
        for c in ['r', 'u', 's', 't'] {
            b.handle_message(key(KeyCode::Char(c)), &tx).await;
        }
        // still showing the latest episodes until the query settles
        assert_eq!(b.feed.mode(), FeedKind::Latest);
        assert_eq!(b.feed.displayed().len(), 2);

        let later = Instant::now() + SEARCH_DEBOUNCE + Duration::from_millis(10);
        assert!(b.tick(later, &tx));
        assert_eq!(b.feed.mode(), FeedKind::Search);
        assert_eq!(b.feed.query(), "rust");
        assert!(b.feed.is_loading());

        let request = FetchRequest {
            kind: FeedKind::Search,
            query: "rust".to_string(),
        };
        b.handle_message(AppMessage::Fetched(request, Ok(vec![episode(850)])), &tx)
            .await;
        assert_eq!(b.selected_episode().map(|e| e.title.as_str()), Some("Радио-Т 850"));
    }

    thread_local! {
        static OPENED: std::cell::RefCell<Vec<String>> = const { std::cell::RefCell::new(Vec::new()) };
    }

    fn record_open(url: &str) -> io::Result<()> {
        OPENED.with(|o| o.borrow_mut().push(url.to_string()));
        Ok(())
    }

    fn refuse_open(_: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no opener"))
    }

    #[tokio::test]
    async fn test_o_opens_episode_page() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        b.opener = record_open;
        load_latest(&mut b, &tx).await;

        b.handle_message(key(KeyCode::Down), &tx).await;
        b.handle_message(key(KeyCode::Char('o')), &tx).await;

        assert_eq!(OPENED.with(|o| o.borrow().clone()), vec![episode(902).url]);
        assert!(b.toast.is_empty());
    }

    #[tokio::test]
    async fn test_o_reports_open_failure() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        b.opener = refuse_open;

        // nothing selected yet
        b.handle_message(key(KeyCode::Char('o')), &tx).await;
        assert!(b.toast.is_empty());

        load_latest(&mut b, &tx).await;
        b.handle_message(key(KeyCode::Char('o')), &tx).await;
        assert!(!b.toast.is_empty());
    }

    #[tokio::test]
    async fn test_q_quits_only_outside_search() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);

        b.handle_message(key(KeyCode::Char('/')), &tx).await;
        b.handle_message(key(KeyCode::Char('q')), &tx).await;
        assert!(!b.should_quit);
        assert_eq!(b.search.text(), "q");

        b.handle_message(key(KeyCode::Enter), &tx).await;
        b.handle_message(key(KeyCode::Char('q')), &tx).await;
        assert!(b.should_quit);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_rows() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        load_latest(&mut b, &tx).await;

        let request = b.feed.set_query("");
        b.handle_message(AppMessage::Fetched(request, Err("offline".into())), &tx)
            .await;
        assert_eq!(b.feed.displayed().len(), 2);
        assert!(!b.toast.is_empty());
    }

    #[tokio::test]
    async fn test_draw_shows_rows_and_topics() {
        let (mut b, _notices) = browser();
        let (tx, _rx) = mpsc::channel(8);
        let mut with_topics = episode(903);
        with_topics.time_labels = vec![rt_proto::protocol::TimeLabel {
            topic: "Вступление".to_string(),
            duration: 600,
            ..Default::default()
        }];
        let request = b.feed.set_query("");
        b.handle_message(AppMessage::Fetched(request, Ok(vec![with_topics])), &tx)
            .await;

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| b.draw(f)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Latest episodes"));
        assert!(screen.contains(&crate::search::format_date("2026-10-17T12:00:00Z")));
        assert!(screen.contains("00:00:00"));
        assert!(screen.contains("Nothing playing"));
    }
}
