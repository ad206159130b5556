//! App state and main loop: key handling, applying server frames, and drawing.

use std::{io, time::Duration};

use chrono::{DateTime, Local};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    Terminal,
};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;

use crate::types::{ActionKind, ClientCommand, Node, ServerMessage, ViewMessage};
use crate::ui::footer::{draw_footer, FooterState};
use crate::ui::header::draw_header;
use crate::ui::nodes::{
    draw_nodes, keep_visible, nodes_handle_mouse, selection_handle_key, sorted, viewport_rows,
    SortBy,
};
use crate::ui::util::parent_location;
use crate::ws::{connect, parse_frame, send_command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Browse,
    Search,
}

pub struct App {
    url: String,
    view: Option<ViewMessage>,
    last_update: Option<DateTime<Local>>,

    pub selected: usize,
    pub scroll_offset: usize,
    pub sort_by: SortBy,
    pub mode: InputMode,
    pub search: String,
    /// Name of the focused group, if any.
    pub focused: Option<String>,
    pub status: Option<String>,

    should_quit: bool,
    last_table_area: Option<Rect>,
}

impl App {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            view: None,
            last_update: None,
            selected: 0,
            scroll_offset: 0,
            sort_by: SortBy::default(),
            mode: InputMode::Browse,
            search: String::new(),
            focused: None,
            status: None,
            should_quit: false,
            last_table_area: None,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn location(&self) -> &str {
        self.view.as_ref().map(|v| v.location.as_str()).unwrap_or("/")
    }

    /// Nodes in display order.
    pub fn visible_nodes(&self) -> Vec<&Node> {
        match &self.view {
            Some(v) => sorted(&v.nodes, self.sort_by),
            None => Vec::new(),
        }
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.visible_nodes().get(self.selected).copied()
    }

    pub fn on_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::View(v) => {
                let total = v.nodes.len();
                self.view = Some(v);
                self.last_update = Some(Local::now());
                self.selected = self.selected.min(total.saturating_sub(1));
            }
            ServerMessage::Ack(a) => {
                let verb = match a.action {
                    ActionKind::Freeze => "freeze",
                    ActionKind::Unfreeze => "unfreeze",
                };
                self.status = Some(if a.ok {
                    format!("{verb} {} ok", a.target)
                } else {
                    format!(
                        "{verb} {} failed: {}",
                        a.target,
                        a.error.unwrap_or_else(|| "unknown error".into())
                    )
                });
            }
        }
    }

    fn navigate(&mut self, path: String) -> ClientCommand {
        let mut cmd = ClientCommand::navigate(path);
        if self.focused.take().is_some() {
            cmd.focus = Some(String::new());
        }
        self.search.clear();
        self.selected = 0;
        self.scroll_offset = 0;
        cmd
    }

    /// Apply a key press; returns the command to send to the agent, if any.
    pub fn handle_key(&mut self, key: KeyEvent, page: usize) -> Option<ClientCommand> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }
        if self.mode == InputMode::Search {
            return match key.code {
                KeyCode::Char(c) => {
                    self.search.push(c);
                    self.selected = 0;
                    Some(ClientCommand::search(self.search.clone()))
                }
                KeyCode::Backspace => {
                    self.search.pop();
                    Some(ClientCommand::search(self.search.clone()))
                }
                KeyCode::Enter => {
                    self.mode = InputMode::Browse;
                    None
                }
                KeyCode::Esc => {
                    self.mode = InputMode::Browse;
                    self.search.clear();
                    Some(ClientCommand::search(""))
                }
                _ => None,
            };
        }

        let total = self.visible_nodes().len();
        if selection_handle_key(&mut self.selected, key, page, total) {
            return None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Enter | KeyCode::Right => {
                let path = self.selected_node()?.path.clone();
                Some(self.navigate(path))
            }
            KeyCode::Backspace | KeyCode::Left => {
                let parent = parent_location(self.location())?;
                Some(self.navigate(parent))
            }
            KeyCode::Char('/') => {
                self.mode = InputMode::Search;
                None
            }
            KeyCode::Char('f') => {
                let node = self.selected_node()?;
                let (name, ident) = (node.name.clone(), node.identifier.clone());
                self.focused = Some(name);
                self.selected = 0;
                Some(ClientCommand::focus(ident))
            }
            KeyCode::Char('F') => self.focused.take().map(|_| ClientCommand::focus("")),
            KeyCode::Esc => {
                if self.focused.take().is_some() {
                    Some(ClientCommand::focus(""))
                } else if !self.search.is_empty() {
                    self.search.clear();
                    Some(ClientCommand::search(""))
                } else {
                    self.status = None;
                    None
                }
            }
            KeyCode::Char('z') => {
                let node = self.selected_node()?;
                let kind = if node.frozen {
                    ActionKind::Unfreeze
                } else {
                    ActionKind::Freeze
                };
                Some(ClientCommand::action(kind, node.path.clone()))
            }
            KeyCode::Char('s') => {
                self.sort_by = self.sort_by.next();
                None
            }
            _ => None,
        }
    }

    pub async fn run(&mut self, tls_ca: Option<&str>) -> anyhow::Result<()> {
        let ws = connect(&self.url, tls_ca).await?;
        let (mut sink, mut stream) = ws.split();

        // Frames arrive on the agent's cadence; the UI drains them between draws
        let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                match msg {
                    Message::Text(t) => {
                        if let Some(m) = parse_frame(&t) {
                            if tx.send(m).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let res = self.event_loop(&mut terminal, &mut sink, &mut rx).await;

        disable_raw_mode()?;
        let backend = terminal.backend_mut();
        execute!(backend, DisableMouseCapture, LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        reader.abort();

        res
    }

    async fn event_loop<B, S>(
        &mut self,
        terminal: &mut Terminal<B>,
        sink: &mut S,
        rx: &mut mpsc::Receiver<ServerMessage>,
    ) -> anyhow::Result<()>
    where
        B: ratatui::backend::Backend,
        S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        loop {
            let mut outgoing = Vec::new();
            while event::poll(Duration::from_millis(10))? {
                match event::read()? {
                    Event::Key(k) => {
                        let page = self.last_table_area.map(viewport_rows).unwrap_or(10);
                        if let Some(cmd) = self.handle_key(k, page) {
                            outgoing.push(cmd);
                        }
                    }
                    Event::Mouse(m) => {
                        if let Some(area) = self.last_table_area {
                            let total = self.visible_nodes().len();
                            if let Some(s) =
                                nodes_handle_mouse(&mut self.selected, m, area, self.scroll_offset, total)
                            {
                                self.sort_by = s;
                            }
                        }
                    }
                    _ => {}
                }
            }
            if self.should_quit {
                break;
            }
            for cmd in &outgoing {
                send_command(sink, cmd).await?;
            }

            loop {
                match rx.try_recv() {
                    Ok(m) => self.on_message(m),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        anyhow::bail!("connection to {} closed", self.url);
                    }
                }
            }

            terminal.draw(|f| self.draw(f))?;
            sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // header
                Constraint::Min(5),    // table
                Constraint::Length(1), // footer
            ])
            .split(f.area());

        draw_header(f, rows[0], &self.url, self.view.as_ref(), self.last_update);

        let title = match (&self.focused, self.search.is_empty()) {
            (Some(name), _) => format!("Focus: {name}"),
            (None, false) => format!("Search: {}", self.search),
            (None, true) => format!("Groups under {}", self.location()),
        };
        let table_area = rows[1];
        self.last_table_area = Some(table_area);
        keep_visible(&mut self.scroll_offset, self.selected, viewport_rows(table_area));
        let nodes = self.visible_nodes();
        draw_nodes(f, table_area, &title, &nodes, self.selected, self.scroll_offset, self.sort_by);

        let footer = if self.mode == InputMode::Search {
            FooterState::Searching(&self.search)
        } else if let Some(s) = &self.status {
            FooterState::Status(s)
        } else {
            FooterState::Hints
        };
        draw_footer(f, rows[2], footer);
    }
}
