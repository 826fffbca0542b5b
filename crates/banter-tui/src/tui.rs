//! Ratatui frontend for the chat client.
//!
//! Pure UI module: terminal lifecycle, rendering, and input → intent mapping.
//! All session state lives in `banter-client`; this module has no networking
//! dependencies.

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use std::io::{self, Stdout};

use banter_client::room_state::{ChatEntry, JoinPhase, RoomSessionState};
use banter_core::protocol::{validate_room_id, validate_username};

// ---------------------------------------------------------------------------
// UserIntent — result of processing user input
// ---------------------------------------------------------------------------

/// The result of processing a user input event.
#[derive(Debug)]
pub enum UserIntent {
    /// No action needed.
    None,
    /// The user wants to quit the application.
    Quit,
    /// Submit the form in create mode.
    CreateRoom { username: String },
    /// Submit the form in join mode.
    JoinRoom { username: String, room_id: String },
    /// Send a chat message (already trimmed, non-empty).
    SendChat(String),
}

// ---------------------------------------------------------------------------
// TUI-only state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormMode {
    Join,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormFocus {
    Username,
    RoomCode,
}

/// UI-layer state that lives alongside (but separate from) the session state.
struct TuiState {
    username_input: String,
    room_input: String,
    mode: FormMode,
    focus: FormFocus,
    /// Local validation error, shown in place of the server error.
    form_error: Option<String>,
    /// True between submitting the form and the server's verdict.
    submitted: bool,
    /// Composer buffer on the room screen.
    composer: String,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            username_input: String::new(),
            room_input: String::new(),
            mode: FormMode::Join,
            focus: FormFocus::Username,
            form_error: None,
            submitted: false,
            composer: String::new(),
        }
    }
}

const USERNAME_MAX: usize = 24;
const ROOM_CODE_MAX: usize = 19;

// ---------------------------------------------------------------------------
// Public API — Tui struct
// ---------------------------------------------------------------------------

/// Owns the ratatui terminal and all UI-layer state.
///
/// The client orchestrator ([`crate::client`]) drives this struct: call
/// [`Tui::render`] each frame, [`Tui::poll_and_handle_input`] to process
/// keyboard events, and [`Tui::on_state_changed`] when the session state
/// changed.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: TuiState,
}

impl Tui {
    /// Set up the terminal (raw mode, alternate screen) and return a ready `Tui`.
    pub fn setup() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            state: TuiState::default(),
        })
    }

    /// Restore the terminal to its original state.
    pub fn teardown(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// Draw the current frame.
    pub fn render(&mut self, gs: &RoomSessionState) -> io::Result<()> {
        self.terminal.draw(|f| ui(f, gs, &self.state))?;
        Ok(())
    }

    /// Poll for a keyboard event and, if one is available, translate it into
    /// a [`UserIntent`]. This never blocks — returns [`UserIntent::None`]
    /// immediately when no event is pending.
    pub fn poll_and_handle_input(&mut self, gs: &RoomSessionState) -> io::Result<UserIntent> {
        if !event::poll(std::time::Duration::from_millis(0))? {
            return Ok(UserIntent::None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(UserIntent::None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(UserIntent::None);
        }
        Ok(self.handle_key_event(key, gs))
    }

    /// Notify the UI that the session state changed.
    ///
    /// Unlocks the form after a server rejection so the user can resubmit.
    pub fn on_state_changed(&mut self, gs: &RoomSessionState) {
        if gs.last_error.is_some() {
            self.state.submitted = false;
        }
    }

    // -- private -----------------------------------------------------------

    fn handle_key_event(&mut self, key: KeyEvent, gs: &RoomSessionState) -> UserIntent {
        if gs.joined() {
            self.handle_room_key(key)
        } else {
            self.handle_form_key(key, gs)
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent, gs: &RoomSessionState) -> UserIntent {
        if key.code == KeyCode::Esc {
            return UserIntent::Quit;
        }
        if key.code == KeyCode::Enter {
            // One in-flight attempt at a time; a rejoin counts as one.
            if self.state.submitted || gs.phase == JoinPhase::Pending {
                return UserIntent::None;
            }
            return self.submit_form();
        }

        let tui = &mut self.state;
        match key.code {
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => {
                if tui.mode == FormMode::Join {
                    tui.focus = match tui.focus {
                        FormFocus::Username => FormFocus::RoomCode,
                        FormFocus::RoomCode => FormFocus::Username,
                    };
                }
                UserIntent::None
            }
            KeyCode::Left | KeyCode::Right => {
                tui.mode = match tui.mode {
                    FormMode::Join => FormMode::Create,
                    FormMode::Create => FormMode::Join,
                };
                if tui.mode == FormMode::Create {
                    tui.focus = FormFocus::Username;
                }
                UserIntent::None
            }
            KeyCode::Char(c) => {
                tui.form_error = None;
                match tui.focus {
                    FormFocus::Username => {
                        if tui.username_input.chars().count() < USERNAME_MAX {
                            tui.username_input.push(c);
                        }
                    }
                    FormFocus::RoomCode => {
                        if tui.room_input.chars().count() < ROOM_CODE_MAX {
                            tui.room_input.push(c);
                        }
                    }
                }
                UserIntent::None
            }
            KeyCode::Backspace => {
                tui.form_error = None;
                match tui.focus {
                    FormFocus::Username => {
                        tui.username_input.pop();
                    }
                    FormFocus::RoomCode => {
                        tui.room_input.pop();
                    }
                }
                UserIntent::None
            }
            _ => UserIntent::None,
        }
    }

    fn submit_form(&mut self) -> UserIntent {
        let tui = &mut self.state;
        let username = tui.username_input.trim().to_string();
        if let Err(e) = validate_username(&username) {
            tui.form_error = Some(e);
            return UserIntent::None;
        }

        match tui.mode {
            FormMode::Create => {
                tui.submitted = true;
                UserIntent::CreateRoom { username }
            }
            FormMode::Join => {
                let room_id = tui.room_input.trim().to_ascii_uppercase();
                if let Err(e) = validate_room_id(&room_id) {
                    tui.form_error = Some(e);
                    return UserIntent::None;
                }
                tui.submitted = true;
                UserIntent::JoinRoom { username, room_id }
            }
        }
    }

    fn handle_room_key(&mut self, key: KeyEvent) -> UserIntent {
        let tui = &mut self.state;
        match key.code {
            KeyCode::Esc => UserIntent::Quit,
            KeyCode::Enter => {
                let text = tui.composer.trim().to_string();
                if text.is_empty() {
                    return UserIntent::None;
                }
                tui.composer.clear();
                UserIntent::SendChat(text)
            }
            KeyCode::Char(c) => {
                tui.composer.push(c);
                UserIntent::None
            }
            KeyCode::Backspace => {
                tui.composer.pop();
                UserIntent::None
            }
            _ => UserIntent::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn ui(frame: &mut Frame, gs: &RoomSessionState, tui: &TuiState) {
    if gs.joined() {
        render_room(frame, gs, tui);
    } else {
        render_form(frame, gs, tui);
    }
}

// -- form screen ------------------------------------------------------------

fn render_form(frame: &mut Frame, gs: &RoomSessionState, tui: &TuiState) {
    let area = centered_rect(54, 14, frame.area());

    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(" banter ")
        .title_style(
            Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        );
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // mode line
            Constraint::Length(3), // username
            Constraint::Length(3), // room code
            Constraint::Length(1), // status
            Constraint::Length(1), // spacer
            Constraint::Length(1), // footer
        ])
        .split(inner);

    // Mode toggle
    let (join_style, create_style) = if tui.mode == FormMode::Join {
        (selected_style(), Style::default().fg(Color::DarkGray))
    } else {
        (Style::default().fg(Color::DarkGray), selected_style())
    };
    let mode_line = Line::from(vec![
        Span::raw("  "),
        Span::styled("[ Join room ]", join_style),
        Span::raw("  "),
        Span::styled("[ Create room ]", create_style),
    ]);
    frame.render_widget(Paragraph::new(mode_line), rows[0]);

    // Username input
    let username_focused = tui.focus == FormFocus::Username;
    frame.render_widget(
        input_widget(&tui.username_input, " Username ", username_focused),
        rows[1],
    );

    // Room code input (join mode only)
    if tui.mode == FormMode::Join {
        let room_focused = tui.focus == FormFocus::RoomCode;
        frame.render_widget(
            input_widget(&tui.room_input, " Room code ", room_focused),
            rows[2],
        );
    }

    // Status line: local validation error > server error > progress hint.
    let error = tui.form_error.as_deref().or(gs.last_error.as_deref());
    let status = if let Some(message) = error {
        Line::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(Color::Red),
        ))
    } else if gs.phase == JoinPhase::Pending && !tui.submitted {
        Line::from(Span::styled(
            "  Resuming cached session...",
            Style::default().fg(Color::Yellow),
        ))
    } else if tui.submitted {
        Line::from(Span::styled(
            "  Waiting for the server...",
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(status), rows[3]);

    // Footer
    let footer = Line::from(vec![
        Span::styled("  Tab", key_style()),
        Span::raw(": field  "),
        Span::styled("←/→", key_style()),
        Span::raw(": mode  "),
        Span::styled("Enter", key_style()),
        Span::raw(": go  "),
        Span::styled("Esc", key_style()),
        Span::raw(": quit"),
    ]);
    frame.render_widget(Paragraph::new(footer), rows[5]);

    // Cursor in the focused input.
    let (input, row) = match tui.focus {
        FormFocus::Username => (&tui.username_input, rows[1]),
        FormFocus::RoomCode => (&tui.room_input, rows[2]),
    };
    frame.set_cursor_position((row.x + 1 + input.chars().count() as u16, row.y + 1));
}

fn input_widget<'a>(value: &'a str, title: &'a str, focused: bool) -> Paragraph<'a> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Paragraph::new(value).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    )
}

fn selected_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn key_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

// -- room screen ------------------------------------------------------------

fn render_room(frame: &mut Frame, gs: &RoomSessionState, tui: &TuiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(3),    // thread
            Constraint::Length(3), // composer
            Constraint::Length(1), // status bar
        ])
        .split(frame.area());

    // Header
    let header = Line::from(vec![
        Span::styled(
            " banter ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  Room: "),
        Span::styled(
            gs.room_id.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  You: "),
        Span::styled(gs.username.as_str(), Style::default().fg(Color::Cyan)),
    ]);
    frame.render_widget(Paragraph::new(header), rows[0]);

    render_thread(frame, gs, rows[1]);

    // Composer
    let composer = Paragraph::new(tui.composer.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Message "),
    );
    frame.render_widget(composer, rows[2]);
    frame.set_cursor_position((
        rows[2].x + 1 + tui.composer.chars().count() as u16,
        rows[2].y + 1,
    ));

    // Status bar
    let status_color = if gs.connected {
        Color::Green
    } else {
        Color::Red
    };
    let status_text = if gs.connected {
        "● Connected"
    } else {
        "● Disconnected"
    };
    let status = Paragraph::new(Line::from(vec![
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(" | "),
        Span::styled("Enter", key_style()),
        Span::raw(": send | "),
        Span::styled("Esc", key_style()),
        Span::raw(": quit"),
    ]));
    frame.render_widget(status, rows[3]);
}

fn render_thread(frame: &mut Frame, gs: &RoomSessionState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    if gs.messages.is_empty() {
        let placeholder = Paragraph::new("No messages yet... start the conversation!")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    // Show the newest messages that fit.
    let visible = area.height.saturating_sub(2) as usize;
    let start = gs.messages.len().saturating_sub(visible);
    let items: Vec<ListItem> = gs.messages[start..]
        .iter()
        .map(|entry| thread_item(entry, &gs.username))
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn thread_item<'a>(entry: &'a ChatEntry, our_name: &str) -> ListItem<'a> {
    let mut spans = vec![Span::styled(
        format!("[{}] ", format_timestamp(entry.timestamp)),
        Style::default().fg(Color::DarkGray),
    )];

    // The server packs messages as "sender: content"; highlight our own.
    match entry.content.split_once(':') {
        Some((sender, rest)) => {
            let is_ours = sender.trim() == our_name;
            let sender_style = if is_ours {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            spans.push(Span::styled(sender, sender_style));
            spans.push(Span::raw(":"));
            spans.push(Span::raw(rest));
        }
        None => spans.push(Span::raw(entry.content.as_str())),
    }

    ListItem::new(Line::from(spans))
}

/// `HH:MM` in local time, for display only.
fn format_timestamp(epoch_ms: i64) -> String {
    use chrono::TimeZone;
    match chrono::Local.timestamp_millis_opt(epoch_ms) {
        chrono::LocalResult::Single(dt) => dt.format("%H:%M").to_string(),
        _ => "--:--".to_string(),
    }
}

// -- helpers ----------------------------------------------------------------

/// A `width` x `height` rect centered in `r`, clamped to fit.
fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}
