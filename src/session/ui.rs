//! Terminal view of a live session.
//!
//! `LiveView` is the observer the controller reports to; `SessionTui` draws
//! its contents and turns key presses into session gestures.

use std::io::{stdout, Stdout};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Padding, Paragraph},
};

use super::observer::{ChatMessage, MessageKind, SessionObserver};
use super::state::SessionState;
use super::timer::format_elapsed;
use crate::emotion::{risk_color, state_color, EmotionTracker, RiskLevel};

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const DIM: Color = Color::Rgb(100, 100, 100);
const ACCENT: Color = Color::Rgb(185, 207, 212);
const ERROR_FG: Color = Color::Rgb(0xef, 0x44, 0x44);

/// Oldest lines are dropped past this many messages.
const MAX_VISIBLE_MESSAGES: usize = 200;

/// What a key press asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Continue,
    /// Enter
    Send,
    /// Escape, `q` or Ctrl+C
    End,
}

#[derive(Debug, Default)]
struct LiveViewState {
    messages: Vec<ChatMessage>,
    elapsed: Duration,
    state: SessionState,
    tracker: EmotionTracker,
}

/// Collects everything the controller reports for display.
#[derive(Debug, Default)]
pub struct LiveView {
    inner: Mutex<LiveViewState>,
}

impl LiveView {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LiveViewState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }
}

impl SessionObserver for LiveView {
    fn chat(&self, message: ChatMessage) {
        let mut view = self.lock();
        let pending = view
            .messages
            .last()
            .is_some_and(|m| m.kind == MessageKind::Pending);

        match message.kind {
            // The transcription replaces the placeholder.
            MessageKind::User if pending => {
                if let Some(last) = view.messages.last_mut() {
                    *last = message;
                }
                return;
            }
            MessageKind::Bot | MessageKind::Error | MessageKind::System if pending => {
                if let Some(last) = view.messages.last_mut() {
                    last.kind = MessageKind::User;
                    last.text = "(voice message)".to_string();
                }
            }
            _ => {}
        }

        view.messages.push(message);
        if view.messages.len() > MAX_VISIBLE_MESSAGES {
            let excess = view.messages.len() - MAX_VISIBLE_MESSAGES;
            view.messages.drain(..excess);
        }
    }

    fn emotion(&self, state: &str, risk: RiskLevel) {
        self.lock().tracker.record(state, risk, Local::now());
    }

    fn timer(&self, elapsed: Duration) {
        self.lock().elapsed = elapsed;
    }

    fn state_changed(&self, state: SessionState) {
        let mut view = self.lock();
        if view.state == SessionState::Idle && state == SessionState::Active {
            view.tracker.start(Local::now());
            view.elapsed = Duration::ZERO;
        }
        view.state = state;
    }
}

/// Alternate-screen UI for a live session.
pub struct SessionTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    device_label: String,
}

impl SessionTui {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new(device_label: &str) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            device_label: device_label.to_string(),
        })
    }

    /// Waits up to 50ms for a key and maps it to a command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> anyhow::Result<SessionCommand> {
        if !event::poll(Duration::from_millis(50))? {
            return Ok(SessionCommand::Continue);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(SessionCommand::Continue);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(SessionCommand::Continue);
        }

        Ok(match key.code {
            KeyCode::Enter => {
                tracing::debug!("Enter pressed: sending turn");
                SessionCommand::Send
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                tracing::debug!("Escape or 'q' pressed: ending session");
                SessionCommand::End
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                tracing::debug!("Ctrl+C pressed: ending session");
                SessionCommand::End
            }
            _ => SessionCommand::Continue,
        })
    }

    /// Draws the current contents of `view`.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, view: &LiveView) -> anyhow::Result<()> {
        let snapshot = view.lock();
        let device_label = self.device_label.as_str();

        self.terminal.draw(|frame| {
            let area = frame.area();
            frame.render_widget(Block::default().style(Style::default().bg(BG)), area);

            let [header_area, body_area, footer_area] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .areas(area);

            let [chat_area, side_area] =
                Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)])
                    .areas(body_area);

            frame.render_widget(header(&snapshot, device_label), header_area);
            render_chat(frame, chat_area, &snapshot.messages);
            frame.render_widget(emotion_panel(&snapshot.tracker), side_area);

            let help = match snapshot.state {
                SessionState::Processing => "waiting for reply... / q end",
                _ => "↵ send / q end",
            };
            frame.render_widget(
                Paragraph::new(help)
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(DIM)),
                footer_area,
            );
        })?;

        Ok(())
    }

    /// Restores the terminal.
    ///
    /// # Errors
    /// - If the terminal mode cannot be restored
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for SessionTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn header(view: &LiveViewState, device_label: &str) -> Paragraph<'static> {
    let indicator = match view.state {
        SessionState::Active => Span::styled("● LIVE ", Style::default().fg(Color::Red)),
        SessionState::Processing => {
            Span::styled("◌ PROCESSING ", Style::default().fg(Color::Yellow))
        }
        SessionState::Idle => Span::styled("○ IDLE ", Style::default().fg(DIM)),
    };

    Paragraph::new(Line::from(vec![
        indicator,
        Span::raw(format_elapsed(view.elapsed)),
        Span::styled(format!("  {device_label}"), Style::default().fg(DIM)),
    ]))
    .style(Style::default().fg(ACCENT).bg(BG))
}

fn render_chat(frame: &mut Frame, area: Rect, messages: &[ChatMessage]) {
    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .padding(Padding::horizontal(1))
        .style(Style::default().fg(FG).bg(BG));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width.max(1) as usize;
    let mut lines: Vec<Line> = Vec::new();
    for message in messages {
        let (sender_style, text_style) = message_styles(message);
        let prefix = format!("{}: ", message.sender);
        let wrapped = wrap_text(&message.text, width.saturating_sub(prefix.len()).max(10));
        for (i, chunk) in wrapped.into_iter().enumerate() {
            let lead = if i == 0 {
                Span::styled(prefix.clone(), sender_style)
            } else {
                Span::raw(" ".repeat(prefix.len()))
            };
            lines.push(Line::from(vec![lead, Span::styled(chunk, text_style)]));
        }
        if let (Some(state), Some(risk)) = (&message.state, message.risk) {
            lines.push(Line::from(vec![
                Span::raw(" ".repeat(prefix.len())),
                Span::styled(state.clone(), Style::default().fg(state_color(state))),
                Span::styled(" / ", Style::default().fg(DIM)),
                Span::styled(risk.to_string(), Style::default().fg(risk_color(risk))),
            ]));
        }
    }

    // Keep the newest lines in view.
    let skip = lines.len().saturating_sub(inner.height as usize);
    let visible: Vec<Line> = lines.into_iter().skip(skip).collect();
    frame.render_widget(Paragraph::new(visible), inner);
}

fn message_styles(message: &ChatMessage) -> (Style, Style) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match message.kind {
        MessageKind::User => (bold.fg(FG), Style::default().fg(FG)),
        MessageKind::Pending => (bold.fg(DIM), Style::default().fg(DIM).add_modifier(Modifier::ITALIC)),
        MessageKind::Bot => (bold.fg(ACCENT), Style::default().fg(ACCENT)),
        MessageKind::System => (bold.fg(DIM), Style::default().fg(DIM)),
        MessageKind::Error => (bold.fg(ERROR_FG), Style::default().fg(ERROR_FG)),
    }
}

fn emotion_panel(tracker: &EmotionTracker) -> Paragraph<'static> {
    let (state, risk) = tracker.current();
    let dominant = tracker.dominant_state().to_string();
    let label = |text: &str| Span::styled(text.to_string(), Style::default().fg(DIM));

    Paragraph::new(vec![
        Line::from(vec![
            label("State     "),
            Span::styled(state.to_string(), Style::default().fg(state_color(state))),
        ]),
        Line::from(vec![
            label("Risk      "),
            Span::styled(risk.to_string(), Style::default().fg(risk_color(risk))),
        ]),
        Line::raw(""),
        Line::from(vec![
            label("Dominant  "),
            Span::styled(dominant.clone(), Style::default().fg(state_color(&dominant))),
        ]),
        Line::from(vec![
            label("Changes   "),
            Span::raw(tracker.state_changes().to_string()),
        ]),
        Line::from(vec![
            label("Duration  "),
            Span::raw(tracker.duration_label(Local::now())),
        ]),
    ])
    .block(
        Block::default()
            .title(" Emotion ")
            .borders(Borders::ALL)
            .padding(Padding::horizontal(1)),
    )
    .style(Style::default().fg(FG).bg(BG))
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(width)
                .map_or(word.len(), |(i, _)| i);
            lines.push(word[..split].to_string());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("hello world again", 11), vec!["hello world", "again"]);
        assert_eq!(wrap_text("", 5), vec![""]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_transcription_replaces_placeholder() {
        let view = LiveView::new();
        view.chat(ChatMessage::new("You", "Processing...", MessageKind::Pending));
        view.chat(ChatMessage::new("You", "I can't sleep", MessageKind::User));
        view.chat(ChatMessage::bot("I'm sorry to hear that.", None, None));

        let messages = view.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "I can't sleep");
        assert_eq!(messages[1].kind, MessageKind::Bot);
    }

    #[test]
    fn test_placeholder_without_transcription_is_settled() {
        let view = LiveView::new();
        view.chat(ChatMessage::new("You", "Processing...", MessageKind::Pending));
        view.chat(ChatMessage::error("Error processing input. Please try again."));

        let messages = view.messages();
        assert_eq!(messages[0].kind, MessageKind::User);
        assert_eq!(messages[0].text, "(voice message)");
    }

    #[test]
    fn test_emotion_updates_tracker() {
        let view = LiveView::new();
        view.state_changed(SessionState::Active);
        view.emotion("Anxiety", RiskLevel::Medium);
        view.emotion("Stress", RiskLevel::High);

        let inner = view.lock();
        assert_eq!(inner.tracker.current(), ("Stress", RiskLevel::High));
        assert_eq!(inner.tracker.state_changes(), 1);
    }
}
