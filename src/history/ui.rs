//! Scrollable terminal view of a stored conversation.
//!
//! Shows each message with its sender, time and, for bot replies, the
//! emotional state and risk level the backend attached to it. The footer
//! summarises the conversation's emotional timeline.

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, HighlightSpacing, List, ListItem, ListState, Padding, Paragraph},
};
use std::io::{self, Stdout};
use std::time::Duration;

use crate::api::HistoryMessage;
use crate::emotion::{risk_color, state_color, EmotionTracker, RiskLevel};

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const META_FG: Color = Color::Rgb(100, 100, 100);
const BOT_FG: Color = Color::Rgb(185, 207, 212);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);

/// Read-only conversation browser.
pub struct ConversationViewer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    messages: Vec<HistoryMessage>,
    summary: String,
    list_state: ListState,
}

impl ConversationViewer {
    pub fn new(messages: Vec<HistoryMessage>, tracker: &EmotionTracker) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        let mut list_state = ListState::default();
        if !messages.is_empty() {
            list_state.select(Some(messages.len() - 1));
        }

        let (current, risk) = tracker.current();
        let summary = format!(
            "now: {current} ({risk}) / dominant: {} / changes: {}",
            tracker.dominant_state(),
            tracker.state_changes()
        );

        Ok(Self {
            terminal,
            messages,
            summary,
            list_state,
        })
    }

    /// Runs until the user exits with Esc or `q`.
    pub fn run(&mut self) -> Result<()> {
        tracing::debug!("Conversation viewer started with {} messages", self.messages.len());

        loop {
            self.draw()?;

            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Up | KeyCode::Char('k') => self.list_state.select_previous(),
                        KeyCode::Down | KeyCode::Char('j') => self.list_state.select_next(),
                        KeyCode::Home => self.list_state.select_first(),
                        KeyCode::End => self.list_state.select_last(),
                        _ => {}
                    },
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }

        self.cleanup()
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.list_state.select_previous(),
            MouseEventKind::ScrollDown => self.list_state.select_next(),
            _ => {}
        }
    }

    fn draw(&mut self) -> Result<()> {
        let summary = self.summary.clone();

        self.terminal.draw(|frame| {
            let area = frame.area();

            let padding_block = Block::default()
                .padding(Padding::uniform(1))
                .style(Style::default().bg(BG));
            frame.render_widget(&padding_block, area);
            let padded_area = padding_block.inner(area);

            let [list_area, summary_area, footer_area] = Layout::vertical([
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .areas(padded_area);

            let items: Vec<ListItem> = self.messages.iter().map(message_item).collect();

            let list = List::new(items)
                .block(
                    Block::default()
                        .title(" Conversation ")
                        .borders(Borders::ALL)
                        .style(Style::default().fg(FG).bg(BG)),
                )
                .highlight_style(Style::default().bg(HIGHLIGHT_BG))
                .highlight_symbol("> ")
                .highlight_spacing(HighlightSpacing::Always);
            frame.render_stateful_widget(list, list_area, &mut self.list_state);

            frame.render_widget(
                Paragraph::new(summary).style(Style::default().fg(BOT_FG)),
                summary_area,
            );
            frame.render_widget(
                Paragraph::new("↑↓ scroll, home/end jump, esc/q exit")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(META_FG)),
                footer_area,
            );
        })?;

        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn message_item(message: &HistoryMessage) -> ListItem<'static> {
    let mut meta = vec![Span::styled(
        message.sender.clone(),
        Style::default().fg(META_FG).add_modifier(Modifier::BOLD),
    )];
    if let Some(timestamp) = &message.timestamp {
        meta.push(Span::styled(format!("  {timestamp}"), Style::default().fg(META_FG)));
    }
    if let Some(state) = &message.state {
        let risk = message.risk_level.unwrap_or(RiskLevel::Low);
        meta.push(Span::raw("  "));
        meta.push(Span::styled(state.clone(), Style::default().fg(state_color(state))));
        meta.push(Span::raw(" / "));
        meta.push(Span::styled(risk.to_string(), Style::default().fg(risk_color(risk))));
    }

    let text_fg = if message.sender == "You" { FG } else { BOT_FG };
    ListItem::new(vec![
        Line::from(meta),
        Line::styled(message.text.clone(), Style::default().fg(text_fg)),
    ])
}

impl Drop for ConversationViewer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
