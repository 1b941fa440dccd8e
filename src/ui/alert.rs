//! Full-screen alerts for failures the user must acknowledge.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;

/// How loud an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Hardware or configuration failure; red
    Error,
    /// Something the user should know before continuing; amber
    Notice,
}

impl AlertKind {
    fn background(self) -> Color {
        match self {
            AlertKind::Error => Color::Rgb(200, 30, 30),
            AlertKind::Notice => Color::Rgb(180, 120, 0),
        }
    }
}

/// Alternate-screen alert dismissed by any key.
pub struct AlertScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl AlertScreen {
    /// Enters the alternate screen.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }

    /// Shows `message` until a key is pressed.
    ///
    /// # Errors
    /// - If rendering or reading input fails
    pub fn show(&mut self, kind: AlertKind, title: &str, message: &str) -> anyhow::Result<()> {
        let bg = kind.background();
        let fg = Color::Rgb(255, 255, 255);

        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.render_widget(Block::default().style(Style::default().bg(bg)), area);

                let text_area = Rect {
                    x: area.x + area.width / 10,
                    y: area.y + area.height / 3,
                    width: area.width * 8 / 10,
                    height: area.height.saturating_sub(area.height / 3),
                };

                let mut lines = vec![
                    Line::styled(title.to_string(), Style::default().add_modifier(Modifier::BOLD)),
                    Line::raw(""),
                ];
                lines.extend(message.lines().map(|l| Line::raw(l.to_string())));
                lines.push(Line::raw(""));
                lines.push(Line::styled(
                    "press any key",
                    Style::default().add_modifier(Modifier::DIM),
                ));

                let paragraph = Paragraph::new(lines)
                    .style(Style::default().fg(fg).bg(bg))
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, text_area);
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Leaves the alternate screen.
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

impl Drop for AlertScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Shows one alert and restores the terminal.
///
/// # Errors
/// - If the terminal cannot be driven
pub fn show_alert(kind: AlertKind, title: &str, message: &str) -> anyhow::Result<()> {
    let mut screen = AlertScreen::new()?;
    screen.show(kind, title, message)?;
    screen.cleanup()
}
