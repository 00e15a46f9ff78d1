//! Drawing

use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Wrap};

use crate::app::App;
use crate::visualizer::MAX_LEVEL;

const ACCENT: Color = Color::Cyan;
const BAR_SCALE: f64 = 100.0;

pub fn draw(f: &mut Frame<'_>, app: &App, now: Instant) {
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));
    let area = outer.inner(f.size());
    f.render_widget(outer, f.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .split(area);

    let heading = Paragraph::new(Line::from(Span::styled(
        "Gurbani 24/7",
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    f.render_widget(heading, chunks[0]);

    let title = Paragraph::new(app.title().to_string())
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(title, chunks[1]);

    draw_visualizer(f, app, now, chunks[2]);

    let button = Paragraph::new(Line::from(Span::styled(
        app.button_label(),
        Style::default().fg(Color::Black).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .style(Style::default().bg(ACCENT)),
    );
    f.render_widget(button, centered(chunks[3], 20));

    let footer = Paragraph::new("Background playback is enabled.")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, chunks[4]);

    let help = Paragraph::new("Space/Enter = Play/Pause | q/Esc = Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[5]);
}

fn draw_visualizer(f: &mut Frame<'_>, app: &App, now: Instant, area: Rect) {
    let color = if app.visualizer().is_animating() {
        ACCENT
    } else {
        Color::DarkGray
    };
    let bars: Vec<Bar> = app
        .visualizer()
        .levels(now)
        .into_iter()
        .map(|level| {
            Bar::default()
                .value((level * BAR_SCALE).round() as u64)
                .text_value(String::new())
                .style(Style::default().fg(color))
        })
        .collect();

    let count = bars.len() as u16;
    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(1)
        .bar_gap(1)
        .max((MAX_LEVEL * BAR_SCALE) as u64);

    // Largeur utile : une colonne par barre plus les espaces
    f.render_widget(chart, centered(area, count * 2));
}

/// Horizontally centered slice of `area`, at most `width` columns wide.
fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(app: &App) -> String {
        let backend = TestBackend::new(60, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(f, app, Instant::now())).unwrap();

        let buffer = terminal.backend().buffer().clone();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_screen_shows_title_button_and_footer() {
        let app = App::new("Loading current shabad...");
        let screen = render(&app);

        assert!(screen.contains("Gurbani 24/7"));
        assert!(screen.contains("Loading current shabad..."));
        assert!(screen.contains("Play"));
        assert!(screen.contains("Background playback is enabled."));
    }

    #[test]
    fn test_centered_clamps_width() {
        let area = Rect::new(0, 0, 10, 3);
        assert_eq!(centered(area, 4), Rect::new(3, 0, 4, 3));
        assert_eq!(centered(area, 40), area);
    }
}
