//! Bottom line: live search input, status of the last action, key hints.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

pub enum FooterState<'a> {
    Searching(&'a str),
    Status(&'a str),
    Hints,
}

const HINTS: &str =
    "↑↓ select  ⏎ open  ⌫ up  / search  f focus  F unfocus  z freeze  s sort  Esc clear  q quit";

pub fn draw_footer(f: &mut ratatui::Frame<'_>, area: Rect, state: FooterState<'_>) {
    let line = match state {
        FooterState::Searching(q) => Line::from(vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(q.to_string()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
            Span::styled("  Enter keep, Esc clear", Style::default().fg(Color::DarkGray)),
        ]),
        FooterState::Status(s) => Line::from(Span::styled(s.to_string(), Style::default().fg(Color::Cyan))),
        FooterState::Hints => Line::from(Span::styled(HINTS, Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line), area);
}
