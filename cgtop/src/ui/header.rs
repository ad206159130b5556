//! Top header: agent URL, current location and the time of the last view.

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    widgets::{Block, Borders},
};

use crate::types::ViewMessage;
use crate::ui::util::human;

pub fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    url: &str,
    view: Option<&ViewMessage>,
    updated: Option<DateTime<Local>>,
) {
    let title = match view {
        Some(v) => {
            let at = updated
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            format!(
                "cgtop — {url} | {} | {} groups | net {}/tick | {at}  (press 'q' to quit)",
                v.location,
                v.nodes.len(),
                human(v.net_delta),
            )
        }
        None => format!("cgtop — connecting to {url}... (press 'q' to quit)"),
    };
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}
