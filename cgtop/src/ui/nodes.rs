//! Control-group table: sorting, selection highlight, per-cell coloring and a scrollbar.

use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::Modifier;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use std::cmp::Ordering;

use crate::types::Node;
use crate::ui::theme::{FROZEN_FG, SB_ARROW, SB_THUMB, SB_TRACK, SELECTED_BG};
use crate::ui::util::{human, truncate_middle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    CpuDesc,
    MemDesc,
    Name,
}

impl SortBy {
    pub fn next(self) -> Self {
        match self {
            SortBy::CpuDesc => SortBy::MemDesc,
            SortBy::MemDesc => SortBy::Name,
            SortBy::Name => SortBy::CpuDesc,
        }
    }
}

// Shared by drawing and header hit-testing.
const COLS: [Constraint; 6] = [
    Constraint::Percentage(40), // Name
    Constraint::Length(8),      // CPU %
    Constraint::Length(10),     // Mem
    Constraint::Length(6),      // PIDs
    Constraint::Length(10),     // Net
    Constraint::Length(7),      // State
];

pub fn sorted(nodes: &[Node], sort_by: SortBy) -> Vec<&Node> {
    let mut out: Vec<&Node> = nodes.iter().collect();
    match sort_by {
        SortBy::CpuDesc => out.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        }),
        SortBy::MemDesc => out.sort_by(|a, b| b.memory.cmp(&a.memory).then_with(|| a.name.cmp(&b.name))),
        SortBy::Name => out.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.path.cmp(&b.path))
        }),
    }
    out
}

fn inner_of(area: Rect) -> Rect {
    Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    }
}

/// Rows of data that fit below the header.
pub fn viewport_rows(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

/// Scroll so `selected` stays inside the viewport.
pub fn keep_visible(offset: &mut usize, selected: usize, viewport: usize) {
    let viewport = viewport.max(1);
    if selected < *offset {
        *offset = selected;
    } else if selected >= *offset + viewport {
        *offset = selected + 1 - viewport;
    }
}

pub fn draw_nodes(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    nodes: &[&Node],
    selected: usize,
    scroll_offset: usize,
    sort_by: SortBy,
) {
    f.render_widget(Block::default().borders(Borders::ALL).title(title.to_string()), area);

    // Reserve 2 columns on the right for the scrollbar
    let inner = inner_of(area);
    if inner.height < 1 || inner.width < 3 {
        return;
    }
    let content = Rect {
        width: inner.width.saturating_sub(2),
        ..inner
    };

    let total_rows = nodes.len();
    let viewport = content.height.saturating_sub(1) as usize;
    let max_off = total_rows.saturating_sub(viewport);
    let offset = scroll_offset.min(max_off);
    let show_n = total_rows.saturating_sub(offset).min(viewport);
    let name_width = (content.width as usize * 40 / 100).max(4);

    let rows = nodes
        .iter()
        .enumerate()
        .skip(offset)
        .take(show_n)
        .map(|(i, n)| {
            let cpu_fg = match n.cpu_percent {
                x if x < 25.0 => Color::Green,
                x if x < 60.0 => Color::Yellow,
                _ => Color::Red,
            };
            let (state, state_fg) = if n.frozen {
                ("frozen", FROZEN_FG)
            } else {
                ("live", Color::DarkGray)
            };
            let style = if i == selected {
                Style::default().bg(SELECTED_BG).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(truncate_middle(&n.name, name_width)),
                Cell::from(format!("{:>6.1}", n.cpu_percent.max(0.0))).style(Style::default().fg(cpu_fg)),
                Cell::from(human(n.memory.saturating_mul(1024 * 1024))),
                Cell::from(n.pid_count.to_string()),
                Cell::from(if n.net_delta > 0 { human(n.net_delta) } else { String::new() }),
                Cell::from(state).style(Style::default().fg(state_fg)),
            ])
            .style(style)
        });

    let mark = |s: SortBy, label: &'static str, marked: &'static str| {
        if s == sort_by {
            marked
        } else {
            label
        }
    };
    let header = Row::new(vec![
        mark(SortBy::Name, "Name", "Name •"),
        mark(SortBy::CpuDesc, "CPU %", "CPU % •"),
        mark(SortBy::MemDesc, "Mem", "Mem •"),
        "PIDs",
        "Net",
        "State",
    ])
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    let table = Table::new(rows, COLS.to_vec()).header(header).column_spacing(1);
    f.render_widget(table, content);

    let scroll_area = Rect {
        x: inner.x + inner.width.saturating_sub(1),
        y: inner.y,
        width: 1,
        height: inner.height,
    };
    if scroll_area.height >= 3 {
        let track = (scroll_area.height - 2) as usize;
        let total = total_rows.max(1);
        let view = viewport.clamp(1, total);
        let max_off = total.saturating_sub(view);

        let thumb_len = (track * view).div_ceil(total).max(1).min(track);
        let thumb_top = if max_off == 0 {
            0
        } else {
            ((track - thumb_len) * offset + max_off / 2) / max_off
        };

        let mut lines: Vec<Line> = Vec::with_capacity(scroll_area.height as usize);
        lines.push(Line::from(Span::styled("▲", Style::default().fg(SB_ARROW))));
        for i in 0..track {
            let glyph = if i >= thumb_top && i < thumb_top + thumb_len {
                Span::styled("█", Style::default().fg(SB_THUMB))
            } else {
                Span::styled("│", Style::default().fg(SB_TRACK))
            };
            lines.push(Line::from(glyph));
        }
        lines.push(Line::from(Span::styled("▼", Style::default().fg(SB_ARROW))));
        f.render_widget(Paragraph::new(lines), scroll_area);
    }
}

/// Move the selection with Up/Down/PageUp/PageDown/Home/End.
/// Returns true if the key was a movement key.
pub fn selection_handle_key(selected: &mut usize, key: KeyEvent, page: usize, total: usize) -> bool {
    let last = total.saturating_sub(1);
    let page = page.max(1);
    match key.code {
        KeyCode::Up => *selected = selected.saturating_sub(1),
        KeyCode::Down => *selected = (*selected + 1).min(last),
        KeyCode::PageUp => *selected = selected.saturating_sub(page),
        KeyCode::PageDown => *selected = (*selected + page).min(last),
        KeyCode::Home => *selected = 0,
        KeyCode::End => *selected = last,
        _ => return false,
    }
    true
}

/// Wheel moves the selection; a click on a sortable header returns the new order.
pub fn nodes_handle_mouse(
    selected: &mut usize,
    mouse: MouseEvent,
    area: Rect,
    scroll_offset: usize,
    total: usize,
) -> Option<SortBy> {
    let inner = inner_of(area);
    if inner.height == 0 || inner.width <= 2 {
        return None;
    }
    let content = Rect {
        width: inner.width.saturating_sub(2),
        ..inner
    };
    let inside = mouse.column >= content.x
        && mouse.column < content.x + content.width
        && mouse.row >= content.y
        && mouse.row < content.y + content.height;
    if !inside {
        return None;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => *selected = selected.saturating_sub(1),
        MouseEventKind::ScrollDown => *selected = (*selected + 1).min(total.saturating_sub(1)),
        MouseEventKind::Down(MouseButton::Left) if mouse.row == content.y => {
            let header = Rect { height: 1, ..content };
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(COLS.to_vec())
                .split(header);
            let hit = |r: Rect| mouse.column >= r.x && mouse.column < r.x + r.width;
            if hit(cols[0]) {
                return Some(SortBy::Name);
            }
            if hit(cols[1]) {
                return Some(SortBy::CpuDesc);
            }
            if hit(cols[2]) {
                return Some(SortBy::MemDesc);
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            // Header occupies the first content row
            let row = scroll_offset + (mouse.row - content.y) as usize - 1;
            if row < total {
                *selected = row;
            }
        }
        _ => {}
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn node(name: &str, cpu: f64, mem: u64) -> Node {
        Node {
            name: name.into(),
            path: format!("/cg/{name}"),
            identifier: name.into(),
            cpu_percent: cpu,
            memory: mem,
            pid_count: 0,
            net_delta: 0,
            frozen: false,
        }
    }

    #[test]
    fn sort_orders() {
        let nodes = vec![node("b", 5.0, 10), node("A", 50.0, 1), node("c", 1.0, 100)];
        let names = |s| sorted(&nodes, s).iter().map(|n| n.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(SortBy::CpuDesc), ["A", "b", "c"]);
        assert_eq!(names(SortBy::MemDesc), ["c", "b", "A"]);
        assert_eq!(names(SortBy::Name), ["A", "b", "c"]);
        assert_eq!(SortBy::Name.next(), SortBy::CpuDesc);
    }

    #[test]
    fn selection_is_bounded() {
        let k = |c| KeyEvent::new(c, KeyModifiers::NONE);
        let mut sel = 0;
        assert!(selection_handle_key(&mut sel, k(KeyCode::Up), 5, 3));
        assert_eq!(sel, 0);
        selection_handle_key(&mut sel, k(KeyCode::PageDown), 5, 3);
        assert_eq!(sel, 2);
        selection_handle_key(&mut sel, k(KeyCode::Home), 5, 3);
        assert_eq!(sel, 0);
        assert!(!selection_handle_key(&mut sel, k(KeyCode::Char('x')), 5, 3));
    }

    #[test]
    fn scroll_follows_selection() {
        let mut off = 0;
        keep_visible(&mut off, 12, 10);
        assert_eq!(off, 3);
        keep_visible(&mut off, 1, 10);
        assert_eq!(off, 1);
    }
}
