//! Shared UI theme constants.

use ratatui::style::Color;

pub const SB_ARROW: Color = Color::Rgb(170, 170, 180);
pub const SB_TRACK: Color = Color::Rgb(170, 170, 180);
pub const SB_THUMB: Color = Color::Rgb(170, 170, 180);

pub const SELECTED_BG: Color = Color::Rgb(50, 60, 80);
pub const FROZEN_FG: Color = Color::LightBlue;
