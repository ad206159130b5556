//! UI module root: exposes drawing functions for individual panels.

pub mod footer;
pub mod header;
pub mod nodes;
pub mod theme;
pub mod util;
