//! TUI 层：Ratatui + crossterm，主循环（app）、事件（event）、渲染（render）

pub mod app;
pub mod event;
pub mod render;

pub use app::{filter_agents, run_app, ViewState};
pub use event::EventHandler;
pub use render::draw;
