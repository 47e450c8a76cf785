//! 核心编排层：状态投影、会话监管、主控循环

pub mod orchestrator;
pub mod session_supervisor;
pub mod state;

pub use orchestrator::{create_runtime, spawn_runtime, Command, RuntimeHandles};
pub use session_supervisor::SessionSupervisor;
pub use state::{UiPhase, UiState, View};
