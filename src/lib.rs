//! ChangeOps - 智能体问答管理台
//!
//! 模块划分：
//! - **chat**: 会话引导（关联 id / 数字 id 回退链）、问答轮次引擎、聊天记录
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排、状态投影、会话监管
//! - **gateway**: 远端代理网关（任务标签式 JSON 接口）、管理任务、Mock 实现
//! - **identity**: 注入式身份（Bearer token 与用户邮箱）
//! - **observability**: tracing 初始化
//! - **ui**: Ratatui TUI 界面

pub mod chat;
pub mod config;
pub mod core;
pub mod gateway;
pub mod identity;
pub mod observability;
pub mod ui;
