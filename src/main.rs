//! ChangeOps - 智能体问答管理台
//!
//! 入口：加载配置、日志写入文件、创建编排器与 TUI，并运行主循环。

use std::path::PathBuf;

use anyhow::Context;
use changeops::{
    config::{load_config, AppConfig},
    core::{create_runtime, Command},
    observability,
    ui::run_app,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 可选参数：配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let loaded = load_config(config_path);
    let cfg: AppConfig = loaded.as_ref().cloned().unwrap_or_default();

    // TUI 占用终端，日志写文件；默认 info，可通过 RUST_LOG 覆盖。
    // 配置加载失败的警告须在订阅器安装之后记录
    observability::init_to_file(&cfg.log.file)
        .with_context(|| format!("Failed to open log file {}", cfg.log.file.display()))?;
    if let Err(e) = &loaded {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }

    let runtime = create_runtime(&cfg).context("Failed to create runtime")?;
    let _ = runtime.cmd_tx.send(Command::RefreshAgents);

    let result = run_app(runtime.state_rx, runtime.cmd_tx)
        .await
        .context("App run failed");

    runtime.shutdown.cancel();
    if let Err(e) = runtime.task.await {
        tracing::warn!("Runtime task ended abnormally: {}", e);
    }
    result
}
