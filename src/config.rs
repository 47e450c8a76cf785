//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CHANGEOPS__*` 覆盖（双下划线表示嵌套，如 `CHANGEOPS__GATEWAY__BASE_URL=http://n8n:5678`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub log: LogSection,
}

/// [gateway] 段：远端代理网关（n8n webhook）地址与超时
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 聊天任务端点（Execute / RetrieveQuestion / ValidateAnswer）
    #[serde(default = "default_execute_path")]
    pub execute_path: String,
    /// 管理任务端点（GetAllAgents / GetAllSessions / ...）
    #[serde(default = "default_services_path")]
    pub services_path: String,
    /// 单次请求超时（秒），0 表示不设超时
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5678".to_string()
}

fn default_execute_path() -> String {
    "/webhook/executeagent".to_string()
}

fn default_services_path() -> String {
    "/webhook/AgentsServices".to_string()
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            execute_path: default_execute_path(),
            services_path: default_services_path(),
            timeout_secs: 0,
        }
    }
}

impl GatewaySection {
    pub fn execute_url(&self) -> String {
        join_url(&self.base_url, &self.execute_path)
    }

    pub fn services_url(&self) -> String {
        join_url(&self.base_url, &self.services_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// [chat] 段：会话引导时发送的占位身份与描述
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_placeholder_email")]
    pub placeholder_email: String,
    #[serde(default = "default_session_description")]
    pub session_description: String,
}

fn default_placeholder_email() -> String {
    "test@test.it".to_string()
}

fn default_session_description() -> String {
    "nuova chat".to_string()
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            placeholder_email: default_placeholder_email(),
            session_description: default_session_description(),
        }
    }
}

/// [auth] 段：Bearer token 与当前用户邮箱（均可选）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthSection {
    pub token: Option<String>,
    pub user_email: Option<String>,
}

/// [log] 段：TUI 运行时日志写入文件，避免破坏全屏界面
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("changeops.log")
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CHANGEOPS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CHANGEOPS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CHANGEOPS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载失败时回退默认配置并记录警告（TUI 与管理 CLI 共用）
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}
