// 配置管理模块

use crate::transfer::error::{ResolveError, ResolveResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 覆盖 Cookie 的环境变量
pub const COOKIE_ENV: &str = "QUARK_COOKIE";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 夸克账号配置
    #[serde(default)]
    pub quark: QuarkConfig,
    /// 转存任务轮询配置
    #[serde(default)]
    pub poll: PollConfig,
    /// 请求重试配置
    #[serde(default)]
    pub request: RequestConfig,
    /// 目录扫描配置
    #[serde(default)]
    pub scan: ScanConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 转存模式设置
///
/// 兼容旧版数字写法："1" 为智能模式，"2" 为强制逐个转存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferModeSetting {
    /// 根据可用空间自动选择批量或逐个转存
    #[serde(alias = "1")]
    Auto,
    /// 始终逐个转存
    #[serde(alias = "2")]
    ForceSequential,
}

impl Default for TransferModeSetting {
    fn default() -> Self {
        Self::Auto
    }
}

/// 夸克账号配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarkConfig {
    /// 登录 Cookie（必填）
    #[serde(default)]
    pub cookie: Option<String>,
    /// 获取下载链接后是否删除转存的文件（释放网盘空间）
    #[serde(default, deserialize_with = "deserialize_bool_like")]
    pub delete_after_resolve: bool,
    /// 转存模式
    #[serde(default)]
    pub transfer_mode: TransferModeSetting,
}

/// 转存任务轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// 轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// 最长等待时间（秒）
    #[serde(default = "default_poll_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_max_wait_secs() -> u64 {
    600
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_poll_max_wait_secs(),
        }
    }
}

/// 请求重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// 最大重试次数（不含首次请求）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试间隔（毫秒）
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 目录扫描配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 每页数量（服务端上限 1000）
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// 最大目录深度
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// 同时列出的目录数
    #[serde(default = "default_scan_concurrency")]
    pub concurrency: usize,
}

fn default_page_size() -> u32 {
    100
}

fn default_max_depth() -> usize {
    32
}

fn default_scan_concurrency() -> usize {
    4
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_depth: default_max_depth(),
            concurrency: default_scan_concurrency(),
        }
    }
}

/// 接受 true/false、1/0 以及对应字符串
fn deserialize_bool_like<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(b) => Ok(b),
        BoolLike::Int(n) => Ok(n != 0),
        BoolLike::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "无法识别的布尔值: {}",
                other
            ))),
        },
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let mut config: AppConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        config.apply_env_overrides();
        config.validate().context("配置文件校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    ///
    /// 只有配置文件不存在时才写入默认配置；文件存在但无法解析或校验失败时，
    /// 本次运行使用内存中的默认配置，不覆盖用户文件
    pub async fn load_or_default(path: &str) -> Self {
        let exists = fs::try_exists(path).await.unwrap_or(false);
        if !exists {
            tracing::info!("配置文件不存在，创建默认配置: {}", path);
            let mut default_config = Self::default();

            // 保存的默认配置不含环境变量中的 Cookie
            if let Err(e) = default_config.save_to_file(path).await {
                tracing::error!("保存默认配置失败: {}", e);
            }

            default_config.apply_env_overrides();
            return default_config;
        }

        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，本次使用默认配置（文件未修改）: {:#}", e);
                let mut default_config = Self::default();
                default_config.apply_env_overrides();
                default_config
            }
        }
    }

    /// 环境变量覆盖（宿主程序注入 Cookie）
    pub fn apply_env_overrides(&mut self) {
        if let Ok(cookie) = std::env::var(COOKIE_ENV) {
            if !cookie.trim().is_empty() {
                self.quark.cookie = Some(cookie);
            }
        }
    }

    /// 校验数值范围
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_ms == 0 {
            anyhow::bail!("poll.interval_ms 必须大于 0");
        }
        if self.poll.max_wait_secs == 0 {
            anyhow::bail!("poll.max_wait_secs 必须大于 0");
        }
        if self.poll.max_wait_secs.saturating_mul(1000) < self.poll.interval_ms {
            anyhow::bail!("poll.max_wait_secs 不能小于一个轮询间隔 (poll.interval_ms)");
        }
        if self.scan.page_size == 0 || self.scan.page_size > 1000 {
            anyhow::bail!("scan.page_size 必须在 1-1000 之间");
        }
        if self.scan.concurrency == 0 {
            anyhow::bail!("scan.concurrency 必须大于 0");
        }
        Ok(())
    }

    /// 生成单次解析使用的只读配置
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            credential: self
                .quark
                .cookie
                .clone()
                .filter(|c| !c.trim().is_empty()),
            delete_after_resolve: self.quark.delete_after_resolve,
            transfer_mode: self.quark.transfer_mode,
            poll_interval: Duration::from_millis(self.poll.interval_ms.max(1)),
            poll_max_wait: Duration::from_secs(self.poll.max_wait_secs),
            max_retries: self.request.max_retries,
            retry_delay: Duration::from_millis(self.request.retry_delay_ms),
            request_timeout: Duration::from_secs(self.request.timeout_secs.max(1)),
            page_size: self.scan.page_size.clamp(1, 1000),
            max_scan_depth: self.scan.max_depth,
            scan_concurrency: self.scan.concurrency.max(1),
        }
    }
}

/// 单次解析的只读配置
///
/// 多个解析任务之间只共享这一份配置，不共享任何可变状态
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub credential: Option<String>,
    pub delete_after_resolve: bool,
    pub transfer_mode: TransferModeSetting,
    pub poll_interval: Duration,
    pub poll_max_wait: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub page_size: u32,
    pub max_scan_depth: usize,
    pub scan_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        AppConfig::default().resolver_config()
    }
}

impl ResolverConfig {
    /// 获取 Cookie，未配置时返回配置错误
    pub fn credential(&self) -> ResolveResult<&str> {
        self.credential.as_deref().ok_or_else(|| {
            ResolveError::Configuration("未配置 Cookie，请在配置中填写夸克 Cookie".to_string())
        })
    }

    pub fn force_sequential(&self) -> bool {
        self.transfer_mode == TransferModeSetting::ForceSequential
    }
}
