// 请求网关
//
// 负责带 Cookie 的 HTTP 请求执行与有界重试

use crate::config::ResolverConfig;
use crate::transfer::error::{ResolveError, ResolveResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 夸克 PC 客户端 User-Agent（可绕过部分大文件下载限制）
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) quark-cloud-drive/2.5.20 Chrome/100.0.4896.160 Electron/18.3.5.4-b478491100 Safari/537.36 Channel/pckk_other_ch";
pub const API_BASE_URL: &str = "https://pan.quark.cn";
pub const DRIVE_PC_BASE_URL: &str = "https://drive-pc.quark.cn";
pub const DRIVE_BASE_URL: &str = "https://drive.quark.cn";

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// 接口请求
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// 请求网关
///
/// 核心流程只依赖此接口，测试中用内存实现替换
#[async_trait]
pub trait RequestGateway: Send + Sync {
    /// 执行请求并返回 JSON 响应
    ///
    /// 重试用尽后返回 `Transport`，取消时返回 `Cancelled`
    async fn execute(&self, request: ApiRequest, cancel: &CancellationToken) -> ResolveResult<Value>;
}

/// 重试策略：固定间隔，有上限
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次请求）
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// 按重试策略执行操作
///
/// 单次请求与重试等待都可以被取消
pub async fn run_with_retry<F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> ResolveResult<Value>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Value, String>>,
{
    let max_attempts = policy.max_attempts();
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        if attempt > 0 {
            warn!(
                "请求失败，{}ms 后重试 ({}/{}): {}",
                policy.delay.as_millis(),
                attempt,
                policy.max_retries,
                last_error
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            outcome = operation(attempt) => outcome,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e,
        }
    }

    Err(ResolveError::Transport {
        attempts: max_attempts,
        message: last_error,
    })
}

/// 基于 reqwest 的网关实现
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    cookie: String,
    policy: RetryPolicy,
}

impl HttpGateway {
    /// 创建网关，未配置 Cookie 时直接返回配置错误
    pub fn new(config: &ResolverConfig) -> ResolveResult<Self> {
        let cookie = config.credential()?.to_string();

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ResolveError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            cookie,
            policy: RetryPolicy::from_config(config),
        })
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<Value, String> {
        debug!("请求 [{:?}]: {}", request.method, request.url);

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .header("Content-Type", "application/json;charset=UTF-8")
                .json(request.body.as_ref().unwrap_or(&Value::Null)),
        };

        let response = builder
            .header("Cookie", &self.cookie)
            .header("User-Agent", USER_AGENT)
            .header("Referer", format!("{}/", API_BASE_URL))
            .header("Origin", API_BASE_URL)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| format!("解析响应失败: {}", e))?;

        let preview: String = value.to_string().chars().take(200).collect();
        debug!("响应: {}...", preview);
        Ok(value)
    }
}

#[async_trait]
impl RequestGateway for HttpGateway {
    async fn execute(&self, request: ApiRequest, cancel: &CancellationToken) -> ResolveResult<Value> {
        run_with_retry(self.policy, cancel, |_| self.send_once(&request)).await
    }
}
