// 网盘API数据类型

use crate::transfer::error::{ResolveError, ResolveResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// 通用响应外壳
///
/// 夸克接口统一返回 `{code, message, data, metadata}`
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    /// 错误码（0表示成功，缺失视为失败）
    #[serde(default)]
    pub code: Option<i64>,

    /// 错误信息
    #[serde(default)]
    pub message: String,

    #[serde(default = "Option::default")]
    pub data: Option<T>,

    #[serde(default)]
    pub metadata: Option<Value>,
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// 从网关返回的 JSON 解析响应
    pub fn from_value(value: Value, endpoint: Endpoint) -> ResolveResult<Self> {
        serde_json::from_value(value).map_err(|e| ResolveError::Provider {
            code: -1,
            message: format!("{}响应格式错误: {}", endpoint.action(), e),
        })
    }

    /// 按接口语义检查错误码
    pub fn check(self, endpoint: Endpoint) -> ResolveResult<Self> {
        match self.code {
            Some(code) => classify(endpoint, code, &self.message)?,
            None => {
                return Err(ResolveError::Provider {
                    code: -1,
                    message: format!("{}: 响应缺少 code 字段", endpoint.action()),
                })
            }
        }
        Ok(self)
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 调用的接口，用于错误码分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Token,
    ListDirectory,
    Save,
    Task,
    Download,
    Delete,
    Member,
}

impl Endpoint {
    /// 服务端未返回 message 时使用的默认描述
    pub fn action(&self) -> &'static str {
        match self {
            Endpoint::Token => "获取 Token 失败",
            Endpoint::ListDirectory => "获取文件列表失败",
            Endpoint::Save => "转存失败",
            Endpoint::Task => "查询转存任务失败",
            Endpoint::Download => "获取下载链接失败",
            Endpoint::Delete => "删除文件失败",
            Endpoint::Member => "获取容量信息失败",
        }
    }
}

/// 分享需要提取码
pub const CODE_PASSWORD_REQUIRED: i64 = 31001;
/// 分享已失效
pub const CODE_SHARE_EXPIRED: i64 = 31002;
/// 大文件下载限制
pub const CODE_LARGE_FILE_RESTRICTED: i64 = 23018;

/// 错误码分类
///
/// 数字错误码只在这里出现，其余代码只处理 `ResolveError` 的语义变体
pub fn classify(endpoint: Endpoint, code: i64, message: &str) -> ResolveResult<()> {
    if code == 0 {
        return Ok(());
    }

    let message = if message.trim().is_empty() {
        endpoint.action().to_string()
    } else {
        message.to_string()
    };

    let err = match (endpoint, code) {
        (Endpoint::Token, CODE_PASSWORD_REQUIRED) => ResolveError::PasswordRequired { message },
        (Endpoint::Token, CODE_SHARE_EXPIRED) => ResolveError::ShareExpired { message },
        (Endpoint::Download, CODE_LARGE_FILE_RESTRICTED) => {
            ResolveError::LargeFileRestricted { code }
        }
        (Endpoint::Save, _) => ResolveError::Provider {
            code,
            message: format!("{} - 可能是 Cookie 已过期或网盘空间不足", message),
        },
        _ => ResolveError::Provider { code, message },
    };
    Err(err)
}

/// 分享 Token 数据
#[derive(Debug, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub stoken: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// 分享目录列表数据
#[derive(Debug, Default, Deserialize)]
pub struct ShareDetailData {
    #[serde(default)]
    pub list: Vec<ShareListItem>,
}

/// 分享目录中的单个条目
#[derive(Debug, Clone, Deserialize)]
pub struct ShareListItem {
    pub fid: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub size: u64,
    /// 是否为目录
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub share_fid_token: Option<String>,
    #[serde(default)]
    pub fid_token: Option<String>,
}

impl ShareListItem {
    /// 转存用的文件令牌（优先 share_fid_token）
    pub fn token(&self) -> String {
        self.share_fid_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| self.fid_token.clone())
            .unwrap_or_default()
    }
}

/// 分页信息（在 metadata 中）
#[derive(Debug, Default, Deserialize)]
pub struct PageMetadata {
    #[serde(default, rename = "_total")]
    pub total: Option<u64>,
}

/// 转存请求返回数据
#[derive(Debug, Deserialize)]
pub struct SaveData {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// 转存任务查询数据
#[derive(Debug, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub save_as: Option<SaveAs>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveAs {
    #[serde(default)]
    pub save_as_top_fids: Vec<String>,
}

/// 下载链接条目
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadItem {
    #[serde(default)]
    pub fid: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_url: String,
}

/// 会员/容量信息
#[derive(Debug, Default, Deserialize)]
pub struct MemberData {
    #[serde(default)]
    pub total_capacity: Option<u64>,
    #[serde(default)]
    pub use_capacity: Option<u64>,
}
