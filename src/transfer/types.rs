// 转存模块类型定义

use serde::{Deserialize, Serialize};

/// 分享链接解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareReference {
    /// 分享 ID（pwd_id）
    pub share_id: String,
    /// 从链接中提取的提取码（如有）
    pub passcode: Option<String>,
    /// 子文件夹 ID（从 #/list/share/<fid> 中提取）
    pub subfolder_id: Option<String>,
}

impl ShareReference {
    /// 合并提取码：显式传入的提取码 > 链接中的提取码
    pub fn with_passcode(mut self, passcode: Option<String>) -> Self {
        if let Some(pwd) = passcode.filter(|p| !p.trim().is_empty()) {
            self.passcode = Some(pwd.trim().to_string());
        }
        self
    }

    /// 扫描起点目录（根目录为空字符串）
    pub fn start_folder(&self) -> &str {
        self.subfolder_id.as_deref().unwrap_or("")
    }
}

/// 分享访问令牌
#[derive(Debug, Clone)]
pub struct ShareToken {
    /// stoken
    pub session_token: String,
    /// 分享标题
    pub title: String,
}

/// 分享中的文件条目（扫描结果）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// 文件 fid
    pub file_id: String,
    /// 文件 fid_token（转存时需要）
    pub file_token: String,
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// 是否为目录
    pub is_directory: bool,
    /// 相对路径（祖先目录名拼接，不含自身文件名）
    pub relative_path: String,
}

/// 转存模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// 批量：一次性转存所有文件，速度快但需要足够空间
    Batch,
    /// 逐个：逐文件转存+取链接+删除，省空间但较慢
    Sequential,
}

/// 选择转存模式的原因（仅用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReason {
    /// 配置强制逐个转存
    Forced,
    /// 无法获取容量信息，使用默认批量模式
    QuotaUnknown,
    /// 空间充足
    QuotaSufficient,
    /// 空间不足
    QuotaInsufficient,
}

impl PlanReason {
    pub fn description(&self) -> &'static str {
        match self {
            PlanReason::Forced => "强制逐个模式",
            PlanReason::QuotaUnknown => "无法获取容量信息，使用批量模式（默认）",
            PlanReason::QuotaSufficient => "空间充足，使用批量转存模式",
            PlanReason::QuotaInsufficient => "空间不足，自动切换为逐个转存模式",
        }
    }
}

/// 转存计划
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub mode: TransferMode,
    pub reason: PlanReason,
    pub entries: Vec<RemoteEntry>,
}

impl TransferPlan {
    /// 所有条目的总大小
    pub fn total_size(&self) -> u64 {
        total_size(&self.entries)
    }
}

/// 计算文件总大小
pub fn total_size(entries: &[RemoteEntry]) -> u64 {
    entries.iter().map(|e| e.size).sum()
}

/// 转存任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// 排队中
    Pending,
    /// 转存中
    Running,
    /// 转存成功
    Succeeded,
    /// 转存失败
    Failed,
}

impl JobStatus {
    /// 从服务端状态码转换
    ///
    /// 未知状态码视为进行中，由轮询超时兜底
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Succeeded,
            3 => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }

    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// 服务端转存任务
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub job_id: String,
    pub status: JobStatus,
}

/// 下载链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    /// 转存后的文件 fid
    pub file_id: String,
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// 网盘可用空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaInfo {
    Known { available_bytes: u64 },
    Unknown,
}

/// 下载请求头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadHeaders {
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    #[serde(rename = "Cookie")]
    pub cookie: String,
}

/// 下载请求描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub headers: DownloadHeaders,
}

/// 解析结果中的单个文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub name: String,
    pub size: u64,
    pub relative_path: String,
    pub request: DownloadRequest,
}

/// 最终解析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedShare {
    pub title: String,
    pub files: Vec<ResolvedFile>,
}
