// 解析流程错误类型

use std::time::Duration;
use thiserror::Error;

/// 分享解析错误
///
/// 主流程中的错误直接向调用方传播；逐个转存模式下单个文件的错误在本地记录并跳过，
/// 清理阶段的错误永远不会向上传播。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// 配置缺失（例如未配置 Cookie）
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 分享链接无法解析
    #[error("无法解析分享链接: {0}")]
    Parse(String),

    /// 分享需要提取码
    #[error("{message}（错误码: 31001）- 分享链接需要密码，请在 URL 中添加密码参数，例如: ?pwd=1234")]
    PasswordRequired { message: String },

    /// 分享已失效或被取消
    #[error("{message}（错误码: 31002）- 分享链接已失效或被取消")]
    ShareExpired { message: String },

    /// 服务端返回的其他非零错误码
    #[error("{message}（错误码: {code}）")]
    Provider { code: i64, message: String },

    /// 触发大文件下载限制
    #[error("触发 {code} 大文件限制错误，可能需要调整客户端标识（User-Agent）")]
    LargeFileRestricted { code: i64 },

    /// 目录扫描失败（层级过深等畸形目录树）
    #[error("扫描目录失败: {0}")]
    Scan(String),

    /// 转存任务失败
    #[error("转存失败: {0}")]
    TransferFailed(String),

    /// 转存任务等待超时
    #[error("转存任务等待超时（已等待 {}秒）", .waited.as_secs())]
    TransferTimeout { waited: Duration },

    /// 分享中没有文件
    #[error("分享中没有文件")]
    EmptyShare,

    /// 请求在重试后仍然失败
    #[error("请求失败（已尝试 {attempts} 次）: {message}")]
    Transport { attempts: u32, message: String },

    /// 操作被取消
    #[error("操作已取消")]
    Cancelled,
}

impl ResolveError {
    /// 是否为取消错误（逐个转存时取消不能被吞掉）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolveError::Cancelled)
    }
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_keep_provider_detail() {
        let err = ResolveError::Provider {
            code: 41011,
            message: "文件不存在".to_string(),
        };
        assert_eq!(err.to_string(), "文件不存在（错误码: 41011）");

        let err = ResolveError::TransferTimeout {
            waited: Duration::from_secs(600),
        };
        assert!(err.to_string().contains("600"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(ResolveError::Cancelled.is_cancelled());
        assert!(!ResolveError::EmptyShare.is_cancelled());
    }
}
