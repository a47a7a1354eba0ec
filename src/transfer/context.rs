// 单次解析的上下文

use crate::config::ResolverConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// 解析上下文
///
/// 每次解析创建一个，显式传给所有组件：只读配置、取消令牌、日志 span。
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// 解析 ID（日志关联用）
    pub id: String,
    pub config: Arc<ResolverConfig>,
    pub cancel: CancellationToken,
    span: Span,
}

impl ResolveContext {
    pub fn new(config: Arc<ResolverConfig>, cancel: CancellationToken) -> Self {
        let id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("resolve", id = %id);
        Self {
            id,
            config,
            cancel,
            span,
        }
    }

    /// 本次解析的日志 span
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
