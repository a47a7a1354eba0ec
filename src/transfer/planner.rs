// 转存模式选择

use super::context::ResolveContext;
use super::error::{ResolveError, ResolveResult};
use super::types::{total_size, PlanReason, QuotaInfo, RemoteEntry, TransferMode, TransferPlan};
use crate::netdisk::QuarkClient;
use tracing::{info, warn};

fn gib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0 / 1024.0
}

/// 根据总大小与可用空间选择转存模式
///
/// | 强制逐个 | 容量已知 | 总大小 ≤ 可用 | 模式 |
/// |---|---|---|---|
/// | 是 | - | - | 逐个 |
/// | 否 | 否 | - | 批量 |
/// | 否 | 是 | 是 | 批量 |
/// | 否 | 是 | 否 | 逐个 |
pub fn plan_mode(total: u64, force_sequential: bool, quota: QuotaInfo) -> (TransferMode, PlanReason) {
    if force_sequential {
        return (TransferMode::Sequential, PlanReason::Forced);
    }
    match quota {
        QuotaInfo::Unknown => (TransferMode::Batch, PlanReason::QuotaUnknown),
        QuotaInfo::Known { available_bytes } if total <= available_bytes => {
            (TransferMode::Batch, PlanReason::QuotaSufficient)
        }
        QuotaInfo::Known { .. } => (TransferMode::Sequential, PlanReason::QuotaInsufficient),
    }
}

/// 查询网盘可用空间，失败视为未知（取消除外）
pub async fn query_quota(client: &QuarkClient, ctx: &ResolveContext) -> ResolveResult<QuotaInfo> {
    match client.get_capacity(ctx).await {
        Ok(available_bytes) => {
            info!("网盘可用空间: {:.2} GB", gib(available_bytes));
            Ok(QuotaInfo::Known { available_bytes })
        }
        Err(ResolveError::Cancelled) => Err(ResolveError::Cancelled),
        Err(e) => {
            warn!("获取容量失败: {}，将使用默认模式", e);
            Ok(QuotaInfo::Unknown)
        }
    }
}

/// 生成转存计划（每次解析只执行一次）
///
/// 强制逐个模式下不查询容量
pub async fn build_plan(
    client: &QuarkClient,
    ctx: &ResolveContext,
    entries: Vec<RemoteEntry>,
) -> ResolveResult<TransferPlan> {
    let total = total_size(&entries);
    let force = ctx.config.force_sequential();

    let quota = if force {
        QuotaInfo::Unknown
    } else {
        info!("检查网盘可用空间...");
        query_quota(client, ctx).await?
    };

    let (mode, reason) = plan_mode(total, force, quota);
    match quota {
        QuotaInfo::Known { available_bytes } if reason == PlanReason::QuotaInsufficient => info!(
            "{}（需要 {:.2} GB，可用 {:.2} GB）",
            reason.description(),
            gib(total),
            gib(available_bytes)
        ),
        _ => info!("{}", reason.description()),
    }

    Ok(TransferPlan {
        mode,
        reason,
        entries,
    })
}
