// 转存任务轮询

use super::context::ResolveContext;
use super::error::{ResolveError, ResolveResult};
use super::types::{JobStatus, TransferJob};
use crate::netdisk::QuarkClient;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 每隔多少次轮询打印一次进度
const PROGRESS_LOG_EVERY: u32 = 5;

/// 状态推进顺序，终止状态最大
fn stage(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Running => 1,
        JobStatus::Succeeded | JobStatus::Failed => 2,
    }
}

/// 轮询转存任务直到结束，返回转存后的顶层文件 fid
///
/// 每次查询前先等待一个轮询间隔；如果下一次查询无法在最长等待时间内发出，
/// 直接返回 `TransferTimeout`，不再发出任何请求。空列表是合法结果。
pub async fn wait_for_job(
    client: &QuarkClient,
    ctx: &ResolveContext,
    job: &mut TransferJob,
) -> ResolveResult<Vec<String>> {
    let interval = ctx.config.poll_interval;
    let started = Instant::now();
    let deadline = started + ctx.config.poll_max_wait;
    let mut polls = 0u32;

    loop {
        if Instant::now() + interval > deadline {
            let waited = started.elapsed();
            warn!(
                "转存任务 {} 等待超时（{} 次查询，{:.1}秒）",
                job.job_id,
                polls,
                waited.as_secs_f64()
            );
            return Err(ResolveError::TransferTimeout { waited });
        }

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ResolveError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
        polls += 1;

        let snapshot = client.query_task(ctx, &job.job_id, 0).await?;
        if stage(snapshot.status) < stage(job.status) {
            warn!(
                "转存任务 {} 状态回退 {:?} -> {:?}，忽略",
                job.job_id, job.status, snapshot.status
            );
        } else if snapshot.status != job.status {
            debug!("转存任务 {} 状态: {:?} -> {:?}", job.job_id, job.status, snapshot.status);
            job.status = snapshot.status;
        }

        match snapshot.status {
            JobStatus::Succeeded => {
                info!("转存完成（耗时 {:.1}秒）", started.elapsed().as_secs_f64());
                return Ok(snapshot.saved_fids);
            }
            JobStatus::Failed => {
                return Err(ResolveError::TransferFailed(
                    "转存任务失败，请检查网盘空间或文件权限".to_string(),
                ));
            }
            JobStatus::Pending | JobStatus::Running => {}
        }

        if polls % PROGRESS_LOG_EVERY == 0 {
            info!("转存中... 已等待 {}秒", started.elapsed().as_secs());
        }
    }
}
