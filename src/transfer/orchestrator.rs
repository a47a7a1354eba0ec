// 转存执行
//
// 批量模式：一次转存全部 → 轮询 → 一次取全部链接 → 删除
// 逐个模式：逐文件 转存 → 轮询 → 取链接 → 删除，单个失败跳过

use super::cleanup::release_transferred;
use super::context::ResolveContext;
use super::error::{ResolveError, ResolveResult};
use super::poller::wait_for_job;
use super::types::{
    DownloadLink, JobStatus, RemoteEntry, ShareToken, TransferJob, TransferMode, TransferPlan,
};
use crate::netdisk::QuarkClient;
use tracing::{info, warn};

/// 已取得下载链接的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFile {
    pub link: DownloadLink,
    /// 在分享中的相对路径
    pub relative_path: String,
}

/// 转存执行器（单次解析内使用）
pub struct TransferOrchestrator<'a> {
    client: &'a QuarkClient,
    ctx: &'a ResolveContext,
    share_id: &'a str,
    token: &'a ShareToken,
}

impl<'a> TransferOrchestrator<'a> {
    pub fn new(
        client: &'a QuarkClient,
        ctx: &'a ResolveContext,
        share_id: &'a str,
        token: &'a ShareToken,
    ) -> Self {
        Self {
            client,
            ctx,
            share_id,
            token,
        }
    }

    /// 按计划执行转存
    pub async fn execute(&self, plan: &TransferPlan) -> ResolveResult<Vec<LinkedFile>> {
        match plan.mode {
            TransferMode::Batch => self.transfer_batch(&plan.entries).await,
            TransferMode::Sequential => self.transfer_sequential(&plan.entries).await,
        }
    }

    fn delete_after_resolve(&self) -> bool {
        self.ctx.config.delete_after_resolve
    }

    /// 转存一组文件并等待完成，返回转存后的 fid
    async fn save_and_wait(&self, entries: &[RemoteEntry]) -> ResolveResult<Vec<String>> {
        let job_id = self
            .client
            .save_files(self.ctx, self.share_id, self.token, entries)
            .await?;
        info!("转存任务创建成功 ({})，等待完成...", job_id);

        let mut job = TransferJob {
            job_id,
            status: JobStatus::Pending,
        };
        wait_for_job(self.client, self.ctx, &mut job).await
    }

    /// 取链接，失败时按配置清理已转存的文件
    async fn links_or_release(&self, saved: &[String]) -> ResolveResult<Vec<DownloadLink>> {
        match self.client.get_download_links(self.ctx, saved).await {
            Ok(links) => Ok(links),
            Err(e) => {
                if self.delete_after_resolve() {
                    release_transferred(self.client, self.ctx, saved).await;
                }
                Err(e)
            }
        }
    }

    async fn transfer_batch(&self, entries: &[RemoteEntry]) -> ResolveResult<Vec<LinkedFile>> {
        info!("批量转存 {} 个文件到网盘...", entries.len());

        let saved = self.save_and_wait(entries).await?;
        if saved.is_empty() {
            return Err(ResolveError::TransferFailed("转存完成但结果为空".to_string()));
        }

        info!("获取下载链接...");
        let links = self.links_or_release(&saved).await?;
        if links.is_empty() {
            if self.delete_after_resolve() {
                release_transferred(self.client, self.ctx, &saved).await;
            }
            return Err(ResolveError::Provider {
                code: 0,
                message: "获取下载链接失败，请稍后重试".to_string(),
            });
        }
        info!("已批量转存 {} 个文件，成功获取下载链接", links.len());

        if self.delete_after_resolve() {
            info!("删除转存文件，释放空间...");
            release_transferred(self.client, self.ctx, &saved).await;
        }

        Ok(links
            .into_iter()
            .map(|link| {
                let relative_path = match_relative_path(&link, &saved, entries);
                LinkedFile {
                    link,
                    relative_path,
                }
            })
            .collect())
    }

    async fn transfer_sequential(&self, entries: &[RemoteEntry]) -> ResolveResult<Vec<LinkedFile>> {
        let total = entries.len();
        info!("开始逐个转存 {} 个文件...", total);

        let mut results = Vec::with_capacity(total);
        for (index, entry) in entries.iter().enumerate() {
            let progress = format!("[{}/{}]", index + 1, total);
            info!("{} 转存: {}", progress, entry.name);

            match self.transfer_one(entry, &progress).await {
                Ok(Some(file)) => {
                    info!("{} 完成: {}", progress, entry.name);
                    results.push(file);
                }
                Ok(None) => {}
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(e) => warn!("{} 处理失败: {}，跳过继续", progress, e),
            }
        }

        if results.is_empty() {
            return Err(ResolveError::TransferFailed("所有文件处理失败".to_string()));
        }
        info!("逐个转存完成，成功 {}/{} 个文件", results.len(), total);
        Ok(results)
    }

    /// 处理单个文件，`Ok(None)` 表示跳过
    async fn transfer_one(&self, entry: &RemoteEntry, progress: &str) -> ResolveResult<Option<LinkedFile>> {
        let saved = self.save_and_wait(std::slice::from_ref(entry)).await?;
        if saved.is_empty() {
            warn!("{} 转存结果为空，跳过", progress);
            return Ok(None);
        }

        let links = self.links_or_release(&saved).await?;
        if self.delete_after_resolve() {
            release_transferred(self.client, self.ctx, &saved).await;
        }

        match links.into_iter().next() {
            Some(link) => Ok(Some(LinkedFile {
                link,
                relative_path: entry.relative_path.clone(),
            })),
            None => {
                warn!("{} 获取下载链接失败，跳过", progress);
                Ok(None)
            }
        }
    }
}

/// 为批量模式的链接找回原始条目的相对路径
///
/// 先按转存结果顺序（saved[i] 对应 entries[i]），再按文件名，都找不到则为空
fn match_relative_path(link: &DownloadLink, saved: &[String], entries: &[RemoteEntry]) -> String {
    if let Some(entry) = saved
        .iter()
        .position(|fid| fid == &link.file_id)
        .and_then(|i| entries.get(i))
    {
        return entry.relative_path.clone();
    }

    entries
        .iter()
        .find(|e| e.name == link.name)
        .map(|e| e.relative_path.clone())
        .unwrap_or_default()
}
