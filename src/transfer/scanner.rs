// 分享目录扫描
//
// 用显式的待扫描目录队列代替递归，逐层并发列目录

use super::context::ResolveContext;
use super::error::{ResolveError, ResolveResult};
use super::types::{RemoteEntry, ShareToken};
use crate::netdisk::{QuarkClient, ShareListItem};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// 单个目录最多翻页次数
const MAX_PAGES_PER_FOLDER: u32 = 1000;

/// 待扫描目录
#[derive(Debug, Clone)]
struct PendingFolder {
    folder_id: String,
    /// 该目录下文件的相对路径
    prefix: String,
    depth: usize,
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// 列出一个目录的全部直接子项（自动翻页）
async fn list_folder(
    client: &QuarkClient,
    ctx: &ResolveContext,
    share_id: &str,
    token: &ShareToken,
    folder_id: &str,
) -> ResolveResult<Vec<ShareListItem>> {
    let page_size = ctx.config.page_size;
    let mut items = Vec::new();
    let mut page = 1u32;

    loop {
        let result = client
            .list_share_page(ctx, share_id, token, folder_id, page, page_size)
            .await?;
        let received = result.items.len();
        items.extend(result.items);

        let finished = match result.total {
            Some(total) => items.len() as u64 >= total,
            None => received < page_size as usize,
        };
        if received == 0 || finished {
            break;
        }
        if page >= MAX_PAGES_PER_FOLDER {
            return Err(ResolveError::Scan(format!(
                "目录 {} 分页超过上限 {} 页",
                folder_id, MAX_PAGES_PER_FOLDER
            )));
        }
        page += 1;
    }

    Ok(items)
}

/// 扫描分享中的所有文件
///
/// 返回扁平的文件列表，`relative_path` 为祖先目录名拼接。顺序不固定。
/// 目录层级超过 `max_scan_depth` 时返回 `ScanError`，防止畸形数据导致无限展开。
pub async fn scan_share(
    client: &QuarkClient,
    ctx: &ResolveContext,
    share_id: &str,
    token: &ShareToken,
    start_folder: &str,
) -> ResolveResult<Vec<RemoteEntry>> {
    let max_depth = ctx.config.max_scan_depth;
    let concurrency = ctx.config.scan_concurrency;

    let mut pending = vec![PendingFolder {
        folder_id: start_folder.to_string(),
        prefix: String::new(),
        depth: 0,
    }];
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    while !pending.is_empty() {
        if ctx.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let level: Vec<PendingFolder> = std::mem::take(&mut pending);
        let listed: Vec<(PendingFolder, Vec<ShareListItem>)> = stream::iter(level)
            .map(|folder| async move {
                let items = list_folder(client, ctx, share_id, token, &folder.folder_id).await?;
                Ok::<_, ResolveError>((folder, items))
            })
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        for (folder, items) in listed {
            for item in items {
                if item.dir {
                    let path = join_path(&folder.prefix, &item.file_name);
                    let depth = folder.depth + 1;
                    if depth > max_depth {
                        return Err(ResolveError::Scan(format!(
                            "目录层级超过上限 {}: {}",
                            max_depth, path
                        )));
                    }
                    info!("进入文件夹: {}", path);
                    pending.push(PendingFolder {
                        folder_id: item.fid,
                        prefix: path,
                        depth,
                    });
                } else {
                    if !seen.insert(item.fid.clone()) {
                        warn!("重复的文件 fid，已忽略: {}", item.fid);
                        continue;
                    }
                    debug!(
                        "找到文件: {} ({:.2} MB)",
                        join_path(&folder.prefix, &item.file_name),
                        item.size as f64 / 1024.0 / 1024.0
                    );
                    entries.push(RemoteEntry {
                        file_token: item.token(),
                        file_id: item.fid,
                        name: item.file_name,
                        size: item.size,
                        is_directory: false,
                        relative_path: folder.prefix.clone(),
                    });
                }
            }
        }
    }

    Ok(entries)
}
