// 转存文件清理

use super::context::ResolveContext;
use crate::netdisk::QuarkClient;
use tracing::{info, warn};

/// 删除转存到网盘的文件，释放空间
///
/// 下载链接在获取后有独立的过期时间，删除文件不影响已获取的链接，
/// 所以这里的任何失败（包括取消）都只记录警告，返回是否删除成功。
pub async fn release_transferred(client: &QuarkClient, ctx: &ResolveContext, fids: &[String]) -> bool {
    if fids.is_empty() {
        return true;
    }

    match client.delete_files(ctx, fids).await {
        Ok(()) => {
            info!("成功删除 {} 个文件，已释放网盘空间", fids.len());
            true
        }
        Err(e) => {
            warn!("删除文件失败: {}，不影响下载", e);
            false
        }
    }
}
