// 分享链接解析入口
//
// 解析链接 → 获取 Token → 扫描文件 → 选择转存模式 → 转存取链接 → 组装结果

use super::context::ResolveContext;
use super::error::{ResolveError, ResolveResult};
use super::orchestrator::TransferOrchestrator;
use super::parser::parse_share_url;
use super::planner::build_plan;
use super::scanner::scan_share;
use super::types::{
    total_size, DownloadHeaders, DownloadRequest, ResolvedFile, ResolvedShare, TransferMode,
};
use crate::config::ResolverConfig;
use crate::netdisk::{HttpGateway, QuarkClient, RequestGateway, USER_AGENT};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// 夸克分享解析器
///
/// 可以被多个并发解析共享：每次调用创建独立的 `ResolveContext`，
/// 解析之间只共享只读配置和网关。
#[derive(Clone)]
pub struct ShareResolver {
    config: Arc<ResolverConfig>,
    client: QuarkClient,
}

impl ShareResolver {
    pub fn new(config: ResolverConfig, gateway: Arc<dyn RequestGateway>) -> Self {
        Self {
            config: Arc::new(config),
            client: QuarkClient::new(gateway),
        }
    }

    /// 使用 HTTP 网关创建解析器
    pub fn from_config(config: ResolverConfig) -> ResolveResult<Self> {
        let gateway = HttpGateway::new(&config)?;
        Ok(Self::new(config, Arc::new(gateway)))
    }

    /// 解析分享链接，返回所有文件的下载请求
    pub async fn resolve(&self, url: &str, cancel: CancellationToken) -> ResolveResult<ResolvedShare> {
        self.resolve_with_passcode(url, None, cancel).await
    }

    /// 解析分享链接，`passcode` 优先于链接中携带的提取码
    pub async fn resolve_with_passcode(
        &self,
        url: &str,
        passcode: Option<String>,
        cancel: CancellationToken,
    ) -> ResolveResult<ResolvedShare> {
        let ctx = ResolveContext::new(self.config.clone(), cancel);
        let span = ctx.span().clone();

        let started = Instant::now();
        let result = self.run(&ctx, url, passcode).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(share) => info!(
                "解析完成，{} 个文件，耗时 {:.2}秒",
                share.files.len(),
                started.elapsed().as_secs_f64()
            ),
            Err(ResolveError::Cancelled) => warn!("解析已取消"),
            Err(e) => warn!("解析失败: {}", e),
        });
        result
    }

    async fn run(
        &self,
        ctx: &ResolveContext,
        url: &str,
        passcode: Option<String>,
    ) -> ResolveResult<ResolvedShare> {
        let cookie = ctx.config.credential()?.to_string();
        if ctx.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        info!("开始解析: {}", url);
        let share = parse_share_url(url)?.with_passcode(passcode);
        info!(
            "Step 1: 分享ID={}, 提取码={}, 子目录={}",
            share.share_id,
            share.passcode.as_deref().unwrap_or("无"),
            share.subfolder_id.as_deref().unwrap_or("根目录")
        );

        info!("Step 2: 获取 Token...");
        let token = self.client.get_share_token(ctx, &share).await?;

        info!("Step 3: 扫描文件...");
        let entries = scan_share(&self.client, ctx, &share.share_id, &token, share.start_folder()).await?;
        if entries.is_empty() {
            return Err(ResolveError::EmptyShare);
        }
        info!(
            "共找到 {} 个文件，总大小 {:.2} GB",
            entries.len(),
            total_size(&entries) as f64 / 1024.0 / 1024.0 / 1024.0
        );

        let plan = build_plan(&self.client, ctx, entries).await?;
        info!(
            "Step 4: {}转存 {} 个文件",
            match plan.mode {
                TransferMode::Batch => "批量",
                TransferMode::Sequential => "逐个",
            },
            plan.entries.len()
        );
        let linked = TransferOrchestrator::new(&self.client, ctx, &share.share_id, &token)
            .execute(&plan)
            .await?;

        let headers = DownloadHeaders {
            user_agent: USER_AGENT.to_string(),
            cookie,
        };
        let files = linked
            .into_iter()
            .map(|file| ResolvedFile {
                name: file.link.name,
                size: file.link.size,
                relative_path: file.relative_path,
                request: DownloadRequest {
                    url: file.link.url,
                    headers: headers.clone(),
                },
            })
            .collect();

        Ok(ResolvedShare {
            title: token.title,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferModeSetting;
    use crate::netdisk::mock::{query_param, MockGateway};
    use crate::netdisk::ApiRequest;
    use serde_json::{json, Value};

    fn config() -> ResolverConfig {
        let mut config = ResolverConfig::default();
        config.credential = Some("kps=abc".to_string());
        config.delete_after_resolve = true;
        config
    }

    /// 根目录: movie.mp4 + 文件夹 extras/bonus.mkv
    fn share_api(req: &ApiRequest) -> ResolveResult<Value> {
        let url = req.url.as_str();
        if url.contains("sharepage/token") {
            let body = req.body.as_ref().unwrap();
            if body["passcode"] != "9f3k" {
                return Ok(json!({"code": 31001, "message": "需要提取码"}));
            }
            return Ok(json!({"code": 0, "data": {"stoken": "st-1", "title": "我的分享"}}));
        }
        if url.contains("sharepage/detail") {
            let items = match query_param(url, "pdir_fid").unwrap_or_default().as_str() {
                "" => json!([
                    {"fid": "f1", "file_name": "movie.mp4", "size": 700, "dir": false, "share_fid_token": "t1"},
                    {"fid": "d1", "file_name": "extras", "size": 0, "dir": true}
                ]),
                "d1" => json!([
                    {"fid": "f2", "file_name": "bonus.mkv", "size": 300, "dir": false, "fid_token": "t2"}
                ]),
                _ => json!([]),
            };
            return Ok(json!({"code": 0, "data": {"list": items}}));
        }
        if url.contains("clouddrive/member") {
            return Ok(json!({"code": 0, "metadata": {"range_size": 10_000}}));
        }
        if url.contains("sharepage/save") {
            let body = req.body.as_ref().unwrap();
            assert_eq!(body["stoken"], "st-1");
            let n = body["fid_list"].as_array().unwrap().len();
            return Ok(json!({"code": 0, "data": {"task_id": format!("task-{}", n)}}));
        }
        if url.contains("clouddrive/task") {
            return Ok(json!({"code": 0, "data": {"status": 2, "save_as": {"save_as_top_fids": ["s1", "s2"]}}}));
        }
        if url.contains("file/download") {
            return Ok(json!({"code": 0, "data": [
                {"fid": "s1", "file_name": "movie.mp4", "size": 700, "download_url": "https://dl/s1"},
                {"fid": "s2", "file_name": "bonus.mkv", "size": 300, "download_url": "https://dl/s2"}
            ]}));
        }
        if url.contains("file/delete") {
            return Ok(json!({"code": 0}));
        }
        panic!("unexpected request {}", url)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_batch_end_to_end() {
        let gateway = Arc::new(MockGateway::new(share_api));
        let resolver = ShareResolver::new(config(), gateway.clone());

        let share = resolver
            .resolve("https://pan.quark.cn/s/abc123def456?pwd=9f3k", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(share.title, "我的分享");
        assert_eq!(share.files.len(), 2);
        assert_eq!(share.files[0].name, "movie.mp4");
        assert_eq!(share.files[0].size, 700);
        assert_eq!(share.files[1].size, 300);
        assert_eq!(share.files[0].relative_path, "");
        assert_eq!(share.files[1].relative_path, "extras");
        assert_eq!(share.files[1].request.url, "https://dl/s2");
        assert_eq!(share.files[1].request.headers.cookie, "kps=abc");
        assert_eq!(share.files[1].request.headers.user_agent, USER_AGENT);

        assert_eq!(gateway.count("sharepage/save"), 1);
        assert_eq!(gateway.count("file/delete"), 1);
    }

    #[tokio::test]
    async fn test_password_required_stops_early() {
        let gateway = Arc::new(MockGateway::new(share_api));
        let resolver = ShareResolver::new(config(), gateway.clone());

        let result = resolver
            .resolve("https://pan.quark.cn/s/abc123def456", CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ResolveError::PasswordRequired { .. })));
        assert_eq!(gateway.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_sequential_end_to_end() {
        let gateway = Arc::new(MockGateway::new(|req| {
            if req.url.contains("clouddrive/task") {
                return Ok(json!({"code": 0, "data": {"status": 2, "save_as": {"save_as_top_fids": ["s1"]}}}));
            }
            if req.url.contains("file/download") {
                return Ok(json!({"code": 0, "data": [
                    {"fid": "s1", "file_name": "one", "size": 1, "download_url": "https://dl/s1"}
                ]}));
            }
            share_api(req)
        }));
        let mut config = config();
        config.transfer_mode = TransferModeSetting::ForceSequential;
        let resolver = ShareResolver::new(config, gateway.clone());

        let share = resolver
            .resolve_with_passcode(
                "https://pan.quark.cn/s/abc123def456",
                Some("9f3k".to_string()),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(share.files.len(), 2);
        assert_eq!(gateway.count("clouddrive/member"), 0);
        assert_eq!(gateway.count("sharepage/save"), 2);
        assert_eq!(gateway.count("file/delete"), 2);
    }

    #[tokio::test]
    async fn test_missing_cookie_fails_before_requests() {
        let gateway = Arc::new(MockGateway::new(share_api));
        let resolver = ShareResolver::new(ResolverConfig::default(), gateway.clone());

        let result = resolver
            .resolve("https://pan.quark.cn/s/abc123def456", CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ResolveError::Configuration(_))));
        assert!(gateway.requests().is_empty());

        assert!(matches!(
            ShareResolver::from_config(ResolverConfig::default()),
            Err(ResolveError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_and_empty_share() {
        let gateway = Arc::new(MockGateway::new(|req| {
            if req.url.contains("sharepage/detail") {
                return Ok(json!({"code": 0, "data": {"list": []}}));
            }
            share_api(req)
        }));
        let resolver = ShareResolver::new(config(), gateway.clone());

        let result = resolver.resolve("not a link", CancellationToken::new()).await;
        assert!(matches!(result, Err(ResolveError::Parse(_))));
        assert!(gateway.requests().is_empty());

        let result = resolver
            .resolve("https://pan.quark.cn/s/abc123def456?pwd=9f3k", CancellationToken::new())
            .await;
        assert_eq!(result, Err(ResolveError::EmptyShare));
        assert_eq!(gateway.count("sharepage/save"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let gateway = Arc::new(MockGateway::new(share_api));
        let resolver = ShareResolver::new(config(), gateway.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolver
            .resolve("https://pan.quark.cn/s/abc123def456?pwd=9f3k", cancel)
            .await;
        assert_eq!(result, Err(ResolveError::Cancelled));
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolves_share_one_resolver() {
        let gateway = Arc::new(MockGateway::new(share_api));
        let resolver = ShareResolver::new(config(), gateway.clone());
        let url = "https://pan.quark.cn/s/abc123def456?pwd=9f3k";
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(
            resolver.resolve(url, cancel.child_token()),
            resolver.resolve(url, cancel.child_token())
        );

        for share in [first.unwrap(), second.unwrap()] {
            assert_eq!(share.files.len(), 2);
            assert_eq!(share.files[0].size, 700);
            assert_eq!(share.files[1].size, 300);
            assert_eq!(share.files[1].relative_path, "extras");
        }
        assert_eq!(gateway.count("sharepage/token"), 2);
        assert_eq!(gateway.count("sharepage/save"), 2);
        assert_eq!(gateway.count("file/delete"), 2);
    }
}
