// 网盘客户端实现

use super::gateway::{ApiRequest, RequestGateway, API_BASE_URL, DRIVE_BASE_URL, DRIVE_PC_BASE_URL};
use super::types::{
    ApiEnvelope, DownloadItem, Endpoint, MemberData, PageMetadata, SaveData, ShareDetailData,
    ShareListItem, TaskData, TokenData,
};
use crate::transfer::context::ResolveContext;
use crate::transfer::error::{ResolveError, ResolveResult};
use crate::transfer::types::{DownloadLink, JobStatus, RemoteEntry, ShareReference, ShareToken};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 公共查询参数
const COMMON_PARAMS: &str = "pr=ucpro&fr=pc&uc_param_str=";

/// 分享标题缺省值
const DEFAULT_TITLE: &str = "夸克分享";

fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 目录列表的一页
#[derive(Debug)]
pub struct SharePage {
    pub items: Vec<ShareListItem>,
    /// 服务端报告的条目总数（如有）
    pub total: Option<u64>,
}

/// 转存任务查询结果
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub status: JobStatus,
    /// 转存后的顶层文件 fid（仅成功时有值）
    pub saved_fids: Vec<String>,
}

/// 夸克网盘客户端
///
/// 每个方法对应一个接口，响应统一经 `ApiEnvelope::check` 分类错误码
#[derive(Clone)]
pub struct QuarkClient {
    gateway: Arc<dyn RequestGateway>,
}

impl QuarkClient {
    pub fn new(gateway: Arc<dyn RequestGateway>) -> Self {
        Self { gateway }
    }

    async fn call<T>(
        &self,
        ctx: &ResolveContext,
        endpoint: Endpoint,
        request: ApiRequest,
    ) -> ResolveResult<ApiEnvelope<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.gateway.execute(request, &ctx.cancel).await?;
        ApiEnvelope::<T>::from_value(value, endpoint)?.check(endpoint)
    }

    /// 获取分享 Token
    ///
    /// 31001 需要提取码，31002 分享已失效
    pub async fn get_share_token(
        &self,
        ctx: &ResolveContext,
        share: &ShareReference,
    ) -> ResolveResult<ShareToken> {
        let url = format!(
            "{}/1/clouddrive/share/sharepage/token?{}&__dt={}",
            API_BASE_URL,
            COMMON_PARAMS,
            timestamp_ms()
        );
        let body = json!({
            "pwd_id": share.share_id,
            "passcode": share.passcode.clone().unwrap_or_default(),
        });

        let res: ApiEnvelope<TokenData> =
            self.call(ctx, Endpoint::Token, ApiRequest::post(url, body)).await?;
        let data = res.data.ok_or_else(|| ResolveError::Provider {
            code: 0,
            message: "Token 响应缺少 data".to_string(),
        })?;

        if data.stoken.is_empty() {
            return Err(ResolveError::Provider {
                code: 0,
                message: "Token 响应缺少 stoken".to_string(),
            });
        }

        let title = data
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        info!("Token 获取成功: {}", title);

        Ok(ShareToken {
            session_token: data.stoken,
            title,
        })
    }

    /// 获取分享目录的一页
    ///
    /// # 参数
    /// * `folder_id` - 目录 fid（根目录为空字符串）
    /// * `page` - 页码（从1开始）
    pub async fn list_share_page(
        &self,
        ctx: &ResolveContext,
        share_id: &str,
        token: &ShareToken,
        folder_id: &str,
        page: u32,
        page_size: u32,
    ) -> ResolveResult<SharePage> {
        let url = format!(
            "{}/1/clouddrive/share/sharepage/detail?{}&pwd_id={}&stoken={}&pdir_fid={}\
             &force=0&_page={}&_size={}&_fetch_banner=1&_fetch_share=1&_fetch_total=1\
             &_sort=file_type:asc,updated_at:desc&__dt={}",
            API_BASE_URL,
            COMMON_PARAMS,
            share_id,
            urlencoding::encode(&token.session_token),
            folder_id,
            page,
            page_size,
            timestamp_ms()
        );

        let res: ApiEnvelope<ShareDetailData> = self
            .call(ctx, Endpoint::ListDirectory, ApiRequest::get(url))
            .await?;

        let total = res
            .metadata
            .and_then(|m| serde_json::from_value::<PageMetadata>(m).ok())
            .and_then(|m| m.total);
        let items = res.data.unwrap_or_default().list;
        debug!(
            "目录 {} 第 {} 页: {} 个条目",
            if folder_id.is_empty() { "<根目录>" } else { folder_id },
            page,
            items.len()
        );

        Ok(SharePage { items, total })
    }

    /// 转存文件到自己的网盘，返回转存任务 ID
    pub async fn save_files(
        &self,
        ctx: &ResolveContext,
        share_id: &str,
        token: &ShareToken,
        entries: &[RemoteEntry],
    ) -> ResolveResult<String> {
        let url = format!(
            "{}/1/clouddrive/share/sharepage/save?{}",
            DRIVE_PC_BASE_URL, COMMON_PARAMS
        );
        let fid_list: Vec<&str> = entries.iter().map(|e| e.file_id.as_str()).collect();
        let fid_token_list: Vec<&str> = entries.iter().map(|e| e.file_token.as_str()).collect();
        let body = json!({
            "fid_list": fid_list,
            "fid_token_list": fid_token_list,
            "to_pdir_fid": "0",
            "pwd_id": share_id,
            "stoken": token.session_token,
            "pdir_fid": "0",
            "scene": "link",
        });

        let res: ApiEnvelope<SaveData> =
            self.call(ctx, Endpoint::Save, ApiRequest::post(url, body)).await?;

        res.data
            .and_then(|d| d.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ResolveError::TransferFailed("转存任务创建失败".to_string()))
    }

    /// 查询转存任务状态
    ///
    /// 以 `data.status` 为准：错误码非 0 但没有终止状态时视为仍在处理，
    /// 由轮询截止时间兜底
    pub async fn query_task(
        &self,
        ctx: &ResolveContext,
        task_id: &str,
        retry_index: u32,
    ) -> ResolveResult<TaskSnapshot> {
        let url = format!(
            "{}/1/clouddrive/task?{}&task_id={}&retry_index={}&__dt={}",
            DRIVE_PC_BASE_URL,
            COMMON_PARAMS,
            task_id,
            retry_index,
            timestamp_ms()
        );

        let value = self.gateway.execute(ApiRequest::get(url), &ctx.cancel).await?;
        let res = ApiEnvelope::<TaskData>::from_value(value, Endpoint::Task)?;
        let success = res.is_success();

        let snapshot = match res.data {
            Some(data) => TaskSnapshot {
                status: JobStatus::from_code(data.status),
                saved_fids: data.save_as.unwrap_or_default().save_as_top_fids,
            },
            // 没有 data 视为仍在处理
            None => TaskSnapshot {
                status: JobStatus::Running,
                saved_fids: Vec::new(),
            },
        };

        if !success && !snapshot.status.is_terminal() {
            warn!(
                "查询转存任务 {} 返回错误码 {:?}: {}，继续等待",
                task_id, res.code, res.message
            );
        }
        Ok(snapshot)
    }

    /// 获取下载链接（一次请求所有 fid）
    pub async fn get_download_links(
        &self,
        ctx: &ResolveContext,
        fids: &[String],
    ) -> ResolveResult<Vec<DownloadLink>> {
        let url = format!("{}/1/clouddrive/file/download?{}", DRIVE_BASE_URL, COMMON_PARAMS);
        let body = json!({ "fids": fids });

        let res: ApiEnvelope<Vec<DownloadItem>> = self
            .call(ctx, Endpoint::Download, ApiRequest::post(url, body))
            .await?;

        Ok(res
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|item| DownloadLink {
                file_id: item.fid,
                name: item.file_name,
                url: item.download_url,
                size: item.size,
            })
            .collect())
    }

    /// 删除网盘中的文件
    ///
    /// 调用方负责决定失败是否可以忽略
    pub async fn delete_files(&self, ctx: &ResolveContext, fids: &[String]) -> ResolveResult<()> {
        let url = format!("{}/1/clouddrive/file/delete?{}", DRIVE_BASE_URL, COMMON_PARAMS);
        let body = json!({
            "action_type": 2,
            "filelist": fids,
            "exclude_fids": [],
        });

        let _: ApiEnvelope<Value> = self
            .call(ctx, Endpoint::Delete, ApiRequest::post(url, body))
            .await?;
        Ok(())
    }

    /// 获取网盘可用空间（字节）
    ///
    /// 优先读取 `metadata.range_size`，缺失时用 `data.total_capacity - data.use_capacity`
    pub async fn get_capacity(&self, ctx: &ResolveContext) -> ResolveResult<u64> {
        let url = format!(
            "{}/1/clouddrive/member?{}&fetch_subscribe=true&_ch=home&fetch_identity=true",
            DRIVE_BASE_URL, COMMON_PARAMS
        );

        let res: ApiEnvelope<MemberData> =
            self.call(ctx, Endpoint::Member, ApiRequest::get(url)).await?;

        let range_size = res
            .metadata
            .as_ref()
            .and_then(|m| m.get("range_size"))
            .and_then(Value::as_u64);
        if let Some(size) = range_size {
            return Ok(size);
        }

        match res.data {
            Some(MemberData {
                total_capacity: Some(total),
                use_capacity: Some(used),
            }) => Ok(total.saturating_sub(used)),
            _ => Err(ResolveError::Provider {
                code: 0,
                message: "容量信息中未找到 range_size 字段".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::netdisk::gateway::HttpMethod;
    use crate::netdisk::mock::{query_param, MockGateway};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ResolveContext {
        ResolveContext::new(Arc::new(ResolverConfig::default()), CancellationToken::new())
    }

    fn token() -> ShareToken {
        ShareToken {
            session_token: "st/o+ken".to_string(),
            title: "t".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_share_token() {
        let gateway = Arc::new(MockGateway::new(|req| {
            let body = req.body.clone().unwrap();
            assert_eq!(body["pwd_id"], "abc");
            assert_eq!(body["passcode"], "");
            Ok(json!({"code": 0, "data": {"stoken": "s1", "title": ""}}))
        }));
        let client = QuarkClient::new(gateway.clone());
        let share = ShareReference {
            share_id: "abc".to_string(),
            passcode: None,
            subfolder_id: None,
        };

        let token = client.get_share_token(&ctx(), &share).await.unwrap();
        assert_eq!(token.session_token, "s1");
        assert_eq!(token.title, "夸克分享");

        let req = &gateway.requests()[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert!(req.url.starts_with("https://pan.quark.cn/1/clouddrive/share/sharepage/token?"));
    }

    #[tokio::test]
    async fn test_get_share_token_password_required() {
        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({"code": 31001, "message": "需要提取码"}))
        }));
        let client = QuarkClient::new(gateway);
        let share = ShareReference {
            share_id: "abc".to_string(),
            passcode: None,
            subfolder_id: None,
        };
        assert!(matches!(
            client.get_share_token(&ctx(), &share).await,
            Err(ResolveError::PasswordRequired { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_share_page_encodes_token() {
        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({
                "code": 0,
                "data": {"list": [{"fid": "f1", "file_name": "a.txt", "size": 5, "dir": false}]},
                "metadata": {"_total": 1}
            }))
        }));
        let client = QuarkClient::new(gateway.clone());

        let page = client
            .list_share_page(&ctx(), "abc", &token(), "d1", 2, 50)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, Some(1));

        let url = &gateway.requests()[0].url;
        assert_eq!(query_param(url, "stoken").as_deref(), Some("st%2Fo%2Bken"));
        assert_eq!(query_param(url, "pdir_fid").as_deref(), Some("d1"));
        assert_eq!(query_param(url, "_page").as_deref(), Some("2"));
        assert_eq!(query_param(url, "_size").as_deref(), Some("50"));
    }

    #[tokio::test]
    async fn test_save_files_without_task_id() {
        let gateway = Arc::new(MockGateway::new(|_| Ok(json!({"code": 0, "data": {}}))));
        let client = QuarkClient::new(gateway);
        let result = client.save_files(&ctx(), "abc", &token(), &[]).await;
        assert!(matches!(result, Err(ResolveError::TransferFailed(_))));
    }

    #[tokio::test]
    async fn test_download_large_file_restricted() {
        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({"code": 23018, "message": "file too large"}))
        }));
        let client = QuarkClient::new(gateway);
        let result = client.get_download_links(&ctx(), &["f1".to_string()]).await;
        assert_eq!(result, Err(ResolveError::LargeFileRestricted { code: 23018 }));
    }

    #[tokio::test]
    async fn test_get_capacity_sources() {
        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({"code": 0, "data": {}, "metadata": {"range_size": 1024}}))
        }));
        assert_eq!(
            QuarkClient::new(gateway).get_capacity(&ctx()).await.unwrap(),
            1024
        );

        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({"code": 0, "data": {"total_capacity": 100, "use_capacity": 30}}))
        }));
        assert_eq!(
            QuarkClient::new(gateway).get_capacity(&ctx()).await.unwrap(),
            70
        );

        let gateway = Arc::new(MockGateway::new(|_| Ok(json!({"code": 0, "data": {}}))));
        assert!(QuarkClient::new(gateway).get_capacity(&ctx()).await.is_err());
    }

    #[tokio::test]
    async fn test_query_task_tolerates_error_code() {
        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({"code": 32003, "message": "busy"}))
        }));
        let snapshot = QuarkClient::new(gateway)
            .query_task(&ctx(), "t1", 0)
            .await
            .unwrap();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(snapshot.saved_fids.is_empty());

        let gateway = Arc::new(MockGateway::new(|_| {
            Ok(json!({"code": 1, "data": {"status": 3}}))
        }));
        let snapshot = QuarkClient::new(gateway)
            .query_task(&ctx(), "t1", 0)
            .await
            .unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
    }
}
