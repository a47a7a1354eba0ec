// 测试用内存网关

use super::gateway::{ApiRequest, RequestGateway};
use crate::transfer::error::ResolveResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

type Handler = Box<dyn Fn(&ApiRequest) -> ResolveResult<Value> + Send + Sync>;

/// 按请求内容返回预设响应，并记录所有请求
pub struct MockGateway {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockGateway {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> ResolveResult<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// URL 中包含指定片段的请求数
    pub fn count(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl RequestGateway for MockGateway {
    async fn execute(&self, request: ApiRequest, _cancel: &CancellationToken) -> ResolveResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

/// 从 URL 中取查询参数（未解码）
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}
