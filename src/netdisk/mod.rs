// 夸克网盘 API 模块

pub mod client;
pub mod gateway;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::{QuarkClient, SharePage, TaskSnapshot};
pub use gateway::{
    run_with_retry, ApiRequest, HttpGateway, HttpMethod, RequestGateway, RetryPolicy, USER_AGENT,
};
pub use types::{ApiEnvelope, Endpoint, ShareListItem};
