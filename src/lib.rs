// Quark Share Resolver Library
// 夸克网盘分享链接解析核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 夸克网盘 API 模块
pub mod netdisk;

// 分享转存解析模块
pub mod transfer;

// 导出常用类型
pub use config::{AppConfig, ResolverConfig};
pub use netdisk::{HttpGateway, QuarkClient, RequestGateway};
pub use transfer::{
    parse_share_url, ResolveError, ResolveResult, ResolvedFile, ResolvedShare, ShareResolver,
};
