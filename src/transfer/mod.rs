// 分享转存解析模块
//
// 解析分享链接，转存到自己的网盘后获取直链，按需删除转存文件

pub mod cleanup;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod poller;
pub mod resolver;
pub mod scanner;
pub mod types;

pub use context::ResolveContext;
pub use error::{ResolveError, ResolveResult};
pub use parser::parse_share_url;
pub use resolver::ShareResolver;
pub use types::{
    DownloadHeaders, DownloadLink, DownloadRequest, RemoteEntry, ResolvedFile, ResolvedShare,
    ShareReference, TransferMode, TransferPlan,
};
