use anyhow::{bail, Context};
use quark_share_resolver::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, ShareResolver,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 加载日志配置
///
/// 尝试从配置文件加载，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

/// 命令行参数：`[--pwd <提取码>] <分享链接>...`
struct CliArgs {
    passcode: Option<String>,
    urls: Vec<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut passcode = None;
    let mut urls = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--pwd" | "-p" => {
                passcode = Some(args.next().context("--pwd 需要一个提取码")?);
            }
            _ => urls.push(arg),
        }
    }

    if urls.is_empty() {
        bail!("用法: quark-share-resolver [--pwd <提取码>] <分享链接>...");
    }
    Ok(CliArgs { passcode, urls })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = load_log_config().await;

    // 必须保持 _log_guard 存活
    let _log_guard = logging::init_logging(&log_config);

    info!("Quark Share Resolver v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let args = parse_args()?;

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    config.validate().context("配置校验失败")?;

    let resolver = ShareResolver::from_config(config.resolver_config())
        .context("初始化解析器失败，请检查配置文件中的 Cookie")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到 Ctrl+C，取消解析...");
            signal_token.cancel();
        }
    });

    let mut failed = 0usize;
    for url in &args.urls {
        match resolver
            .resolve_with_passcode(url, args.passcode.clone(), cancel.child_token())
            .await
        {
            Ok(share) => {
                let output = serde_json::to_string_pretty(&share).context("序列化解析结果失败")?;
                println!("{}", output);
            }
            Err(e) if e.is_cancelled() => {
                error!("解析已取消: {}", url);
                bail!("解析已取消");
            }
            Err(e) => {
                error!("解析失败 {}: {}", url, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} 个链接解析失败", failed);
    }
    Ok(())
}
