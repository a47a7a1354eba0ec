// 分享链接解析

use super::error::{ResolveError, ResolveResult};
use super::types::ShareReference;
use regex::Regex;
use tracing::info;

fn compile(pattern: &str) -> ResolveResult<Regex> {
    Regex::new(pattern).map_err(|e| ResolveError::Parse(e.to_string()))
}

/// 解析分享链接，提取 share_id、提取码和子文件夹 ID
///
/// 支持格式：
/// - https://pan.quark.cn/s/abc123def456
/// - https://pan.quark.cn/s/abc123def456?pwd=xxxx
/// - https://pan.quark.cn/s/abc123def456#/list/share/<fid>
/// - 直接粘贴的分享 ID（纯字母数字，长度大于 10）
///
/// 链接中的 `[...]` 干扰字符会被先行移除。
pub fn parse_share_url(url: &str) -> ResolveResult<ShareReference> {
    if url.trim().is_empty() {
        return Err(ResolveError::Parse("无效的分享链接".to_string()));
    }

    let noise = compile(r"\[.*?\]")?;
    let clean = noise.replace_all(url, "");
    let clean = clean.trim();

    // 尝试匹配 /s/{id} 格式
    let re_id = compile(r"/s/([a-zA-Z0-9]+)")?;
    let share_id = match re_id.captures(clean).and_then(|c| c.get(1)) {
        Some(m) => Some(m.as_str().to_string()),
        None => {
            let bare = compile(r"^[a-zA-Z0-9]+$")?;
            if clean.len() > 10 && bare.is_match(clean) {
                Some(clean.to_string())
            } else {
                None
            }
        }
    };

    // 提取码: ?pwd=xxxx / &password=xxxx / ?pw=xxxx
    let re_pwd = compile(r"(?i)[?&](?:pwd|password|pw)=([a-zA-Z0-9]{4})")?;
    let passcode = re_pwd
        .captures(clean)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let re_dir = compile(r"#/list/share/([a-zA-Z0-9]+)")?;
    let subfolder_id = re_dir
        .captures(clean)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    match share_id {
        Some(share_id) => {
            info!(
                "解析结果 - share_id: {}, 密码: {}, 子目录: {}",
                share_id,
                passcode.as_deref().unwrap_or("无"),
                subfolder_id.as_deref().unwrap_or("根目录")
            );
            Ok(ShareReference {
                share_id,
                passcode,
                subfolder_id,
            })
        }
        None => Err(ResolveError::Parse(
            "无法从链接中解析出分享 ID，请检查链接格式".to_string(),
        )),
    }
}
