use crate::utils::error::{HarvestError, Result};
use url::Url;

pub const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// 清理使用者提供或頁面抓到的個人頁面連結
///
/// 處理重複的前綴（例如 `https://github.com/https://github.com/alice`），
/// 沒有 scheme 時補上 `https://`，並要求必須有主機名稱。
pub fn normalize_profile_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::parse(raw, "empty URL"));
    }

    let collapsed = collapse_repeated_scheme(trimmed);
    let candidate = if collapsed.contains("://") {
        collapsed.to_string()
    } else {
        format!("https://{}", collapsed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| HarvestError::parse(raw, format!("invalid URL: {}", e)))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(HarvestError::parse(
                raw,
                format!("unsupported scheme: {}", scheme),
            ))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(HarvestError::parse(raw, "URL has no host"));
    }

    Ok(url)
}

/// 只保留最後一個 `http(s)://` 之後的部分；query 與 fragment 內的網址不算
fn collapse_repeated_scheme(value: &str) -> &str {
    let head = value
        .find(['?', '#'])
        .map_or(value, |end| &value[..end]);
    let last = head.rfind("https://").into_iter().chain(head.rfind("http://")).max();
    match last {
        Some(index) if index > 0 => &value[index..],
        _ => value,
    }
}

/// `host` 是否為 `domain` 或其子網域
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_start_matches("www.").to_ascii_lowercase();
    let domain = domain.trim_start_matches("www.").to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}
