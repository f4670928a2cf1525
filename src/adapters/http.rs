//! 頁面抓取策略
//!
//! - `StaticFetcher`：直接 GET，適用於伺服器端渲染的頁面
//! - `RenderedFetcher`：交給遠端瀏覽器服務（Browserless `/content` 相容）執行 JavaScript 後回傳 HTML
//! - `FallbackFetcher`：先直接抓，被擋 (403) 或看起來需要登入時改用渲染服務

use crate::config::toml_config::HttpConfig;
use crate::domain::policy::RenderMode;
use crate::domain::ports::PageFetcher;
use crate::utils::error::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const LOGIN_INDICATORS: &[&str] = &[
    "log in to browse",
    "sign in to view",
    "login required",
    "please log in",
    "authentication required",
    "you need to sign in",
];

/// 建立共用的 HTTP client（逾時、User-Agent、預設標頭）
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| HarvestError::config(format!("Failed to create HTTP client: {}", e)))
}

/// 依設定選擇抓取策略
pub fn build_fetcher(config: &HttpConfig, client: Client) -> Result<Arc<dyn PageFetcher>> {
    let rendered = || -> Result<RenderedFetcher> {
        let endpoint = config
            .render_endpoint
            .clone()
            .ok_or_else(|| HarvestError::MissingConfigError {
                field: "http.render_endpoint".to_string(),
            })?;
        Ok(RenderedFetcher::new(client.clone(), endpoint, config.render_token.clone()))
    };

    let fetcher: Arc<dyn PageFetcher> = match config.render_mode {
        RenderMode::Static => Arc::new(StaticFetcher::new(client.clone())),
        RenderMode::Rendered => Arc::new(rendered()?),
        RenderMode::Auto => Arc::new(FallbackFetcher::new(
            StaticFetcher::new(client.clone()),
            Some(rendered()?),
        )),
    };

    tracing::debug!("Using {:?} page fetcher", fetcher.mode());
    Ok(fetcher)
}

/// 頁面內容是否像是登入牆
pub fn looks_login_gated(html: &str) -> bool {
    let lower = html.to_lowercase();
    LOGIN_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

#[derive(Clone)]
pub struct StaticFetcher {
    client: Client,
}

impl StaticFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::status(url.as_str(), status));
        }

        response
            .text()
            .await
            .map_err(|e| HarvestError::fetch(url.as_str(), e))
    }

    fn mode(&self) -> RenderMode {
        RenderMode::Static
    }
}

#[derive(Clone)]
pub struct RenderedFetcher {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RenderedFetcher {
    pub fn new(client: Client, endpoint: String, token: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            token,
        }
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        tracing::debug!("RENDER {} via {}", url, self.endpoint);
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "url": url.as_str() }));

        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url.as_str(), format!("render service: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::FetchError {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("render service returned HTTP {}", status),
            });
        }

        response
            .text()
            .await
            .map_err(|e| HarvestError::fetch(url.as_str(), e))
    }

    fn mode(&self) -> RenderMode {
        RenderMode::Rendered
    }
}

pub struct FallbackFetcher {
    primary: StaticFetcher,
    rendered: Option<RenderedFetcher>,
}

impl FallbackFetcher {
    pub fn new(primary: StaticFetcher, rendered: Option<RenderedFetcher>) -> Self {
        Self { primary, rendered }
    }

    fn is_blocking_error(error: &HarvestError) -> bool {
        matches!(error.http_status(), Some(401) | Some(403) | Some(429))
    }
}

#[async_trait]
impl PageFetcher for FallbackFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let reason = match self.primary.fetch(url).await {
            Ok(html) if !looks_login_gated(&html) => return Ok(html),
            Ok(html) => {
                if self.rendered.is_none() {
                    return Ok(html);
                }
                "page requires login".to_string()
            }
            Err(e) if Self::is_blocking_error(&e) && self.rendered.is_some() => e.to_string(),
            Err(e) => return Err(e),
        };

        match &self.rendered {
            Some(rendered) => {
                tracing::warn!("🔄 {} ({}), falling back to rendered fetch", url, reason);
                rendered.fetch(url).await
            }
            None => Err(HarvestError::fetch(url.as_str(), reason)),
        }
    }

    fn mode(&self) -> RenderMode {
        RenderMode::Auto
    }
}
