use crate::config::toml_config::ContactsConfig;
use crate::domain::model::{ContactKind, ContactLink, ContactRecord};
use crate::domain::ports::{PageFetcher, Summarize};
use crate::utils::error::{HarvestError, Result};
use crate::utils::links::EMAIL_PATTERN;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

const GITHUB_HOST: &str = "github.com";
const RAW_CONTENT_ORIGIN: &str = "https://raw.githubusercontent.com";

/// 地址含這些片段時視為系統或範例信箱
const IGNORED_EMAIL_FRAGMENTS: &[&str] = &[
    "noreply",
    "no-reply",
    "example.com",
    "test.com",
    "github.com",
];

/// `logo@2x.png` 之類的檔名也符合 email 格式
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// 替還沒有 email 的聯絡紀錄，到連出去的程式碼託管頁與個人網站找地址
///
/// GitHub 個人頁沒有公開信箱時，再讀前幾個儲存庫的 README。
/// 找不到或抓取失敗都只記錄日誌，不會讓該筆紀錄變成失敗。
pub struct EmailEnricher {
    fetcher: Arc<dyn PageFetcher>,
    email_pattern: Regex,
    mailto: Selector,
    anchors: Selector,
    max_repositories: usize,
    raw_origin: Url,
}

impl EmailEnricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ContactsConfig) -> Result<Self> {
        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| HarvestError::config(format!("email pattern: {}", e)))?;
        let mailto = Selector::parse(r#"a[href^="mailto:"]"#)
            .map_err(|e| HarvestError::config(format!("mailto selector: {}", e)))?;
        let anchors = Selector::parse("a[href]")
            .map_err(|e| HarvestError::config(format!("anchor selector: {}", e)))?;
        let raw_origin = Url::parse(RAW_CONTENT_ORIGIN)
            .map_err(|e| HarvestError::config(format!("raw content origin: {}", e)))?;

        Ok(Self {
            fetcher,
            email_pattern,
            mailto,
            anchors,
            max_repositories: config.enrich_max_repositories,
            raw_origin,
        })
    }

    /// 回傳新增的 email 數量
    pub async fn enrich(&self, record: &mut ContactRecord) -> usize {
        if record.error.is_some() || !record.emails().is_empty() {
            return 0;
        }

        let mut found: Vec<String> = Vec::new();
        for link in &record.links {
            let lookup = match link.kind {
                ContactKind::CodeHost => self.from_code_host(&link.value).await,
                ContactKind::PersonalSite => self.from_personal_site(&link.value).await,
                ContactKind::ProfessionalNetwork | ContactKind::Email => continue,
            };

            match lookup {
                Ok(Some(email)) if !found.iter().any(|f| f.eq_ignore_ascii_case(&email)) => {
                    tracing::info!("📧 Found {} via {}", email, link.value);
                    found.push(email);
                }
                Ok(_) => tracing::debug!("No email on {}", link.value),
                Err(e) => tracing::warn!("⚠️  Could not search {} for email: {}", link.value, e),
            }
        }

        let added = found.len();
        record
            .links
            .extend(found.into_iter().map(|email| ContactLink::new(ContactKind::Email, email)));
        added
    }

    async fn from_code_host(&self, profile: &str) -> Result<Option<String>> {
        let url = Url::parse(profile).map_err(|e| HarvestError::parse(profile, e.to_string()))?;
        let html = self.fetcher.fetch(&url).await?;
        if let Some(email) = self.first_mailto(&html) {
            return Ok(Some(email));
        }

        if url.host_str() != Some(GITHUB_HOST) {
            return Ok(None);
        }
        match github_user(&url) {
            Some(user) => self.from_repositories(&url, user).await,
            None => Ok(None),
        }
    }

    async fn from_repositories(&self, profile: &Url, user: &str) -> Result<Option<String>> {
        if self.max_repositories == 0 {
            return Ok(None);
        }

        let mut listing = profile.clone();
        listing.set_query(Some("tab=repositories"));
        let html = self.fetcher.fetch(&listing).await?;

        for repository in self.repository_names(&html, user) {
            let readme = self
                .raw_origin
                .join(&format!("{}/{}/HEAD/README.md", user, repository))
                .map_err(|e| HarvestError::parse(listing.as_str(), e.to_string()))?;

            match self.fetcher.fetch(&readme).await {
                Ok(text) => {
                    if let Some(email) = self.first_text_email(&text) {
                        return Ok(Some(email));
                    }
                }
                Err(e) => tracing::debug!("{}: {}", readme, e),
            }
        }
        Ok(None)
    }

    async fn from_personal_site(&self, site: &str) -> Result<Option<String>> {
        let url = Url::parse(site).map_err(|e| HarvestError::parse(site, e.to_string()))?;
        let html = self.fetcher.fetch(&url).await?;
        Ok(self
            .first_mailto(&html)
            .or_else(|| self.first_text_email(&page_text(&html))))
    }

    fn first_mailto(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.mailto)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| href.get(7..)?.split('?').next())
            .map(str::trim)
            .find(|address| is_personal_email(address))
            .map(str::to_string)
    }

    fn first_text_email(&self, text: &str) -> Option<String> {
        self.email_pattern
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|address| is_personal_email(address))
            .map(str::to_string)
    }

    /// 儲存庫列表頁上 `/{user}/{repo}` 形式的連結，依出現順序去重
    fn repository_names(&self, html: &str, user: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut names: Vec<String> = Vec::new();

        for href in document
            .select(&self.anchors)
            .filter_map(|el| el.value().attr("href"))
        {
            let path = href
                .trim_start_matches("https://github.com")
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            let mut segments = path.split('/').filter(|s| !s.is_empty());
            let (Some(owner), Some(name), None) = (segments.next(), segments.next(), segments.next())
            else {
                continue;
            };

            if owner.eq_ignore_ascii_case(user) && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
                if names.len() >= self.max_repositories {
                    break;
                }
            }
        }
        names
    }
}

/// `https://github.com/{user}` 的使用者名稱；其他路徑回傳 None
fn github_user(url: &Url) -> Option<&str> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(user), None) => Some(user),
        _ => None,
    }
}

fn page_text(html: &str) -> String {
    Html::parse_document(html)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_personal_email(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    !address.is_empty()
        && !IGNORED_EMAIL_FRAGMENTS.iter().any(|f| lower.contains(f))
        && !ASSET_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::RenderMode;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 以網址對應固定內容；沒有登記的網址回應 404
    struct StubFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| HarvestError::status(url.as_str(), reqwest::StatusCode::NOT_FOUND))
        }

        fn mode(&self) -> RenderMode {
            RenderMode::Static
        }
    }

    fn enricher(fetcher: Arc<StubFetcher>) -> EmailEnricher {
        EmailEnricher::new(fetcher, &ContactsConfig::default()).unwrap()
    }

    fn record(links: &[(ContactKind, &str)]) -> ContactRecord {
        ContactRecord::new(
            "https://devpost.com/alice",
            links
                .iter()
                .map(|(kind, value)| ContactLink::new(*kind, *value))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_github_profile_mailto() {
        let fetcher = StubFetcher::new(&[(
            "https://github.com/alice",
            r#"<html><body><a href="mailto:alice@alice.dev">alice@alice.dev</a></body></html>"#,
        )]);
        let mut record = record(&[(ContactKind::CodeHost, "https://github.com/alice")]);

        let added = enricher(fetcher.clone()).enrich(&mut record).await;

        assert_eq!(added, 1);
        assert_eq!(record.emails(), vec!["alice@alice.dev"]);
        assert_eq!(fetcher.requested(), vec!["https://github.com/alice"]);
    }

    #[tokio::test]
    async fn test_github_readmes_searched_in_listing_order() {
        let fetcher = StubFetcher::new(&[
            ("https://github.com/alice", "<html><body>No public email</body></html>"),
            (
                "https://github.com/alice?tab=repositories",
                r#"<html><body>
  <a href="/alice">alice</a>
  <a href="/alice/notes">notes</a>
  <a href="/bob/fork-source">fork</a>
  <a href="/alice/notes/stargazers">3</a>
  <a href="https://github.com/alice/site">site</a>
</body></html>"#,
            ),
            (
                "https://raw.githubusercontent.com/alice/notes/HEAD/README.md",
                "# Notes\nBuilt by ci@users.noreply.github.com",
            ),
            (
                "https://raw.githubusercontent.com/alice/site/HEAD/README.md",
                "Questions? Write to alice.liddell@wonder.land",
            ),
        ]);
        let mut record = record(&[(ContactKind::CodeHost, "https://github.com/alice")]);

        enricher(fetcher.clone()).enrich(&mut record).await;

        assert_eq!(record.emails(), vec!["alice.liddell@wonder.land"]);
        assert_eq!(
            fetcher.requested(),
            vec![
                "https://github.com/alice",
                "https://github.com/alice?tab=repositories",
                "https://raw.githubusercontent.com/alice/notes/HEAD/README.md",
                "https://raw.githubusercontent.com/alice/site/HEAD/README.md",
            ]
        );
    }

    #[tokio::test]
    async fn test_repository_limit() {
        let fetcher = StubFetcher::new(&[
            ("https://github.com/alice", "<html></html>"),
            (
                "https://github.com/alice?tab=repositories",
                r#"<a href="/alice/one">one</a><a href="/alice/two">two</a>"#,
            ),
        ]);
        let config = ContactsConfig {
            enrich_max_repositories: 1,
            ..Default::default()
        };
        let mut record = record(&[(ContactKind::CodeHost, "https://github.com/alice")]);

        EmailEnricher::new(fetcher.clone(), &config)
            .unwrap()
            .enrich(&mut record)
            .await;

        assert!(record.emails().is_empty());
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_personal_site_text_skips_asset_names() {
        let fetcher = StubFetcher::new(&[(
            "https://alice.dev/",
            r#"<html><body><img src="logo@2x.png" alt="logo@2x.png">
<p>Banner art: banner@2x.png</p>
<p>Say hi: hello@alice.dev or noreply@alice.dev</p></body></html>"#,
        )]);
        let mut record = record(&[
            (ContactKind::ProfessionalNetwork, "https://www.linkedin.com/in/alice"),
            (ContactKind::PersonalSite, "https://alice.dev/"),
        ]);

        enricher(fetcher.clone()).enrich(&mut record).await;

        assert_eq!(record.emails(), vec!["hello@alice.dev"]);
        assert_eq!(fetcher.requested(), vec!["https://alice.dev/"]);
    }

    #[tokio::test]
    async fn test_records_with_email_or_error_untouched() {
        let fetcher = StubFetcher::new(&[]);
        let enricher = enricher(fetcher.clone());

        let mut with_email = record(&[
            (ContactKind::Email, "alice@example.org"),
            (ContactKind::PersonalSite, "https://alice.dev/"),
        ]);
        let mut failed = ContactRecord::failed("https://devpost.com/ghost", "HTTP 404");

        assert_eq!(enricher.enrich(&mut with_email).await, 0);
        assert_eq!(enricher.enrich(&mut failed).await, 0);
        assert!(fetcher.requested().is_empty());
        assert_eq!(with_email.links.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_site_leaves_record_unchanged() {
        let fetcher = StubFetcher::new(&[]);
        let mut record = record(&[(ContactKind::PersonalSite, "https://alice.dev/")]);
        let before = record.clone();

        let added = enricher(fetcher).enrich(&mut record).await;

        assert_eq!(added, 0);
        assert_eq!(record, before);
    }
}
