use crate::config::toml_config::ContactsConfig;
use crate::domain::model::{ContactKind, ContactLink, ContactRecord};
use crate::domain::ports::ContactExtractor;
use crate::utils::error::{HarvestError, Result};
use crate::utils::links::{host_matches, normalize_profile_url, EMAIL_PATTERN};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// 掃描個人頁面上的外部連結並依網域分類
pub struct ProfileLinkExtractor {
    scope: Selector,
    anchors: Selector,
    fallback_to_document: bool,
    code_host_domains: Vec<String>,
    professional_domains: Vec<String>,
    email_pattern: Option<Regex>,
}

impl ProfileLinkExtractor {
    pub fn new(config: &ContactsConfig) -> Result<Self> {
        let scope = Selector::parse(&config.scope_selector).map_err(|e| {
            HarvestError::InvalidConfigValueError {
                field: "contacts.scope_selector".to_string(),
                value: config.scope_selector.clone(),
                reason: format!("Invalid CSS selector: {}", e),
            }
        })?;
        let anchors = Selector::parse("a[href]")
            .map_err(|e| HarvestError::config(format!("anchor selector: {}", e)))?;

        let email_pattern = if config.scan_text_for_emails {
            Some(
                Regex::new(EMAIL_PATTERN)
                    .map_err(|e| HarvestError::config(format!("email pattern: {}", e)))?,
            )
        } else {
            None
        };

        Ok(Self {
            scope,
            anchors,
            fallback_to_document: config.fallback_to_document,
            code_host_domains: config.code_host_domains.clone(),
            professional_domains: config.professional_domains.clone(),
            email_pattern,
        })
    }

    /// 分類單一 href；內部連結與不支援的 scheme 回傳 None
    pub fn classify(&self, href: &str, page_url: &Url) -> Option<ContactLink> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        if href
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        {
            let address = href[7..].split('?').next()?.trim();
            return (!address.is_empty()).then(|| ContactLink::new(ContactKind::Email, address));
        }

        let target = if href.contains("://") {
            normalize_profile_url(href).ok()?
        } else {
            page_url.join(href).ok()?
        };
        if !matches!(target.scheme(), "http" | "https") {
            return None;
        }

        let host = target.host_str()?;
        if page_url
            .host_str()
            .is_some_and(|own_host| host_matches(host, own_host))
        {
            return None;
        }

        let kind = if self.code_host_domains.iter().any(|d| host_matches(host, d)) {
            ContactKind::CodeHost
        } else if self.professional_domains.iter().any(|d| host_matches(host, d)) {
            ContactKind::ProfessionalNetwork
        } else {
            ContactKind::PersonalSite
        };

        Some(ContactLink::new(kind, target.to_string()))
    }
}

impl ContactExtractor for ProfileLinkExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<ContactRecord> {
        let document = Html::parse_document(html);

        let mut hrefs: Vec<&str> = document
            .select(&self.scope)
            .filter_map(|el| el.value().attr("href"))
            .collect();

        if hrefs.is_empty() && self.fallback_to_document {
            hrefs = document
                .select(&self.anchors)
                .filter_map(|el| el.value().attr("href"))
                .collect();
        }

        let mut links: Vec<ContactLink> = hrefs
            .into_iter()
            .filter_map(|href| self.classify(href, page_url))
            .collect();

        if let Some(pattern) = &self.email_pattern {
            let text = document.root_element().text().collect::<Vec<_>>().join(" ");
            links.extend(
                pattern
                    .find_iter(&text)
                    .map(|m| ContactLink::new(ContactKind::Email, m.as_str())),
            );
        }

        tracing::debug!("{}: {} contact links", page_url, links.len());
        Ok(ContactRecord::new(page_url.as_str(), links))
    }
}
