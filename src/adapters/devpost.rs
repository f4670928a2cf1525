use crate::config::toml_config::ParticipantsConfig;
use crate::domain::model::{ListingPage, ParticipantRecord};
use crate::domain::ports::ParticipantExtractor;
use crate::utils::error::{HarvestError, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const RESERVED_HANDLES: &[&str] = &["logout", "login", "signup", "sign_in", "register"];

fn parse_selector(field: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| HarvestError::InvalidConfigValueError {
        field: field.to_string(),
        value: selector.to_string(),
        reason: format!("Invalid CSS selector: {}", e),
    })
}

/// 以 CSS 選擇器解析 Devpost 參賽者頁面
pub struct SelectorParticipantExtractor {
    entry_selectors: Vec<Selector>,
    link_selector: Selector,
    fallback_link_selector: Selector,
    name_selector: Selector,
    next_selectors: Vec<Selector>,
}

impl SelectorParticipantExtractor {
    pub fn new(config: &ParticipantsConfig) -> Result<Self> {
        Ok(Self {
            entry_selectors: config
                .entry_selectors
                .iter()
                .map(|s| parse_selector("participants.entry_selectors", s))
                .collect::<Result<_>>()?,
            link_selector: parse_selector("participants.link_selector", &config.link_selector)?,
            fallback_link_selector: parse_selector("participants.link_selector", "a[href]")?,
            name_selector: parse_selector("participants.name_selector", &config.name_selector)?,
            next_selectors: config
                .next_selectors
                .iter()
                .map(|s| parse_selector("participants.next_selectors", s))
                .collect::<Result<_>>()?,
        })
    }

    fn parse_entry(&self, entry: ElementRef<'_>, page_url: &Url) -> Option<ParticipantRecord> {
        let link = entry
            .select(&self.link_selector)
            .next()
            .or_else(|| entry.select(&self.fallback_link_selector).next())?;
        let href = link.value().attr("href")?.trim();
        let profile_url = page_url.join(href).ok()?;
        let handle = handle_from_url(&profile_url)?;

        if RESERVED_HANDLES.contains(&handle.to_lowercase().as_str()) {
            return None;
        }

        let name = entry
            .select(&self.name_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty());

        Some(ParticipantRecord {
            handle,
            profile_url: profile_url.to_string(),
            name,
        })
    }

    fn next_page(&self, document: &Html, page_url: &Url) -> Option<String> {
        self.next_selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|el| el.value().attr("href"))
                .find_map(|href| page_url.join(href.trim()).ok())
                .map(|url| url.to_string())
        })
    }
}

impl ParticipantExtractor for SelectorParticipantExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<ListingPage> {
        let document = Html::parse_document(html);

        let entries: Vec<ElementRef<'_>> = self
            .entry_selectors
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|entries| !entries.is_empty())
            .ok_or_else(|| HarvestError::parse(page_url.as_str(), "no participant entries found"))?;

        let participants = entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry, page_url))
            .collect();

        Ok(ListingPage {
            participants,
            next_page: self.next_page(&document, page_url),
        })
    }
}

/// 個人頁面網址的最後一段即為帳號
pub fn handle_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// 黑客松首頁 → 參賽者頁面
pub fn participants_url(listing_url: &str) -> Result<Url> {
    let mut url = Url::parse(listing_url.trim())
        .map_err(|e| HarvestError::parse(listing_url, format!("invalid listing URL: {}", e)))?;

    let path = url.path().trim_end_matches('/').to_string();
    if !path.ends_with("/participants") {
        url.set_path(&format!("{}/participants", path));
    }
    Ok(url)
}
