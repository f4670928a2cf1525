use crate::adapters::devpost::{participants_url, SelectorParticipantExtractor};
use crate::config::toml_config::HarvestConfig;
use crate::core::output::Exporter;
use crate::domain::model::{ParticipantRecord, TransformResult};
use crate::domain::policy::FailurePolicy;
use crate::domain::ports::{PageFetcher, ParticipantExtractor, Pipeline, Storage};
use crate::utils::error::{HarvestError, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// 逐頁走訪參賽者列表
pub struct ParticipantLister {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ParticipantExtractor>,
    start_url: Url,
    max_pages: usize,
    page_param: Option<String>,
    failure_policy: FailurePolicy,
}

struct CrawlState {
    next: Option<Url>,
    page: usize,
    seen_urls: HashSet<String>,
    seen_handles: HashSet<String>,
    failures: usize,
    parsed_pages: usize,
    /// `next` 是由分頁參數推算出來，而不是頁面上的連結
    guessed: bool,
}

impl ParticipantLister {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ParticipantExtractor>,
        start_url: Url,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            start_url,
            max_pages: 50,
            page_param: Some("page".to_string()),
            failure_policy: FailurePolicy::Skip,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_param(mut self, page_param: Option<String>) -> Self {
        self.page_param = page_param;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn start_url(&self) -> &Url {
        &self.start_url
    }

    /// 每個元素是一頁中「新出現」的參賽者；只在被拉取時才抓下一頁
    pub fn pages(&self) -> impl Stream<Item = Result<Vec<ParticipantRecord>>> + Send + '_ {
        let state = CrawlState {
            next: Some(self.start_url.clone()),
            page: 0,
            seen_urls: HashSet::new(),
            seen_handles: HashSet::new(),
            failures: 0,
            parsed_pages: 0,
            guessed: false,
        };

        stream::unfold(state, move |mut state| async move {
            let item = self.step(&mut state).await?;
            Some((item, state))
        })
    }

    pub fn participants(&self) -> impl Stream<Item = Result<ParticipantRecord>> + Send + '_ {
        self.pages()
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, HarvestError>)))
            .try_flatten()
    }

    /// 略過前 `offset` 位並最多取 `limit` 位
    pub async fn collect(&self, offset: usize, limit: Option<usize>) -> Result<Vec<ParticipantRecord>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        if limit == 0 {
            return Ok(records);
        }

        let mut participants = std::pin::pin!(self.participants());
        let mut skipped = 0;
        while let Some(record) = participants.try_next().await? {
            if skipped < offset {
                skipped += 1;
                continue;
            }
            records.push(record);
            if records.len() >= limit {
                break;
            }
        }
        Ok(records)
    }

    async fn step(&self, state: &mut CrawlState) -> Option<Result<Vec<ParticipantRecord>>> {
        loop {
            let url = state.next.take()?;

            if state.page >= self.max_pages {
                tracing::warn!("Reached max_pages ({}), stopping", self.max_pages);
                return None;
            }
            if !state.seen_urls.insert(url.to_string()) {
                tracing::debug!("{} already visited, stopping", url);
                return None;
            }
            state.page += 1;
            tracing::info!("📄 Scraping page {}: {}", state.page, url);

            let parsed = match self.fetcher.fetch(&url).await {
                Ok(html) => self.extractor.extract(&html, &url),
                Err(e) => Err(e),
            };

            let listing = match parsed {
                Ok(listing) => listing,
                Err(HarvestError::ParseError { message, .. }) => {
                    tracing::info!("Page {} has no participants ({}), stopping", state.page, message);
                    return None;
                }
                Err(e) if state.guessed && state.parsed_pages > 0 => {
                    tracing::info!("Page {} unavailable ({}), end of listing", state.page, e);
                    return None;
                }
                Err(e) => {
                    if let Err(e) = self.failure_policy.absorb(e, &format!("page {}", state.page)) {
                        return Some(Err(e));
                    }
                    state.failures += 1;
                    if state.failures >= MAX_CONSECUTIVE_FAILURES {
                        tracing::warn!("⚠️  {} consecutive failed pages, stopping", state.failures);
                        return None;
                    }
                    state.next = self.page_url(state.page + 1);
                    state.guessed = true;
                    continue;
                }
            };
            state.failures = 0;
            state.parsed_pages += 1;

            let fresh: Vec<ParticipantRecord> = listing
                .participants
                .into_iter()
                .filter(|p| state.seen_handles.insert(p.handle.to_lowercase()))
                .collect();

            if fresh.is_empty() {
                tracing::info!("Page {} has no new participants, stopping", state.page);
                return None;
            }
            tracing::info!("✅ Found {} participants on page {}", fresh.len(), state.page);

            let linked = listing.next_page.and_then(|next| url.join(&next).ok());
            state.guessed = linked.is_none();
            state.next = linked.or_else(|| self.page_url(state.page + 1));

            return Some(Ok(fresh));
        }
    }

    /// `?{page_param}=N`；沒有設定分頁參數時回傳 None
    fn page_url(&self, page: usize) -> Option<Url> {
        let param = self.page_param.as_deref()?;
        let mut url = self.start_url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair(param, &page.to_string());
        Some(url)
    }
}

pub struct ParticipantPipeline<S: Storage> {
    lister: ParticipantLister,
    exporter: Exporter<S>,
    start_offset: usize,
    max_participants: Option<usize>,
}

impl<S: Storage> ParticipantPipeline<S> {
    pub fn new(storage: S, config: &HarvestConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let participants = &config.participants;
        let listing_url = participants
            .listing_url
            .as_deref()
            .ok_or_else(|| HarvestError::MissingConfigError {
                field: "participants.listing_url".to_string(),
            })?;

        let extractor = Arc::new(SelectorParticipantExtractor::new(participants)?);
        let lister = ParticipantLister::new(fetcher, extractor, participants_url(listing_url)?)
            .with_max_pages(participants.max_pages)
            .with_page_param(participants.page_param.clone())
            .with_failure_policy(config.run.failure_policy);

        Ok(Self {
            lister,
            exporter: Exporter::new(storage, config.output.clone()),
            start_offset: participants.start_offset,
            max_participants: participants.max_participants,
        })
    }

    fn file_stem(&self) -> String {
        let slug = self
            .lister
            .start_url()
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or("listing");
        format!("{}_participants", slug)
    }
}

#[async_trait]
impl<S: Storage> Pipeline for ParticipantPipeline<S> {
    type Item = ParticipantRecord;

    fn name(&self) -> &str {
        "participants"
    }

    async fn extract(&self) -> Result<Vec<ParticipantRecord>> {
        self.lister
            .collect(self.start_offset, self.max_participants)
            .await
    }

    async fn transform(&self, data: Vec<ParticipantRecord>) -> Result<TransformResult<ParticipantRecord>> {
        self.exporter
            .render(self.name(), self.lister.start_url().as_str(), data)
    }

    async fn load(&self, result: &TransformResult<ParticipantRecord>) -> Result<String> {
        self.exporter.write(&self.file_stem(), result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::ParticipantsConfig;
    use crate::domain::model::ListingPage;
    use crate::domain::policy::RenderMode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 以網址對應固定 HTML，並記錄抓取順序
    struct MapFetcher {
        pages: HashMap<String, std::result::Result<String, String>>,
        requested: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pages: Vec<(&str, std::result::Result<String, &str>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, html)| (url.to_string(), html.map_err(str::to_string)))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url.as_str()) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(e)) => Err(HarvestError::fetch(url.as_str(), e)),
                None => Err(HarvestError::FetchError {
                    url: url.to_string(),
                    status: Some(404),
                    message: "HTTP 404".to_string(),
                }),
            }
        }

        fn mode(&self) -> RenderMode {
            RenderMode::Static
        }
    }

    fn card(handle: &str) -> String {
        format!(
            r#"<div class="user-profile"><a class="user-profile-link" href="/{0}">{0}</a></div>"#,
            handle
        )
    }

    fn listing(handles: &[&str], next: Option<&str>) -> std::result::Result<String, &'static str> {
        let cards: String = handles.iter().map(|h| card(h)).collect();
        let next = next
            .map(|href| format!(r#"<a rel="next" href="{}">Next</a>"#, href))
            .unwrap_or_default();
        Ok(format!("<html><body>{}{}</body></html>", cards, next))
    }

    fn lister(fetcher: Arc<MapFetcher>) -> ParticipantLister {
        let extractor = Arc::new(SelectorParticipantExtractor::new(&ParticipantsConfig::default()).unwrap());
        ParticipantLister::new(
            fetcher,
            extractor,
            Url::parse("https://hack.devpost.com/participants").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_follows_next_links_and_dedupes() {
        let fetcher = Arc::new(MapFetcher::new(vec![
            (
                "https://hack.devpost.com/participants",
                listing(&["alice", "bob"], Some("/participants?page=2")),
            ),
            (
                "https://hack.devpost.com/participants?page=2",
                listing(&["Bob", "carol"], None),
            ),
            (
                "https://hack.devpost.com/participants?page=3",
                listing(&["carol"], None),
            ),
        ]));

        let records = lister(fetcher.clone()).collect(0, None).await.unwrap();

        let handles: Vec<&str> = records.iter().map(|r| r.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "bob", "carol"]);
        assert_eq!(fetcher.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_offset_and_limit_stop_fetching_early() {
        let fetcher = Arc::new(MapFetcher::new(vec![
            (
                "https://hack.devpost.com/participants",
                listing(&["alice", "bob"], Some("/participants?page=2")),
            ),
            (
                "https://hack.devpost.com/participants?page=2",
                listing(&["carol", "dave"], None),
            ),
        ]));

        let records = lister(fetcher.clone()).collect(1, Some(1)).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handle, "bob");
        assert_eq!(fetcher.requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_skip_policy_stops_after_consecutive_failures() {
        let fetcher = Arc::new(MapFetcher::new(vec![(
            "https://hack.devpost.com/participants",
            Err("connection reset"),
        )]));

        let records = lister(fetcher.clone()).collect(0, None).await.unwrap();

        assert!(records.is_empty());
        assert_eq!(
            fetcher.requested.lock().unwrap().len(),
            MAX_CONSECUTIVE_FAILURES
        );
    }

    #[tokio::test]
    async fn test_missing_guessed_page_ends_listing() {
        let fetcher = Arc::new(MapFetcher::new(vec![(
            "https://hack.devpost.com/participants",
            listing(&["alice", "bob"], None),
        )]));

        let records = lister(fetcher.clone())
            .with_failure_policy(FailurePolicy::Abort)
            .collect(0, None)
            .await
            .unwrap();

        let handles: Vec<&str> = records.iter().map(|r| r.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "bob"]);
        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec![
                "https://hack.devpost.com/participants",
                "https://hack.devpost.com/participants?page=2",
            ]
        );
    }

    #[tokio::test]
    async fn test_linked_page_failure_still_follows_policy() {
        let fetcher = Arc::new(MapFetcher::new(vec![(
            "https://hack.devpost.com/participants",
            listing(&["alice"], Some("/participants/page/2")),
        )]));

        let result = lister(fetcher)
            .with_failure_policy(FailurePolicy::Abort)
            .collect(0, None)
            .await;

        assert!(matches!(result, Err(HarvestError::FetchError { status: Some(404), .. })));
    }

    #[tokio::test]
    async fn test_abort_policy_surfaces_fetch_error() {
        let fetcher = Arc::new(MapFetcher::new(Vec::new()));

        let result = lister(fetcher)
            .with_failure_policy(FailurePolicy::Abort)
            .collect(0, None)
            .await;

        assert!(matches!(result, Err(HarvestError::FetchError { .. })));
    }

    #[test]
    fn test_page_url_replaces_existing_param() {
        let fetcher = Arc::new(MapFetcher::new(Vec::new()));
        let lister = ParticipantLister::new(
            fetcher,
            Arc::new(FixedExtractor),
            Url::parse("https://hack.devpost.com/participants?page=1&sort=name").unwrap(),
        );

        assert_eq!(
            lister.page_url(4).unwrap().as_str(),
            "https://hack.devpost.com/participants?sort=name&page=4"
        );
        assert!(lister.with_page_param(None).page_url(2).is_none());
    }

    struct FixedExtractor;

    impl ParticipantExtractor for FixedExtractor {
        fn extract(&self, _html: &str, _page_url: &Url) -> Result<ListingPage> {
            Ok(ListingPage::default())
        }
    }
}
