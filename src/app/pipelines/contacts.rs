use crate::adapters::enrichment::EmailEnricher;
use crate::adapters::profile_links::ProfileLinkExtractor;
use crate::app::pipelines::profile_input::load_profile_urls;
use crate::config::toml_config::HarvestConfig;
use crate::core::output::Exporter;
use crate::domain::model::{ContactRecord, TransformResult};
use crate::domain::policy::FailurePolicy;
use crate::domain::ports::{ContactExtractor, PageFetcher, Pipeline, Storage};
use crate::utils::error::{HarvestError, Result};
use crate::utils::links::normalize_profile_url;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;

/// 抓取個人頁面並擷取聯絡方式；輸出順序與輸入相同
pub struct ContactCollector {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ContactExtractor>,
    enricher: Option<EmailEnricher>,
    concurrency: usize,
    failure_policy: FailurePolicy,
}

impl ContactCollector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, extractor: Arc<dyn ContactExtractor>) -> Self {
        Self {
            fetcher,
            extractor,
            enricher: None,
            concurrency: 1,
            failure_policy: FailurePolicy::Skip,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_enricher(mut self, enricher: EmailEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub async fn collect(&self, urls: &[String]) -> Result<Vec<ContactRecord>> {
        let total = urls.len();
        tracing::info!(
            "📊 Processing {} profiles ({} concurrent requests)",
            total,
            self.concurrency
        );

        let visits: Vec<_> = urls
            .iter()
            .enumerate()
            .map(|(index, raw)| Box::pin(self.visit(index, total, raw)))
            .collect();

        // buffered 依輸入順序產出結果
        stream::iter(visits)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn visit(&self, index: usize, total: usize, raw: &str) -> Result<ContactRecord> {
        tracing::info!("👤 Processing {}/{}: {}", index + 1, total, raw.trim());

        match self.scrape(raw).await {
            Ok(record) => Ok(record),
            Err(e) => {
                let message = self.failure_policy.absorb(e, raw.trim())?;
                Ok(ContactRecord::failed(raw.trim(), message))
            }
        }
    }

    async fn scrape(&self, raw: &str) -> Result<ContactRecord> {
        let url = normalize_profile_url(raw)?;
        let html = self.fetcher.fetch(&url).await?;
        let mut record = self.extractor.extract(&html, &url)?;
        if let Some(enricher) = &self.enricher {
            enricher.enrich(&mut record).await;
        }
        Ok(record)
    }
}

pub struct ContactPipeline<S: Storage> {
    input: String,
    collector: ContactCollector,
    exporter: Exporter<S>,
}

impl<S: Storage> ContactPipeline<S> {
    pub fn new(storage: S, config: &HarvestConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let input = config
            .contacts
            .input
            .clone()
            .ok_or_else(|| HarvestError::MissingConfigError {
                field: "contacts.input".to_string(),
            })?;

        let extractor = Arc::new(ProfileLinkExtractor::new(&config.contacts)?);
        let mut collector = ContactCollector::new(fetcher.clone(), extractor)
            .with_concurrency(config.run.concurrent_requests)
            .with_failure_policy(config.run.failure_policy);
        if config.contacts.enrich_emails {
            tracing::info!("📧 Email enrichment enabled");
            collector = collector.with_enricher(EmailEnricher::new(fetcher, &config.contacts)?);
        }

        Ok(Self {
            input,
            collector,
            exporter: Exporter::new(storage, config.output.clone()),
        })
    }

    fn file_stem(&self) -> String {
        let stem = Path::new(&self.input)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("profiles");
        format!("{}_contacts", stem)
    }
}

#[async_trait]
impl<S: Storage> Pipeline for ContactPipeline<S> {
    type Item = ContactRecord;

    fn name(&self) -> &str {
        "contacts"
    }

    async fn extract(&self) -> Result<Vec<ContactRecord>> {
        let urls = load_profile_urls(&self.input).await?;
        self.collector.collect(&urls).await
    }

    async fn transform(&self, data: Vec<ContactRecord>) -> Result<TransformResult<ContactRecord>> {
        self.exporter.render(self.name(), &self.input, data)
    }

    async fn load(&self, result: &TransformResult<ContactRecord>) -> Result<String> {
        self.exporter.write(&self.file_stem(), result).await
    }
}
