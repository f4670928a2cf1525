use crate::domain::model::{ContactRecord, ListingPage, TransformResult};
use crate::domain::policy::RenderMode;
use crate::utils::error::Result;
use async_trait::async_trait;
use url::Url;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 寫入後的完整路徑（用於顯示）
    fn location(&self, path: &str) -> String;
}

/// 取得頁面 HTML 的策略
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
    fn mode(&self) -> RenderMode;
}

/// 把一頁參賽者列表轉成紀錄；版面改變時只需替換實作
pub trait ParticipantExtractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &Url) -> Result<ListingPage>;
}

/// 把個人頁面轉成聯絡方式
pub trait ContactExtractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &Url) -> Result<ContactRecord>;
}

/// 可輸出成 CSV/TSV 的紀錄
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn rows(&self) -> Vec<Vec<String>>;
}

/// 摘要報告需要的資訊
pub trait Summarize {
    fn emails(&self) -> Vec<&str>;

    fn link_kinds(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn failed(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Item: serde::Serialize + Tabular + Summarize + Send + Sync + 'static;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Vec<Self::Item>>;
    async fn transform(&self, data: Vec<Self::Item>) -> Result<TransformResult<Self::Item>>;
    async fn load(&self, result: &TransformResult<Self::Item>) -> Result<String>;
}
