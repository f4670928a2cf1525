use crate::utils::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};

/// 單一項目（一頁、一個個人頁面、一次查詢）失敗時的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 記錄錯誤後繼續下一個項目
    #[default]
    Skip,
    /// 立即中止整個流程
    Abort,
}

impl FailurePolicy {
    /// 在 `Skip` 模式下吞下錯誤並回傳訊息；`Abort` 模式直接回傳錯誤
    pub fn absorb(&self, error: HarvestError, item: &str) -> Result<String> {
        match self {
            FailurePolicy::Abort => Err(error),
            FailurePolicy::Skip => {
                tracing::warn!("⚠️  Skipping {}: {}", item, error);
                Ok(error.to_string())
            }
        }
    }
}

/// 取得頁面內容的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// 直接 HTTP GET
    #[default]
    Static,
    /// 透過遠端瀏覽器渲染服務
    Rendered,
    /// 先直接抓取，被擋或需要登入時改用渲染服務
    Auto,
}

impl RenderMode {
    pub fn needs_render_endpoint(&self) -> bool {
        !matches!(self, RenderMode::Static)
    }
}
