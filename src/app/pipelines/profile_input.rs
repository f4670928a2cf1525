use crate::utils::error::{HarvestError, Result};
use serde_json::Value;
use std::path::Path;

const URL_FIELDS: &[&str] = &["profile_url", "profileUrl", "url", "source_profile_url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Delimited(u8),
    Lines,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => InputFormat::Json,
            Some("csv") => InputFormat::Delimited(b','),
            Some("tsv") => InputFormat::Delimited(b'\t'),
            _ => InputFormat::Lines,
        }
    }
}

/// 讀取個人頁面網址清單，保留檔案中的順序
pub async fn load_profile_urls(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await?;
    let urls = parse_profile_urls(&content, InputFormat::from_path(path))?;
    tracing::info!("✅ Loaded {} profile URLs from {}", urls.len(), path.display());
    Ok(urls)
}

pub fn parse_profile_urls(content: &str, format: InputFormat) -> Result<Vec<String>> {
    match format {
        InputFormat::Json => parse_json(content),
        InputFormat::Delimited(delimiter) => parse_delimited(content, delimiter),
        InputFormat::Lines => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()),
    }
}

// 接受參賽者輸出的 envelope、紀錄陣列或字串陣列
fn parse_json(content: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(content)?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("records")
            .or_else(|| map.get("participants"))
            .and_then(Value::as_array)
            .ok_or_else(|| HarvestError::ConfigValidationError {
                field: "contacts.input".to_string(),
                message: "JSON object has no 'records' array".to_string(),
            })?,
        _ => {
            return Err(HarvestError::ConfigValidationError {
                field: "contacts.input".to_string(),
                message: "Expected a JSON array or an object with 'records'".to_string(),
            })
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) => Some(url.trim().to_string()),
            Value::Object(record) => URL_FIELDS
                .iter()
                .find_map(|field| record.get(*field).and_then(Value::as_str))
                .map(|url| url.trim().to_string()),
            _ => None,
        })
        .filter(|url| !url.is_empty())
        .collect())
}

fn parse_delimited(content: &str, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let column = reader
        .headers()?
        .iter()
        .position(|header| URL_FIELDS.contains(&header.trim()))
        .unwrap_or(0);

    let mut urls = Vec::new();
    for row in reader.records() {
        if let Some(url) = row?.get(column).map(str::trim).filter(|url| !url.is_empty()) {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}
