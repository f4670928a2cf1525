use crate::config::toml_config::{OutputConfig, OutputFormat};
use crate::core::summary::Summary;
use crate::domain::model::TransformResult;
use crate::domain::ports::{Storage, Summarize, Tabular};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub pipeline: String,
    pub source: String,
    pub total_records: usize,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct JsonEnvelope<'a, T: Serialize> {
    metadata: ExportMetadata,
    records: &'a [T],
}

/// 把紀錄轉成 CSV / TSV / JSON 並寫到 Storage
pub struct Exporter<S: Storage> {
    storage: S,
    config: OutputConfig,
}

impl<S: Storage> Exporter<S> {
    pub fn new(storage: S, config: OutputConfig) -> Self {
        Self { storage, config }
    }

    pub fn render<T>(&self, pipeline: &str, source: &str, records: Vec<T>) -> Result<TransformResult<T>>
    where
        T: Serialize + Tabular + Summarize,
    {
        let metadata = ExportMetadata {
            pipeline: pipeline.to_string(),
            source: source.to_string(),
            total_records: records.len(),
            scraped_at: Utc::now(),
        };

        let csv_output = render_delimited(&records, b',')?;
        let tsv_output = render_delimited(&records, b'\t')?;
        let json_output = serde_json::to_string_pretty(&JsonEnvelope {
            metadata,
            records: &records,
        })?;
        let summary = Summary::from_records(&records);

        Ok(TransformResult {
            records,
            csv_output,
            tsv_output,
            json_output,
            summary,
        })
    }

    /// 寫出設定的格式；回傳輸出位置
    pub async fn write<T>(&self, stem: &str, result: &TransformResult<T>) -> Result<String> {
        if self.config.stdout {
            println!("{}", result.tsv_output.trim_end());
        }

        if self.config.formats.is_empty() {
            return Ok("stdout".to_string());
        }

        let stem = self.config.file_stem.as_deref().unwrap_or(stem);
        let files: Vec<(String, &str)> = self
            .config
            .formats
            .iter()
            .map(|format| {
                let content = match format {
                    OutputFormat::Csv => &result.csv_output,
                    OutputFormat::Tsv => &result.tsv_output,
                    OutputFormat::Json => &result.json_output,
                };
                (format!("{}.{}", stem, format.extension()), content.as_str())
            })
            .collect();

        if self.config.bundle {
            let archive_name = format!("{}.zip", stem);
            tracing::debug!("Creating ZIP file with {} files", files.len());

            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, content) in &files {
                    zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                    zip.write_all(content.as_bytes())?;
                }
                zip.finish()?.into_inner()
            };

            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(&archive_name, &zip_data).await?;
            return Ok(self.storage.location(&archive_name));
        }

        for (name, content) in &files {
            self.storage.write_file(name, content.as_bytes()).await?;
            tracing::info!("📁 Saved {}", self.storage.location(name));
        }

        Ok(self.storage.location(&files[0].0))
    }
}

fn render_delimited<T: Tabular>(records: &[T], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(T::headers())?;
    for record in records {
        for row in record.rows() {
            writer.write_record(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| crate::utils::error::HarvestError::IoError(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
