use crate::core::summary::Summary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 一次執行的結果
#[derive(Debug)]
pub struct RunReport<T> {
    pub records: Vec<T>,
    pub summary: Summary,
    pub output_path: String,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunReport<P::Item>> {
        let name = self.pipeline.name().to_string();
        tracing::info!("🚀 Starting {} pipeline", name);

        // Extract
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} records", raw_data.len());
        self.monitor.log_phase("Extract", raw_data.len());

        // Transform
        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!("🔧 Transformed {} records", result.records.len());
        self.monitor.log_phase("Transform", result.records.len());

        // Load
        let output_path = self.pipeline.load(&result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_phase("Load", result.records.len());
        self.monitor.log_final_stats();

        Ok(RunReport {
            records: result.records,
            summary: result.summary,
            output_path,
        })
    }
}
