use clap::Parser;
use contact_harvest::adapters::http::{build_client, build_fetcher};
use contact_harvest::config::cli::Command;
use contact_harvest::core::summary::Summary;
use contact_harvest::domain::ports::Pipeline;
use contact_harvest::utils::error::{ErrorSeverity, HarvestError};
use contact_harvest::utils::logger;
use contact_harvest::{
    Cli, ContactPipeline, ContributorPipeline, EtlEngine, HarvestConfig, LocalStorage,
    ParticipantPipeline,
};

struct RunOutcome {
    pipeline: String,
    summary: Summary,
    output_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting contact-harvest");

    // 載入並驗證配置
    let config = match cli
        .load_config()
        .and_then(|config| cli.validate_for_command(&config).map(|_| config))
    {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    tracing::debug!("Config: {:?}", config);

    if config.run.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&cli.command, &config).await {
        Ok(outcome) => {
            eprintln!("\n{}", outcome.summary.render(&outcome.pipeline));
            tracing::info!("✅ {} completed successfully!", outcome.pipeline);
            eprintln!("📁 Output saved to: {}", outcome.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn run(command: &Command, config: &HarvestConfig) -> Result<RunOutcome, HarvestError> {
    let storage = LocalStorage::new(config.output.path.clone());
    let client = build_client(&config.http)?;
    let monitor = config.run.monitor;

    match command {
        Command::Participants(_) => {
            let fetcher = build_fetcher(&config.http, client)?;
            execute(ParticipantPipeline::new(storage, config, fetcher)?, monitor).await
        }
        Command::Contributors(_) => {
            execute(ContributorPipeline::new(storage, config, client)?, monitor).await
        }
        Command::Contacts(_) => {
            let fetcher = build_fetcher(&config.http, client)?;
            execute(ContactPipeline::new(storage, config, fetcher)?, monitor).await
        }
    }
}

async fn execute<P: Pipeline>(pipeline: P, monitor: bool) -> Result<RunOutcome, HarvestError> {
    let name = pipeline.name().to_string();
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor);
    let report = engine.run().await?;

    Ok(RunOutcome {
        pipeline: name,
        summary: report.summary,
        output_path: report.output_path,
    })
}
