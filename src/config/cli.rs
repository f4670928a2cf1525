use crate::config::toml_config::{HarvestConfig, OutputFormat};
use crate::domain::policy::{FailurePolicy, RenderMode};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "contact-harvest")]
#[command(version, about = "Collect hackathon participants, repository contributors and profile contact links")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log CPU / memory usage per phase
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Output directory
    #[arg(long, global = true)]
    pub output: Option<String>,

    /// Output file formats (repeatable)
    #[arg(long = "format", value_enum, global = true)]
    pub formats: Vec<OutputFormat>,

    /// Do not print the result table to stdout
    #[arg(long, global = true)]
    pub no_stdout: bool,

    /// Bundle all output files into one zip archive
    #[arg(long, global = true)]
    pub bundle: bool,

    /// What to do when a single page or profile fails
    #[arg(long, value_enum, global = true)]
    pub on_error: Option<FailurePolicy>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List participants of a hackathon
    Participants(ParticipantsArgs),
    /// Collect contributors of a repository through the GraphQL API
    Contributors(ContributorsArgs),
    /// Extract contact links from profile pages
    Contacts(ContactsArgs),
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// How pages are fetched
    #[arg(long, value_enum)]
    pub render_mode: Option<RenderMode>,

    /// Rendering service endpoint (Browserless `/content` compatible)
    #[arg(long)]
    pub render_endpoint: Option<String>,
}

#[derive(Debug, Args)]
pub struct ParticipantsArgs {
    /// Hackathon URL or its participants page
    pub listing_url: String,

    #[command(flatten)]
    pub render: RenderArgs,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long)]
    pub max_participants: Option<usize>,

    #[arg(long)]
    pub start_offset: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ContributorsArgs {
    /// Repository as owner/name
    pub repository: String,

    /// Access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GraphQL endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub page_size: Option<usize>,

    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Custom GraphQL query document
    #[arg(long)]
    pub query_file: Option<String>,
}

#[derive(Debug, Args)]
pub struct ContactsArgs {
    /// Profile URL list (.json, .csv, .tsv or one URL per line)
    pub input: String,

    #[command(flatten)]
    pub render: RenderArgs,

    /// Number of profiles fetched at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Also collect email addresses found in page text
    #[arg(long)]
    pub scan_text_emails: bool,

    /// Look for missing emails on linked GitHub profiles and personal sites
    #[arg(long)]
    pub enrich_emails: bool,
}

impl Cli {
    /// 載入設定檔（若有）並套用命令列覆蓋
    pub fn load_config(&self) -> Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                HarvestConfig::from_file(path)?
            }
            None => HarvestConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_to(&self, config: &mut HarvestConfig) {
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if !self.formats.is_empty() {
            config.output.formats = self.formats.clone();
        }
        if self.no_stdout {
            config.output.stdout = false;
        }
        if self.bundle {
            config.output.bundle = true;
        }
        if self.monitor {
            config.run.monitor = true;
        }
        if let Some(policy) = self.on_error {
            config.run.failure_policy = policy;
        }

        match &self.command {
            Command::Participants(args) => {
                args.render.apply_to(config);
                let participants = &mut config.participants;
                participants.listing_url = Some(args.listing_url.clone());
                if let Some(max_pages) = args.max_pages {
                    participants.max_pages = max_pages;
                }
                if let Some(max_participants) = args.max_participants {
                    participants.max_participants = Some(max_participants);
                }
                if let Some(start_offset) = args.start_offset {
                    participants.start_offset = start_offset;
                }
            }
            Command::Contributors(args) => {
                let contributors = &mut config.contributors;
                contributors.repository = Some(args.repository.clone());
                if let Some(token) = &args.token {
                    contributors.token = Some(token.clone());
                }
                if let Some(endpoint) = &args.endpoint {
                    contributors.endpoint = endpoint.clone();
                }
                if let Some(page_size) = args.page_size {
                    contributors.page_size = page_size;
                }
                if let Some(max_pages) = args.max_pages {
                    contributors.max_pages = Some(max_pages);
                }
                if let Some(query_file) = &args.query_file {
                    contributors.query_file = Some(query_file.clone());
                }
            }
            Command::Contacts(args) => {
                args.render.apply_to(config);
                config.contacts.input = Some(args.input.clone());
                if let Some(concurrency) = args.concurrency {
                    config.run.concurrent_requests = concurrency;
                }
                if args.scan_text_emails {
                    config.contacts.scan_text_for_emails = true;
                }
                if args.enrich_emails {
                    config.contacts.enrich_emails = true;
                }
            }
        }
    }

    /// 檢查共用設定以及子命令需要的區段
    pub fn validate_for_command(&self, config: &HarvestConfig) -> Result<()> {
        config.validate()?;
        match &self.command {
            Command::Participants(_) => config.participants.validate(),
            Command::Contributors(_) => config.contributors.validate(),
            Command::Contacts(_) => config.contacts.validate(),
        }
    }
}

impl RenderArgs {
    fn apply_to(&self, config: &mut HarvestConfig) {
        if let Some(mode) = self.render_mode {
            config.http.render_mode = mode;
        }
        if let Some(endpoint) = &self.render_endpoint {
            config.http.render_endpoint = Some(endpoint.clone());
        }
    }
}
