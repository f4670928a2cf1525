use crate::domain::policy::{FailurePolicy, RenderMode};
use crate::utils::error::{HarvestError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_required_field, validate_selector, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const MAX_GRAPHQL_PAGE_SIZE: usize = 100;
pub const MAX_ENRICH_REPOSITORIES: usize = 30;

/// 所有流程共用的設定檔；每個區段都有預設值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub http: HttpConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
    pub participants: ParticipantsConfig,
    pub contributors: ContributorsConfig,
    pub contacts: ContactsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub render_mode: RenderMode,
    /// Browserless 相容的 `/content` 端點
    pub render_endpoint: Option<String>,
    pub render_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            render_mode: RenderMode::Static,
            render_endpoint: None,
            render_token: None,
        }
    }
}

impl fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConfig")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .field("render_mode", &self.render_mode)
            .field("render_endpoint", &self.render_endpoint)
            .field("render_token", &self.render_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub failure_policy: FailurePolicy,
    pub concurrent_requests: usize,
    pub monitor: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Skip,
            concurrent_requests: 4,
            monitor: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub formats: Vec<OutputFormat>,
    /// 在標準輸出印出表格
    pub stdout: bool,
    /// 把所有輸出檔打包成單一 zip
    pub bundle: bool,
    pub file_stem: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            formats: vec![OutputFormat::Csv, OutputFormat::Json],
            stdout: true,
            bundle: false,
            file_stem: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantsConfig {
    pub listing_url: Option<String>,
    pub max_pages: usize,
    /// 沒有「下一頁」連結時使用的分頁參數
    pub page_param: Option<String>,
    pub max_participants: Option<usize>,
    pub start_offset: usize,
    pub entry_selectors: Vec<String>,
    pub link_selector: String,
    pub name_selector: String,
    pub next_selectors: Vec<String>,
}

impl Default for ParticipantsConfig {
    fn default() -> Self {
        Self {
            listing_url: None,
            max_pages: 50,
            page_param: Some("page".to_string()),
            max_participants: None,
            start_offset: 0,
            entry_selectors: vec![".user-profile".to_string(), "[data-user-profile]".to_string()],
            link_selector: "a.user-profile-link".to_string(),
            name_selector: ".user-name h5 a".to_string(),
            next_selectors: vec![
                "a[rel='next']".to_string(),
                ".pagination .next a".to_string(),
                "a.next_page".to_string(),
            ],
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributorsConfig {
    /// `owner/name`
    pub repository: Option<String>,
    pub token: Option<String>,
    pub endpoint: String,
    pub page_size: usize,
    pub max_pages: Option<usize>,
    pub query_file: Option<String>,
}

impl Default for ContributorsConfig {
    fn default() -> Self {
        Self {
            repository: None,
            token: None,
            endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            page_size: MAX_GRAPHQL_PAGE_SIZE,
            max_pages: None,
            query_file: None,
        }
    }
}

// token 不應出現在 debug 日誌
impl fmt::Debug for ContributorsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContributorsConfig")
            .field("repository", &self.repository)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("query_file", &self.query_file)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    pub input: Option<String>,
    pub scope_selector: String,
    /// 找不到 scope 時改掃描整份文件的連結
    pub fallback_to_document: bool,
    pub code_host_domains: Vec<String>,
    pub professional_domains: Vec<String>,
    pub scan_text_for_emails: bool,
    /// 沒有 email 的紀錄，再到 GitHub 個人頁與個人網站找
    pub enrich_emails: bool,
    /// GitHub 上最多讀幾個儲存庫的 README
    pub enrich_max_repositories: usize,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            input: None,
            scope_selector: "#portfolio-user-links a[href]".to_string(),
            fallback_to_document: true,
            code_host_domains: vec![
                "github.com".to_string(),
                "gitlab.com".to_string(),
                "bitbucket.org".to_string(),
            ],
            professional_domains: vec!["linkedin.com".to_string()],
            scan_text_for_emails: false,
            enrich_emails: false,
            enrich_max_repositories: 5,
        }
    }
}

impl HarvestConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HarvestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| HarvestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GITHUB_TOKEN})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| HarvestError::config(format!("env pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for HarvestConfig {
    fn validate(&self) -> Result<()> {
        self.http.validate()?;
        validate_positive_number("run.concurrent_requests", self.run.concurrent_requests, 1)?;
        self.output.validate()
    }
}

impl Validate for HttpConfig {
    fn validate(&self) -> Result<()> {
        validate_range("http.timeout_seconds", self.timeout_seconds, 1, 600)?;
        validate_non_empty_string("http.user_agent", &self.user_agent)?;

        if self.render_mode.needs_render_endpoint() {
            let endpoint = validate_required_field("http.render_endpoint", &self.render_endpoint)?;
            validate_url("http.render_endpoint", endpoint)?;
        }
        Ok(())
    }
}

impl Validate for OutputConfig {
    fn validate(&self) -> Result<()> {
        validate_path("output.path", &self.path)?;

        if self.formats.is_empty() && !self.stdout {
            return Err(HarvestError::ConfigValidationError {
                field: "output.formats".to_string(),
                message: "No output formats selected and stdout disabled".to_string(),
            });
        }

        if let Some(stem) = &self.file_stem {
            validate_non_empty_string("output.file_stem", stem)?;
        }
        Ok(())
    }
}

impl Validate for ParticipantsConfig {
    fn validate(&self) -> Result<()> {
        let listing_url = validate_required_field("participants.listing_url", &self.listing_url)?;
        validate_url("participants.listing_url", listing_url)?;
        validate_positive_number("participants.max_pages", self.max_pages, 1)?;

        if self.entry_selectors.is_empty() {
            return Err(HarvestError::MissingConfigError {
                field: "participants.entry_selectors".to_string(),
            });
        }
        for selector in self.entry_selectors.iter().chain(&self.next_selectors) {
            validate_selector("participants selectors", selector)?;
        }
        validate_selector("participants.link_selector", &self.link_selector)?;
        validate_selector("participants.name_selector", &self.name_selector)
    }
}

impl Validate for ContributorsConfig {
    fn validate(&self) -> Result<()> {
        validate_required_field("contributors.repository", &self.repository)?;
        let token = validate_required_field("contributors.token", &self.token)?;
        if token.trim().is_empty() || token.contains("${") {
            return Err(HarvestError::MissingConfigError {
                field: "contributors.token (set GITHUB_TOKEN)".to_string(),
            });
        }
        validate_url("contributors.endpoint", &self.endpoint)?;
        validate_range("contributors.page_size", self.page_size, 1, MAX_GRAPHQL_PAGE_SIZE)?;
        if let Some(max_pages) = self.max_pages {
            validate_positive_number("contributors.max_pages", max_pages, 1)?;
        }
        Ok(())
    }
}

impl Validate for ContactsConfig {
    fn validate(&self) -> Result<()> {
        let input = validate_required_field("contacts.input", &self.input)?;
        validate_path("contacts.input", input)?;
        validate_range(
            "contacts.enrich_max_repositories",
            self.enrich_max_repositories,
            0,
            MAX_ENRICH_REPOSITORIES,
        )?;
        validate_selector("contacts.scope_selector", &self.scope_selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = HarvestConfig::from_toml_str("").unwrap();

        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.run.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.contributors.endpoint, DEFAULT_GRAPHQL_ENDPOINT);
        assert_eq!(config.participants.page_param.as_deref(), Some("page"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[http]
render_mode = "auto"
render_endpoint = "http://localhost:3000/content"

[run]
failure_policy = "abort"
concurrent_requests = 8

[output]
path = "./results"
formats = ["tsv"]
bundle = true

[participants]
listing_url = "https://hack.devpost.com/participants"
max_pages = 3
"#;

        let config = HarvestConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.http.render_mode, RenderMode::Auto);
        assert_eq!(config.run.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.output.formats, vec![OutputFormat::Tsv]);
        assert!(config.output.bundle);
        assert_eq!(config.participants.max_pages, 3);
        assert!(config.validate().is_ok());
        assert!(config.participants.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("HARVEST_TEST_TOKEN", "ghp_test");

        let toml_content = r#"
[contributors]
repository = "rust-lang/rust"
token = "${HARVEST_TEST_TOKEN}"
"#;

        let config = HarvestConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.contributors.token.as_deref(), Some("ghp_test"));
        assert!(config.contributors.validate().is_ok());

        std::env::remove_var("HARVEST_TEST_TOKEN");
    }

    #[test]
    fn test_unresolved_token_fails_validation() {
        let toml_content = r#"
[contributors]
repository = "rust-lang/rust"
token = "${HARVEST_SURELY_UNSET_VARIABLE}"
"#;

        let config = HarvestConfig::from_toml_str(toml_content).unwrap();
        assert!(config.contributors.validate().is_err());
        assert!(!format!("{:?}", config.contributors).contains("HARVEST_SURELY"));
    }

    #[test]
    fn test_render_mode_requires_endpoint() {
        let config = HarvestConfig::from_toml_str("[http]\nrender_mode = \"rendered\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[contacts]\ninput = \"participants.json\"\n")
            .unwrap();

        let config = HarvestConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.contacts.input.as_deref(), Some("participants.json"));
        assert!(config.contacts.validate().is_ok());
    }

    #[test]
    fn test_enrichment_settings() {
        let config = HarvestConfig::from_toml_str(
            "[contacts]\ninput = \"profiles.txt\"\nenrich_emails = true\nenrich_max_repositories = 99\n",
        )
        .unwrap();

        assert!(config.contacts.enrich_emails);
        assert!(config.contacts.validate().is_err());
        assert!(!HarvestConfig::default().contacts.enrich_emails);
    }
}
