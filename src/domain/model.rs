use crate::core::summary::Summary;
use crate::domain::ports::{Summarize, Tabular};
use crate::utils::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 黑客松參賽者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub handle: String,
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 儲存庫貢獻者；email 只在帳號公開時存在
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub contribution_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactKind {
    CodeHost,
    ProfessionalNetwork,
    PersonalSite,
    Email,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::CodeHost => "code-host",
            ContactKind::ProfessionalNetwork => "professional-network",
            ContactKind::PersonalSite => "personal-site",
            ContactKind::Email => "email",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactLink {
    pub kind: ContactKind,
    pub value: String,
}

impl ContactLink {
    pub fn new(kind: ContactKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// 單一個人頁面的聯絡方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub source_profile_url: String,
    pub links: Vec<ContactLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContactRecord {
    pub fn new(source_profile_url: impl Into<String>, links: Vec<ContactLink>) -> Self {
        Self {
            source_profile_url: source_profile_url.into(),
            links,
            error: None,
        }
    }

    /// 抓取失敗但選擇略過時，保留一筆空的紀錄以維持輸入順序
    pub fn failed(source_profile_url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_profile_url: source_profile_url.into(),
            links: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn links_of(&self, kind: ContactKind) -> impl Iterator<Item = &ContactLink> {
        self.links.iter().filter(move |link| link.kind == kind)
    }
}

/// 一頁參賽者列表的解析結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub participants: Vec<ParticipantRecord>,
    pub next_page: Option<String>,
}

/// `owner/name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepositoryId {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value
            .trim()
            .trim_start_matches("https://github.com/")
            .trim_end_matches('/')
            .trim_end_matches(".git");

        let invalid = || HarvestError::InvalidConfigValueError {
            field: "contributors.repository".to_string(),
            value: value.to_string(),
            reason: "Expected the form owner/name".to_string(),
        };

        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult<T> {
    pub records: Vec<T>,
    pub csv_output: String,
    pub tsv_output: String,
    pub json_output: String,
    pub summary: Summary,
}

impl Tabular for ParticipantRecord {
    fn headers() -> &'static [&'static str] {
        &["handle", "name", "profile_url"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.handle.clone(),
            self.name.clone().unwrap_or_default(),
            self.profile_url.clone(),
        ]]
    }
}

impl Summarize for ParticipantRecord {
    fn emails(&self) -> Vec<&str> {
        Vec::new()
    }
}

impl Tabular for ContributorRecord {
    fn headers() -> &'static [&'static str] {
        &["handle", "email", "contribution_count"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.handle.clone(),
            self.email.clone().unwrap_or_default(),
            self.contribution_count.to_string(),
        ]]
    }
}

impl Summarize for ContributorRecord {
    fn emails(&self) -> Vec<&str> {
        self.email.as_deref().into_iter().collect()
    }
}

impl Tabular for ContactRecord {
    fn headers() -> &'static [&'static str] {
        &["source_profile_url", "kind", "value", "error"]
    }

    // 每個連結一列；沒有連結時仍輸出一列，保持與輸入一對一
    fn rows(&self) -> Vec<Vec<String>> {
        let error = self.error.clone().unwrap_or_default();
        if self.links.is_empty() {
            return vec![vec![
                self.source_profile_url.clone(),
                String::new(),
                String::new(),
                error,
            ]];
        }

        self.links
            .iter()
            .map(|link| {
                vec![
                    self.source_profile_url.clone(),
                    link.kind.to_string(),
                    link.value.clone(),
                    error.clone(),
                ]
            })
            .collect()
    }
}

impl Summarize for ContactRecord {
    fn emails(&self) -> Vec<&str> {
        self.links_of(ContactKind::Email)
            .map(|link| link.value.as_str())
            .collect()
    }

    fn link_kinds(&self) -> Vec<&'static str> {
        self.links.iter().map(|link| link.kind.as_str()).collect()
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_rows_cover_empty_records() {
        let record = ContactRecord::new("https://devpost.com/alice", Vec::new());
        assert_eq!(record.rows().len(), 1);

        let record = ContactRecord::new(
            "https://devpost.com/bob",
            vec![
                ContactLink::new(ContactKind::CodeHost, "https://github.com/bob"),
                ContactLink::new(ContactKind::Email, "bob@example.com"),
            ],
        );
        let rows = record.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "email");
        assert_eq!(record.emails(), vec!["bob@example.com"]);
    }

    #[test]
    fn test_contact_kind_serializes_kebab_case() {
        let link = ContactLink::new(ContactKind::ProfessionalNetwork, "https://linkedin.com/in/a");
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["kind"], "professional-network");
    }

    #[test]
    fn test_repository_id_parsing() {
        let repo: RepositoryId = "rust-lang/rust".parse().unwrap();
        assert_eq!(repo.owner, "rust-lang");
        assert_eq!(repo.name, "rust");

        let repo: RepositoryId = "https://github.com/vercel/ai.git".parse().unwrap();
        assert_eq!(repo.to_string(), "vercel/ai");

        assert!("just-a-name".parse::<RepositoryId>().is_err());
        assert!("a/b/c".parse::<RepositoryId>().is_err());
    }

    #[test]
    fn test_failed_contact_record_has_no_links() {
        let record = ContactRecord::failed("https://devpost.com/alice", "HTTP 404");
        assert!(record.links.is_empty());
        assert_eq!(record.error.as_deref(), Some("HTTP 404"));
    }
}
