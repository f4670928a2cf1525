use crate::domain::ports::Summarize;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

const TOP_DOMAINS: usize = 10;

/// 執行結束時的摘要報告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub records_with_email: usize,
    pub total_emails: usize,
    pub failed_records: usize,
    /// 依數量遞減排序，最多十個
    pub email_domains: Vec<(String, usize)>,
    pub link_kinds: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_records<T: Summarize>(records: &[T]) -> Self {
        let mut summary = Summary {
            total_records: records.len(),
            ..Default::default()
        };
        let mut domains: HashMap<String, usize> = HashMap::new();

        for record in records {
            let emails = record.emails();
            if !emails.is_empty() {
                summary.records_with_email += 1;
            }
            summary.total_emails += emails.len();

            for email in emails {
                let domain = email
                    .rsplit_once('@')
                    .map(|(_, domain)| domain.to_ascii_lowercase())
                    .unwrap_or_else(|| "unknown".to_string());
                *domains.entry(domain).or_default() += 1;
            }

            for kind in record.link_kinds() {
                *summary.link_kinds.entry(kind.to_string()).or_default() += 1;
            }

            if record.failed() {
                summary.failed_records += 1;
            }
        }

        let mut domains: Vec<(String, usize)> = domains.into_iter().collect();
        domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        domains.truncate(TOP_DOMAINS);
        summary.email_domains = domains;

        summary
    }

    pub fn render(&self, pipeline: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "📊 {} SUMMARY", pipeline.to_uppercase());
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Total records: {}", self.total_records);
        let _ = writeln!(out, "Records with email: {}", self.records_with_email);
        let _ = writeln!(out, "Total email addresses: {}", self.total_emails);

        if self.failed_records > 0 {
            let _ = writeln!(out, "Failed records: {}", self.failed_records);
        }

        if !self.email_domains.is_empty() {
            let _ = writeln!(out, "\n📧 Email domains:");
            for (domain, count) in &self.email_domains {
                let _ = writeln!(out, "   {}: {}", domain, count);
            }
        }

        if !self.link_kinds.is_empty() {
            let _ = writeln!(out, "\n🔗 Contact links:");
            for (kind, count) in &self.link_kinds {
                let _ = writeln!(out, "   {}: {}", kind, count);
            }
        }

        out
    }
}
