//! NVD CVE 2.0 API adapter.
//!
//! The API is index-paged and reports `totalResults`, which maps cleanly onto
//! the page-count contract: page N at size S starts at index (N-1)*S.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use vulnwatch_common::{Provider, Severity, VulnRecord, VulnWatchError};

use super::VulnSource;

const BASE_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NvdSource {
    http: reqwest::Client,
    base_url: String,
}

impl NvdSource {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the adapter at a different API root. Used by tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("vulnwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client construction only fails on invalid TLS config");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, start_index: usize, results_per_page: usize) -> Result<CveResponse> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("startIndex", start_index.to_string()),
                ("resultsPerPage", results_per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| VulnWatchError::Fetch(format!("nvd request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VulnWatchError::Fetch(format!("nvd returned status {status}")).into());
        }

        resp.json().await.context("nvd response decode failed")
    }
}

impl Default for NvdSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VulnSource for NvdSource {
    fn provider(&self) -> Provider {
        Provider {
            name: "nvd".to_string(),
            display_name: "NVD CVE Feed".to_string(),
            link: "https://nvd.nist.gov/vuln".to_string(),
        }
    }

    async fn page_count(&self, page_size: usize) -> Result<usize> {
        let resp = self.fetch(0, 1).await?;
        Ok(resp.total_results.div_ceil(page_size))
    }

    async fn parse_page(&self, page: usize, page_size: usize) -> Result<Vec<VulnRecord>> {
        let start_index = (page - 1) * page_size;
        let resp = self.fetch(start_index, page_size).await?;
        Ok(resp
            .vulnerabilities
            .into_iter()
            .map(|v| v.cve.into_record())
            .collect())
    }

    fn is_valuable(&self, record: &VulnRecord) -> bool {
        record.severity >= Severity::High
    }
}

// ---------------------------------------------------------------------------
// API response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CveResponse {
    total_results: usize,
    #[serde(default)]
    vulnerabilities: Vec<CveWrapper>,
}

#[derive(Debug, Deserialize)]
struct CveWrapper {
    cve: CveItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CveItem {
    id: String,
    #[serde(default)]
    published: String,
    #[serde(default)]
    descriptions: Vec<LangString>,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default)]
    weaknesses: Vec<Weakness>,
    #[serde(default)]
    references: Vec<Reference>,
}

#[derive(Debug, Deserialize)]
struct LangString {
    lang: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metrics {
    #[serde(default)]
    cvss_metric_v31: Vec<CvssMetric>,
    #[serde(default)]
    cvss_metric_v30: Vec<CvssMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssMetric {
    cvss_data: CvssData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssData {
    base_severity: String,
}

#[derive(Debug, Deserialize)]
struct Weakness {
    #[serde(default)]
    description: Vec<LangString>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    url: String,
}

impl CveItem {
    fn into_record(self) -> VulnRecord {
        let severity = self
            .metrics
            .cvss_metric_v31
            .first()
            .or(self.metrics.cvss_metric_v30.first())
            .map(|m| severity_from_cvss(&m.cvss_data.base_severity))
            .unwrap_or(Severity::Low);

        let description = self
            .descriptions
            .iter()
            .find(|d| d.lang == "en")
            .or(self.descriptions.first())
            .map(|d| d.value.clone())
            .unwrap_or_default();

        // Weakness entries are CWE identifiers ("CWE-79"); they serve as tags.
        let mut tags: Vec<String> = Vec::new();
        for w in &self.weaknesses {
            for d in &w.description {
                if d.value.starts_with("CWE-") && !tags.contains(&d.value) {
                    tags.push(d.value.clone());
                }
            }
        }

        let disclosure = self.published.chars().take(10).collect();

        VulnRecord {
            cve: self.id.clone(),
            title: self.id.clone(),
            unique_key: self.id,
            description,
            severity,
            disclosure,
            solutions: String::new(),
            references: self.references.into_iter().map(|r| r.url).collect(),
            tags,
            source: "nvd".to_string(),
            reasons: Vec::new(),
        }
    }
}

fn severity_from_cvss(base_severity: &str) -> Severity {
    match base_severity.to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        _ => Severity::Low,
    }
}
