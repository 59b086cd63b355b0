use serde::Serialize;

use vulnwatch_common::{Provider, VulnRecord};

/// Summary sent once after a successful bootstrap.
#[derive(Debug, Clone, Serialize)]
pub struct InitialMessage {
    pub version: String,
    pub vuln_count: usize,
    pub interval: String,
    pub providers: Vec<Provider>,
}

/// Payload for the structured sink. Tagged so consumers can route on `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawMessage {
    Initial(InitialMessage),
    Text { content: String },
    VulnInfo(VulnRecord),
}

impl RawMessage {
    pub fn initial(msg: InitialMessage) -> Self {
        RawMessage::Initial(msg)
    }

    pub fn text(content: impl Into<String>) -> Self {
        RawMessage::Text {
            content: content.into(),
        }
    }

    pub fn vuln(record: &VulnRecord) -> Self {
        RawMessage::VulnInfo(record.clone())
    }
}

/// Render the initialization summary as markdown.
pub fn render_initial(msg: &InitialMessage) -> String {
    let mut lines = vec![
        format!("vulnwatch {} initialized", msg.version),
        format!("- local catalog: {} vulns", msg.vuln_count),
        format!("- checking every {}", msg.interval),
    ];
    for p in &msg.providers {
        lines.push(format!("- watching [{}]({})", p.display_name, p.link));
    }
    lines.join("\n")
}

/// Render one vulnerability as markdown for the formatted sink.
pub fn render_vuln(record: &VulnRecord) -> String {
    let mut lines = vec![
        format!("**{}**", record.title),
        String::new(),
        format!("- Key: `{}`", record.unique_key),
        format!("- Severity: {}", record.severity),
        format!("- Disclosure: {}", record.disclosure),
        format!("- Source: {}", record.source),
    ];
    if !record.cve.is_empty() {
        lines.push(format!("- CVE: {}", record.cve));
    }
    if !record.tags.is_empty() {
        lines.push(format!("- Tags: {}", record.tags.join(", ")));
    }
    if !record.reasons.is_empty() {
        lines.push(format!("- Why: {}", record.reasons.join("; ")));
    }
    if !record.description.is_empty() {
        lines.push(String::new());
        lines.push(record.description.clone());
    }
    if !record.solutions.is_empty() {
        lines.push(String::new());
        lines.push(format!("Solutions: {}", record.solutions));
    }
    if !record.references.is_empty() {
        lines.push(String::new());
        lines.push("References:".to_string());
        for r in &record.references {
            lines.push(format!("- {r}"));
        }
    }
    lines.join("\n")
}
