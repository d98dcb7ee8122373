//! Finding: one per-site result item parsed out of a tool's output.

use serde::{Deserialize, Serialize};

/// One checked site/service.
///
/// Order of findings inside a result matches the order the tool reported them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub site: String,
    pub found: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Finding {
    pub fn found(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            found: true,
            evidence_url: None,
            note: None,
        }
    }

    pub fn not_found(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            found: false,
            evidence_url: None,
            note: None,
        }
    }

    pub fn with_evidence(mut self, url: impl Into<String>) -> Self {
        self.evidence_url = Some(url.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted_and_camel_cased() {
        let f = Finding::not_found("twitter.com");
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v, serde_json::json!({ "site": "twitter.com", "found": false }));

        let f = Finding::found("github.com").with_evidence("https://github.com/x");
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["evidenceUrl"], "https://github.com/x");
    }
}
