use crate::error::{AgileError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Category given to artifacts whose path has no parent directory.
pub const DEFAULT_CATEGORY: &str = "general";

// ---------------------------------------------------------------------------
// DocumentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Active,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TokenCounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCounts {
    pub markdown: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<u64>,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4)
}

// ---------------------------------------------------------------------------
// DocumentKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub category: String,
    pub name: String,
}

impl DocumentKey {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

// ---------------------------------------------------------------------------
// DocumentRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub category: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub token_counts: TokenCounts,
    #[serde(default)]
    pub agent: String,
    /// Names of documents this one was built from. Weak references: a
    /// dependency need not exist in the registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Registry insertion sequence; preserves listing order across reloads.
    #[serde(default)]
    pub seq: u64,
}

impl DocumentRecord {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            category: category.into(),
            name: name.into(),
            path: path.into(),
            summary: String::new(),
            token_counts: TokenCounts::default(),
            agent: String::new(),
            dependencies: Vec::new(),
            status: DocumentStatus::Active,
            created_at: now,
            updated_at: now,
            archived_at: None,
            seq: 0,
        }
    }

    /// Build a record whose category and name are inferred from `path`.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let (category, name) = infer_key(&path);
        Self::new(category, name, path)
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_tokens(mut self, markdown: u64, json: Option<u64>) -> Self {
        self.token_counts = TokenCounts { markdown, json };
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.category, &self.name)
    }

    pub fn is_archived(&self) -> bool {
        self.status == DocumentStatus::Archived
    }

    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(AgileError::Validation("category must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(AgileError::Validation("name must not be empty".into()));
        }
        if self.path.trim().is_empty() {
            return Err(AgileError::Validation(format!(
                "path must not be empty for {}/{}",
                self.category, self.name
            )));
        }
        Ok(())
    }
}

/// Infer `(category, name)` from an artifact path: the parent directory's
/// name and the file stem. `docs/debug-1.md` -> `("docs", "debug-1")`.
pub fn infer_key(path: &str) -> (String, String) {
    let p = Path::new(path);
    let name = p
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let category = p
        .parent()
        .and_then(|parent| parent.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    (category, name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_key_from_path() {
        assert_eq!(
            infer_key("docs/debug-1.md"),
            ("docs".to_string(), "debug-1".to_string())
        );
        assert_eq!(
            infer_key("project-documents/research/competitive-analysis.md"),
            ("research".to_string(), "competitive-analysis".to_string())
        );
        assert_eq!(
            infer_key("README.md"),
            ("general".to_string(), "README".to_string())
        );
    }

    #[test]
    fn from_path_fills_key() {
        let r = DocumentRecord::from_path("docs/debug-1.md").with_summary("NPE fix");
        assert_eq!(r.category, "docs");
        assert_eq!(r.name, "debug-1");
        assert_eq!(r.summary, "NPE fix");
        assert_eq!(r.status, DocumentStatus::Active);
    }

    #[test]
    fn validate_rejects_empty_fields() {
        assert!(DocumentRecord::new("c", "n", "p").validate().is_ok());
        assert!(DocumentRecord::new("", "n", "p").validate().is_err());
        assert!(DocumentRecord::new("c", " ", "p").validate().is_err());
        assert!(DocumentRecord::new("c", "n", "").validate().is_err());
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }

    #[test]
    fn record_json_shape() {
        let r = DocumentRecord::new("docs", "a", "docs/a.md").with_tokens(10, Some(4));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["token_counts"]["markdown"], 10);
        assert_eq!(v["token_counts"]["json"], 4);
        assert_eq!(v["status"], "active");
        assert!(v.get("dependencies").is_none());
    }
}
