//! Conversation data model
//!
//! Turns, citations, and the grouping rules used when citations are
//! presented to a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lightweight history message carried on requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A pointer from generated content back to a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Document identifier (filename)
    pub source: String,

    /// Page within the document, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Grade-level label the passage was tagged with, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_grade: Option<String>,
}

impl Citation {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
            section_grade: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Citations grouped by source for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub source: String,
    /// Sorted, de-duplicated page set collected across the group
    pub pages: Vec<u32>,
}

/// Group citations by source.
///
/// Merge rule: first-seen source order is preserved, page values are
/// unioned and sorted. Repeated retrievals within one conversation merge
/// the same way.
pub fn group_citations(citations: &[Citation]) -> Vec<SourceGroup> {
    let mut groups: Vec<SourceGroup> = Vec::new();
    for citation in citations {
        let idx = match groups.iter().position(|g| g.source == citation.source) {
            Some(idx) => idx,
            None => {
                groups.push(SourceGroup {
                    source: citation.source.clone(),
                    pages: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[idx];
        if let Some(page) = citation.page {
            if !group.pages.contains(&page) {
                group.pages.push(page);
            }
        }
    }
    for group in &mut groups {
        group.pages.sort_unstable();
    }
    groups
}

/// One message in a conversation.
///
/// Immutable once finalized; the in-progress assistant turn is mutable
/// until a terminal stream event arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_steps: Vec<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub finalized: bool,

    #[serde(default)]
    pub failed: bool,
}

impl Turn {
    /// A completed user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            reasoning_steps: Vec::new(),
            created_at: Utc::now(),
            finalized: true,
            failed: false,
        }
    }

    /// An empty in-progress assistant turn, mutated by the stream merger
    pub fn assistant_draft() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
            reasoning_steps: Vec::new(),
            created_at: Utc::now(),
            finalized: false,
            failed: false,
        }
    }
}
