//! Fragment data model.
//!
//! A `Fragment` is an immutable slice of a source document with the metadata
//! the retrieval pipeline needs: where it came from, how much to trust it,
//! and how strongly to prefer it during ranking. Fragments are produced by an
//! external ingestion layer; this crate only consumes them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::ConfigError;

/// Unique identifier for a fragment.
///
/// Either content-addressed (see [`FragmentId::derive`]) or assigned by the
/// ingestion layer (e.g. `notes.pdf_p3_c1`). Compared lexically, which gives
/// the deterministic tie-break order used by the retriever.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentId(String);

impl FragmentId {
    /// Wrap an ingestion-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a content-addressed id from the fragment's identity fields.
    ///
    /// UUID v5 over (document, page, span, text), so re-ingesting unchanged
    /// content produces the same id and upserts replace instead of duplicate.
    pub fn derive(document_id: &str, page_number: u32, char_span: (usize, usize), text: &str) -> Self {
        let material = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            document_id, page_number, char_span.0, char_span.1, text
        );
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FragmentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Priority class of a fragment's source document.
///
/// Drives the multiplicative score boost during retrieval:
/// rubric > slides > textbook > normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTag {
    Rubric,
    Slides,
    Textbook,
    Normal,
}

impl PriorityTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rubric => "rubric",
            Self::Slides => "slides",
            Self::Textbook => "textbook",
            Self::Normal => "normal",
        }
    }
}

impl Default for PriorityTag {
    fn default() -> Self {
        Self::Normal
    }
}

impl FromStr for PriorityTag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rubric" => Ok(Self::Rubric),
            "slides" => Ok(Self::Slides),
            "textbook" => Ok(Self::Textbook),
            "normal" => Ok(Self::Normal),
            other => Err(ConfigError::UnknownPriority(other.to_string())),
        }
    }
}

/// An immutable document fragment with provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub document_id: String,
    pub text: String,
    pub page_number: u32,
    /// Character offsets of this fragment within its source page.
    pub char_span: (usize, usize),
    pub priority_tag: PriorityTag,
    pub trusted: bool,
}

impl Fragment {
    /// Create a fragment with a content-addressed id.
    pub fn new(
        document_id: impl Into<String>,
        page_number: u32,
        char_span: (usize, usize),
        text: impl Into<String>,
        priority_tag: PriorityTag,
        trusted: bool,
    ) -> Self {
        let document_id = document_id.into();
        let text = text.into();
        let id = FragmentId::derive(&document_id, page_number, char_span, &text);
        Self {
            id,
            document_id,
            text,
            page_number,
            char_span,
            priority_tag,
            trusted,
        }
    }

    /// Create a fragment with an ingestion-assigned id.
    pub fn with_id(
        id: impl Into<String>,
        document_id: impl Into<String>,
        page_number: u32,
        char_span: (usize, usize),
        text: impl Into<String>,
        priority_tag: PriorityTag,
        trusted: bool,
    ) -> Self {
        Self {
            id: FragmentId::new(id),
            document_id: document_id.into(),
            text: text.into(),
            page_number,
            char_span,
            priority_tag,
            trusted,
        }
    }
}

/// A candidate solution step produced by the external generation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStep {
    pub text: String,
    /// Citation the generator claims for this step, if any. Passed through
    /// for rendering; support is established independently by the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_citation: Option<String>,
}

impl CandidateStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            claimed_citation: None,
        }
    }

    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.claimed_citation = Some(citation.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_across_reingestion() {
        let a = Fragment::new("notes.pdf", 3, (0, 42), "the mean value theorem", PriorityTag::Textbook, true);
        let b = Fragment::new("notes.pdf", 3, (0, 42), "the mean value theorem", PriorityTag::Textbook, true);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn derived_ids_differ_when_content_differs() {
        let a = Fragment::new("notes.pdf", 3, (0, 42), "the mean value theorem", PriorityTag::Normal, true);
        let b = Fragment::new("notes.pdf", 3, (0, 42), "the extreme value theorem", PriorityTag::Normal, true);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn priority_round_trips_through_str() {
        for tag in [PriorityTag::Rubric, PriorityTag::Slides, PriorityTag::Textbook, PriorityTag::Normal] {
            assert_eq!(tag.as_str().parse::<PriorityTag>().unwrap(), tag);
        }
        assert!("homework".parse::<PriorityTag>().is_err());
    }

    #[test]
    fn fragment_ids_order_lexically() {
        let a = FragmentId::new("doc_p1_c0");
        let b = FragmentId::new("doc_p1_c1");
        assert!(a < b);
    }
}
