//! The data model shared across pipeline stages.

use serde_json::Map;

use crate::prelude::*;

/// The two kinds of input media we accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image,
}

/// An immutable reference to one input file, as collected by the orchestrator.
#[derive(Debug, Clone)]
pub struct InputRef {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// The coarse document classification used to pick a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    Medical,
    Pleading,
    Police,
    Transcript,
    InsuranceEob,
    Imaging,
    Unknown,
}

impl DocType {
    /// All classifiable types, in the order ties are broken when classifying.
    pub const CLASSIFIABLE_IN_TIE_BREAK_ORDER: [DocType; 6] = [
        DocType::Medical,
        DocType::Pleading,
        DocType::Police,
        DocType::Transcript,
        DocType::InsuranceEob,
        DocType::Imaging,
    ];

    /// The lowercase tag used in cache keys and in the `doc_type` output field.
    pub fn tag(self) -> &'static str {
        match self {
            DocType::Medical => "medical",
            DocType::Pleading => "pleading",
            DocType::Police => "police",
            DocType::Transcript => "transcript",
            DocType::InsuranceEob => "insurance_eob",
            DocType::Imaging => "imaging",
            DocType::Unknown => "unknown",
        }
    }
}

/// A single transcript citation found by the local extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub page: u32,
    pub line: String,
    pub text: String,
}

/// Pre-LLM extraction artifacts: the snippet and any regex-found fields.
#[derive(Debug, Clone, Default)]
pub struct LocalCandidates {
    pub important_snippets: String,
    pub char_count: usize,
    pub name_candidate: Option<String>,
    pub date_candidate: Option<String>,
    pub phone_candidate: Option<String>,
    pub local_citations: Vec<Citation>,
}

impl LocalCandidates {
    /// Serialize to the `Map<String, Value>` used as the cache-key input and
    /// as part of the remote request's user message.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "important_snippets".to_string(),
            Value::String(self.important_snippets.clone()),
        );
        map.insert(
            "char_count".to_string(),
            Value::Number(self.char_count.into()),
        );
        if let Some(name) = &self.name_candidate {
            map.insert("name_candidate".to_string(), Value::String(name.clone()));
        }
        if let Some(date) = &self.date_candidate {
            map.insert("date_candidate".to_string(), Value::String(date.clone()));
        }
        if let Some(phone) = &self.phone_candidate {
            map.insert(
                "phone_candidate".to_string(),
                Value::String(phone.clone()),
            );
        }
        if !self.local_citations.is_empty() {
            map.insert(
                "local_citations".to_string(),
                serde_json::to_value(&self.local_citations)
                    .expect("citations always serialize"),
            );
        }
        map
    }

    /// A canonical, deterministic serialization used as a cache-key input.
    /// `serde_json` serializes `Map` (a `BTreeMap` under the hood, since we
    /// don't enable the `preserve_order` feature) in key-sorted order, which
    /// is what makes this deterministic across runs with the same inputs.
    pub fn dump(&self) -> String {
        Value::Object(self.to_json()).to_string()
    }
}

/// The final per-document structured output emitted to sinks.
pub type MergedRecord = Map<String, Value>;

/// The result of processing exactly one input, produced exactly once.
#[derive(Debug, Clone)]
pub struct DocResult {
    pub input_path: PathBuf,
    pub doc_type: DocType,
    pub merged: Option<MergedRecord>,
    pub ok: bool,
    pub error: Option<String>,
    pub pages: usize,
    pub chars_used: usize,
    /// Length (in chars) of the snippet sent to the remote extractor. Used
    /// only to compute the combined output's `stats.avg_snippet_chars`; not
    /// itself part of the per-document output.
    pub snippet_chars: usize,
}

impl DocResult {
    pub fn success(
        input_path: PathBuf,
        doc_type: DocType,
        merged: MergedRecord,
        pages: usize,
        chars_used: usize,
        snippet_chars: usize,
    ) -> Self {
        Self {
            input_path,
            doc_type,
            merged: Some(merged),
            ok: true,
            error: None,
            pages,
            chars_used,
            snippet_chars,
        }
    }

    pub fn failure(input_path: PathBuf, doc_type: DocType, error: impl ToString) -> Self {
        Self {
            input_path,
            doc_type,
            merged: None,
            ok: false,
            error: Some(error.to_string()),
            pages: 0,
            chars_used: 0,
            snippet_chars: 0,
        }
    }
}
