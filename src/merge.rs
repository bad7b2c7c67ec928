//! Overlays local candidates onto the remote extractor's output, and
//! optionally redacts PII from every string value.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Map;

use crate::{
    prelude::*,
    types::{DocType, LocalCandidates, MergedRecord},
};

const MAX_RAW_OCR_PREVIEW_CHARS: usize = 4000;

/// Merge the model's `ExtractionResult` with `local` into a [`MergedRecord`].
#[instrument(level = "debug", skip_all)]
#[allow(clippy::too_many_arguments)]
pub fn merge(
    mut model_output: Map<String, Value>,
    local: &LocalCandidates,
    doc_type: DocType,
    source_filename: &str,
    page_count: usize,
    audit: bool,
    concatenated_page_texts: &str,
) -> MergedRecord {
    if !model_output.contains_key("snippets") && !local.important_snippets.is_empty() {
        model_output.insert(
            "snippets".to_string(),
            Value::String(local.important_snippets.clone()),
        );
    }

    if let Some(name) = &local.name_candidate {
        if !model_output.contains_key("patient_name") {
            model_output.insert("patient_name".to_string(), Value::String(name.clone()));
        }
        if !model_output.contains_key("member") {
            model_output.insert("member".to_string(), Value::String(name.clone()));
        }
    }

    if doc_type == DocType::Transcript
        && !model_output.contains_key("citations")
        && !local.local_citations.is_empty()
    {
        model_output.insert(
            "citations".to_string(),
            serde_json::to_value(&local.local_citations).expect("citations always serialize"),
        );
    }

    model_output.insert("doc_type".to_string(), Value::String(doc_type.tag().to_string()));
    model_output.insert(
        "source".to_string(),
        Value::String(source_filename.to_string()),
    );
    model_output.insert(
        "page_count".to_string(),
        Value::Number(page_count.into()),
    );

    if audit {
        let preview: String = concatenated_page_texts
            .chars()
            .take(MAX_RAW_OCR_PREVIEW_CHARS)
            .collect();
        model_output.insert("raw_ocr_preview".to_string(), Value::String(preview));
    }

    model_output
}

static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3}[- ]?\d{2}[- ]?\d{4}").expect("valid regex"));
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").expect("valid regex")
});
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid regex")
});

/// Redact SSNs, phone numbers, and email addresses from every string value
/// in a JSON tree. Idempotent: running it twice yields the same output as
/// running it once, since the masked placeholders don't themselves match
/// the redaction patterns.
pub fn redact(value: &mut Value) {
    match value {
        Value::String(s) => {
            let redacted = EMAIL_RE.replace_all(s, "***@***.***");
            let redacted = PHONE_RE.replace_all(&redacted, "***-***-****");
            let redacted = SSN_RE.replace_all(&redacted, "***-**-****");
            *s = redacted.into_owned();
        }
        Value::Array(items) => {
            for item in items {
                redact(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                redact(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_with_name(name: &str) -> LocalCandidates {
        LocalCandidates {
            important_snippets: "snip".to_string(),
            char_count: 4,
            name_candidate: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn copies_snippets_when_model_lacks_them() {
        let model = Map::new();
        let local = local_with_name("Jane");
        let merged = merge(model, &local, DocType::Medical, "a.pdf", 1, false, "");
        assert_eq!(merged["snippets"], json!("snip"));
    }

    #[test]
    fn copies_name_into_both_patient_name_and_member_independently() {
        let model = Map::new();
        let local = local_with_name("Patient: Jane Smith");
        let merged = merge(model, &local, DocType::Medical, "a.pdf", 1, false, "");
        assert_eq!(merged["patient_name"], json!("Patient: Jane Smith"));
        assert_eq!(merged["member"], json!("Patient: Jane Smith"));
    }

    #[test]
    fn does_not_overwrite_existing_patient_name() {
        let mut model = Map::new();
        model.insert("patient_name".to_string(), json!("Already Set"));
        let local = local_with_name("Jane");
        let merged = merge(model, &local, DocType::Medical, "a.pdf", 1, false, "");
        assert_eq!(merged["patient_name"], json!("Already Set"));
    }

    #[test]
    fn sets_doc_type_source_and_page_count() {
        let model = Map::new();
        let local = LocalCandidates::default();
        let merged = merge(model, &local, DocType::Pleading, "case.pdf", 3, false, "");
        assert_eq!(merged["doc_type"], json!("pleading"));
        assert_eq!(merged["source"], json!("case.pdf"));
        assert_eq!(merged["page_count"], json!(3));
    }

    #[test]
    fn audit_mode_sets_raw_ocr_preview() {
        let model = Map::new();
        let local = LocalCandidates::default();
        let merged = merge(model, &local, DocType::Medical, "a.pdf", 1, true, "hello world");
        assert_eq!(merged["raw_ocr_preview"], json!("hello world"));
    }

    #[test]
    fn redacts_ssn_phone_and_email() {
        let mut value = json!({"note": "SSN 123-45-6789 call 555-123-4567 mail a@b.com"});
        redact(&mut value);
        let note = value["note"].as_str().unwrap();
        assert!(!note.contains("123-45-6789"));
        assert!(!note.contains("555-123-4567"));
        assert!(!note.contains("a@b.com"));
        assert!(note.contains("***-**-****"));
        assert!(note.contains("***@***.***"));
    }

    #[test]
    fn redaction_is_idempotent() {
        let mut value = json!({"note": "SSN 123-45-6789 call 555-123-4567 mail a@b.com"});
        redact(&mut value);
        let once = value.clone();
        redact(&mut value);
        assert_eq!(once, value);
    }
}
