//! Regex-based candidate field extraction, run before any remote call.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    prelude::*,
    snippet::select_snippet,
    types::{Citation, DocType, LocalCandidates},
};

const MAX_CITATIONS: usize = 10;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Patient|Name)\s*[:\-]\s*([A-Za-z ,.\-']{3,90})").expect("valid regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").expect("valid regex")
});

static TRANSCRIPT_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpage\s+(\d+)").expect("valid regex"));

static TRANSCRIPT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blines?\s+(\d+)(?:-(\d+))?").expect("valid regex"));

/// Run all local regex probes against the full document text, and select the
/// keyword-windowed snippet for `doc_type`.
#[instrument(level = "debug", skip(full_text))]
pub fn extract_local_candidates(
    full_text: &str,
    doc_type: DocType,
    max_snippet_lines: usize,
    max_chars_per_snippet: usize,
) -> LocalCandidates {
    let important_snippets =
        select_snippet(full_text, doc_type, max_snippet_lines, max_chars_per_snippet);

    let mut candidates = LocalCandidates {
        char_count: full_text.chars().count(),
        important_snippets,
        name_candidate: NAME_RE
            .find(full_text)
            .map(|m| m.as_str().trim().to_string()),
        date_candidate: DATE_RE.find(full_text).map(|m| m.as_str().to_string()),
        phone_candidate: PHONE_RE.find(full_text).map(|m| m.as_str().to_string()),
        local_citations: Vec::new(),
    };

    if doc_type == DocType::Transcript {
        candidates.local_citations = extract_transcript_citations(full_text);
    }

    candidates
}

/// Scan for `page N` markers to track the current page, and for each
/// `line(s) N(-M)` reference emit a citation capped at [`MAX_CITATIONS`],
/// preserving source order.
fn extract_transcript_citations(full_text: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut current_page: u32 = 0;

    for raw_line in full_text.lines() {
        if citations.len() >= MAX_CITATIONS {
            break;
        }
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = TRANSCRIPT_PAGE_RE.captures(line) {
            if let Some(page) = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                current_page = page;
            }
        }

        if let Some(captures) = TRANSCRIPT_LINE_RE.captures(line) {
            let line_ref = match captures.get(2) {
                Some(end) => format!(
                    "{}-{}",
                    captures.get(1).map(|m| m.as_str()).unwrap_or_default(),
                    end.as_str()
                ),
                None => captures
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            };
            citations.push(Citation {
                page: current_page,
                line: line_ref,
                text: line.to_string(),
            });
        }
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_name_candidate() {
        let text = "Patient: Jane Smith. Diagnosis: concussion. Medication: ibuprofen.";
        let candidates = extract_local_candidates(text, DocType::Medical, 10, 2000);
        assert_eq!(
            candidates.name_candidate.as_deref(),
            Some("Patient: Jane Smith")
        );
    }

    #[test]
    fn extracts_iso_date() {
        let text = "DOB: 1990-05-12. Seen on 5/12/2024 again.";
        let candidates = extract_local_candidates(text, DocType::Medical, 10, 2000);
        assert_eq!(candidates.date_candidate.as_deref(), Some("1990-05-12"));
    }

    #[test]
    fn extracts_phone_candidate() {
        let text = "Contact the office at 555-123-4567 for records.";
        let candidates = extract_local_candidates(text, DocType::Medical, 10, 2000);
        assert_eq!(candidates.phone_candidate.as_deref(), Some("555-123-4567"));
    }

    #[test]
    fn extracts_transcript_citation_with_page_tracking() {
        let text = "Page 17\nQ: Did you see the light?\nA: Yes. Line 22";
        let candidates = extract_local_candidates(text, DocType::Transcript, 10, 2000);
        assert!(!candidates.local_citations.is_empty());
        assert_eq!(candidates.local_citations[0].page, 17);
    }

    #[test]
    fn citations_are_capped_at_ten() {
        let mut text = String::from("Page 1\n");
        for i in 0..20 {
            text.push_str(&format!("Line {i}\n"));
        }
        let candidates = extract_local_candidates(&text, DocType::Transcript, 50, 20_000);
        assert_eq!(candidates.local_citations.len(), 10);
    }

    #[test]
    fn dump_is_deterministic() {
        let text = "Patient: Jane Smith. Diagnosis: concussion.";
        let a = extract_local_candidates(text, DocType::Medical, 10, 2000);
        let b = extract_local_candidates(text, DocType::Medical, 10, 2000);
        assert_eq!(a.dump(), b.dump());
    }
}
