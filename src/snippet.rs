//! Keyword-windowed excerpt selection, bounded by line and byte caps.

use crate::{prelude::*, types::DocType};

/// Per-type keyword tables, duplicated here (rather than shared with
/// `classifier.rs`) because the snippet selector's keyword set is
/// deliberately narrower and line-oriented: it only needs to recognize a
/// *hit line*, not score a whole document.
fn keywords_for(doc_type: DocType) -> &'static [&'static str] {
    match doc_type {
        DocType::Medical => &["diagnosis", "treatment", "medication", "mrn", "cpt", "icd"],
        DocType::Pleading => &["plaintiff", "defendant", "index no", "caption"],
        DocType::Police => &["officer", "incident report", "violation", "report number"],
        DocType::Transcript => &["q:", "a:", "witness", "deposition"],
        DocType::InsuranceEob => &["payer", "claim number", "allowed amount", "denied amount"],
        DocType::Imaging => &["impression", "findings", "study type"],
        DocType::Unknown => &[],
    }
}

/// Select a keyword-windowed snippet from `text` for the given `doc_type`.
///
/// Splits `text` into trimmed lines. For each line containing any keyword
/// for `doc_type`, appends the window `[i-2, i+2]` (clamped to the
/// document's bounds), skipping empty lines, until the accumulated
/// non-empty line count reaches `max_snippet_lines`. If no line matches any
/// keyword, falls back to the first `max_snippet_lines` non-empty lines.
/// The joined result is truncated to `max_chars_per_snippet` bytes, UTF-8
/// safe and dropping a trailing partial line.
#[instrument(level = "debug", skip(text))]
pub fn select_snippet(
    text: &str,
    doc_type: DocType,
    max_snippet_lines: usize,
    max_chars_per_snippet: usize,
) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let keywords = keywords_for(doc_type);

    let mut selected_indices: Vec<usize> = Vec::new();
    let mut seen = vec![false; lines.len()];
    let mut non_empty_count = 0usize;

    if !keywords.is_empty() {
        'lines: for (i, line) in lines.iter().enumerate() {
            if non_empty_count >= max_snippet_lines {
                break;
            }
            let lowercased = line.to_lowercase();
            if keywords.iter().any(|kw| lowercased.contains(kw)) {
                let start = i.saturating_sub(2);
                let end = (i + 2).min(lines.len().saturating_sub(1));
                for j in start..=end {
                    if seen[j] {
                        continue;
                    }
                    if lines[j].is_empty() {
                        continue;
                    }
                    seen[j] = true;
                    selected_indices.push(j);
                    non_empty_count += 1;
                    if non_empty_count >= max_snippet_lines {
                        continue 'lines;
                    }
                }
            }
        }
    }

    if selected_indices.is_empty() {
        for (i, line) in lines.iter().enumerate() {
            if non_empty_count >= max_snippet_lines {
                break;
            }
            if line.is_empty() {
                continue;
            }
            selected_indices.push(i);
            non_empty_count += 1;
        }
    }

    selected_indices.sort_unstable();
    selected_indices.dedup();

    let joined = selected_indices
        .into_iter()
        .map(|i| lines[i])
        .collect::<Vec<_>>()
        .join("\n");

    truncate_utf8_safe_dropping_partial_line(&joined, max_chars_per_snippet)
}

/// Truncate `s` to at most `max_bytes` bytes, respecting UTF-8 character
/// boundaries, and additionally drop a trailing partial *line* (scanning
/// backward to the last `\n` before the truncation point) so a snippet
/// never ends mid-sentence.
pub fn truncate_utf8_safe_dropping_partial_line(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let truncated = &s[..boundary];

    match truncated.rfind('\n') {
        Some(last_newline) => truncated[..last_newline].to_string(),
        // No newline at all within the truncated range: keep the
        // byte/char-safe truncation as-is rather than returning an empty
        // string, since there's no "partial line" to drop.
        None => truncated.to_string(),
    }
}
