//! Case-insensitive lexical scoring that assigns a [`DocType`] to page text.

use crate::{prelude::*, types::DocType};

const MEDICAL_KEYWORDS: &[&str] = &[
    "diagnosis",
    "treatment",
    "medication",
    "mrn",
    "cpt",
    "icd",
    "history of present illness",
    "patient",
    "prescri",
];

const PLEADING_KEYWORDS: &[&str] = &[
    "plaintiff",
    "defendant",
    "index no",
    "caption",
    "cause of action",
    "relief sought",
    "complaint",
    "summons",
];

const POLICE_KEYWORDS: &[&str] = &[
    "incident report",
    "officer",
    "badge",
    "violation",
    "citation",
    "accident report",
    "report number",
];

const TRANSCRIPT_KEYWORDS: &[&str] = &[
    "q:", "a:", "deposition", "witness", "sworn", "examination", "transcript",
];

const INSURANCE_EOB_KEYWORDS: &[&str] = &[
    "explanation of benefits",
    "payer",
    "claim number",
    "allowed amount",
    "denied amount",
    "adjustment",
    "member id",
];

const IMAGING_KEYWORDS: &[&str] = &[
    "impression",
    "findings",
    "study type",
    "radiograph",
    "mri",
    "ct scan",
    "ultrasound",
    "x-ray",
];

/// Keyword table for a classifiable [`DocType`].
fn keywords_for(doc_type: DocType) -> &'static [&'static str] {
    match doc_type {
        DocType::Medical => MEDICAL_KEYWORDS,
        DocType::Pleading => PLEADING_KEYWORDS,
        DocType::Police => POLICE_KEYWORDS,
        DocType::Transcript => TRANSCRIPT_KEYWORDS,
        DocType::InsuranceEob => INSURANCE_EOB_KEYWORDS,
        DocType::Imaging => IMAGING_KEYWORDS,
        DocType::Unknown => &[],
    }
}

/// Count case-insensitive, possibly-overlapping-free substring hits of
/// `keyword` in `lowercased_text` (`lowercased_text` must already be
/// lowercased; `keyword` must already be lowercase).
fn count_hits(lowercased_text: &str, keyword: &str) -> usize {
    lowercased_text.matches(keyword).count()
}

/// Score `text` against every classifiable [`DocType`]'s keyword table.
pub fn score(text: &str) -> [(DocType, usize); 6] {
    let lowercased = text.to_lowercase();
    let mut scores = [(DocType::Medical, 0usize); 6];
    for (slot, doc_type) in scores
        .iter_mut()
        .zip(DocType::CLASSIFIABLE_IN_TIE_BREAK_ORDER)
    {
        let total: usize = keywords_for(doc_type)
            .iter()
            .map(|keyword| count_hits(&lowercased, keyword))
            .sum();
        *slot = (doc_type, total);
    }
    scores
}

/// Classify `text`, breaking ties by the fixed order
/// `MEDICAL, PLEADING, POLICE, TRANSCRIPT, INSURANCE_EOB, IMAGING`. Returns
/// [`DocType::Unknown`] if every score is zero.
#[instrument(level = "debug", skip(text))]
pub fn classify(text: &str) -> DocType {
    let scores = score(text);
    let (best_type, best_score) = scores
        .into_iter()
        .max_by_key(|(doc_type, score)| {
            // `max_by_key` returns the *last* maximal element on ties, so we
            // negate the tie-break index to prefer the *first* one instead.
            let tie_break_rank = DocType::CLASSIFIABLE_IN_TIE_BREAK_ORDER
                .iter()
                .position(|t| t == doc_type)
                .unwrap_or(usize::MAX);
            (*score, std::cmp::Reverse(tie_break_rank))
        })
        .expect("scores array is never empty");

    if best_score == 0 {
        DocType::Unknown
    } else {
        best_type
    }
}
