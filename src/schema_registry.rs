//! Per-`DocType` function schemas and function names.

use crate::{prelude::*, types::DocType};

/// A single OpenAI-style function schema.
#[derive(Debug, Clone)]
pub struct FunctionSchema {
    pub name: &'static str,
    pub parameters: Value,
}

fn medical_schema() -> FunctionSchema {
    FunctionSchema {
        name: "extract_medical_json",
        parameters: json!({
            "type": "object",
            "properties": {
                "patient_name": {"type": "string"},
                "dob": {"type": "string"},
                "dates_of_service": {"type": "array", "items": {"type": "string"}},
                "diagnoses": {"type": "array", "items": {"type": "string"}},
                "procedures": {"type": "array", "items": {"type": "string"}},
                "medications": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"},
            },
            "required": ["patient_name", "confidence"],
        }),
    }
}

fn pleading_schema() -> FunctionSchema {
    FunctionSchema {
        name: "extract_pleading_json",
        parameters: json!({
            "type": "object",
            "properties": {
                "court": {"type": "string"},
                "caption": {"type": "string"},
                "index_number": {"type": "string"},
                "parties": {"type": "array", "items": {"type": "string"}},
                "causes_of_action": {"type": "array", "items": {"type": "string"}},
                "relief_sought": {"type": "string"},
                "confidence": {"type": "number"},
            },
            "required": ["caption", "confidence"],
        }),
    }
}

fn police_schema() -> FunctionSchema {
    FunctionSchema {
        name: "extract_police_json",
        parameters: json!({
            "type": "object",
            "properties": {
                "report_number": {"type": "string"},
                "incident_date": {"type": "string"},
                "location": {"type": "string"},
                "officer": {"type": "string"},
                "vehicles": {"type": "array", "items": {"type": "string"}},
                "injuries": {"type": "array", "items": {"type": "string"}},
                "violations": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"},
            },
            "required": ["incident_date", "confidence"],
        }),
    }
}

fn transcript_schema() -> FunctionSchema {
    FunctionSchema {
        name: "extract_transcript_json",
        parameters: json!({
            "type": "object",
            "properties": {
                "witness_name": {"type": "string"},
                "date": {"type": "string"},
                "key_admissions": {"type": "array", "items": {"type": "string"}},
                "key_inconsistencies": {"type": "array", "items": {"type": "string"}},
                "credibility_factors": {"type": "array", "items": {"type": "string"}},
                "citations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "page": {"type": "integer"},
                            "line": {"type": "string"},
                            "text": {"type": "string"},
                        },
                        "required": ["page", "text"],
                    },
                },
                "confidence": {"type": "number"},
            },
            "required": ["confidence"],
        }),
    }
}

fn eob_schema() -> FunctionSchema {
    FunctionSchema {
        name: "extract_eob_json",
        parameters: json!({
            "type": "object",
            "properties": {
                "payer": {"type": "string"},
                "member": {"type": "string"},
                "claim_number": {"type": "string"},
                "service_dates": {"type": "array", "items": {"type": "string"}},
                "allowed_amount": {"type": "string"},
                "denied_amount": {"type": "string"},
                "adjustments": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"},
            },
            "required": ["payer", "claim_number", "confidence"],
        }),
    }
}

fn imaging_schema() -> FunctionSchema {
    FunctionSchema {
        name: "extract_imaging_json",
        parameters: json!({
            "type": "object",
            "properties": {
                "patient_name": {"type": "string"},
                "study_type": {"type": "string"},
                "study_date": {"type": "string"},
                "impression": {"type": "array", "items": {"type": "string"}},
                "findings": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"},
            },
            "required": ["impression", "confidence"],
        }),
    }
}

/// All six schemas, in a fixed order.
pub fn all_schemas() -> Vec<FunctionSchema> {
    vec![
        medical_schema(),
        pleading_schema(),
        police_schema(),
        transcript_schema(),
        eob_schema(),
        imaging_schema(),
    ]
}

/// The schemas offered to the remote extractor for `doc_type`. `UNKNOWN`
/// receives all six.
pub fn schemas_for(doc_type: DocType) -> Vec<FunctionSchema> {
    match doc_type {
        DocType::Medical => vec![medical_schema()],
        DocType::Pleading => vec![pleading_schema()],
        DocType::Police => vec![police_schema()],
        DocType::Transcript => vec![transcript_schema()],
        DocType::InsuranceEob => vec![eob_schema()],
        DocType::Imaging => vec![imaging_schema()],
        DocType::Unknown => all_schemas(),
    }
}

/// The function name forced via `function_call.name`. `UNKNOWN` defaults to
/// `extract_medical_json`.
pub fn forced_function_name(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Medical | DocType::Unknown => "extract_medical_json",
        DocType::Pleading => "extract_pleading_json",
        DocType::Police => "extract_police_json",
        DocType::Transcript => "extract_transcript_json",
        DocType::InsuranceEob => "extract_eob_json",
        DocType::Imaging => "extract_imaging_json",
    }
}
