//! Constructs the request, enforces rate limiting, retries with backoff,
//! and parses function-call output.

use reqwest::blocking::Client;

use crate::{
    prelude::*,
    rate_limit::RateLimiter,
    retry::{BackoffSchedule, MAX_ATTEMPTS, RetryClass, classify_status},
    schema_registry::schemas_for,
    snippet::truncate_utf8_safe_dropping_partial_line,
    types::{DocType, LocalCandidates},
};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You are a legal-intake document extraction assistant. \
Extract the requested fields from the supplied OCR text and local candidate \
fields. Call the provided function with minified JSON only; do not include \
any prose.";

/// Configuration shared by every remote call.
pub struct RemoteConfig {
    pub api_key: String,
    pub model: String,
    pub qps: u32,
    pub timeout_secs: u64,
    pub max_chars_per_snippet: usize,
    /// Overrides the server base URL (everything before `/chat/completions`).
    /// Defaults to [`DEFAULT_API_BASE`] when `None`; settable via the
    /// `OPENAI_API_BASE` environment variable (see `main.rs`).
    pub api_base: Option<String>,
}

impl RemoteConfig {
    fn chat_completions_url(&self) -> String {
        let base = self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

/// A collaborator (not a global) wrapping the HTTP client and rate limiter.
pub struct RemoteExtractor {
    client: Client,
    limiter: RateLimiter,
    config: RemoteConfig,
}

impl RemoteExtractor {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(config.qps),
            config,
        })
    }

    /// Extract structured data for one document, given its classification
    /// and local candidates.
    #[instrument(level = "debug", skip(self, local))]
    pub fn extract(&self, doc_type: DocType, local: &LocalCandidates) -> Result<Value> {
        let snippet =
            truncate_utf8_safe_dropping_partial_line(&local.important_snippets, self.config.max_chars_per_snippet);

        let user_message = format!(
            "Document type guess: {}. Keep output minified JSON only.\n{}\n---\n{}",
            doc_type.tag(),
            Value::Object(local.to_json()),
            snippet
        );

        let functions: Vec<Value> = schemas_for(doc_type)
            .into_iter()
            .map(|schema| {
                json!({
                    "name": schema.name,
                    "parameters": schema.parameters,
                })
            })
            .collect();

        let function_name = crate::schema_registry::forced_function_name(doc_type);

        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_message},
            ],
            "functions": functions,
            "function_call": {"name": function_name},
        });

        let response_value = self.dispatch_with_retry(&body)?;
        let arguments = extract_function_call_arguments(&response_value)?;
        let parsed = parse_with_brace_recovery(&arguments)?;
        validate_against_schema(&parsed, doc_type, function_name)?;
        Ok(parsed)
    }

    /// Dispatch the request, retrying on transient failures per our backoff policy.
    fn dispatch_with_retry(&self, body: &Value) -> Result<Value> {
        let mut backoff = BackoffSchedule::default();

        for attempt in 1..=MAX_ATTEMPTS {
            self.limiter.acquire();

            let result = self
                .client
                .post(self.config.chat_completions_url())
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send();

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    // Transport failures are fatal to this document
                    // immediately; they are not part of the HTTP-status
                    // retry ladder.
                    return Err(PipelineError::TransportError(err.to_string()).into());
                }
            };

            let status = response.status().as_u16();
            let class = classify_status(status);

            match class {
                RetryClass::Success => {
                    return response
                        .json::<Value>()
                        .map_err(|err| PipelineError::ParseError(err.to_string()).into());
                }
                RetryClass::RateLimited | RetryClass::ServerError if attempt < MAX_ATTEMPTS => {
                    let delay = backoff.next_delay(class);
                    debug!(attempt, status, ?delay, "retrying after transient error");
                    std::thread::sleep(delay);
                }
                _ => {
                    let body_text = response.text().unwrap_or_default();
                    return Err(PipelineError::RemoteError {
                        status,
                        body: body_text,
                    }
                    .into());
                }
            }
        }

        unreachable!("loop always returns on the final attempt")
    }
}

/// Extract `choices[0].message.function_call.arguments`, falling back to
/// `choices[0].message.content` if the function-call field is absent.
fn extract_function_call_arguments(response: &Value) -> Result<String> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| PipelineError::ParseError("no choices in response".to_string()))?;

    if let Some(arguments) = message.pointer("/function_call/arguments").and_then(|v| v.as_str())
    {
        return Ok(arguments.to_string());
    }

    if let Some(content) = message.get("content").and_then(|v| v.as_str()) {
        return Ok(content.to_string());
    }

    Err(PipelineError::ParseError("no function_call.arguments or content in response".to_string()).into())
}

/// Parse `text` as JSON. On failure, fall back to locating the first `{`
/// and last `}` and parsing that substring (brace-recovery).
fn parse_with_brace_recovery(text: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(PipelineError::ParseError(format!("could not parse model output as JSON: {text:?}")).into())
}

/// Validate `parsed` against the `parameters` schema that was forced via
/// `function_call.name`, using `jsonschema::validator_for` so we don't trust
/// LLM output blindly. A model output missing a required field, or one that
/// isn't even a JSON object, surfaces as a `ParseError` rather than being
/// merged as if it were `ok: true`.
fn validate_against_schema(parsed: &Value, doc_type: DocType, function_name: &str) -> Result<()> {
    let schema = schemas_for(doc_type)
        .into_iter()
        .find(|schema| schema.name == function_name)
        .ok_or_else(|| {
            PipelineError::ParseError(format!("no schema registered for {function_name:?}"))
        })?
        .parameters;

    let validator = jsonschema::validator_for(&schema)
        .map_err(|err| PipelineError::ParseError(format!("invalid schema {function_name:?}: {err}")))?;

    if !validator.is_valid(parsed) {
        let errors: Vec<String> = validator
            .iter_errors(parsed)
            .map(|err| err.to_string())
            .collect();
        return Err(PipelineError::ParseError(format!(
            "model output for {function_name:?} failed schema validation: {}",
            errors.join("; ")
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_arguments_preferring_function_call() {
        let response = json!({
            "choices": [{
                "message": {
                    "function_call": {"arguments": "{\"confidence\":0.9}"},
                    "content": null,
                }
            }]
        });
        assert_eq!(
            extract_function_call_arguments(&response).unwrap(),
            "{\"confidence\":0.9}"
        );
    }

    #[test]
    fn falls_back_to_content() {
        let response = json!({
            "choices": [{"message": {"content": "{\"confidence\":0.5}"}}]
        });
        assert_eq!(
            extract_function_call_arguments(&response).unwrap(),
            "{\"confidence\":0.5}"
        );
    }

    #[test]
    fn brace_recovery_handles_prefixed_junk() {
        let text = "Sure, here you go: {\"confidence\": 0.8} Thanks!";
        let value = parse_with_brace_recovery(text).unwrap();
        assert_eq!(value["confidence"], json!(0.8));
    }

    #[test]
    fn brace_recovery_fails_on_garbage() {
        assert!(parse_with_brace_recovery("not json at all").is_err());
    }

    #[test]
    fn validates_against_schema() {
        let parsed = json!({"confidence": 0.9});
        assert!(validate_against_schema(&parsed, DocType::Transcript, "extract_transcript_json").is_ok());
        assert!(validate_against_schema(&parsed, DocType::Medical, "extract_medical_json").is_err());
    }

    /// A tiny sequential HTTP/1.1 server, standing in for the OpenAI
    /// endpoint via `OPENAI_API_BASE`-style overriding (see
    /// `RemoteConfig::api_base`). Each call to `extract` issues one
    /// connection per response we've queued up.
    mod mock_server {
        use std::{
            io::{Read, Write},
            net::TcpListener,
            thread::JoinHandle,
        };

        pub fn start(responses: Vec<(u16, String)>) -> (String, JoinHandle<()>) {
            let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind mock server");
            let base_url = format!("http://{}", listener.local_addr().unwrap());

            let handle = std::thread::spawn(move || {
                for (status, body) in responses {
                    let (mut stream, _) = match listener.accept() {
                        Ok(accepted) => accepted,
                        Err(_) => return,
                    };
                    let mut buf = [0u8; 65536];
                    let _ = stream.read(&mut buf);

                    let reason = match status {
                        200 => "OK",
                        429 => "Too Many Requests",
                        500..=599 => "Internal Server Error",
                        _ => "Error",
                    };
                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes());
                    let _ = stream.flush();
                }
            });

            (base_url, handle)
        }
    }

    fn function_call_body(arguments: &str) -> String {
        json!({
            "choices": [{
                "message": {"function_call": {"arguments": arguments}}
            }]
        })
        .to_string()
    }

    fn test_extractor(api_base: String) -> RemoteExtractor {
        RemoteExtractor::new(RemoteConfig {
            api_key: "test-key".to_string(),
            model: "gpt-4o-mini".to_string(),
            qps: 50,
            timeout_secs: 30,
            max_chars_per_snippet: 2000,
            api_base: Some(api_base),
        })
        .unwrap()
    }

    #[test]
    fn succeeds_on_first_attempt() {
        let body = function_call_body(r#"{"patient_name":"Jane","confidence":0.9}"#);
        let (base_url, handle) = mock_server::start(vec![(200, body)]);
        let extractor = test_extractor(base_url);

        let local = LocalCandidates {
            important_snippets: "Patient: Jane".to_string(),
            char_count: 13,
            ..Default::default()
        };
        let result = extractor.extract(DocType::Medical, &local).unwrap();
        assert_eq!(result["patient_name"], json!("Jane"));
        handle.join().unwrap();
    }

    #[test]
    fn retries_past_429_then_succeeds() {
        let success_body = function_call_body(r#"{"patient_name":"Jane","confidence":0.9}"#);
        let (base_url, handle) = mock_server::start(vec![
            (429, "rate limited".to_string()),
            (429, "rate limited".to_string()),
            (200, success_body),
        ]);
        let extractor = test_extractor(base_url);

        let local = LocalCandidates::default();
        let result = extractor.extract(DocType::Medical, &local).unwrap();
        assert_eq!(result["confidence"], json!(0.9));
        handle.join().unwrap();
    }

    #[test]
    fn exhausts_retries_and_surfaces_remote_error() {
        let (base_url, handle) = mock_server::start(vec![
            (500, "boom".to_string()),
            (500, "boom".to_string()),
            (500, "boom".to_string()),
            (500, "boom".to_string()),
        ]);
        let extractor = test_extractor(base_url);

        let local = LocalCandidates::default();
        let err = extractor.extract(DocType::Medical, &local).unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
        handle.join().unwrap();
    }
}
