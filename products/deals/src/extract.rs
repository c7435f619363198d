//! Deal extraction: ask the LLM whether a thread is a deal and validate its
//! answer into an [`ExtractionOutcome`] before anything else reads it.

use entity::deals::DealType;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::config::{IntakeConfig, truncate_chars};
use crate::llm::{ChatRequest, LlmClient, LlmError};
use crate::mail::ParsedEmail;

/// Lowest confidence still treated as a deal.
pub const MIN_CONFIDENCE: u8 = 50;

const MESSAGE_SEPARATOR: &str = "\n\n---\n\n";
const EXTRACTION_MAX_TOKENS: u32 = 800;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an analyst at an investment bank. \
Read the e-mail thread and decide whether it describes a potential deal \
(a sale, acquisition, capital raise, asset mandate or other transaction opportunity). \
Respond with a single JSON object and nothing else, using these keys: \
name (short deal name), \
dealType (one of \"M&A\", \"Capital Raising\", \"Asset Management\", \"Opportunity\"), \
client (company name), \
sector (industry), \
estimatedValue (number, millions USD, 0 if unknown), \
description (one or two sentences), \
contactName, \
contactEmail, \
confidence (integer 0-100), \
isDeal (boolean).";

#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedDeal {
    pub name: String,
    pub deal_type: DealType,
    pub client: String,
    pub sector: String,
    pub estimated_value: f64,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub confidence: u8,
}

impl ExtractedDeal {
    /// JSON snapshot stored on the thread's intake record.
    pub fn snapshot(&self) -> Value {
        json!({
            "name": self.name,
            "dealType": self.deal_type.as_str(),
            "client": self.client,
            "sector": self.sector,
            "estimatedValue": self.estimated_value,
            "description": self.description,
            "contactName": self.contact_name,
            "contactEmail": self.contact_email,
            "confidence": self.confidence,
            "isDeal": true,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExtractionOutcome {
    Accepted(ExtractedDeal),
    Rejected { confidence: u8 },
    Malformed(String),
}

impl ExtractionOutcome {
    /// Human-readable reason for a thread that produced no deal.
    pub fn ignore_reason(&self) -> Option<String> {
        match self {
            ExtractionOutcome::Accepted(_) => None,
            ExtractionOutcome::Rejected { confidence } => Some(format!(
                "not a deal opportunity (confidence {confidence}, threshold {MIN_CONFIDENCE})"
            )),
            ExtractionOutcome::Malformed(reason) => {
                Some(format!("unusable extraction response: {reason}"))
            }
        }
    }
}

pub fn build_thread_prompt(emails: &[ParsedEmail], config: &IntakeConfig) -> String {
    emails
        .iter()
        .map(|email| {
            format!(
                "From: {}\nSubject: {}\nDate: {}\n\n{}",
                email.from,
                email.subject,
                email.date,
                truncate_chars(&email.body, config.body_char_limit)
            )
        })
        .collect::<Vec<_>>()
        .join(MESSAGE_SEPARATOR)
}

/// Validate a raw model response.
pub fn parse_extraction(raw: &str) -> ExtractionOutcome {
    let Some(candidate) = find_json_object(raw) else {
        return ExtractionOutcome::Malformed("no JSON object in response".into());
    };
    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(err) => return ExtractionOutcome::Malformed(format!("invalid JSON: {err}")),
    };
    let Value::Object(fields) = value else {
        return ExtractionOutcome::Malformed("response is not an object".into());
    };
    let Some(is_deal) = fields.get("isDeal").and_then(Value::as_bool) else {
        return ExtractionOutcome::Malformed("isDeal missing or not a boolean".into());
    };

    let raw_confidence = number_field(&fields, "confidence")
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 100.0))
        .unwrap_or(0.0);
    // Floored so the stored figure is below the threshold exactly when the
    // raw answer was.
    let confidence = raw_confidence.floor() as u8;
    if !is_deal || raw_confidence < f64::from(MIN_CONFIDENCE) {
        return ExtractionOutcome::Rejected { confidence };
    }

    let Some(name) = text_field(&fields, "name") else {
        return ExtractionOutcome::Malformed("accepted deal has no name".into());
    };

    ExtractionOutcome::Accepted(ExtractedDeal {
        name,
        deal_type: text_field(&fields, "dealType")
            .and_then(|raw| DealType::parse(&raw))
            .unwrap_or(DealType::Opportunity),
        client: text_field(&fields, "client").unwrap_or_else(|| "Unknown".to_string()),
        sector: text_field(&fields, "sector").unwrap_or_else(|| "General".to_string()),
        estimated_value: number_field(&fields, "estimatedValue")
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0),
        description: text_field(&fields, "description"),
        contact_name: text_field(&fields, "contactName"),
        contact_email: text_field(&fields, "contactEmail"),
        confidence,
    })
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Locate the JSON object in a response that may be wrapped in a code fence
/// or surrounded by prose.
pub(crate) fn find_json_object(text: &str) -> Option<&str> {
    let body = strip_code_fence(text).unwrap_or(text);
    let start = body.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, b) in body.bytes().enumerate().skip(start) {
        if escape {
            escape = false;
            continue;
        }
        match b {
            b'\\' if in_string => escape = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let content_start = after.find('\n')? + 1;
    let content = &after[content_start..];
    let end = content.find("```")?;
    Some(content[..end].trim())
}

/// Run extraction and return the validated outcome. Provider failures are
/// returned to the caller.
#[instrument(name = "deals.classify_thread", skip_all, fields(messages = emails.len()))]
pub async fn classify_thread(
    llm: &dyn LlmClient,
    emails: &[ParsedEmail],
    config: &IntakeConfig,
) -> Result<ExtractionOutcome, LlmError> {
    let request = ChatRequest::new(
        EXTRACTION_SYSTEM_PROMPT,
        build_thread_prompt(emails, config),
    )
    .json()
    .max_tokens(EXTRACTION_MAX_TOKENS);
    let raw = llm.complete(request).await?;
    let outcome = parse_extraction(&raw);
    debug!(?outcome, "extraction outcome");
    Ok(outcome)
}

/// Fail-soft extraction: anything other than an accepted deal is `None`.
pub async fn extract_deal_info(
    llm: &dyn LlmClient,
    emails: &[ParsedEmail],
    config: &IntakeConfig,
) -> Option<ExtractedDeal> {
    match classify_thread(llm, emails, config).await {
        Ok(ExtractionOutcome::Accepted(deal)) => Some(deal),
        Ok(ExtractionOutcome::Rejected { .. }) => None,
        Ok(ExtractionOutcome::Malformed(reason)) => {
            warn!(%reason, "discarding malformed extraction");
            None
        }
        Err(err) => {
            warn!(error = %err, "deal extraction failed");
            None
        }
    }
}
