//! Mail collaborator: scan a label/folder for candidate deal messages.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_GMAIL_BASE_URL: &str = "https://gmail.googleapis.com";

/// A message as the intake pipeline sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEmail {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    /// Raw `Date` header.
    pub date: String,
    pub received_at: Option<DateTime<Utc>>,
    pub body: String,
    pub snippet: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Messages sharing a thread id, in scan order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailThread {
    pub thread_id: String,
    pub messages: Vec<ParsedEmail>,
}

impl MailThread {
    /// The message the thread is recorded under.
    pub fn first(&self) -> Option<&ParsedEmail> {
        self.messages.first()
    }
}

/// Group messages by thread id, keeping first-seen thread order and the
/// message order within each thread.
pub fn group_by_thread(emails: Vec<ParsedEmail>) -> Vec<MailThread> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut threads: Vec<MailThread> = Vec::new();
    for email in emails {
        match index.get(&email.thread_id) {
            Some(&slot) => threads[slot].messages.push(email),
            None => {
                index.insert(email.thread_id.clone(), threads.len());
                threads.push(MailThread {
                    thread_id: email.thread_id.clone(),
                    messages: vec![email],
                });
            }
        }
    }
    threads
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail authorization expired or invalid")]
    AuthExpired,
    #[error("mail folder `{0}` not found")]
    FolderNotFound(String),
    #[error("mail API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("mail network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[async_trait]
pub trait MailSource: Send + Sync {
    /// List the messages currently filed under `folder`.
    async fn scan_deal_folder(&self, folder: &str) -> Result<Vec<ParsedEmail>, MailError>;
}

#[derive(Clone, Debug)]
pub struct GmailConfig {
    pub access_token: String,
    pub base_url: String,
    pub user_id: String,
    pub page_size: u32,
}

impl GmailConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: DEFAULT_GMAIL_BASE_URL.to_string(),
            user_id: "me".to_string(),
            page_size: 50,
        }
    }
}

pub struct GmailClient {
    config: GmailConfig,
    http: reqwest::Client,
}

impl GmailClient {
    pub fn new(config: GmailConfig) -> Result<Self, MailError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.user_id,
            path
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, MailError> {
        let response = request.bearer_auth(&self.config.access_token).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MailError::AuthExpired);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn resolve_label(&self, folder: &str) -> Result<String, MailError> {
        let labels: LabelListResponse = self.get_json(self.http.get(self.url("labels"))).await?;
        labels
            .labels
            .into_iter()
            .find(|label| label.name.eq_ignore_ascii_case(folder) || label.id == folder)
            .map(|label| label.id)
            .ok_or_else(|| MailError::FolderNotFound(folder.to_string()))
    }

    async fn fetch_message(&self, id: &str) -> Result<ParsedEmail, MailError> {
        let detail: MessageDetail = self
            .get_json(
                self.http
                    .get(self.url(&format!("messages/{id}")))
                    .query(&[("format", "full")]),
            )
            .await?;
        Ok(detail.into_parsed())
    }
}

#[async_trait]
impl MailSource for GmailClient {
    #[instrument(name = "mail.scan_folder", skip(self))]
    async fn scan_deal_folder(&self, folder: &str) -> Result<Vec<ParsedEmail>, MailError> {
        let label_id = self.resolve_label(folder).await?;
        let page_size = self.config.page_size.to_string();
        let list: MessageListResponse = self
            .get_json(self.http.get(self.url("messages")).query(&[
                ("labelIds", label_id.as_str()),
                ("maxResults", page_size.as_str()),
            ]))
            .await?;

        let mut emails = Vec::with_capacity(list.messages.len());
        for stub in &list.messages {
            match self.fetch_message(&stub.id).await {
                Ok(email) => emails.push(email),
                Err(err) => {
                    debug!(message_id = %stub.id, error = %err, "skipping message");
                }
            }
        }
        // The API lists newest first; threads read oldest first.
        emails.reverse();
        Ok(emails)
    }
}

#[derive(Debug, Deserialize)]
struct LabelListResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attachment_id: Option<String>,
}

impl MessageDetail {
    fn into_parsed(self) -> ParsedEmail {
        let payload = self.payload.unwrap_or_default();
        let header = |name: &str| {
            payload
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };
        let from = header("From");
        let subject = header("Subject");
        let date = header("Date");

        let received_at = self
            .internal_date
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .or_else(|| {
                DateTime::parse_from_rfc2822(&date)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            });

        let body = plain_text_body(&payload).unwrap_or_else(|| self.snippet.clone());
        let mut attachments = Vec::new();
        collect_attachments(&payload, &mut attachments);

        ParsedEmail {
            id: self.id,
            thread_id: self.thread_id,
            from,
            subject,
            date,
            received_at,
            body,
            snippet: self.snippet,
            attachments,
        }
    }
}

fn plain_text_body(part: &MessagePart) -> Option<String> {
    if part.mime_type.eq_ignore_ascii_case("text/plain") && part.filename.is_empty() {
        if let Some(text) = part
            .body
            .as_ref()
            .and_then(|body| body.data.as_deref())
            .and_then(decode_base64url)
        {
            return Some(text);
        }
    }
    part.parts.iter().find_map(plain_text_body)
}

fn collect_attachments(part: &MessagePart, out: &mut Vec<String>) {
    let is_attachment = !part.filename.is_empty()
        && part
            .body
            .as_ref()
            .is_some_and(|body| body.attachment_id.is_some());
    if is_attachment {
        out.push(part.filename.clone());
    }
    for child in &part.parts {
        collect_attachments(child, out);
    }
}

fn decode_base64url(data: &str) -> Option<String> {
    let trimmed = data.trim();
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed.trim_end_matches('='))
        .or_else(|_| URL_SAFE.decode(trimmed))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str, thread: &str) -> ParsedEmail {
        ParsedEmail {
            id: id.into(),
            thread_id: thread.into(),
            from: "banker@example.com".into(),
            subject: format!("subject {id}"),
            date: String::new(),
            received_at: None,
            body: String::new(),
            snippet: String::new(),
            attachments: vec![],
        }
    }

    #[test]
    fn threads_keep_first_seen_order() {
        let threads = group_by_thread(vec![
            email("1", "a"),
            email("2", "b"),
            email("3", "a"),
            email("4", "c"),
        ]);
        let ids: Vec<_> = threads.iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        let a: Vec<_> = threads[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(a, ["1", "3"]);
        assert_eq!(threads[0].first().map(|m| m.id.as_str()), Some("1"));
    }

    #[test]
    fn empty_thread_has_no_first_message() {
        let thread = MailThread {
            thread_id: "empty".into(),
            messages: vec![],
        };
        assert!(thread.first().is_none());
    }

    #[test]
    fn full_message_payload_is_flattened() {
        let plain = URL_SAFE_NO_PAD.encode("We'd like to explore a sale of Acme Corp.");
        let raw = serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "snippet": "We'd like to explore",
            "internalDate": "1760000000000",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "From", "value": "CFO <cfo@acme.test>"},
                    {"name": "Subject", "value": "Strategic options"},
                    {"name": "Date", "value": "Thu, 9 Oct 2025 08:53:20 +0000"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {"mimeType": "text/plain", "body": {"data": plain}},
                            {"mimeType": "text/html", "body": {"data": "PGI-aGk8L2I-"}}
                        ]
                    },
                    {
                        "mimeType": "application/pdf",
                        "filename": "teaser.pdf",
                        "body": {"attachmentId": "att-1", "size": 1024}
                    }
                ]
            }
        });
        let detail: MessageDetail = serde_json::from_value(raw).unwrap();
        let parsed = detail.into_parsed();
        assert_eq!(parsed.from, "CFO <cfo@acme.test>");
        assert_eq!(parsed.subject, "Strategic options");
        assert_eq!(parsed.body, "We'd like to explore a sale of Acme Corp.");
        assert_eq!(parsed.attachments, vec!["teaser.pdf".to_string()]);
        assert_eq!(
            parsed.received_at,
            Utc.timestamp_millis_opt(1_760_000_000_000).single()
        );
    }

    #[test]
    fn snippet_stands_in_without_plain_part() {
        let raw = serde_json::json!({
            "id": "m2",
            "threadId": "t2",
            "snippet": "see attached",
            "payload": {"mimeType": "text/html", "headers": [
                {"name": "Date", "value": "Thu, 9 Oct 2025 08:53:20 +0000"}
            ]}
        });
        let detail: MessageDetail = serde_json::from_value(raw).unwrap();
        let parsed = detail.into_parsed();
        assert_eq!(parsed.body, "see attached");
        assert!(parsed.received_at.is_some());
    }

    #[test]
    fn padded_base64url_decodes() {
        let padded = URL_SAFE.encode("hi");
        assert!(padded.ends_with('='));
        assert_eq!(decode_base64url(&padded).as_deref(), Some("hi"));
    }
}
