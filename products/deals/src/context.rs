use chrono::Utc;
use entity::deal_ai_contexts;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr, EntityTrait};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::{IntakeConfig, truncate_chars};
use crate::llm::{ChatRequest, LlmClient};
use crate::mail::ParsedEmail;

pub const EMAIL_CONTEXT_TYPE: &str = "email";

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize e-mails for an investment banking deal team. \
Reply with two or three plain sentences covering who is writing, what they want and any \
figures or dates mentioned.";
const SUMMARY_MAX_TOKENS: u32 = 200;

/// Summarize a message, falling back to the opening of its body when the
/// provider fails or answers with nothing.
pub async fn summarize_email(
    llm: &dyn LlmClient,
    email: &ParsedEmail,
    config: &IntakeConfig,
) -> String {
    let prompt = format!(
        "From: {}\nSubject: {}\n\n{}",
        email.from,
        email.subject,
        truncate_chars(&email.body, config.body_char_limit)
    );
    let request = ChatRequest::new(SUMMARY_SYSTEM_PROMPT, prompt).max_tokens(SUMMARY_MAX_TOKENS);
    match llm.complete(request).await {
        Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
        Ok(_) => excerpt(email, config),
        Err(err) => {
            warn!(email = %email.id, error = %err, "summary failed; storing excerpt");
            excerpt(email, config)
        }
    }
}

fn excerpt(email: &ParsedEmail, config: &IntakeConfig) -> String {
    truncate_chars(&email.body, config.summary_excerpt_chars).to_string()
}

/// Store a source e-mail against the deal. Context rows are append-only.
#[instrument(name = "deals.attach_context", skip_all, fields(deal = %deal_id, email = %email.id))]
pub async fn attach_email_context<C>(
    db: &C,
    llm: &dyn LlmClient,
    deal_id: Uuid,
    email: &ParsedEmail,
    config: &IntakeConfig,
) -> Result<deal_ai_contexts::Model, DbErr>
where
    C: ConnectionTrait,
{
    let summary = summarize_email(llm, email, config).await;
    let model = deal_ai_contexts::Model {
        id: Uuid::new_v4(),
        deal_id,
        context_type: EMAIL_CONTEXT_TYPE.to_string(),
        content: format!(
            "From: {}\nSubject: {}\nDate: {}\n\n{}",
            email.from, email.subject, email.date, email.body
        ),
        summary: Some(summary),
        source_id: Some(email.id.clone()),
        processed_at: Utc::now().into(),
    };
    let row = deal_ai_contexts::ActiveModel {
        id: Set(model.id),
        deal_id: Set(model.deal_id),
        context_type: Set(model.context_type.clone()),
        content: Set(model.content.clone()),
        summary: Set(model.summary.clone()),
        source_id: Set(model.source_id.clone()),
        processed_at: Set(model.processed_at),
    };
    deal_ai_contexts::Entity::insert(row)
        .exec_without_returning(db)
        .await?;
    Ok(model)
}
